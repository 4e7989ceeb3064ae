//! Capture sinks: where mirrored connection bytes are written.
//!
//! A sink is any `std::io::Write`. Each connection owns exactly one sink for
//! its lifetime; the sink is dropped (and therefore closed) with the
//! connection. Sinks come from a [`SinkFactory`], invoked once per
//! connection.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Per-connection sink handed to a [`DuplexSocket`](super::duplex::DuplexSocket).
pub type BoxSink = Box<dyn Write + Send>;

/// Produces a fresh sink for each new connection.
///
/// Failures abort only the connection that asked for the sink.
///
/// Sinks are written synchronously from the connection's `poll_read` and
/// `poll_write`, on the runtime thread driving the connection. A sink that
/// blocks (a full stderr pipe, a slow disk) stalls that thread; wrap the
/// factory in [`BackgroundSinks`] to move the writes onto a dedicated thread.
pub trait SinkFactory: Send + Sync {
    fn make_sink(&self) -> io::Result<BoxSink>;
}

impl<F> SinkFactory for F
where
    F: Fn() -> io::Result<BoxSink> + Send + Sync,
{
    fn make_sink(&self) -> io::Result<BoxSink> {
        self()
    }
}

/// Hands every connection a handle to the process's standard error.
///
/// Concurrent connections interleave on stderr, so this is only readable
/// for one connection at a time. It is the default for the client dialer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSinks;

impl SinkFactory for StderrSinks {
    fn make_sink(&self) -> io::Result<BoxSink> {
        Ok(Box::new(io::stderr()))
    }
}

/// In-memory sink whose clones all append to the same buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Contents decoded as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Factory that gives every connection a handle to this same buffer.
    pub fn sinks(&self) -> impl SinkFactory + Clone + 'static {
        let buffer = self.clone();
        move || -> io::Result<BoxSink> { Ok(Box::new(buffer.clone())) }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panicking writer cannot leave a Vec<u8> half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .finish()
    }
}

/// Factory that creates a new [`SharedBuffer`] for every connection and
/// remembers them in creation order.
///
/// Every buffer is kept until [`take`](Self::take) drains them, so this is
/// meant for tests and short captures, not a long-running server.
#[derive(Clone, Default)]
pub struct PerConnectionBuffers {
    created: Arc<Mutex<Vec<SharedBuffer>>>,
}

impl PerConnectionBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers handed out so far, oldest first.
    pub fn buffers(&self) -> Vec<SharedBuffer> {
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Remove and return the buffers handed out so far, oldest first.
    /// Connections still open keep writing to their (now detached) buffer.
    pub fn take(&self) -> Vec<SharedBuffer> {
        std::mem::take(
            &mut *self
                .created
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl SinkFactory for PerConnectionBuffers {
    fn make_sink(&self) -> io::Result<BoxSink> {
        let buffer = SharedBuffer::new();
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(buffer.clone());
        Ok(Box::new(buffer))
    }
}

impl fmt::Debug for PerConnectionBuffers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerConnectionBuffers")
            .field("connections", &self.buffers().len())
            .finish()
    }
}

/// Upper bound on `-N` suffixes tried when capture file names collide.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Writes each connection to its own file named after the UTC time the
/// connection started, e.g. `20261018T090807.123Z.txt`.
///
/// Files are created with `create_new`, so an existing capture is never
/// truncated: a second connection within the same millisecond gets a `-1`,
/// `-2`, ... suffix instead.
#[derive(Debug, Clone)]
pub struct DebugFileSinks {
    dir: PathBuf,
}

impl DebugFileSinks {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Files in the system temporary directory (`/tmp` on most Unix systems).
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a connection started at `at`, in UTC to the millisecond.
    pub fn file_name(at: OffsetDateTime) -> io::Result<String> {
        Ok(format!("{}.txt", Self::stamp(at)?))
    }

    /// Create the capture file for a connection started at `at`.
    pub fn create_at(&self, at: OffsetDateTime) -> io::Result<(PathBuf, File)> {
        let stamp = Self::stamp(at)?;
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.txt", stamp)
            } else {
                format!("{}-{}.txt", stamp, attempt)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    tracing::debug!(path = %path.display(), "opened capture file");
                    return Ok((path, file));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "failed to create capture file");
                    return Err(e);
                }
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free capture file name for {}", stamp),
        ))
    }

    fn stamp(at: OffsetDateTime) -> io::Result<String> {
        let format =
            format_description!("[year][month][day]T[hour][minute][second].[subsecond digits:3]Z");
        at.to_offset(UtcOffset::UTC)
            .format(format)
            .map_err(io::Error::other)
    }
}

impl SinkFactory for DebugFileSinks {
    fn make_sink(&self) -> io::Result<BoxSink> {
        let (_, file) = self.create_at(OffsetDateTime::now_utc())?;
        Ok(Box::new(file))
    }
}

/// Wraps a factory so each sink is drained by its own writer thread.
///
/// Connection I/O only queues a copy of the bytes and never waits on the
/// underlying sink. The queue is unbounded: a sink that cannot keep up
/// costs memory instead of stalling the connection. The writer flushes and
/// drops the sink once the connection's end is dropped and the queue is empty.
#[derive(Debug, Clone)]
pub struct BackgroundSinks<F> {
    inner: F,
}

impl<F: SinkFactory> BackgroundSinks<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: SinkFactory> SinkFactory for BackgroundSinks<F> {
    fn make_sink(&self) -> io::Result<BoxSink> {
        let mut sink = self.inner.make_sink()?;
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        thread::Builder::new()
            .name("connspy-sink".to_string())
            .spawn(move || {
                for chunk in rx {
                    if let Err(e) = sink.write_all(&chunk) {
                        tracing::debug!(len = chunk.len(), error = %e, "background sink write failed");
                    }
                }
                if let Err(e) = sink.flush() {
                    tracing::debug!(error = %e, "background sink flush failed");
                }
            })?;
        Ok(Box::new(QueuedSink { tx }))
    }
}

/// Connection-side end of a [`BackgroundSinks`] sink.
struct QueuedSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl Write for QueuedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "sink writer thread stopped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_shared_buffer_clones_share_storage() {
        let buffer = SharedBuffer::new();
        let mut a = buffer.clone();
        let mut b = buffer.clone();

        a.write_all(b"GET / HTTP/1.1\r\n").unwrap();
        b.write_all(b"Host: example.com\r\n").unwrap();

        assert_eq!(buffer.to_string_lossy(), "GET / HTTP/1.1\r\nHost: example.com\r\n");
    }

    #[test]
    fn test_shared_buffer_factory_reuses_buffer() {
        let buffer = SharedBuffer::new();
        let sinks = buffer.sinks();

        sinks.make_sink().unwrap().write_all(b"one").unwrap();
        sinks.make_sink().unwrap().write_all(b"two").unwrap();

        assert_eq!(buffer.contents(), b"onetwo");
    }

    #[test]
    fn test_per_connection_buffers_are_distinct() {
        let factory = PerConnectionBuffers::new();
        let mut first = factory.make_sink().unwrap();
        let mut second = factory.make_sink().unwrap();

        first.write_all(b"first").unwrap();
        second.write_all(b"second").unwrap();

        let buffers = factory.buffers();
        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers[0].contents(), b"first");
        assert_eq!(buffers[1].contents(), b"second");
    }

    #[test]
    fn test_per_connection_buffers_take_drains() {
        let factory = PerConnectionBuffers::new();
        factory.make_sink().unwrap().write_all(b"old").unwrap();

        let taken = factory.take();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].contents(), b"old");
        assert!(factory.buffers().is_empty());

        factory.make_sink().unwrap().write_all(b"new").unwrap();
        assert_eq!(factory.buffers()[0].contents(), b"new");
    }

    #[test]
    fn test_debug_file_name_is_utc_millis() {
        let at = datetime!(2026-10-18 09:08:07.123456 UTC);
        assert_eq!(DebugFileSinks::file_name(at).unwrap(), "20261018T090807.123Z.txt");

        let shifted = datetime!(2026-10-18 11:08:07.123 +2);
        assert_eq!(DebugFileSinks::file_name(shifted).unwrap(), "20261018T090807.123Z.txt");
    }

    #[test]
    fn test_debug_files_in_same_millisecond_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = DebugFileSinks::new(dir.path());
        let at = datetime!(2026-10-18 09:08:07.123 UTC);

        let (first_path, mut first) = sinks.create_at(at).unwrap();
        let (second_path, mut second) = sinks.create_at(at).unwrap();
        first.write_all(b"first").unwrap();
        second.write_all(b"second").unwrap();

        assert_ne!(first_path, second_path);
        assert_eq!(first_path, dir.path().join("20261018T090807.123Z.txt"));
        assert_eq!(second_path, dir.path().join("20261018T090807.123Z-1.txt"));
        assert_eq!(std::fs::read(&first_path).unwrap(), b"first");
        assert_eq!(std::fs::read(&second_path).unwrap(), b"second");
    }

    #[test]
    fn test_debug_file_factory_reports_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = DebugFileSinks::new(dir.path().join("missing"));
        let err = sinks.make_sink().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_debug_file_factory_creates_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = DebugFileSinks::new(dir.path());
        for _ in 0..5 {
            sinks.make_sink().unwrap().write_all(b"x").unwrap();
        }
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 5);
    }

    #[test]
    fn test_background_sink_delivers_in_order() {
        let buffer = SharedBuffer::new();
        let factory = BackgroundSinks::new(buffer.sinks());
        let mut sink = factory.make_sink().unwrap();
        for chunk in [&b"one "[..], b"two ", b"three"] {
            assert_eq!(sink.write(chunk).unwrap(), chunk.len());
        }
        drop(sink);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while buffer.len() < 13 && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(buffer.to_string_lossy(), "one two three");
    }

    #[test]
    fn test_closure_factory() {
        let factory = || -> io::Result<BoxSink> { Err(io::Error::other("disk full")) };
        let err = factory.make_sink().err().unwrap();
        assert_eq!(err.to_string(), "disk full");
    }
}
