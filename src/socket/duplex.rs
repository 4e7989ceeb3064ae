//! Byte-for-byte mirroring of a stream into a capture sink.
//!
//! [`DuplexSocket`] wraps one established stream and one sink. Every
//! successful read and write is copied to the sink exactly as the
//! application sees it; results, byte counts and errors returned to the
//! application are always the inner stream's own.

use hyper_util::client::legacy::connect::{Connected, Connection};
use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A stream decorator that tees reads and writes into `sink`.
///
/// The sink is written synchronously from inside `poll_read` / `poll_write`,
/// one sink write per completed call, in the order the calls complete.
/// Nothing is buffered and call boundaries are preserved. Sink errors are
/// logged and dropped.
///
/// Shutting the socket down does not close the sink; the sink is closed
/// when the `DuplexSocket` is dropped.
#[derive(Debug)]
pub struct DuplexSocket<S, W> {
    inner: S,
    sink: W,
}

impl<S, W> DuplexSocket<S, W>
where
    W: Write,
{
    pub fn new(inner: S, sink: W) -> Self {
        Self { inner, sink }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Reading or writing through this reference bypasses the sink.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn into_parts(self) -> (S, W) {
        (self.inner, self.sink)
    }

    fn mirror(&mut self, bytes: &[u8], direction: &'static str) {
        if bytes.is_empty() {
            return;
        }
        if let Err(e) = self.sink.write_all(bytes) {
            tracing::debug!(direction, len = bytes.len(), error = %e, "capture sink write failed");
        }
    }
}

impl<S, W> AsyncRead for DuplexSocket<S, W>
where
    S: AsyncRead + Unpin,
    W: Write + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = result {
            this.mirror(&buf.filled()[before..], "read");
        }
        result
    }
}

impl<S, W> AsyncWrite for DuplexSocket<S, W>
where
    S: AsyncWrite + Unpin,
    W: Write + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);
        // Only what the stream accepted; a retried remainder is mirrored on its own call.
        if let Poll::Ready(Ok(n)) = result {
            this.mirror(&buf[..n.min(buf.len())], "write");
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_flush(cx);
        if let Poll::Ready(Ok(())) = result {
            if let Err(e) = this.sink.flush() {
                tracing::debug!(error = %e, "capture sink flush failed");
            }
        }
        result
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

// hyper::rt::Read / Write so the socket can be handed to hyper directly.
impl<S, W> hyper::rt::Read for DuplexSocket<S, W>
where
    S: AsyncRead + Unpin,
    W: Write + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        mut buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        // SAFETY: the tokio ReadBuf only initializes and fills the cursor's
        // unfilled region, and `advance` is called with exactly the filled length.
        let unfilled = unsafe { buf.as_mut() };
        let mut read_buf = ReadBuf::uninit(unfilled);
        match AsyncRead::poll_read(self.as_mut(), cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                unsafe { buf.advance(n) };
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S, W> hyper::rt::Write for DuplexSocket<S, W>
where
    S: AsyncWrite + Unpin,
    W: Write + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        <Self as AsyncWrite>::poll_write(self, cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        <Self as AsyncWrite>::poll_flush(self, cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        <Self as AsyncWrite>::poll_shutdown(self, cx)
    }
}

impl<S, W> Connection for DuplexSocket<S, W>
where
    S: Connection,
{
    fn connected(&self) -> Connected {
        self.inner.connected()
    }
}
