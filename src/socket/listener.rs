//! Server-side interception: a listener whose accepted connections are tapped.

use crate::base::neterror::NetError;
use crate::socket::duplex::DuplexSocket;
use crate::socket::sink::{BoxSink, SinkFactory};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

/// An accepted connection whose traffic is mirrored into its own sink.
pub type TappedStream = DuplexSocket<TcpStream, BoxSink>;

enum AcceptFailure {
    Listener(io::Error),
    Sink(io::Error),
}

/// Wraps a [`TcpListener`] so every accepted connection gets a fresh sink.
///
/// The sink factory is called exactly once per accepted connection. If it
/// fails, that connection is closed and the error is returned from
/// [`accept`](Self::accept); the listener itself keeps working.
///
/// Dropping the listener closes only the listening socket. Connections
/// already handed out keep their sinks until they are dropped.
pub struct SpyListener {
    listener: TcpListener,
    sinks: Arc<dyn SinkFactory>,
}

impl SpyListener {
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        sinks: impl SinkFactory + 'static,
    ) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::debug!(error = %e, "bind failed");
            NetError::from(e)
        })?;
        Ok(Self::from_listener(listener, sinks))
    }

    pub fn from_listener(listener: TcpListener, sinks: impl SinkFactory + 'static) -> Self {
        Self::with_shared_sinks(listener, Arc::new(sinks))
    }

    pub fn with_shared_sinks(listener: TcpListener, sinks: Arc<dyn SinkFactory>) -> Self {
        Self { listener, sinks }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.listener.local_addr().map_err(NetError::from)
    }

    /// Accept the next connection and bind it to a new sink.
    pub async fn accept(&self) -> Result<(TappedStream, SocketAddr), NetError> {
        self.accept_tapped().await.map_err(|failure| match failure {
            AcceptFailure::Listener(e) => NetError::from(e),
            AcceptFailure::Sink(_) => NetError::SinkUnavailable,
        })
    }

    /// Like [`accept`](Self::accept) but reports the listener's or the
    /// factory's own error.
    pub async fn accept_io(&self) -> io::Result<(TappedStream, SocketAddr)> {
        self.accept_tapped().await.map_err(|failure| match failure {
            AcceptFailure::Listener(e) | AcceptFailure::Sink(e) => e,
        })
    }

    async fn accept_tapped(&self) -> Result<(TappedStream, SocketAddr), AcceptFailure> {
        let (stream, peer) = self.listener.accept().await.map_err(|e| {
            tracing::debug!(error = %e, "accept failed");
            AcceptFailure::Listener(e)
        })?;

        let sink = self.sinks.make_sink().map_err(|e| {
            tracing::debug!(%peer, error = %e, "no capture sink; dropping connection");
            AcceptFailure::Sink(e)
        })?;

        tracing::debug!(%peer, "accepted connection");
        Ok((DuplexSocket::new(stream, sink), peer))
    }

    pub fn get_ref(&self) -> &TcpListener {
        &self.listener
    }

    pub fn into_inner(self) -> TcpListener {
        self.listener
    }
}

impl fmt::Debug for SpyListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyListener")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}
