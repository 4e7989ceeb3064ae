//! HTTP/1.1 server whose connections are each captured into their own sink.
//!
//! # Example
//!
//! ```rust,ignore
//! use connspy::http::SpyServer;
//! use connspy::socket::PerConnectionBuffers;
//! use hyper::service::service_fn;
//!
//! let server = SpyServer::new(":8080", PerConnectionBuffers::new());
//! server
//!     .listen_and_serve(service_fn(|_req| async {
//!         Ok::<_, std::convert::Infallible>(hyper::Response::new(
//!             http_body_util::Full::new(bytes::Bytes::from("Hello World!\n")),
//!         ))
//!     }))
//!     .await?;
//! ```

use crate::base::neterror::NetError;
use crate::socket::listener::SpyListener;
use crate::socket::sink::SinkFactory;
use http::{Request, Response};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::Service;
use std::error::Error as StdError;
use std::fmt;
use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

/// Pause after an accept error other than a sink failure.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Serves HTTP/1.1 on a [`SpyListener`], one task per connection.
pub struct SpyServer {
    addr: String,
    sinks: Arc<dyn SinkFactory>,
}

impl SpyServer {
    /// `addr` is `host:port`; `":port"` listens on all interfaces and an
    /// empty address means `0.0.0.0:80`.
    pub fn new(addr: impl Into<String>, sinks: impl SinkFactory + 'static) -> Self {
        Self {
            addr: addr.into(),
            sinks: Arc::new(sinks),
        }
    }

    /// The address [`listen_and_serve`](Self::listen_and_serve) binds.
    pub fn addr(&self) -> String {
        if self.addr.is_empty() {
            "0.0.0.0:80".to_string()
        } else if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }

    /// Bind the address and serve until the process ends.
    pub async fn listen_and_serve<S, B>(&self, service: S) -> Result<(), NetError>
    where
        S: Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<Box<dyn StdError + Send + Sync>>,
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.listen_and_serve_with_shutdown(service, future::pending())
            .await
    }

    /// Bind the address and serve until `signal` completes.
    pub async fn listen_and_serve_with_shutdown<S, B, F>(
        &self,
        service: S,
        signal: F,
    ) -> Result<(), NetError>
    where
        S: Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<Box<dyn StdError + Send + Sync>>,
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
        F: Future<Output = ()>,
    {
        let listener = tokio::net::TcpListener::bind(self.addr()).await.map_err(|e| {
            tracing::debug!(addr = %self.addr(), error = %e, "bind failed");
            NetError::from(e)
        })?;
        let listener = SpyListener::with_shared_sinks(listener, self.sinks.clone());
        serve_with_shutdown(listener, service, signal).await
    }
}

impl fmt::Debug for SpyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyServer")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

/// Serve `service` on an existing listener until the process ends.
pub async fn serve<S, B>(listener: SpyListener, service: S) -> Result<(), NetError>
where
    S: Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn StdError + Send + Sync>>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    serve_with_shutdown(listener, service, future::pending()).await
}

/// Accept loop. A connection whose sink cannot be created is skipped; other
/// accept errors are logged and retried after a short pause. Completing
/// `signal` stops accepting; connections already running are left to finish.
pub async fn serve_with_shutdown<S, B, F>(
    listener: SpyListener,
    service: S,
    signal: F,
) -> Result<(), NetError>
where
    S: Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn StdError + Send + Sync>>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
    F: Future<Output = ()>,
{
    tokio::pin!(signal);
    tracing::debug!(addr = ?listener.local_addr().ok(), "serving");

    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut signal => {
                tracing::debug!("shutdown signal received; no longer accepting");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(NetError::SinkUnavailable) => {
                    tracing::warn!("capture sink unavailable; connection dropped");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed; retrying");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
        };

        let service = service.clone();
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new().serve_connection(stream, service).await {
                tracing::debug!(%peer, error = %e, "connection ended with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::sink::StderrSinks;

    #[test]
    fn test_addr_defaults() {
        assert_eq!(SpyServer::new("", StderrSinks).addr(), "0.0.0.0:80");
        assert_eq!(SpyServer::new(":8080", StderrSinks).addr(), "0.0.0.0:8080");
        assert_eq!(SpyServer::new("127.0.0.1:9000", StderrSinks).addr(), "127.0.0.1:9000");
    }
}
