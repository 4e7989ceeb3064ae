//! HTTP client whose raw HTTP/1.1 traffic lands in the dialer's sinks.
//!
//! # Example
//!
//! ```rust,ignore
//! use connspy::http::new_client;
//! use connspy::socket::{Dialer, SharedBuffer};
//!
//! let capture = SharedBuffer::new();
//! let client = new_client(Dialer::builder().sinks(capture.sinks()).build()?);
//! let resp = client.get("http://example.com/".parse()?).await?;
//! println!("{}", capture.to_string_lossy());
//! ```

use crate::base::neterror::NetError;
use crate::socket::dialer::{Dialer, SpyConnector};
use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// A `hyper_util` client over [`SpyConnector`].
pub type SpyClient<B = Full<Bytes>> = Client<SpyConnector, B>;

/// Build a client that dials through `dialer`.
pub fn new_client<B>(dialer: Dialer) -> SpyClient<B>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
{
    Client::builder(TokioExecutor::new()).build(SpyConnector::new(dialer))
}

/// Client with the default dialer: stderr capture, 30s connect timeout,
/// 30s keep-alive and a 1s TLS handshake deadline.
pub fn default_client() -> Result<SpyClient, NetError> {
    Ok(new_client(Dialer::new()?))
}
