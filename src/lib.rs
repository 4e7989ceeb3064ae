//! # connspy
//!
//! Transparent TCP/TLS connection interception.
//!
//! `connspy` wraps client and server connections so that every byte the
//! application reads or writes is also copied, unmodified and in order, into
//! a capture sink. For TLS connections the copy is the decrypted plaintext.
//! The wrapped connection behaves exactly like the one it wraps.
//!
//! ## Features
//!
//! - **Duplexing socket**: an `AsyncRead + AsyncWrite` decorator that mirrors traffic
//! - **Dial hook**: TCP connect, optional TLS handshake with a 1 second deadline
//!   and host name verification, then tap
//! - **Listener wrapper**: every accepted connection gets its own sink
//! - **hyper integration**: a connector for the legacy client and an HTTP/1.1 server loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use connspy::http::new_client;
//! use connspy::socket::{Dialer, SharedBuffer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let capture = SharedBuffer::new();
//!     let dialer = Dialer::builder().sinks(capture.sinks()).build()?;
//!     let client = new_client::<http_body_util::Empty<bytes::Bytes>>(dialer);
//!
//!     let response = client.get("http://example.com/".parse()?).await?;
//!     println!("Status: {}", response.status());
//!     println!("{}", capture.to_string_lossy());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error codes and error context helpers
//! - [`dns`] - Host name resolution and overrides
//! - [`socket`] - The duplexing socket, sinks, TLS, dialer and listener
//! - [`http`] - hyper client and server wired through the interception layer

pub mod base;
pub mod dns;
pub mod http;
pub mod socket;

pub use base::neterror::NetError;
pub use socket::{
    BackgroundSinks, BoxSink, DebugFileSinks, Dialer, DuplexSocket, PerConnectionBuffers,
    SharedBuffer, SinkFactory, SpyConnector, SpyListener, StderrSinks,
};
