//! Socket interception.
//!
//! Client and server connections are wrapped so that every byte read or
//! written is mirrored into a capture sink:
//! - [`duplex`]: the mirroring stream decorator
//! - [`sink`]: sink types and per-connection sink factories
//! - [`connectjob`]: DNS → TCP connection flow
//! - [`tls`]: client TLS handshake with a deadline and host name check
//! - [`dialer`]: the client dial hook and its `tower::Service<Uri>` connector
//! - [`listener`]: the server-side listener wrapper

pub mod client;
pub mod connectjob;
pub mod dialer;
pub mod duplex;
pub mod listener;
pub mod sink;
pub mod tls;

pub use client::SocketType;
pub use connectjob::{ConnectJob, Network};
pub use dialer::{Dialer, DialerBuilder, SpyConnector, TappedSocket};
pub use duplex::DuplexSocket;
pub use listener::{SpyListener, TappedStream};
pub use sink::{
    BackgroundSinks, BoxSink, DebugFileSinks, PerConnectionBuffers, SharedBuffer, SinkFactory,
    StderrSinks,
};
pub use tls::{TlsConfig, TlsHandshaker};
