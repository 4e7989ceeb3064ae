//! HTTP client and server plumbing over tapped connections.
//!
//! - [`client`]: a `hyper_util` client whose connector is the tapping [`Dialer`](crate::socket::Dialer)
//! - [`server`]: a hyper HTTP/1.1 accept loop over a [`SpyListener`](crate::socket::SpyListener)

pub mod client;
pub mod server;

pub use client::{default_client, new_client, SpyClient};
pub use server::SpyServer;
