//! Host name resolution for the dial hook.
//!
//! The [`Resolve`] trait lets the dialer's resolver be swapped out:
//! - [`GaiResolver`]: the system resolver (getaddrinfo on the blocking pool)
//! - [`DnsResolverWithOverrides`]: fixed host-to-address overrides in front of
//!   another resolver, handy for pointing a certificate's host name at loopback
//!
//! # Example
//!
//! ```rust,ignore
//! use connspy::dns::{GaiResolver, Name, Resolve};
//!
//! let resolver = GaiResolver::new();
//! let addrs = resolver.resolve(Name::new("example.com")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr);
//! }
//! ```

mod gai;
mod resolve;

pub use gai::{GaiResolver, SocketAddrs};
pub use resolve::{Addrs, DnsResolverWithOverrides, Name, Resolve, Resolving};
