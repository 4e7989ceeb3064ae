//! System DNS resolver using getaddrinfo.
//!
//! Resolution runs in `tokio::task::spawn_blocking` so the runtime is not
//! stalled by the libc call.

use super::{Addrs, Name, Resolve, Resolving};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// System DNS resolver using `getaddrinfo` in a thread pool.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let domain = host.clone();

            let result = tokio::task::spawn_blocking(move || {
                tracing::debug!(host = %host, "resolving via getaddrinfo");
                (host.as_str(), 0u16)
                    .to_socket_addrs()
                    .map(|iter| iter.collect::<Vec<_>>())
            })
            .await;

            let addrs = result
                .map_err(|e| {
                    tracing::error!(error = %e, "DNS resolution task failed");
                    NetError::NameNotResolved
                })?
                .dns_context(&domain)?;

            if addrs.is_empty() {
                tracing::debug!(domain = %domain, "getaddrinfo returned no addresses");
                return Err(NetError::NameNotResolved);
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "DNS resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Addresses for a host that is already an IP literal.
///
/// Lets the connect job skip the resolver entirely for `127.0.0.1:8080`
/// or `[::1]:443` style targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketAddrs {
    addrs: Vec<SocketAddr>,
}

impl SocketAddrs {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self { addrs }
    }

    /// Returns `Some` if `host` parses as an IPv4 or IPv6 address.
    pub fn try_parse(host: &str, port: u16) -> Option<Self> {
        let ip = host.parse::<IpAddr>().ok()?;
        Some(Self {
            addrs: vec![SocketAddr::new(ip, port)],
        })
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// Keep only addresses accepted by `keep`, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&SocketAddr) -> bool) {
        self.addrs.retain(keep);
    }

    /// Set the dial port on every address.
    pub fn with_port(mut self, port: u16) -> Self {
        for addr in &mut self.addrs {
            addr.set_port(port);
        }
        self
    }
}

impl IntoIterator for SocketAddrs {
    type Item = SocketAddr;
    type IntoIter = std::vec::IntoIter<SocketAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.into_iter()
    }
}

impl FromIterator<SocketAddr> for SocketAddrs {
    fn from_iter<I: IntoIterator<Item = SocketAddr>>(iter: I) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}
