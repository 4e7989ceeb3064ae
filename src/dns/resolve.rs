//! Resolver trait and the override wrapper.

use crate::base::neterror::NetError;
use std::{
    borrow::Cow, collections::HashMap, fmt, future::Future, net::SocketAddr, pin::Pin, sync::Arc,
};

/// A host name to resolve into IP addresses.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    #[inline]
    pub fn new(host: impl Into<Box<str>>) -> Self {
        Self { host: host.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Iterator over resolved addresses.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

/// Future returned by a resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Resolves host names for [`ConnectJob`](crate::socket::connectjob::ConnectJob).
///
/// Returned addresses carry port 0; the connect job sets the dial port.
pub trait Resolve: Send + Sync {
    fn resolve(&self, name: Name) -> Resolving;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}

/// Resolver that answers a fixed set of host names itself and forwards
/// everything else to `inner`.
///
/// ```rust,ignore
/// use connspy::dns::{DnsResolverWithOverrides, GaiResolver};
/// use std::collections::HashMap;
///
/// let mut overrides = HashMap::new();
/// overrides.insert("api.local".into(), vec!["127.0.0.1:0".parse().unwrap()]);
/// let resolver = DnsResolverWithOverrides::new(Arc::new(GaiResolver::new()), overrides);
/// ```
pub struct DnsResolverWithOverrides {
    inner: Arc<dyn Resolve>,
    overrides: Arc<HashMap<Cow<'static, str>, Vec<SocketAddr>>>,
}

impl DnsResolverWithOverrides {
    pub fn new(
        inner: Arc<dyn Resolve>,
        overrides: HashMap<Cow<'static, str>, Vec<SocketAddr>>,
    ) -> Self {
        Self {
            inner,
            overrides: Arc::new(overrides),
        }
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Resolve for DnsResolverWithOverrides {
    fn resolve(&self, name: Name) -> Resolving {
        if let Some(addrs) = self.overrides.get(name.as_str()) {
            tracing::debug!(domain = %name, count = addrs.len(), "resolved from overrides");
            let addrs: Addrs = Box::new(addrs.clone().into_iter());
            return Box::pin(std::future::ready(Ok(addrs)));
        }
        self.inner.resolve(name)
    }
}

impl fmt::Debug for DnsResolverWithOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsResolverWithOverrides")
            .field("override_count", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    struct FixedResolver {
        response: Vec<SocketAddr>,
    }

    impl Resolve for FixedResolver {
        fn resolve(&self, _name: Name) -> Resolving {
            let addrs = self.response.clone();
            Box::pin(async move { Ok(Box::new(addrs.into_iter()) as Addrs) })
        }
    }

    struct FailingResolver;

    impl Resolve for FailingResolver {
        fn resolve(&self, _name: Name) -> Resolving {
            Box::pin(async { Err(NetError::NameNotResolved) })
        }
    }

    fn v4(a: u8, b: u8, c: u8, d: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), 0)
    }

    #[test]
    fn test_name_display_matches_input() {
        let name = Name::from(String::from("cert.example.test"));
        assert_eq!(name.as_str(), "cert.example.test");
        assert_eq!(name.to_string(), "cert.example.test");
        assert_eq!(name, Name::new("cert.example.test"));
    }

    #[tokio::test]
    async fn test_override_hit_skips_inner() {
        let mut overrides = HashMap::new();
        overrides.insert(Cow::Borrowed("pinned.test"), vec![v4(127, 0, 0, 1)]);

        let resolver = DnsResolverWithOverrides::new(Arc::new(FailingResolver), overrides);
        let addrs: Vec<_> = resolver
            .resolve(Name::new("pinned.test"))
            .await
            .unwrap()
            .collect();

        assert_eq!(addrs, vec![v4(127, 0, 0, 1)]);
    }

    #[tokio::test]
    async fn test_override_miss_falls_through() {
        let inner = Arc::new(FixedResolver {
            response: vec![v4(10, 0, 0, 7)],
        });
        let resolver = DnsResolverWithOverrides::new(inner, HashMap::new());

        let addrs: Vec<_> = resolver
            .resolve(Name::new("elsewhere.test"))
            .await
            .unwrap()
            .collect();

        assert_eq!(addrs, vec![v4(10, 0, 0, 7)]);
        assert_eq!(resolver.override_count(), 0);
    }
}
