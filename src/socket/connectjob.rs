use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{GaiResolver, Name, Resolve, SocketAddrs};
use socket2::{SockRef, TcpKeepalive};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default TCP keep-alive idle time.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Address family restriction for a dial, named like `"tcp"`, `"tcp4"`, `"tcp6"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }

    pub fn allows(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for Network {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            _ => Err(NetError::AddressInvalid),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `host:port` (or `[v6]:port`) into its host and port.
///
/// The port is required. IPv6 brackets are removed from the host.
pub fn split_host_port(address: &str) -> Result<(String, u16), NetError> {
    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, port) = rest.split_once("]:").ok_or(NetError::AddressInvalid)?;
        if host.contains(']') || host.contains('[') {
            return Err(NetError::AddressInvalid);
        }
        (host, port)
    } else {
        let (host, port) = address.rsplit_once(':').ok_or(NetError::AddressInvalid)?;
        if host.contains(':') || host.contains('[') || host.contains(']') {
            return Err(NetError::AddressInvalid);
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(NetError::AddressInvalid);
    }
    let port = port.parse::<u16>().map_err(|_| NetError::AddressInvalid)?;
    Ok((host.to_string(), port))
}

/// Manages the connection process: DNS -> TCP.
/// Roughly equivalent to net::ConnectJob, without the TLS step, which the
/// dialer runs separately under its own deadline.
#[derive(Clone)]
pub struct ConnectJob {
    resolver: Arc<dyn Resolve>,
    connect_timeout: Duration,
    keep_alive: Option<Duration>,
}

impl Default for ConnectJob {
    fn default() -> Self {
        Self::new(Arc::new(GaiResolver::new()))
    }
}

impl ConnectJob {
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self {
            resolver,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            keep_alive: Some(DEFAULT_KEEP_ALIVE),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `None` leaves keep-alive at the OS default (off).
    pub fn keep_alive(mut self, keep_alive: Option<Duration>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn get_connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn get_keep_alive(&self) -> Option<Duration> {
        self.keep_alive
    }

    /// Resolve `address` and connect to the first reachable candidate.
    ///
    /// The whole step, resolution included, is bounded by the connect timeout.
    pub async fn connect(&self, network: Network, address: &str) -> Result<TcpStream, NetError> {
        let (host, port) = split_host_port(address)?;

        match tokio::time::timeout(self.connect_timeout, self.connect_inner(network, &host, port))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    host = %host,
                    port,
                    timeout = ?self.connect_timeout,
                    "connect timed out"
                );
                Err(NetError::ConnectionTimedOut)
            }
        }
    }

    async fn connect_inner(
        &self,
        network: Network,
        host: &str,
        port: u16,
    ) -> Result<TcpStream, NetError> {
        // 1. DNS Resolution (skipped for IP literals)
        let mut addrs = match SocketAddrs::try_parse(host, port) {
            Some(addrs) => addrs,
            None => self
                .resolver
                .resolve(Name::new(host))
                .await?
                .collect::<SocketAddrs>()
                .with_port(port),
        };
        addrs.retain(|addr| network.allows(addr));
        if addrs.is_empty() {
            tracing::debug!(host = %host, network = %network, "no address for network");
            return Err(NetError::AddressUnreachable);
        }

        // 2. TCP Connect, first success wins
        let mut last_err = NetError::ConnectionFailed;
        for addr in addrs {
            match TcpStream::connect(addr).await.connection_context(host, port) {
                Ok(stream) => {
                    self.configure(&stream);
                    tracing::debug!(host = %host, %addr, "connected");
                    return Ok(stream);
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    fn configure(&self, stream: &TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }
        if let Some(idle) = self.keep_alive {
            let keepalive = TcpKeepalive::new().with_time(idle);
            if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
                tracing::debug!(error = %e, "failed to enable TCP keep-alive");
            }
        }
    }
}

impl fmt::Debug for ConnectJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectJob")
            .field("connect_timeout", &self.connect_timeout)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}
