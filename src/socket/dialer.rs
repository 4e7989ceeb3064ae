//! The dial hook: connect, optionally secure, then tap.
//!
//! [`Dialer`] replaces a direct network dial for an HTTP client. Each dial
//! establishes TCP through a [`ConnectJob`], runs the TLS handshake for the
//! TLS variant, and returns the connection wrapped in a [`DuplexSocket`]
//! bound to a sink from the dialer's [`SinkFactory`]. Failures are returned
//! as-is; a half-built connection is never handed out.
//!
//! [`SpyConnector`] adapts a `Dialer` to `tower::Service<Uri>`, which is what
//! `hyper_util`'s legacy client accepts as a connector.

use crate::base::neterror::NetError;
use crate::dns::Resolve;
use crate::socket::client::SocketType;
use crate::socket::connectjob::{ConnectJob, Network};
use crate::socket::duplex::DuplexSocket;
use crate::socket::sink::{BoxSink, SinkFactory, StderrSinks};
use crate::socket::tls::{TlsConfig, TlsHandshaker};
use futures::future::BoxFuture;
use http::Uri;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// A dialed connection whose traffic is mirrored into its sink.
pub type TappedSocket = DuplexSocket<SocketType, BoxSink>;

/// Line written to the sink ahead of each new connection's traffic.
pub fn separator() -> String {
    format!("\n{}\n\n", "-".repeat(80))
}

/// Builder for [`Dialer`].
#[must_use]
pub struct DialerBuilder {
    connect: ConnectJob,
    tls: TlsConfig,
    sinks: Arc<dyn SinkFactory>,
    separator: bool,
}

impl Default for DialerBuilder {
    fn default() -> Self {
        Self {
            connect: ConnectJob::default(),
            tls: TlsConfig::default(),
            sinks: Arc::new(StderrSinks),
            separator: true,
        }
    }
}

impl DialerBuilder {
    /// TCP connect timeout (resolution included). Default: 30 seconds.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect = self.connect.connect_timeout(timeout);
        self
    }

    /// TCP keep-alive idle time, `None` to leave it off. Default: 30 seconds.
    pub fn keep_alive(mut self, keep_alive: Option<Duration>) -> Self {
        self.connect = self.connect.keep_alive(keep_alive);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.connect = ConnectJob::new(resolver)
            .connect_timeout(self.connect.get_connect_timeout())
            .keep_alive(self.connect.get_keep_alive());
        self
    }

    pub fn tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// TLS handshake deadline. Default: 1 second.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls.handshake_timeout = timeout;
        self
    }

    /// Where captured bytes go. Default: standard error.
    pub fn sinks(mut self, sinks: impl SinkFactory + 'static) -> Self {
        self.sinks = Arc::new(sinks);
        self
    }

    pub fn shared_sinks(mut self, sinks: Arc<dyn SinkFactory>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Write [`separator`] to the sink before each connection. Default: on.
    pub fn separator(mut self, enabled: bool) -> Self {
        self.separator = enabled;
        self
    }

    pub fn build(self) -> Result<Dialer, NetError> {
        let tls = TlsHandshaker::new(&self.tls)?;
        Ok(Dialer {
            inner: Arc::new(DialerInner {
                connect: self.connect,
                tls,
                sinks: self.sinks,
                separator: self.separator,
            }),
        })
    }
}

struct DialerInner {
    connect: ConnectJob,
    tls: TlsHandshaker,
    sinks: Arc<dyn SinkFactory>,
    separator: bool,
}

/// Establishes tapped client connections. Cheap to clone.
#[derive(Clone)]
pub struct Dialer {
    inner: Arc<DialerInner>,
}

impl Dialer {
    pub fn builder() -> DialerBuilder {
        DialerBuilder::default()
    }

    /// Dialer with default settings and a stderr sink.
    pub fn new() -> Result<Self, NetError> {
        Self::builder().build()
    }

    /// Plain TCP dial to `address` (`host:port`).
    pub async fn dial(&self, network: Network, address: &str) -> Result<TappedSocket, NetError> {
        let stream = self.inner.connect.connect(network, address).await?;
        self.tap(SocketType::Tcp(stream))
    }

    /// TCP dial to `address` followed by a TLS handshake for its host.
    pub async fn dial_tls(
        &self,
        network: Network,
        address: &str,
    ) -> Result<TappedSocket, NetError> {
        let stream = self.inner.connect.connect(network, address).await?;
        let tls = self.inner.tls.handshake(stream, address).await?;
        self.tap(SocketType::Ssl(tls))
    }

    /// Dial by network name (`"tcp"`, `"tcp4"`, `"tcp6"`), plain or TLS.
    pub async fn dial_named(
        &self,
        network: &str,
        address: &str,
        tls: bool,
    ) -> Result<TappedSocket, NetError> {
        let network = network.parse::<Network>()?;
        if tls {
            self.dial_tls(network, address).await
        } else {
            self.dial(network, address).await
        }
    }

    fn tap(&self, socket: SocketType) -> Result<TappedSocket, NetError> {
        let mut sink = self.inner.sinks.make_sink().map_err(|e| {
            tracing::debug!(error = %e, "failed to open capture sink");
            NetError::SinkUnavailable
        })?;
        if self.inner.separator {
            if let Err(e) = sink.write_all(separator().as_bytes()) {
                tracing::debug!(error = %e, "failed to write connection separator");
            }
        }
        Ok(DuplexSocket::new(socket, sink))
    }
}

impl fmt::Debug for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialer")
            .field("connect", &self.inner.connect)
            .field("tls", &self.inner.tls)
            .field("separator", &self.inner.separator)
            .finish_non_exhaustive()
    }
}

/// `tower::Service<Uri>` front end for [`Dialer`].
///
/// `http` URIs are dialed plain, `https` URIs through TLS. Default ports
/// are 80 and 443.
#[derive(Clone, Debug)]
pub struct SpyConnector {
    dialer: Dialer,
}

impl SpyConnector {
    pub fn new(dialer: Dialer) -> Self {
        Self { dialer }
    }

    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }
}

impl From<Dialer> for SpyConnector {
    fn from(dialer: Dialer) -> Self {
        Self::new(dialer)
    }
}

/// Turn a request URI into a dial target and whether it needs TLS.
pub fn uri_target(uri: &Uri) -> Result<(String, bool), NetError> {
    let tls = match uri.scheme_str() {
        Some("http") => false,
        Some("https") => true,
        Some(_) => return Err(NetError::UnknownUrlScheme),
        None => return Err(NetError::InvalidUrl),
    };
    let host = uri.host().ok_or(NetError::InvalidUrl)?;
    let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });

    // Uri::host keeps IPv6 brackets, which is what host:port needs.
    Ok((format!("{}:{}", host, port), tls))
}

impl tower::Service<Uri> for SpyConnector {
    type Response = TappedSocket;
    type Error = NetError;
    type Future = BoxFuture<'static, Result<TappedSocket, NetError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        Box::pin(async move {
            let (address, tls) = uri_target(&uri)?;
            tracing::debug!(%uri, address = %address, tls, "dialing");
            if tls {
                dialer.dial_tls(Network::Tcp, &address).await
            } else {
                dialer.dial(Network::Tcp, &address).await
            }
        })
    }
}
