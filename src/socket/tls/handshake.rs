//! The TLS handshake, raced against a fixed deadline.

use super::verify::verify_hostname;
use super::TlsConfig;
use crate::base::neterror::NetError;
use crate::socket::connectjob::split_host_port;
use boring::ssl::{SslConnector, SslVerifyMode};
use std::fmt;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_boring::SslStream;

/// Derive the certificate host name from a dial target.
///
/// Accepts `host:port`, `[v6]:port`, a bare host, or a bare IPv6 literal.
/// The port, if any, is dropped and IPv6 brackets are removed.
pub fn server_name(target: &str) -> Result<String, NetError> {
    if let Ok((host, _port)) = split_host_port(target) {
        return Ok(host);
    }

    let bare = target
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(target);
    if bare.parse::<Ipv6Addr>().is_ok() {
        return Ok(bare.to_string());
    }
    if bare.is_empty() || bare.contains(':') || bare.contains('[') || bare.contains(']') {
        return Err(NetError::AddressInvalid);
    }
    Ok(bare.to_string())
}

/// Aborts the handshake task when the caller stops waiting for it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Performs client TLS handshakes for the dial hook.
///
/// Each call spawns the handshake as its own task, bounded by the deadline
/// inside that task. When the deadline wins, the plain stream is already
/// closed when [`NetError::SslHandshakeTimedOut`] is returned. Dropping the
/// returned future aborts the task, which closes the stream as well.
///
/// With verification enabled, the handshake checks the certificate chain and
/// a successful handshake is then checked against the target host name.
#[derive(Clone)]
pub struct TlsHandshaker {
    connector: SslConnector,
    verify: bool,
    timeout: Duration,
}

impl TlsHandshaker {
    pub fn new(config: &TlsConfig) -> Result<Self, NetError> {
        Ok(Self {
            connector: config.build_connector()?,
            verify: config.verify_certificates,
            timeout: config.handshake_timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn verifies_certificates(&self) -> bool {
        self.verify
    }

    /// Secure `stream` for `target` (`host:port` or a bare host).
    ///
    /// On any error the stream has been dropped, closing the connection.
    pub async fn handshake<S>(&self, stream: S, target: &str) -> Result<SslStream<S>, NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug + 'static,
    {
        let host = server_name(target)?;

        let mut config = self.connector.configure().map_err(|e| {
            tracing::debug!(error = %e, "failed to configure TLS session");
            NetError::SslProtocolError
        })?;
        // The host name is checked explicitly once the handshake completes.
        config.set_verify_hostname(false);
        config.set_use_server_name_indication(TlsConfig::should_set_sni(&host));

        let chain_rejected = Arc::new(AtomicBool::new(false));
        if self.verify {
            let flag = chain_rejected.clone();
            config.set_verify_callback(SslVerifyMode::PEER, move |preverify_ok, _ctx| {
                if !preverify_ok {
                    flag.store(true, Ordering::Relaxed);
                }
                preverify_ok
            });
        }

        tracing::debug!(host = %host, timeout = ?self.timeout, "starting TLS handshake");

        let domain = host.clone();
        let deadline = self.timeout;
        let task = tokio::spawn(async move {
            // The stream lives inside the connect future, so it is closed
            // by the time this task yields the timeout error.
            match tokio::time::timeout(deadline, tokio_boring::connect(config, &domain, stream)).await
            {
                Ok(Ok(tls)) => Ok(tls),
                Ok(Err(e)) => {
                    tracing::debug!(host = %domain, error = %e, "TLS handshake failed");
                    if chain_rejected.load(Ordering::Relaxed) {
                        Err(NetError::CertAuthorityInvalid)
                    } else {
                        Err(NetError::SslProtocolError)
                    }
                }
                Err(_) => {
                    tracing::debug!(host = %domain, timeout = ?deadline, "TLS handshake timed out");
                    Err(NetError::SslHandshakeTimedOut)
                }
            }
        });
        let mut task = AbortOnDrop(task);

        let tls = match (&mut task.0).await {
            Ok(result) => result?,
            Err(e) => {
                tracing::error!(error = %e, "TLS handshake task failed");
                return Err(NetError::SslProtocolError);
            }
        };

        if self.verify {
            let Some(cert) = tls.ssl().peer_certificate() else {
                tracing::debug!(host = %host, "peer presented no certificate");
                return Err(NetError::CertAuthorityInvalid);
            };
            if let Err(e) = verify_hostname(&cert, &host) {
                tracing::debug!(host = %host, "certificate does not match host name");
                return Err(e);
            }
        }

        tracing::debug!(
            host = %host,
            version = tls.ssl().version_str(),
            "TLS handshake complete"
        );
        Ok(tls)
    }
}

impl fmt::Debug for TlsHandshaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsHandshaker")
            .field("verify", &self.verify)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_name_strips_port() {
        assert_eq!(server_name("example.com:443").unwrap(), "example.com");
        assert_eq!(server_name("127.0.0.1:8443").unwrap(), "127.0.0.1");
        assert_eq!(server_name("[::1]:443").unwrap(), "::1");
    }

    #[test]
    fn test_server_name_bare_hosts() {
        assert_eq!(server_name("example.com").unwrap(), "example.com");
        assert_eq!(server_name("::1").unwrap(), "::1");
        assert_eq!(server_name("[2001:db8::1]").unwrap(), "2001:db8::1");
    }

    #[test]
    fn test_server_name_rejects_garbage() {
        assert_eq!(server_name(""), Err(NetError::AddressInvalid));
        assert_eq!(server_name("a:b:c"), Err(NetError::AddressInvalid));
        assert_eq!(server_name("[example.com"), Err(NetError::AddressInvalid));
    }

    #[test]
    fn test_handshaker_carries_config() {
        let config = TlsConfig::default().handshake_timeout(Duration::from_millis(250));
        let handshaker = TlsHandshaker::new(&config).unwrap();
        assert_eq!(handshaker.timeout(), Duration::from_millis(250));
        assert!(handshaker.verifies_certificates());
    }
}
