//! Client-side TLS for the TLS dial path.
//!
//! - [`TlsConfig`]: protocol versions, ALPN, trust roots and the handshake deadline
//! - [`TlsHandshaker`]: runs one handshake under the deadline, then checks the host name
//! - [`verify`]: certificate-to-host-name matching

use crate::base::neterror::NetError;
use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion};
use boring::x509::X509;
use std::fmt;
use std::time::Duration;

pub mod handshake;
pub mod verify;

pub use self::handshake::{server_name, TlsHandshaker};

/// Handshake deadline used when none is configured.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// TLS settings for the dial hook.
///
/// ALPN defaults to `http/1.1` only, so captured traffic stays plain
/// HTTP/1.1 text rather than binary HTTP/2 frames.
#[derive(Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    pub alpn_protos: Vec<String>,
    /// Verify the peer chain and host name. Disabling this accepts any certificate.
    pub verify_certificates: bool,
    /// Trusted in addition to the system roots.
    pub root_certificates: Vec<X509>,
    /// Bounds only the TLS handshake, not the TCP connect before it.
    pub handshake_timeout: Duration,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            alpn_protos: vec!["http/1.1".to_string()],
            verify_certificates: true,
            root_certificates: Vec::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("alpn_protos", &self.alpn_protos)
            .field("verify_certificates", &self.verify_certificates)
            .field("root_certificates", &self.root_certificates.len())
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

impl TlsConfig {
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Trust `cert` as a root in addition to the system store.
    pub fn add_root_certificate(mut self, cert: X509) -> Self {
        self.root_certificates.push(cert);
        self
    }

    /// Skip chain and host name verification entirely.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.verify_certificates = !accept;
        self
    }

    pub fn alpn_protos<I, P>(mut self, protos: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.alpn_protos = protos.into_iter().map(Into::into).collect();
        self
    }

    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(min) = self.min_version {
            builder
                .set_min_proto_version(Some(min))
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = self.max_version {
            builder
                .set_max_proto_version(Some(max))
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.alpn_protos.is_empty() {
            let mut alpn_wire = Vec::new();
            for proto in &self.alpn_protos {
                if proto.is_empty() || proto.len() > 255 {
                    return Err(NetError::SslProtocolError);
                }
                alpn_wire.push(proto.len() as u8);
                alpn_wire.extend_from_slice(proto.as_bytes());
            }
            builder
                .set_alpn_protos(&alpn_wire)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        for cert in &self.root_certificates {
            builder
                .cert_store_mut()
                .add_cert(cert.clone())
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if self.verify_certificates {
            builder.set_verify(SslVerifyMode::PEER);
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(())
    }

    /// Build the connector once; every handshake configures from it.
    pub fn build_connector(&self) -> Result<SslConnector, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
        self.apply_to_builder(&mut builder)?;
        Ok(builder.build())
    }

    /// Check if SNI should be set for this host.
    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.parse::<std::net::IpAddr>().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TlsConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(1));
        assert_eq!(config.alpn_protos, vec!["http/1.1".to_string()]);
        assert!(config.verify_certificates);
        assert!(config.root_certificates.is_empty());
    }

    #[test]
    fn test_default_config_builds_connector() {
        assert!(TlsConfig::default().build_connector().is_ok());
    }

    #[test]
    fn test_insecure_config_builds_connector() {
        let config = TlsConfig::default()
            .danger_accept_invalid_certs(true)
            .alpn_protos(["h2", "http/1.1"]);
        assert!(!config.verify_certificates);
        assert!(config.build_connector().is_ok());
    }

    #[test]
    fn test_oversized_alpn_rejected() {
        let config = TlsConfig::default().alpn_protos(["x".repeat(256)]);
        assert_eq!(config.build_connector().err(), Some(NetError::SslProtocolError));
    }

    #[test]
    fn test_should_set_sni() {
        assert!(TlsConfig::should_set_sni("example.com"));
        assert!(!TlsConfig::should_set_sni("127.0.0.1"));
        assert!(!TlsConfig::should_set_sni("::1"));
    }
}
