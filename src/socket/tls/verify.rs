//! Host name check against a peer certificate.
//!
//! Matching is BoringSSL's (`X509_check_host` / `X509_check_ip_asc`):
//! `subjectAltName` entries are authoritative, a wildcard is honoured only as
//! the whole left-most label, and IP targets match IP SAN entries only.

use crate::base::neterror::NetError;
use boring::x509::X509Ref;
use std::net::IpAddr;

/// Check that `cert` was issued for `host` (a DNS name or IP literal).
pub fn verify_hostname(cert: &X509Ref, host: &str) -> Result<(), NetError> {
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        return Err(NetError::CertCommonNameInvalid);
    }

    let matched = if host.parse::<IpAddr>().is_ok() {
        cert.check_ip_asc(host)
    } else {
        cert.check_host(host)
    };

    match matched {
        Ok(true) => Ok(()),
        Ok(false) => Err(NetError::CertCommonNameInvalid),
        Err(e) => {
            tracing::debug!(host = %host, error = %e, "host name check failed");
            Err(NetError::CertCommonNameInvalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boring::asn1::Asn1Time;
    use boring::ec::{EcGroup, EcKey};
    use boring::hash::MessageDigest;
    use boring::nid::Nid;
    use boring::pkey::PKey;
    use boring::x509::extension::SubjectAlternativeName;
    use boring::x509::{X509NameBuilder, X509};

    /// Throwaway certificate carrying the given SAN entries.
    fn cert_for(dns: &[&str], ips: &[&str]) -> X509 {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, "test certificate").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();

        let mut san = SubjectAlternativeName::new();
        for d in dns {
            san.dns(d);
        }
        for ip in ips {
            san.ip(ip);
        }
        let san = san.build(&builder.x509v3_context(None, None)).unwrap();
        builder.append_extension(san).unwrap();

        builder.sign(&key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    #[test]
    fn test_exact_match_ignores_case_and_trailing_dot() {
        let cert = cert_for(&["example.com"], &[]);
        assert!(verify_hostname(&cert, "example.com").is_ok());
        assert!(verify_hostname(&cert, "EXAMPLE.com").is_ok());
        assert!(verify_hostname(&cert, "example.com.").is_ok());
        assert_eq!(
            verify_hostname(&cert, "example.org"),
            Err(NetError::CertCommonNameInvalid)
        );
    }

    #[test]
    fn test_wildcard_covers_one_label() {
        let cert = cert_for(&["*.example.com"], &[]);
        assert!(verify_hostname(&cert, "www.example.com").is_ok());
        assert!(verify_hostname(&cert, "example.com").is_err());
        assert!(verify_hostname(&cert, "a.b.example.com").is_err());
    }

    #[test]
    fn test_tld_wildcard_rejected() {
        let cert = cert_for(&["*.com"], &[]);
        assert!(verify_hostname(&cert, "example.com").is_err());
    }

    #[test]
    fn test_ip_targets_match_ip_entries_only() {
        let cert = cert_for(&["127.0.0.1"], &["10.0.0.1"]);
        assert!(verify_hostname(&cert, "10.0.0.1").is_ok());
        // A DNS entry spelled like an address does not cover the address.
        assert!(verify_hostname(&cert, "127.0.0.1").is_err());
        assert!(verify_hostname(&cert, "10.0.0.2").is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        let cert = cert_for(&["example.com"], &[]);
        assert_eq!(verify_hostname(&cert, ""), Err(NetError::CertCommonNameInvalid));
        assert_eq!(verify_hostname(&cert, "."), Err(NetError::CertCommonNameInvalid));
    }
}
