//! Shared fixtures: throwaway certificates and small TLS peers.

#![allow(dead_code)]

use boring::asn1::Asn1Time;
use boring::bn::{BigNum, MsbOption};
use boring::ec::{EcGroup, EcKey};
use boring::hash::MessageDigest;
use boring::nid::Nid;
use boring::pkey::{PKey, Private};
use boring::ssl::{select_next_proto, AlpnError, SslAcceptor, SslMethod};
use boring::x509::extension::{BasicConstraints, SubjectAlternativeName};
use boring::x509::{X509NameBuilder, X509};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Self-signed certificate whose SAN lists `names` (DNS names or IPs).
/// The first name is also the subject CN.
pub fn self_signed(names: &[&str]) -> (X509, PKey<Private>) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut subject = X509NameBuilder::new().unwrap();
    subject.append_entry_by_nid(Nid::COMMONNAME, names[0]).unwrap();
    let subject = subject.build();

    let serial = {
        let mut bn = BigNum::new().unwrap();
        bn.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
        bn.to_asn1_integer().unwrap()
    };

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();

    let mut san = SubjectAlternativeName::new();
    for name in names {
        if name.parse::<IpAddr>().is_ok() {
            san.ip(name);
        } else {
            san.dns(name);
        }
    }
    let san = san.build(&builder.x509v3_context(None, None)).unwrap();
    builder.append_extension(san).unwrap();

    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (builder.build(), key)
}

pub fn acceptor(cert: &X509, key: &PKey<Private>) -> SslAcceptor {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    builder.set_private_key(key).unwrap();
    builder.set_certificate(cert).unwrap();
    builder.check_private_key().unwrap();
    builder.set_alpn_select_callback(|_, client| {
        select_next_proto(b"\x08http/1.1", client).ok_or(AlpnError::NOACK)
    });
    builder.build()
}

/// Read until the client closes its end (EOF or reset).
async fn drain(stream: &mut TcpStream) {
    let mut buf = vec![0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}

/// TLS server for one connection: reads `ping`, answers `pong`. Handshake
/// failures on the server side are ignored. The receiver fires once the
/// client has closed the underlying TCP connection.
pub async fn ping_pong_tls_server(
    cert: &X509,
    key: &PKey<Private>,
) -> (SocketAddr, oneshot::Receiver<()>) {
    let acceptor = acceptor(cert, key);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        // TLS runs over a borrow so the raw socket outlives a failed handshake.
        if let Ok(mut tls) = tokio_boring::accept(&acceptor, &mut stream).await {
            let mut buf = [0u8; 4];
            if tls.read_exact(&mut buf).await.is_ok() && &buf == b"ping" {
                let _ = tls.write_all(b"pong").await;
                let _ = tls.flush().await;
            }
            // Hold the connection until the client goes away.
            while let Ok(n) = tls.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
        }
        drain(&mut stream).await;
        let _ = closed_tx.send(());
    });

    (addr, closed_rx)
}

/// TCP peer that answers whatever arrives first with a plain-text HTTP
/// error, as a non-TLS server would answer a ClientHello. The receiver
/// fires once the client has closed the connection.
pub async fn plaintext_server() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let mut buf = vec![0u8; 4096];
        if matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {
            let _ = stream
                .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                .await;
        }
        drain(&mut stream).await;
        let _ = closed_tx.send(());
    });

    (addr, closed_rx)
}

/// TCP peer that accepts one connection and never speaks. The receiver
/// fires once the client side of that connection has been closed.
pub async fn silent_server() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        drain(&mut stream).await;
        let _ = closed_tx.send(());
    });

    (addr, closed_rx)
}
