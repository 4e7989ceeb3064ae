use std::io;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address invalid")]
    AddressInvalid,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("SSL version or cipher mismatch")]
    SslVersionOrCipherMismatch,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Network access denied")]
    NetworkAccessDenied,
    #[error("Address in use")]
    AddressInUse,

    // Certificate Errors
    #[error("Certificate common name invalid")]
    CertCommonNameInvalid,
    #[error("Certificate authority invalid")]
    CertAuthorityInvalid,

    // URL Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,

    // Interception Errors (custom range)
    #[error("TLS handshake timeout")]
    SslHandshakeTimedOut,
    #[error("Capture sink unavailable")]
    SinkUnavailable,

    #[error("Unknown network error ({0})")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::SslProtocolError => -107,
            NetError::AddressInvalid => -108,
            NetError::AddressUnreachable => -109,
            NetError::SocketNotConnected => -112,
            NetError::SslVersionOrCipherMismatch => -113,
            NetError::ConnectionTimedOut => -118,
            NetError::NetworkAccessDenied => -138,
            NetError::AddressInUse => -147,

            NetError::CertCommonNameInvalid => -200,
            NetError::CertAuthorityInvalid => -202,

            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,

            NetError::SslHandshakeTimedOut => -10001,
            NetError::SinkUnavailable => -10002,

            NetError::Unknown(code) => *code,
        }
    }

    /// Returns true for errors raised while establishing TLS, including
    /// certificate verification failures.
    pub fn is_tls_error(&self) -> bool {
        matches!(
            self,
            NetError::SslProtocolError
                | NetError::SslVersionOrCipherMismatch
                | NetError::SslHandshakeTimedOut
                | NetError::CertCommonNameInvalid
                | NetError::CertAuthorityInvalid
        )
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -108 => NetError::AddressInvalid,
            -109 => NetError::AddressUnreachable,
            -112 => NetError::SocketNotConnected,
            -113 => NetError::SslVersionOrCipherMismatch,
            -118 => NetError::ConnectionTimedOut,
            -138 => NetError::NetworkAccessDenied,
            -147 => NetError::AddressInUse,

            -200 => NetError::CertCommonNameInvalid,
            -202 => NetError::CertAuthorityInvalid,

            -300 => NetError::InvalidUrl,
            -302 => NetError::UnknownUrlScheme,

            -10001 => NetError::SslHandshakeTimedOut,
            -10002 => NetError::SinkUnavailable,
            _ => NetError::Unknown(code),
        }
    }
}

impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected => NetError::SocketNotConnected,
            io::ErrorKind::AddrInUse => NetError::AddressInUse,
            io::ErrorKind::AddrNotAvailable => NetError::AddressInvalid,
            io::ErrorKind::InvalidInput => NetError::AddressInvalid,
            io::ErrorKind::PermissionDenied => NetError::NetworkAccessDenied,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            _ => NetError::ConnectionFailed,
        }
    }
}

impl From<NetError> for io::Error {
    fn from(err: NetError) -> Self {
        let kind = match err {
            NetError::ConnectionRefused => io::ErrorKind::ConnectionRefused,
            NetError::ConnectionReset => io::ErrorKind::ConnectionReset,
            NetError::ConnectionAborted => io::ErrorKind::ConnectionAborted,
            NetError::SocketNotConnected => io::ErrorKind::NotConnected,
            NetError::AddressInUse => io::ErrorKind::AddrInUse,
            NetError::AddressInvalid | NetError::InvalidUrl | NetError::UnknownUrlScheme => {
                io::ErrorKind::InvalidInput
            }
            NetError::NetworkAccessDenied => io::ErrorKind::PermissionDenied,
            NetError::ConnectionTimedOut | NetError::SslHandshakeTimedOut => {
                io::ErrorKind::TimedOut
            }
            NetError::ConnectionClosed => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
