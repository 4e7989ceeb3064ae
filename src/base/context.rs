//! Error context helpers.
//!
//! `NetError` is a plain code, so the underlying `io::Error` is recorded in a
//! `tracing` event at the point of conversion instead of being carried along.

use crate::base::neterror::NetError;
use std::io;

/// Extension trait for converting IO Results into `NetError` with context.
pub trait IoResultExt<T> {
    /// Map a connect failure, logging the peer and the original error.
    ///
    /// # Example
    /// ```ignore
    /// use connspy::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("example.com", 443)?;
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Map a DNS resolution failure, logging the domain.
    fn dns_context(self, domain: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(host = %host, port, error = %e, "connect failed");
            NetError::from(e)
        })
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(domain = %domain, error = %e, "DNS resolution failed");
            NetError::NameNotResolved
        })
    }
}
