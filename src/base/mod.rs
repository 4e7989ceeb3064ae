//! Base types and error handling.
//!
//! Provides foundational types mirroring Chromium's `net/base/`:
//! - [`NetError`]: Network error codes matching `net_error_list.h`
//! - [`context`]: `io::Error` to `NetError` conversion with logged context

pub mod context;
pub mod neterror;

pub use neterror::NetError;
