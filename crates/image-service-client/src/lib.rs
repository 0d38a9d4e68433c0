//! TCP client for the upstream image retrieval service
//!
//! The upstream service speaks a minimal connection-oriented protocol:
//! connect, write the search term once, then read image bytes until the
//! peer closes the connection. There is no framing and no length prefix.

mod client;
mod error;

pub use client::{ImageServiceClient, DEFAULT_TIMEOUT, PROBE_TIMEOUT};
pub use error::{FetchError, Result};
