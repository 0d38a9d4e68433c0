//! Connection handling for the image retrieval service
//!
//! Each `fetch` call opens one TCP connection, sends the raw UTF-8 search
//! term, and accumulates everything the service sends back until it closes
//! the connection. Retries are the caller's responsibility.

use crate::error::{FetchError, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default overall timeout for a single fetch
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Timeout for the reachability probe
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// TCP client for the image retrieval service
pub struct ImageServiceClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ImageServiceClient {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Fetch the image bytes for a search term
    ///
    /// Succeeds only if the connection completed and at least one byte
    /// arrived before the peer closed. The whole connect/write/read
    /// sequence races against the configured timeout; on expiry the
    /// connection is dropped and any buffered bytes are discarded.
    pub async fn fetch(&self, search_term: &str) -> Result<Vec<u8>> {
        match timeout(self.timeout, self.fetch_inner(search_term)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    host = %self.host,
                    port = self.port,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Image service request timed out"
                );
                Err(FetchError::Timeout)
            }
        }
    }

    async fn fetch_inner(&self, search_term: &str) -> Result<Vec<u8>> {
        let addr = format!("{}:{}", self.host, self.port);

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| FetchError::ConnectFailed(e.to_string()))?;
        debug!(addr = %addr, term = search_term, "Connected to image service");

        stream.write_all(search_term.as_bytes()).await?;

        let mut payload = Vec::new();
        stream.read_to_end(&mut payload).await?;

        if payload.is_empty() {
            return Err(FetchError::EmptyPayload);
        }

        debug!(size = payload.len(), "Received image data");
        Ok(payload)
    }

    /// Check whether the image service accepts connections
    ///
    /// Opens and immediately drops a connection with a short timeout.
    pub async fn probe(&self) -> bool {
        let addr = format!("{}:{}", self.host, self.port);
        matches!(
            timeout(PROBE_TIMEOUT, TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        )
    }
}
