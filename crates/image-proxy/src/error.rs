//! Error types for the image proxy

use image_service_client::FetchError;
use std::fmt;

#[derive(Debug)]
pub enum ProxyError {
    /// Request carried a missing or empty search term
    InvalidInput,
    /// The upstream image service could not satisfy the fetch
    ServiceUnavailable(FetchError),
    /// Disk read/write failure while persisting or serving an image
    Storage(Box<std::io::Error>),
    /// Requested stored file does not exist (or the name was unsafe)
    NotFound,
    Config(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::InvalidInput => write!(f, "Missing or invalid search term"),
            ProxyError::ServiceUnavailable(err) => {
                write!(f, "Image service unavailable: {}", err)
            }
            ProxyError::Storage(err) => write!(f, "Storage error: {}", err),
            ProxyError::NotFound => write!(f, "Image not found"),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::ServiceUnavailable(err) => Some(err),
            ProxyError::Storage(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<FetchError> for ProxyError {
    fn from(err: FetchError) -> Self {
        ProxyError::ServiceUnavailable(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for ProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
