//! Error types for the image service client

use std::fmt;

#[derive(Debug)]
pub enum FetchError {
    /// The connection to the image service never completed
    ConnectFailed(String),
    /// No connect or close event within the configured timeout
    Timeout,
    /// The service connected but closed without sending any data
    EmptyPayload,
    /// A lower-level channel error after the connection was established
    Transport(Box<std::io::Error>),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::ConnectFailed(msg) => {
                write!(f, "Failed to connect to image service: {}", msg)
            }
            FetchError::Timeout => write!(f, "Request timeout"),
            FetchError::EmptyPayload => write!(f, "No image data received"),
            FetchError::Transport(err) => write!(f, "Transport error: {}", err),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Transport(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
