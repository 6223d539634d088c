//! Error types for the networking module.

use std::io;

use courier_core::ThreadPoolError;

/// Network-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The URL names a protocol the transport cannot speak.
    #[error("Unsupported protocol: {0}")]
    UnsupportedScheme(String),
    /// Connection refused, unreachable, timed out or aborted during the handshake.
    #[error("Connection error: {0}")]
    Connection(#[source] io::Error),
    /// I/O error while exchanging the request or response.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A request header name or value is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// The HTTP client could not be set up.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    /// The worker executor refused to run the request.
    #[error("Request rejected: {0}")]
    Rejected(String),
    /// Neither the status accessor nor the raw status line produced a code.
    #[error("No HTTP status could be resolved")]
    NoStatus,
    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ThreadPoolError),
}

impl NetworkError {
    /// Check if this error happened while establishing the connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this error is a pool-exhaustion or shutdown rejection.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Get the underlying I/O error kind, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Connection(err) | Self::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
