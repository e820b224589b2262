//! Error handling and custom error types
//!
//! Provides unified error handling across the compression pipeline using thiserror.

use std::fmt;
use thiserror::Error;

/// Why a call to the remote optimizer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFailure {
    Auth,
    QuotaExceeded,
    UnsupportedFormat,
    Network,
    Service,
}

impl CompressionFailure {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Service)
    }
}

impl fmt::Display for CompressionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auth => "authentication failed",
            Self::QuotaExceeded => "quota exceeded",
            Self::UnsupportedFormat => "unsupported format",
            Self::Network => "network failure",
            Self::Service => "service error",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Compression service error ({kind}): {message}")]
    Compression {
        kind: CompressionFailure,
        message: String,
    },

    #[error("Storage service error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Metadata error: {0}")]
    Metadata(String),
}

impl Error {
    pub fn compression(kind: CompressionFailure, message: impl Into<String>) -> Self {
        Self::Compression {
            kind,
            message: message.into(),
        }
    }

    /// The optimizer failure kind, if this is a compression error.
    pub fn compression_failure(&self) -> Option<CompressionFailure> {
        match self {
            Self::Compression { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
