//! Error types for frame decoding and transport handling.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. The taxonomy follows the wire-protocol failure modes:
//!
//! - **UnknownDevice**: identification failed against the device inventory
//! - **TruncatedFrame**: a declared structure ran past the end of the buffer
//! - **ChecksumMismatch**: a reassembled transfer failed its integrity check
//! - **UnsupportedCodec**: no decoding or acknowledgement rule for a codec
//! - **Framing**: the byte stream itself violated the framing rules
//! - **Io / Config**: ambient transport and configuration failures
//!
//! Every decode-level error is local: a bad frame is dropped, the connection
//! and all unrelated sessions survive. Only framing and I/O errors tear down
//! a connection.
//!
//! ```rust
//! use fleetwire::ProtocolError;
//!
//! let error = ProtocolError::truncated(4, 1);
//! assert!(error.is_recoverable());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for decoding and transport operations.
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Main error type for frame decoding and transport handling.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProtocolError {
    #[error("Unknown device identity '{identity}'")]
    UnknownDevice { identity: String },

    #[error("Truncated frame: needed {needed} bytes, {remaining} remaining")]
    TruncatedFrame { needed: usize, remaining: usize },

    #[error("Transfer checksum mismatch: declared {declared:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { declared: u32, computed: u32 },

    #[error("Unsupported codec {codec:#04x}")]
    UnsupportedCodec { codec: u8 },

    #[error("Framing violation: {details}")]
    Framing { details: String },

    #[error("I/O error during {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error in {path}: {details}")]
    Config { path: PathBuf, details: String },

    #[error("Storage rejected blob '{key}': {details}")]
    Storage { key: String, details: String },
}

impl ProtocolError {
    /// Returns whether the connection that produced this error can keep
    /// decoding subsequent frames.
    ///
    /// Decode-level failures are recoverable: the offending frame is dropped
    /// and the session state is untouched. Framing and I/O failures are not,
    /// since the stream position can no longer be trusted.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ProtocolError::UnknownDevice { .. } => true,
            ProtocolError::TruncatedFrame { .. } => true,
            ProtocolError::ChecksumMismatch { .. } => true,
            ProtocolError::UnsupportedCodec { .. } => true,
            ProtocolError::Storage { .. } => true,
            ProtocolError::Framing { .. } => false,
            ProtocolError::Io { .. } => false,
            ProtocolError::Config { .. } => false,
        }
    }

    /// Helper constructor for unknown-device errors.
    pub fn unknown_device(identity: impl Into<String>) -> Self {
        ProtocolError::UnknownDevice { identity: identity.into() }
    }

    /// Helper constructor for truncated-frame errors.
    pub fn truncated(needed: usize, remaining: usize) -> Self {
        ProtocolError::TruncatedFrame { needed, remaining }
    }

    /// Helper constructor for framing violations.
    pub fn framing(details: impl Into<String>) -> Self {
        ProtocolError::Framing { details: details.into() }
    }

    /// Helper constructor for I/O errors with operation context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ProtocolError::Io { context: context.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        ProtocolError::Config { path: path.into(), details: details.into() }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Io { context: "transport".to_string(), source: err }
    }
}
