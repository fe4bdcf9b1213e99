//! Container error types
//!
//! Error codes:
//! - PBC_END_OF_STREAM: clean end of the record sequence, not a failure
//! - PBC_CORRUPTION: bad magic, bad checksum, truncated record, short read
//! - PBC_UNSUPPORTED_VERSION: header carries a version other than the supported one
//! - PBC_IO_ERROR: any other read/write/serialize/parse failure
//!
//! Programming errors (using a closed writer, size inconsistencies during
//! serialization) are panics and never show up here.

use std::fmt;
use std::io;

/// Container error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerErrorCode {
    /// Reached the end of the records at a record boundary
    EndOfStream,
    /// Bytes on disk are not a valid container
    Corruption,
    /// Header version is not supported
    UnsupportedVersion,
    /// Underlying I/O or codec failure
    IoError,
}

impl ContainerErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ContainerErrorCode::EndOfStream => "PBC_END_OF_STREAM",
            ContainerErrorCode::Corruption => "PBC_CORRUPTION",
            ContainerErrorCode::UnsupportedVersion => "PBC_UNSUPPORTED_VERSION",
            ContainerErrorCode::IoError => "PBC_IO_ERROR",
        }
    }
}

impl fmt::Display for ContainerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Container error with context
#[derive(Debug)]
pub struct ContainerError {
    /// Error code
    code: ContainerErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl ContainerError {
    fn new(code: ContainerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create the end-of-stream signal
    pub fn end_of_stream(message: impl Into<String>) -> Self {
        Self::new(ContainerErrorCode::EndOfStream, message)
    }

    /// Create a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(ContainerErrorCode::Corruption, message)
    }

    /// Create a corruption error with context details
    pub fn corruption_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(ContainerErrorCode::Corruption, message)
        }
    }

    /// Create an unsupported version error
    pub fn unsupported_version(found: u32, supported: u32) -> Self {
        Self::new(
            ContainerErrorCode::UnsupportedVersion,
            format!(
                "Protobuf container has version {}, we only support version {}",
                found, supported
            ),
        )
    }

    /// Create an I/O error wrapping an underlying failure
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(ContainerErrorCode::IoError, message)
        }
    }

    /// Create an I/O error without an underlying `io::Error`
    pub fn io_error_no_source(message: impl Into<String>) -> Self {
        Self::new(ContainerErrorCode::IoError, message)
    }

    /// Create an I/O error with context details
    pub fn io_error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(ContainerErrorCode::IoError, message)
        }
    }

    /// Prefixes the message with `context`, keeping code, details and source.
    pub fn prepend(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// Returns the error code
    pub fn code(&self) -> ContainerErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this is the clean end of the record sequence
    pub fn is_end_of_stream(&self) -> bool {
        self.code == ContainerErrorCode::EndOfStream
    }

    /// Returns whether the bytes on disk were found to be invalid
    pub fn is_corruption(&self) -> bool {
        self.code == ContainerErrorCode::Corruption
    }

    /// Returns whether the header version was rejected
    pub fn is_unsupported_version(&self) -> bool {
        self.code == ContainerErrorCode::UnsupportedVersion
    }

    /// Returns whether the underlying failure was a missing file
    pub fn is_not_found(&self) -> bool {
        self.source
            .as_ref()
            .map(|e| e.kind() == io::ErrorKind::NotFound)
            .unwrap_or(false)
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;
