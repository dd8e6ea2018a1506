//! Error types and handling for driftsync
//!
//! Every failure mode of a synchronization run maps to one variant here.
//! Write-protection and path-escape violations are fatal and abort the run;
//! metadata and comparison problems are recovered locally and the run
//! continues.

use std::path::PathBuf;

/// Main error type for driftsync operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// A mutating call was attempted against a read-only target
    #[error("target is read-only: {target}")]
    WriteProtected {
        /// Description of the target that rejected the write
        target: String,
    },

    /// A directory change would leave the configured root
    #[error("tried to navigate outside root '{root}': '{path}'")]
    PathEscape {
        /// Configured synchronization root
        root: PathBuf,
        /// Offending resolved path
        path: PathBuf,
    },

    /// Sidecar metadata could not be read or parsed
    #[error("metadata error: {message}")]
    Metadata {
        /// Error message describing the metadata issue
        message: String,
    },

    /// Provider-level transport failure (connection drop, refused command)
    #[error("transport error: {message}")]
    Transport {
        /// Error message describing the transport issue
        message: String,
    },

    /// Anomalous entry comparison (equal time, different content signals)
    #[error("comparison anomaly: {message}")]
    Comparison {
        /// Description of the anomalous entry pair
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Write-protection violations
    WriteProtected,
    /// Root-escape violations
    PathEscape,
    /// Sidecar metadata errors
    Metadata,
    /// Transport errors
    Transport,
    /// Comparison anomalies
    Comparison,
    /// Configuration errors
    Config,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::WriteProtected { .. } => ErrorKind::WriteProtected,
            Self::PathEscape { .. } => ErrorKind::PathEscape,
            Self::Metadata { .. } => ErrorKind::Metadata,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Comparison { .. } => ErrorKind::Comparison,
            Self::Config { .. } => ErrorKind::Config,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Check whether this error aborts the run
    ///
    /// Write-protection and path-escape violations indicate a logic error or
    /// hostile input; everything else is surfaced and the run continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::WriteProtected { .. } | Self::PathEscape { .. }
        )
    }

    /// Create a new write-protection error
    pub fn write_protected<S: Into<String>>(target: S) -> Self {
        Self::WriteProtected {
            target: target.into(),
        }
    }

    /// Create a new metadata error
    pub fn metadata<S: Into<String>>(message: S) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new comparison anomaly error
    pub fn comparison<S: Into<String>>(message: S) -> Self {
        Self::Comparison {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
