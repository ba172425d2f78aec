//! Error types for hostmon
//!
//! Only failures that stop a whole operation live here. Degraded hardware
//! lookups and unreachable nodes are reported as values (`Probed::Unknown`,
//! `NodeFailure`) inside the returned records instead.

use crate::nodes::NodeFailure;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hostmon operations
#[derive(Error, Debug)]
pub enum HostmonError {
    /// The OS could not be queried; no partial sample is produced
    #[error("Sampling failed: {0}")]
    SamplingFailure(String),

    /// I/O error while reading a file
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A node request failed (only raised by fallible node calls)
    #[error("Node '{node}' request failed: {failure}")]
    Node { node: String, failure: NodeFailure },
}

impl HostmonError {
    /// Create a sampling failure
    pub fn sampling(message: impl Into<String>) -> Self {
        Self::SamplingFailure(message.into())
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a node error
    pub fn node(node: impl Into<String>, failure: NodeFailure) -> Self {
        Self::Node {
            node: node.into(),
            failure,
        }
    }

    /// Check if the caller may simply retry the whole operation
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SamplingFailure(_) | Self::Io { .. } => true,
            Self::Node { failure, .. } => failure.is_transient(),
            Self::Serialization(_) | Self::Config(_) => false,
        }
    }
}

/// Result type alias for hostmon operations
pub type Result<T> = std::result::Result<T, HostmonError>;

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| HostmonError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Result<()> = Err(io_err).with_path("/etc/hostmon/nodes.json");
        let err = err.unwrap_err();
        assert!(err.to_string().contains("/etc/hostmon/nodes.json"));
    }

    #[test]
    fn test_error_recoverability() {
        assert!(HostmonError::sampling("cpu ticks unavailable").is_recoverable());
        assert!(!HostmonError::config("bad timeout").is_recoverable());

        let timeout = HostmonError::node("n1", NodeFailure::Timeout { after_ms: 5000 });
        assert!(timeout.is_recoverable());

        let status = HostmonError::node("n1", NodeFailure::UnexpectedResponse { status: 404 });
        assert!(!status.is_recoverable());
    }
}
