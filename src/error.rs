//! Error types for Observar
//!
//! Lookup and lifecycle failures surface immediately to the caller.
//! Name resolution never fails: an unrecognized tensor name is a
//! [`Resolution::Unresolved`](crate::resolve::Resolution) outcome, not an error.

use thiserror::Error;

/// Result type alias for Observar operations
pub type Result<T> = std::result::Result<T, ObservarError>;

/// Error type for all Observar operations
#[derive(Debug, Error)]
pub enum ObservarError {
    /// Model family label is not one of the supported families
    #[error("Unknown model family: {0}")]
    UnknownFamily(String),

    /// Size label is not in the family's layer-count table
    #[error("Unknown size '{size}' for model family '{family}'")]
    UnknownSize {
        /// Family the lookup was made against
        family: String,
        /// Size label that was not found
        size: String,
    },

    /// `start_trial` called while a trial is still active
    #[error("A trial is already active; end it before starting another")]
    TrialAlreadyActive,

    /// `end_trial` called without a preceding `start_trial`
    #[error("No active trial to end")]
    NoActiveTrial,

    /// Capture document is malformed or misses required fields
    #[error("Invalid capture document: {0}")]
    InvalidDocument(String),

    /// A query needed a loaded capture but none is loaded
    #[error("No capture loaded")]
    NoCaptureLoaded,

    /// Requested trial index is out of range
    #[error("Trial {index} not found ({available} trials available)")]
    TrialNotFound {
        /// Requested trial index
        index: usize,
        /// Number of trials in the capture
        available: usize,
    },

    /// Filesystem error while reading or writing a capture document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ObservarError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDocument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_size_display() {
        let err = ObservarError::UnknownSize {
            family: "llama".to_string(),
            size: "5b".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown size '5b' for model family 'llama'");
    }

    #[test]
    fn test_json_error_maps_to_invalid_document() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ObservarError = parse_err.into();
        assert!(matches!(err, ObservarError::InvalidDocument(_)));
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: ObservarError = io.into();
        assert!(err.to_string().contains("missing.json"));
    }
}
