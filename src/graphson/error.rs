//! GraphSON protocol error types.

use std::fmt;

/// Result type for GraphSON operations.
pub type GraphsonResult<T> = Result<T, GraphsonError>;

/// GraphSON protocol errors.
#[derive(Debug)]
pub enum GraphsonError {
    /// Frame could not be parsed as a response
    MalformedFrame(String),

    /// Typed value did not match its declared GraphSON type
    InvalidValue {
        /// Declared `@type`
        type_name: String,
        /// What went wrong
        reason: String,
    },

    /// Request could not be built
    InvalidRequest(String),

    /// JSON serialization failure
    Json(serde_json::Error),
}

impl GraphsonError {
    pub(crate) fn invalid_value(type_name: &str, reason: impl Into<String>) -> Self {
        GraphsonError::InvalidValue {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GraphsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphsonError::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
            GraphsonError::InvalidValue { type_name, reason } => {
                write!(f, "Invalid {} value: {}", type_name, reason)
            }
            GraphsonError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            GraphsonError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for GraphsonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraphsonError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GraphsonError {
    fn from(e: serde_json::Error) -> Self {
        GraphsonError::Json(e)
    }
}
