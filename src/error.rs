use thiserror::Error;

/// Maximum characters of a provider message kept in an outcome comment.
pub(crate) const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// Errors that can occur while talking to a provider or loading inputs.
#[derive(Debug, Error)]
pub enum IamError {
    /// A provider call raised instead of returning a result.
    #[error("provider error during {operation}: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },

    /// Pillar data could not be read or had the wrong shape.
    #[error("pillar error: {0}")]
    Pillar(String),

    /// JSON (de)serialization error.
    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// Filesystem error while loading an input file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IamError {
    /// Shorthand for a provider-side error.
    pub fn provider(operation: &'static str, message: impl Into<String>) -> Self {
        IamError::Provider {
            operation,
            message: message.into(),
        }
    }

    /// Returns the provider operation name if this is a provider error.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            IamError::Provider { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

/// A specialized Result type for IAM role state operations.
pub type Result<T> = std::result::Result<T, IamError>;

/// Cuts provider error text down to `max_chars` characters before it lands
/// in a comment. Never splits a character.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
