use thiserror::Error;

/// Default message used when an error response carries no body text.
pub const DEFAULT_API_MESSAGE: &str = "Erreur API";

/// Failure taxonomy for the client data layer.
///
/// `Network` and `Api` come out of the transport, `Validation` and `Conflict`
/// are raised client-side before a request is dispatched, `Decode` covers
/// payloads that do not match the expected shape, and `Storage` wraps local
/// session persistence failures.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_API_MESSAGE.to_string()
        } else {
            message
        };
        Self::Api { status, message }
    }

    /// HTTP status carried by the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures the caller may retry as-is (transport-level only).
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
