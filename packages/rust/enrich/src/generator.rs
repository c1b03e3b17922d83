//! The text-generation seam and its typed failure modes.

use std::future::Future;

/// Why a generation call produced no usable payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    /// The service rejected our credentials (HTTP 401/403).
    #[error("unauthorized (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// The service answered with another non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never completed (connect, TLS, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response envelope was unreadable or carried no text.
    #[error("unreadable response: {0}")]
    Parse(String),
}

impl GenerateError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// A request/response text generator that is asked for JSON output.
pub trait TextGenerator: Send + Sync {
    /// Identifier of the underlying model, used for cache keying.
    fn model_id(&self) -> &str;

    /// Send one instruction and return the raw text payload.
    fn generate(
        &self,
        instruction: &str,
    ) -> impl Future<Output = Result<String, GenerateError>> + Send;
}
