//! Credit-gated email generation.
//!
//! [`workflow::GenerationWorkflow`] is the only place where credits are spent. For an identified
//! caller it reads the balance, debits one credit with a conditional decrement and saves the result
//! to the vault; anonymous callers get the generated text with no side effects.
//!
//! Failures before text exists abort the request with a [`GenerationError`]. Failures after text
//! exists degrade to a [`SoftFailure`] carried on the [`GenerationResult`], except for exhausted
//! credits, which withhold the text.

use thiserror::Error;

pub mod backend;
pub mod workflow;

pub use backend::{BackendError, Completion, GenerationBackend, OpenAiBackend};
pub use workflow::GenerationWorkflow;

/// Message returned alongside text generated for an unauthenticated caller.
pub const ANONYMOUS_MESSAGE: &str = "User not authenticated";

/// Token usage reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A post-generation step that failed without discarding the generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftFailure {
    /// The balance could not be read; nothing was debited or saved.
    LedgerReadFailed,
    /// The debit write failed; the remaining balance is unknown.
    DebitFailed,
    /// The email was paid for but could not be saved to the vault.
    HistoryAppendFailed,
}

impl SoftFailure {
    pub fn message(self) -> &'static str {
        match self {
            SoftFailure::LedgerReadFailed => "Failed to check user credits",
            SoftFailure::DebitFailed => "Failed to update user credits",
            SoftFailure::HistoryAppendFailed => "Failed to save email",
        }
    }
}

/// What a generation request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub email: String,
    pub model: String,
    pub usage: Usage,
    /// The caller presented no usable token; nothing was debited or saved
    pub anonymous: bool,
    /// Whether the email was appended to the caller's vault
    pub saved: bool,
    pub message: Option<String>,
    /// Balance after the debit, when the debit succeeded
    pub credits_remaining: Option<i64>,
    pub soft_failure: Option<SoftFailure>,
}

/// Failures that abort a generation request.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{message}")]
    InvalidInput { message: String },

    /// No backend credential is configured
    #[error("OpenAI API key is not configured")]
    ServiceUnavailable,

    /// The backend rejected our credential
    #[error("Invalid or expired OpenAI API key")]
    UpstreamAuth { details: String },

    #[error("Generation backend error: {message}")]
    Upstream {
        status: Option<u16>,
        code: Option<String>,
        kind: Option<String>,
        message: String,
    },

    /// The caller has no credits left; the generated text is withheld
    #[error("No remaining credits")]
    CreditsExhausted,
}

impl From<BackendError> for GenerationError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Auth { message } => GenerationError::UpstreamAuth { details: message },
            BackendError::Api {
                status,
                code,
                kind,
                message,
            } => GenerationError::Upstream {
                status: Some(status),
                code,
                kind,
                message,
            },
            BackendError::Transport { message } => GenerationError::Upstream {
                status: None,
                code: None,
                kind: None,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_failure_messages() {
        assert_eq!(SoftFailure::LedgerReadFailed.message(), "Failed to check user credits");
        assert_eq!(SoftFailure::DebitFailed.message(), "Failed to update user credits");
        assert_eq!(SoftFailure::HistoryAppendFailed.message(), "Failed to save email");
    }

    #[test]
    fn test_backend_errors_map_to_generation_errors() {
        let err: GenerationError = BackendError::Auth {
            message: "Incorrect API key provided".to_string(),
        }
        .into();
        assert!(matches!(err, GenerationError::UpstreamAuth { .. }));

        let err: GenerationError = BackendError::Api {
            status: 429,
            code: Some("rate_limit_exceeded".to_string()),
            kind: Some("requests".to_string()),
            message: "Rate limit reached".to_string(),
        }
        .into();
        assert!(matches!(err, GenerationError::Upstream { status: Some(429), .. }));

        let err: GenerationError = BackendError::Transport {
            message: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, GenerationError::Upstream { status: None, .. }));
    }
}
