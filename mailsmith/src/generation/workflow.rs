//! The generation workflow: validate, generate, then pay and save.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::api::models::users::CurrentUser;
use crate::auth::identity::IdentityProvider;
use crate::generation::{ANONYMOUS_MESSAGE, GenerationBackend, GenerationError, GenerationResult, SoftFailure};
use crate::metrics::{self, GenerationOutcome};
use crate::store::{CreditLedger, HistoryStore};
use crate::types::abbrev_uuid;

/// Credits spent per generated email.
pub const GENERATION_COST: i64 = 1;

pub struct GenerationWorkflow {
    /// `None` when no backend credential is configured
    backend: Option<Arc<dyn GenerationBackend>>,
    identity: Arc<dyn IdentityProvider>,
    credits: Arc<dyn CreditLedger>,
    history: Arc<dyn HistoryStore>,
}

impl GenerationWorkflow {
    pub fn new(
        backend: Option<Arc<dyn GenerationBackend>>,
        identity: Arc<dyn IdentityProvider>,
        credits: Arc<dyn CreditLedger>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            backend,
            identity,
            credits,
            history,
        }
    }

    /// Generate an email for `prompt`, charging the caller identified by `caller_token` if any.
    #[instrument(skip_all, fields(has_token = caller_token.is_some()))]
    pub async fn generate(&self, prompt: &str, caller_token: Option<&str>) -> Result<GenerationResult, GenerationError> {
        let result = self.run(prompt, caller_token).await;
        metrics::record_generation(outcome_of(&result));
        result
    }

    async fn run(&self, prompt: &str, caller_token: Option<&str>) -> Result<GenerationResult, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidInput {
                message: "A prompt is required".to_string(),
            });
        }

        let Some(backend) = &self.backend else {
            return Err(GenerationError::ServiceUnavailable);
        };

        let caller = self.resolve_caller(caller_token).await;

        let completion = backend.complete(prompt).await.map_err(GenerationError::from)?;
        metrics::record_generation_tokens(
            &completion.model,
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens,
        );

        let mut result = GenerationResult {
            email: completion.text,
            model: completion.model,
            usage: completion.usage,
            anonymous: false,
            saved: false,
            message: None,
            credits_remaining: None,
            soft_failure: None,
        };

        let Some(caller) = caller else {
            result.anonymous = true;
            result.message = Some(ANONYMOUS_MESSAGE.to_string());
            return Ok(result);
        };

        let user_id = caller.id;

        let balance = match self.credits.balance(user_id).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(user_id = %abbrev_uuid(&user_id), "Failed to read credit balance: {:#}", e);
                return Ok(degrade(result, SoftFailure::LedgerReadFailed));
            }
        };

        if balance.is_none_or(|credits| credits <= 0) {
            debug!(user_id = %abbrev_uuid(&user_id), "Caller has no credits left");
            return Err(GenerationError::CreditsExhausted);
        }

        match self.credits.debit(user_id, GENERATION_COST).await {
            Ok(Some(remaining)) => {
                metrics::record_credit_debit(GENERATION_COST);
                result.credits_remaining = Some(remaining);
            }
            // A concurrent request spent the last credit between the read and the debit
            Ok(None) => {
                info!(user_id = %abbrev_uuid(&user_id), "Lost the race for the last credit");
                return Err(GenerationError::CreditsExhausted);
            }
            Err(e) => {
                metrics::record_credit_debit_error();
                warn!(user_id = %abbrev_uuid(&user_id), "Failed to debit credits: {:#}", e);
                result = degrade(result, SoftFailure::DebitFailed);
            }
        }

        match self.history.append(user_id, prompt, &result.email).await {
            Ok(record) => {
                debug!(user_id = %abbrev_uuid(&user_id), history_id = %abbrev_uuid(&record.id), "Saved generated email");
                result.saved = true;
            }
            Err(e) => {
                warn!(user_id = %abbrev_uuid(&user_id), "Failed to save generated email: {:#}", e);
                result = degrade(result, SoftFailure::HistoryAppendFailed);
            }
        }

        Ok(result)
    }

    /// Resolve the caller. Any verification failure degrades to anonymous.
    async fn resolve_caller(&self, caller_token: Option<&str>) -> Option<CurrentUser> {
        let token = caller_token.map(str::trim).filter(|token| !token.is_empty())?;
        match self.identity.resolve(token).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("Caller token rejected, continuing anonymously: {}", e);
                None
            }
        }
    }
}

/// Record a soft failure. The latest one supplies the message.
fn degrade(mut result: GenerationResult, failure: SoftFailure) -> GenerationResult {
    result.soft_failure = Some(failure);
    result.message = Some(failure.message().to_string());
    result
}

fn outcome_of(result: &Result<GenerationResult, GenerationError>) -> GenerationOutcome {
    match result {
        Ok(r) if r.saved => GenerationOutcome::Saved,
        Ok(r) if r.anonymous => GenerationOutcome::Anonymous,
        Ok(_) => GenerationOutcome::Unsaved,
        Err(GenerationError::InvalidInput { .. }) => GenerationOutcome::InvalidInput,
        Err(GenerationError::ServiceUnavailable) => GenerationOutcome::ServiceUnavailable,
        Err(GenerationError::UpstreamAuth { .. }) => GenerationOutcome::UpstreamAuth,
        Err(GenerationError::Upstream { .. }) => GenerationOutcome::Upstream,
        Err(GenerationError::CreditsExhausted) => GenerationOutcome::CreditsExhausted,
    }
}
