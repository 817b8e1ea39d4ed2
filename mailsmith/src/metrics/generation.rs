//! Generation outcome metrics for Prometheus.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, register_int_counter_vec};

/// How a generation request ended, used as the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Saved,
    Unsaved,
    Anonymous,
    CreditsExhausted,
    InvalidInput,
    ServiceUnavailable,
    UpstreamAuth,
    Upstream,
}

impl GenerationOutcome {
    fn as_str(self) -> &'static str {
        match self {
            GenerationOutcome::Saved => "saved",
            GenerationOutcome::Unsaved => "unsaved",
            GenerationOutcome::Anonymous => "anonymous",
            GenerationOutcome::CreditsExhausted => "credits_exhausted",
            GenerationOutcome::InvalidInput => "invalid_input",
            GenerationOutcome::ServiceUnavailable => "service_unavailable",
            GenerationOutcome::UpstreamAuth => "upstream_auth",
            GenerationOutcome::Upstream => "upstream",
        }
    }
}

static GENERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mailsmith_generations_total",
        "Total email generation requests by outcome",
        &["outcome"]
    )
    .expect("Failed to register mailsmith_generations_total metric")
});

static GENERATION_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mailsmith_generation_tokens_total",
        "Total tokens reported by the generation backend",
        &["model", "token_type"]
    )
    .expect("Failed to register mailsmith_generation_tokens_total metric")
});

/// Record the outcome of a generation request
pub fn record_generation(outcome: GenerationOutcome) {
    GENERATIONS.with_label_values(&[outcome.as_str()]).inc();
}

/// Record token usage reported by the backend
pub fn record_generation_tokens(model: &str, prompt_tokens: u32, completion_tokens: u32) {
    GENERATION_TOKENS
        .with_label_values(&[model, "input"])
        .inc_by(u64::from(prompt_tokens));
    GENERATION_TOKENS
        .with_label_values(&[model, "output"])
        .inc_by(u64::from(completion_tokens));
}
