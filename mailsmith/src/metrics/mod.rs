//! Prometheus metrics for the generation workflow.
//!
//! Counters are registered lazily against the default `prometheus` registry and rendered next to
//! the `axum-prometheus` HTTP metrics at `/internal/metrics` when `enable_metrics` is set.

mod credits;
mod generation;

pub use credits::{record_credit_debit, record_credit_debit_error};
pub use generation::{GenerationOutcome, record_generation, record_generation_tokens};

/// Render every metric in the default registry in the Prometheus text format.
pub fn render_default_registry() -> String {
    use prometheus::{Encoder, TextEncoder};

    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!("Failed to encode Prometheus metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
