//! Credit balance metrics for Prometheus.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, register_int_counter};

/// Counter for successful credit debits
static CREDITS_DEBITED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("mailsmith_credits_debited_total", "Total credits spent on email generation")
        .expect("Failed to register mailsmith_credits_debited_total metric")
});

/// Counter for failed credit debit writes
static CREDITS_DEBIT_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("mailsmith_credits_debit_errors_total", "Total credit debit errors")
        .expect("Failed to register mailsmith_credits_debit_errors_total metric")
});

/// Record a successful credit debit
pub fn record_credit_debit(amount: i64) {
    // Ensure non-negative
    CREDITS_DEBITED.inc_by(amount.max(0) as u64);
}

/// Record a failed credit debit
pub fn record_credit_debit_error() {
    CREDITS_DEBIT_ERRORS.inc();
}
