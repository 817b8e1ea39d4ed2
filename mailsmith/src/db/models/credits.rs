//! Database models for credit balances.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database response for a user's credit balance
#[derive(Debug, Clone)]
pub struct UserCreditBalanceDBResponse {
    pub user_id: UserId,
    pub credits: i64,
    pub updated_at: DateTime<Utc>,
}
