//! Database models for saved emails.

use crate::types::{HistoryId, UserId};
use chrono::{DateTime, Utc};

/// Database request for saving a generated email
#[derive(Debug, Clone)]
pub struct HistoryCreateDBRequest {
    pub user_id: UserId,
    pub prompt: String,
    pub email: String,
}

/// Database response for a saved email
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDBResponse {
    pub id: HistoryId,
    pub user_id: UserId,
    pub prompt: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
