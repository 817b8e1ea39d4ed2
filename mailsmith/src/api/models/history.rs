//! API models for saved emails.

use crate::db::models::history::HistoryDBResponse;
use crate::types::{HistoryId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: HistoryId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub prompt: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryDBResponse> for HistoryResponse {
    fn from(db: HistoryDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            prompt: db.prompt,
            email: db.email,
            created_at: db.created_at,
        }
    }
}
