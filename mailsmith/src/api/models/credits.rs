//! API models for credit balances.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditsResponse {
    /// Remaining generations
    pub credits: i64,
}
