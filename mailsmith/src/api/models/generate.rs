//! API models for email generation.

use crate::generation::{GenerationResult, Usage};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateEmailRequest {
    /// What the email should say
    #[serde(default)]
    pub prompt: String,
    /// Session token; may be sent as `Authorization: Bearer` instead
    #[serde(default, rename = "authToken")]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Usage> for UsageResponse {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateEmailResponse {
    pub email: String,
    pub model: String,
    pub usage: UsageResponse,
    /// Whether the email was saved to the caller's history
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Balance after this generation, when it was charged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<i64>,
}

impl From<GenerationResult> for GenerateEmailResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            email: result.email,
            model: result.model,
            usage: result.usage.into(),
            saved: result.saved,
            message: result.message,
            credits_remaining: result.credits_remaining,
        }
    }
}
