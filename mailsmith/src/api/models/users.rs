//! API models for users.

use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated caller, as carried in the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
}

/// Public user info returned by sign-up and login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self { id: db.id, email: db.email }
    }
}

impl From<&UserDBResponse> for CurrentUser {
    fn from(db: &UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email.clone(),
        }
    }
}
