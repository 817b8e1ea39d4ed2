//! Database models for the signup address log.

use chrono::{DateTime, Utc};

/// Database request for recording the address a signup came from
#[derive(Debug, Clone)]
pub struct SignupLogCreateDBRequest {
    pub ip_address: String,
    pub email: String,
}

/// Database response for a signup log entry
#[derive(Debug, Clone)]
pub struct SignupLogDBResponse {
    pub ip_address: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
