//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: user account identifier
//! - [`HistoryId`]: saved email (vault entry) identifier
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging
//! - [`mask_email`]: Hide the local part of an email address for logging

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type HistoryId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Mask an email address for log output, keeping the first two characters of the local part.
/// Example: "jane.doe@gmail.com" -> "ja***@gmail.com"
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(2).collect();
            format!("{visible}***@{domain}")
        }
        None => "***".to_string(),
    }
}
