//! API request and response data models.
//!
//! These structures define the public JSON contract. They are kept distinct from the database
//! models in [`crate::db::models`], and annotated with `utoipa` for the generated API docs.
//!
//! - [`generate`]: email generation request and result
//! - [`auth`]: sign-up and login payloads
//! - [`users`]: the authenticated user and public user info
//! - [`history`]: saved emails
//! - [`credits`]: balance responses

pub mod auth;
pub mod credits;
pub mod generate;
pub mod history;
pub mod users;
