//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates its input, resolves the caller where needed, delegates to the
//! generation workflow or the stores in [`crate::AppState`], and serializes the result.
//!
//! # Handler Modules
//!
//! - [`auth`]: Sign-up and login
//! - [`credits`]: The current user's credit balance
//! - [`generate`]: Email generation
//! - [`history`]: Listing and deleting saved emails
//!
//! # Authentication
//!
//! Handlers that take a [`crate::api::models::users::CurrentUser`] argument require a valid
//! `Authorization: Bearer` session token. Email generation is open to anonymous callers.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to an HTTP status code and a JSON
//! error body.

pub mod auth;
pub mod credits;
pub mod generate;
pub mod history;
