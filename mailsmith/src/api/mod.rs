//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Generation** (`/api/generate-email`): Generate an email, charged when signed in
//! - **Authentication** (`/api/signup`, `/api/login`): Accounts and session tokens
//! - **History** (`/api/history`): The signed-in user's saved emails
//! - **Credits** (`/api/credits`): The signed-in user's balance
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The API reference is served at `/docs`.

pub mod handlers;
pub mod models;
