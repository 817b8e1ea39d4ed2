//! Authentication.
//!
//! Accounts sign in with email and password and receive an HS256 session token. The token is
//! presented as `Authorization: Bearer <token>` (or, for generation requests, as `authToken` in
//! the body).
//!
//! # Modules
//!
//! - [`current_user`]: Extractor for the authenticated user in handlers
//! - [`identity`]: The [`identity::IdentityProvider`] seam used by the generation workflow
//! - [`password`]: Password hashing and verification using Argon2
//! - [`session`]: Session token creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use mailsmith::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.email)
//! }
//! ```

pub mod current_user;
pub mod identity;
pub mod password;
pub mod session;
