//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (a pooled connection or an open transaction)
//! and returns models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: account creation and lookup by email
//! - [`Credits`]: balance reads, provisioning and the conditional debit
//! - [`History`]: the email vault, implements [`Repository`]
//! - [`SignupLogs`]: one-signup-per-address bookkeeping
//!
//! ```ignore
//! use mailsmith::db::handlers::{History, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = History::new(&mut conn);
//!     let saved = repo.list(&HistoryFilter::new(user_id)).await?;
//!     Ok(())
//! }
//! ```

pub mod credits;
pub mod history;
pub mod repository;
pub mod signup_logs;
pub mod users;

pub use credits::Credits;
pub use history::{History, HistoryFilter};
pub use repository::Repository;
pub use signup_logs::SignupLogs;
pub use users::Users;
