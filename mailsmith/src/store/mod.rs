//! Storage abstraction layer
//!
//! This module defines the storage traits the generation workflow and the HTTP handlers are
//! written against:
//!
//! - [`CreditLedger`]: one credit counter per user, with an atomic conditional debit
//! - [`HistoryStore`]: the per-user email vault
//! - [`AccountStore`]: accounts and the signup address log
//!
//! Two implementations exist: [`postgres::PgStore`] over the repositories in
//! [`crate::db::handlers`], and [`memory::MemoryStore`] for running without a database.
//! Both report failures as [`DbError`].

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::errors::Result;
use crate::db::models::{
    history::HistoryDBResponse,
    signup_logs::SignupLogCreateDBRequest,
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{HistoryId, UserId};

#[cfg(doc)]
use crate::db::errors::DbError;

pub mod memory;
pub mod postgres;

/// Per-user credit balances.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Current balance, or `None` when the user has no balance row.
    async fn balance(&self, user_id: UserId) -> Result<Option<i64>>;

    /// Subtract `amount` only if the balance covers it, as a single atomic step.
    ///
    /// Returns the new balance, or `None` when nothing changed.
    async fn debit(&self, user_id: UserId, amount: i64) -> Result<Option<i64>>;

    /// Create the balance row for a new user.
    async fn provision(&self, user_id: UserId, credits: i64) -> Result<()>;
}

/// Saved emails, one list per user.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, user_id: UserId, prompt: &str, email: &str) -> Result<HistoryDBResponse>;

    /// All of a user's records, newest first.
    async fn list(&self, user_id: UserId) -> Result<Vec<HistoryDBResponse>>;

    async fn get(&self, id: HistoryId) -> Result<Option<HistoryDBResponse>>;

    /// Delete a record by id. Callers are responsible for checking ownership.
    async fn delete_by_id(&self, id: HistoryId) -> Result<bool>;
}

/// User accounts and the signup address log.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn signup_address_exists(&self, ip_address: &str) -> Result<bool>;

    async fn record_signup(&self, request: &SignupLogCreateDBRequest) -> Result<()>;
}

/// The set of stores handed to the workflow and the handlers.
#[derive(Clone)]
pub struct Stores {
    pub credits: Arc<dyn CreditLedger>,
    pub history: Arc<dyn HistoryStore>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Stores {
    /// Stores backed by a PostgreSQL pool. Migrations must already have run.
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            credits: store.clone(),
            history: store.clone(),
            accounts: store,
        }
    }

    /// Stores held in process memory.
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            credits: store.clone(),
            history: store.clone(),
            accounts: store,
        }
    }
}
