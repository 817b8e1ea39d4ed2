//! PostgreSQL-backed stores.
//!
//! Every call checks a connection out of the pool and runs a single repository operation on it.
//! The debit is one conditional `UPDATE`, so no transaction spans the workflow's steps.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{
    errors::Result,
    handlers::{Credits, History, HistoryFilter, Repository, SignupLogs, Users},
    models::{
        history::{HistoryCreateDBRequest, HistoryDBResponse},
        signup_logs::SignupLogCreateDBRequest,
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::store::{AccountStore, CreditLedger, HistoryStore};
use crate::types::{HistoryId, UserId};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditLedger for PgStore {
    async fn balance(&self, user_id: UserId) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        let balance = Credits::new(&mut conn).get_user_balance(user_id).await?;
        Ok(balance.map(|b| b.credits))
    }

    async fn debit(&self, user_id: UserId, amount: i64) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Credits::new(&mut conn).debit(user_id, amount).await
    }

    async fn provision(&self, user_id: UserId, credits: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Credits::new(&mut conn).provision(user_id, credits).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn append(&self, user_id: UserId, prompt: &str, email: &str) -> Result<HistoryDBResponse> {
        let mut conn = self.pool.acquire().await?;
        History::new(&mut conn)
            .create(&HistoryCreateDBRequest {
                user_id,
                prompt: prompt.to_string(),
                email: email.to_string(),
            })
            .await
    }

    async fn list(&self, user_id: UserId) -> Result<Vec<HistoryDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        History::new(&mut conn).list(&HistoryFilter::new(user_id)).await
    }

    async fn get(&self, id: HistoryId) -> Result<Option<HistoryDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        History::new(&mut conn).get_by_id(id).await
    }

    async fn delete_by_id(&self, id: HistoryId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        History::new(&mut conn).delete(id).await
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).create(request).await
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_email(email).await
    }

    async fn signup_address_exists(&self, ip_address: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        SignupLogs::new(&mut conn).exists_for_address(ip_address).await
    }

    async fn record_signup(&self, request: &SignupLogCreateDBRequest) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        SignupLogs::new(&mut conn).create(request).await?;
        Ok(())
    }
}
