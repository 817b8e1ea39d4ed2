//! Database repository for the email vault.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::history::{HistoryCreateDBRequest, HistoryDBResponse},
};
use crate::types::{HistoryId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing saved emails
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub user_id: UserId,
}

impl HistoryFilter {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct EmailHistory {
    pub id: HistoryId,
    pub user_id: UserId,
    pub prompt: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<EmailHistory> for HistoryDBResponse {
    fn from(row: EmailHistory) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            prompt: row.prompt,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

pub struct History<'c> {
    db: &'c mut PgConnection,
}

impl<'c> History<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for History<'c> {
    type CreateRequest = HistoryCreateDBRequest;
    type Response = HistoryDBResponse;
    type Id = HistoryId;
    type Filter = HistoryFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as::<_, EmailHistory>(
            r#"
            INSERT INTO email_history (id, user_id, prompt, email)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, prompt, email, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.prompt)
        .bind(&request.email)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row.into())
    }

    #[instrument(skip(self), fields(history_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, EmailHistory>("SELECT id, user_id, prompt, email, created_at FROM email_history WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        // seq orders rows that share a transaction timestamp
        let rows = sqlx::query_as::<_, EmailHistory>(
            r#"
            SELECT id, user_id, prompt, email, created_at
            FROM email_history
            WHERE user_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(filter.user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(history_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM email_history WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
