//! Database repository for the signup address log.

use crate::db::{
    errors::Result,
    models::signup_logs::{SignupLogCreateDBRequest, SignupLogDBResponse},
};
use crate::types::mask_email;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

#[derive(Debug, Clone, FromRow)]
struct SignupLog {
    pub ip_address: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<SignupLog> for SignupLogDBResponse {
    fn from(row: SignupLog) -> Self {
        Self {
            ip_address: row.ip_address,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

pub struct SignupLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SignupLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn exists_for_address(&mut self, ip_address: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM signup_logs WHERE ip_address = $1)")
            .bind(ip_address)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), fields(ip_address = %request.ip_address, email = %mask_email(&request.email)), err)]
    pub async fn create(&mut self, request: &SignupLogCreateDBRequest) -> Result<SignupLogDBResponse> {
        let row = sqlx::query_as::<_, SignupLog>(
            r#"
            INSERT INTO signup_logs (ip_address, email)
            VALUES ($1, $2)
            RETURNING ip_address, email, created_at
            "#,
        )
        .bind(&request.ip_address)
        .bind(&request.email)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row.into())
    }
}
