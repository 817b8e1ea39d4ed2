//! Database repository for credit balances.

use crate::db::{errors::Result, models::credits::UserCreditBalanceDBResponse};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

// Database entity model for a balance row
#[derive(Debug, Clone, FromRow)]
struct UserCredits {
    pub user_id: UserId,
    pub credits: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<UserCredits> for UserCreditBalanceDBResponse {
    fn from(row: UserCredits) -> Self {
        Self {
            user_id: row.user_id,
            credits: row.credits,
            updated_at: row.updated_at,
        }
    }
}

pub struct Credits<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Credits<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Get the balance row for a user, if one has been provisioned
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_user_balance(&mut self, user_id: UserId) -> Result<Option<UserCreditBalanceDBResponse>> {
        let row = sqlx::query_as::<_, UserCredits>("SELECT user_id, credits, updated_at FROM user_credits WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Create the balance row for a new user
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn provision(&mut self, user_id: UserId, credits: i64) -> Result<UserCreditBalanceDBResponse> {
        let row = sqlx::query_as::<_, UserCredits>(
            r#"
            INSERT INTO user_credits (user_id, credits)
            VALUES ($1, $2)
            RETURNING user_id, credits, updated_at
            "#,
        )
        .bind(user_id)
        .bind(credits)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row.into())
    }

    /// Atomically subtract `amount` from the balance, only if the balance covers it.
    ///
    /// Returns the new balance, or `None` when no row was changed (no balance row, or the
    /// balance was already below `amount`).
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn debit(&mut self, user_id: UserId, amount: i64) -> Result<Option<i64>> {
        let remaining = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE user_credits
            SET credits = credits - $2, updated_at = NOW()
            WHERE user_id = $1 AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn create_user(pool: &PgPool, email: &str) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: email.to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_provision_and_read_balance(pool: PgPool) {
        let user_id = create_user(&pool, "credits@gmail.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Credits::new(&mut conn);

        assert!(repo.get_user_balance(user_id).await.unwrap().is_none());

        let created = repo.provision(user_id, 3).await.unwrap();
        assert_eq!(created.credits, 3);

        let balance = repo.get_user_balance(user_id).await.unwrap().unwrap();
        assert_eq!(balance.credits, 3);
        assert_eq!(balance.user_id, user_id);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_debit_stops_at_zero(pool: PgPool) {
        let user_id = create_user(&pool, "debit@gmail.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Credits::new(&mut conn);
        repo.provision(user_id, 2).await.unwrap();

        assert_eq!(repo.debit(user_id, 1).await.unwrap(), Some(1));
        assert_eq!(repo.debit(user_id, 1).await.unwrap(), Some(0));
        assert_eq!(repo.debit(user_id, 1).await.unwrap(), None);

        let balance = repo.get_user_balance(user_id).await.unwrap().unwrap();
        assert_eq!(balance.credits, 0);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_debit_without_balance_row(pool: PgPool) {
        let user_id = create_user(&pool, "nobalance@gmail.com").await;
        let mut conn = pool.acquire().await.unwrap();

        assert_eq!(Credits::new(&mut conn).debit(user_id, 1).await.unwrap(), None);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_concurrent_debits_never_overdraw(pool: PgPool) {
        let user_id = create_user(&pool, "race@gmail.com").await;
        {
            let mut conn = pool.acquire().await.unwrap();
            Credits::new(&mut conn).provision(user_id, 1).await.unwrap();
        }

        let attempts = (0..5).map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                Credits::new(&mut conn).debit(user_id, 1).await.unwrap()
            })
        });

        let mut successes = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.unwrap().is_some() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);

        let mut conn = pool.acquire().await.unwrap();
        let balance = Credits::new(&mut conn).get_user_balance(user_id).await.unwrap().unwrap();
        assert_eq!(balance.credits, 0);
    }
}
