//! In-memory stores for running without a database.
//!
//! Data lives in [`DashMap`]s and is lost on shutdown. Each map entry is guarded by its shard
//! lock, which is what makes [`CreditLedger::debit`] atomic here.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    models::{
        history::HistoryDBResponse,
        signup_logs::{SignupLogCreateDBRequest, SignupLogDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::store::{AccountStore, CreditLedger, HistoryStore};
use crate::types::{HistoryId, UserId};

#[derive(Default)]
pub struct MemoryStore {
    credits: DashMap<UserId, i64>,
    /// Records keyed by id, tagged with an insertion sequence number for ordering
    history: DashMap<HistoryId, (u64, HistoryDBResponse)>,
    history_seq: AtomicU64,
    users: DashMap<UserId, UserDBResponse>,
    users_by_email: DashMap<String, UserId>,
    signup_logs: DashMap<String, SignupLogDBResponse>,
}

fn unique_violation(table: &str, constraint: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

#[async_trait]
impl CreditLedger for MemoryStore {
    async fn balance(&self, user_id: UserId) -> Result<Option<i64>> {
        Ok(self.credits.get(&user_id).map(|credits| *credits))
    }

    async fn debit(&self, user_id: UserId, amount: i64) -> Result<Option<i64>> {
        let Some(mut credits) = self.credits.get_mut(&user_id) else {
            return Ok(None);
        };
        if *credits < amount {
            return Ok(None);
        }
        *credits -= amount;
        Ok(Some(*credits))
    }

    async fn provision(&self, user_id: UserId, credits: i64) -> Result<()> {
        match self.credits.entry(user_id) {
            Entry::Occupied(_) => Err(unique_violation("user_credits", "user_credits_pkey")),
            Entry::Vacant(slot) => {
                slot.insert(credits);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, user_id: UserId, prompt: &str, email: &str) -> Result<HistoryDBResponse> {
        let record = HistoryDBResponse {
            id: Uuid::new_v4(),
            user_id,
            prompt: prompt.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        let seq = self.history_seq.fetch_add(1, Ordering::SeqCst);
        self.history.insert(record.id, (seq, record.clone()));
        Ok(record)
    }

    async fn list(&self, user_id: UserId) -> Result<Vec<HistoryDBResponse>> {
        let mut records: Vec<(u64, HistoryDBResponse)> = self
            .history
            .iter()
            .filter(|entry| entry.value().1.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    async fn get(&self, id: HistoryId) -> Result<Option<HistoryDBResponse>> {
        Ok(self.history.get(&id).map(|entry| entry.value().1.clone()))
    }

    async fn delete_by_id(&self, id: HistoryId) -> Result<bool> {
        Ok(self.history.remove(&id).is_some())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        match self.users_by_email.entry(request.email.clone()) {
            Entry::Occupied(_) => Err(unique_violation("users", "users_email_unique")),
            Entry::Vacant(slot) => {
                let user = UserDBResponse {
                    id: Uuid::new_v4(),
                    email: request.email.clone(),
                    password_hash: request.password_hash.clone(),
                    created_at: Utc::now(),
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let Some(id) = self.users_by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.get_user_by_id(id).await
    }

    async fn signup_address_exists(&self, ip_address: &str) -> Result<bool> {
        Ok(self.signup_logs.contains_key(ip_address))
    }

    async fn record_signup(&self, request: &SignupLogCreateDBRequest) -> Result<()> {
        match self.signup_logs.entry(request.ip_address.clone()) {
            Entry::Occupied(_) => Err(unique_violation("signup_logs", "signup_logs_ip_address_unique")),
            Entry::Vacant(slot) => {
                slot.insert(SignupLogDBResponse {
                    ip_address: request.ip_address.clone(),
                    email: request.email.clone(),
                    created_at: Utc::now(),
                });
                Ok(())
            }
        }
    }
}
