//! Database record models matching table schemas.
//!
//! These structs are what the repositories in [`crate::db::handlers`] accept and return.
//! They are kept separate from the API models in [`crate::api::models`] so that storage and wire
//! representations can evolve independently.
//!
//! - [`users`]: accounts and password hashes
//! - [`credits`]: per-user credit balances
//! - [`history`]: saved emails (the vault)
//! - [`signup_logs`]: network addresses that have already been used to sign up

pub mod credits;
pub mod history;
pub mod signup_logs;
pub mod users;
