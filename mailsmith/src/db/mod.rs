//! Database layer for data persistence and access.
//!
//! This module implements the PostgreSQL data access layer using SQLx. It follows the Repository
//! pattern; [`crate::store::postgres`] adapts the repositories to the storage traits the rest of
//! the service is written against.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Stores    │  (store::postgres - trait impls over a pool)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Storage error types, shared by the in-memory store
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! mailsmith::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
