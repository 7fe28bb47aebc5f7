//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations for the `users` and `magic_tokens` tables
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories work with SQLx transactions to ensure ACID properties. Create
//! repositories from a transaction when multiple statements must commit together:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut tokens = MagicTokens::new(&mut tx);
//! // ... operations ...
//! tx.commit().await?;
//! ```
//!
//! Read-only lookups may use a plain pool connection instead.
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! sopd::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
