//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the cart store and recovery ledger ports,
//! backed by PostgreSQL via `diesel-async` with `bb8` connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: implementations only translate between Diesel rows
//!   and domain types. Lifecycle rules stay in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Compare-and-set transitions**: status updates filter on the status
//!   they expect, so concurrent writers cannot move a cart backwards.
//!
//! # Example
//!
//! ```ignore
//! use cart_recovery::outbound::persistence::{
//!     DbPool, DieselCartStore, DieselRecoveryLedger, PoolConfig,
//! };
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/shop")).await?;
//! let store = DieselCartStore::new(pool.clone());
//! let ledger = DieselRecoveryLedger::new(pool);
//! ```

mod cart_snapshots;
mod diesel_basic_error_mapping;
mod diesel_cart_store;
mod diesel_recovery_ledger;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_cart_store::DieselCartStore;
pub use diesel_recovery_ledger::DieselRecoveryLedger;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
