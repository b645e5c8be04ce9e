//! # Relational Storage
//!
//! sqlx/Postgres implementations of the store traits. Each service points its
//! stores at its own database; the outbox and processed-event tables are
//! deliberately per-service, never consolidated.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::{
    run_migrations, PgExecutionStore, PgIdempotencyLedger, PgOutboxStore, PgTaskStore,
};
