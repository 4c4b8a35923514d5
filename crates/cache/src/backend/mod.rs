//! Cache backends.
//!
//! The in-memory backend needs no transactions. The two database backends
//! share the transaction discipline below: every logical operation runs as
//! `begin → statement → settle`. A [`Transaction`] owns its pooled
//! connection; dropping one that was never settled rolls it back and returns
//! the connection to the pool, so early returns cannot leak either.

mod memory;
mod postgres;
mod sqlite;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::{Database, Pool, Transaction};

/// Acquire a pooled connection and open a transaction on it.
pub(crate) async fn begin<DB: Database>(pool: &Pool<DB>) -> Result<Transaction<'static, DB>> {
    pool.begin().await.or_raise(|| ErrorKind::Database)
}

/// Finish a transaction according to the outcome of the statement run in it.
///
/// Commits on success. On failure the transaction is rolled back first and
/// the statement's own error is returned, never the rollback's.
pub(crate) async fn settle<DB: Database, T>(tx: Transaction<'static, DB>, outcome: sqlx::Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.or_raise(|| ErrorKind::Database)?;
            Ok(value)
        },
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "Failed to roll back cache transaction");
            }
            Err(err).or_raise(|| ErrorKind::Database)
        },
    }
}
