//! Transactions on a reserved connection.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ReservedClient;
use crate::queryable::{PgQueryable, Queryable, SqlQuery, SqlResultSet};
use crate::{Error, Result};

/// Transaction isolation levels accepted by `start_transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Options the engine reads off a started transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    /// When false the engine sends `COMMIT` / `ROLLBACK` itself through
    /// `execute_raw` before calling `commit` / `rollback`.
    pub use_phantom_query: bool,
}

/// Transaction surface the engine drives.
#[async_trait]
pub trait Transaction: Queryable {
    fn options(&self) -> TransactionOptions;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;
}

/// Transaction bound to one reserved connection.
pub struct PgTransaction<R> {
    queryable: PgQueryable<R>,
    options: TransactionOptions,
    active: AtomicBool,
}

impl<R> fmt::Debug for PgTransaction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTransaction")
            .field("options", &self.options)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl<R: ReservedClient> PgTransaction<R> {
    pub fn new(client: R, options: TransactionOptions) -> Self {
        Self {
            queryable: PgQueryable::new(client),
            options,
            active: AtomicBool::new(true),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(Error::TransactionClosed {
                details: "Transaction is no longer active".to_string(),
            });
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Err(Error::TransactionClosed {
                details: "Transaction was already committed or rolled back".to_string(),
            });
        }
        self.queryable.client().release().await;
        Ok(())
    }
}

#[async_trait]
impl<R: ReservedClient> Queryable for PgTransaction<R> {
    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet> {
        self.ensure_active()?;
        self.queryable.query_raw(query).await
    }

    async fn execute_raw(&self, query: &SqlQuery) -> Result<u64> {
        self.ensure_active()?;
        self.queryable.execute_raw(query).await
    }
}

#[async_trait]
impl<R: ReservedClient> Transaction for PgTransaction<R> {
    fn options(&self) -> TransactionOptions {
        self.options
    }

    async fn commit(&self) -> Result<()> {
        debug!("[pgshim::commit]");
        self.finish().await
    }

    async fn rollback(&self) -> Result<()> {
        debug!("[pgshim::rollback]");
        self.finish().await
    }
}
