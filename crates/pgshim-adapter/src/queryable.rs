//! Query execution shared by the adapter and its transactions.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::client::{QueryOutput, SqlExecutor};
use crate::value::{ColumnType, DbValue, guess_column_types};
use crate::{Error, Result};

pub const PROVIDER: &str = "postgres";
pub const ADAPTER_NAME: &str = env!("CARGO_PKG_NAME");

/// Statement with positional arguments (`$1`, `$2`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub args: Vec<DbValue>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<DbValue>) -> Self {
        self.args = args;
        self
    }
}

/// Result set in the engine's positional shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlResultSet {
    pub column_names: Vec<String>,
    pub column_types: Vec<ColumnType>,
    pub rows: Vec<Vec<DbValue>>,
}

/// Query surface the engine drives.
#[async_trait]
pub trait Queryable: Send + Sync {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn adapter_name(&self) -> &'static str {
        ADAPTER_NAME
    }

    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet>;

    /// Execute a statement and return the number of affected rows.
    async fn execute_raw(&self, query: &SqlQuery) -> Result<u64>;
}

/// [`Queryable`] over any statement executor: the shared client or a
/// reserved connection.
pub struct PgQueryable<C> {
    client: C,
}

impl<C> fmt::Debug for PgQueryable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgQueryable").finish_non_exhaustive()
    }
}

impl<C: SqlExecutor> PgQueryable<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn perform_io(&self, context: &str, query: &SqlQuery) -> Result<QueryOutput> {
        self.client
            .execute(&query.sql, &query.args)
            .await
            .map_err(|err| {
                debug!(error = %err, "[pgshim::{context}] client error");
                Error::from_client(context, err)
            })
    }

    /// Run each statement of `statements` in order, stopping at the first
    /// failure.
    pub(crate) async fn execute_each(&self, statements: &[&str]) -> Result<()> {
        for statement in statements {
            self.perform_io("execute_script", &SqlQuery::new(*statement))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: SqlExecutor> Queryable for PgQueryable<C> {
    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet> {
        debug!(sql = %query.sql, args = query.args.len(), "[pgshim::query_raw]");

        let output = self.perform_io("query_raw", query).await?;
        let column_names: Vec<String> = output
            .rows
            .first()
            .map(|row| row.column_names().map(str::to_owned).collect())
            .unwrap_or_default();
        let column_types = guess_column_types(&output.rows);
        let rows = output
            .rows
            .iter()
            .map(|row| row.values_for(&column_names))
            .collect();

        Ok(SqlResultSet {
            column_names,
            column_types,
            rows,
        })
    }

    async fn execute_raw(&self, query: &SqlQuery) -> Result<u64> {
        debug!(sql = %query.sql, args = query.args.len(), "[pgshim::execute_raw]");

        let output = self.perform_io("execute_raw", query).await?;
        Ok(output
            .rows_affected
            .unwrap_or(output.rows.len() as u64))
    }
}
