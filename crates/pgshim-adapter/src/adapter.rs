//! Top-level driver adapter.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{ReservedClient, SqlClient, SqlExecutor};
use crate::config::AdapterOptions;
use crate::queryable::{PgQueryable, Queryable, SqlQuery, SqlResultSet};
use crate::script::split_script;
use crate::sql::quote_identifier;
use crate::transaction::{IsolationLevel, PgTransaction, Transaction, TransactionOptions};
use crate::{Error, Result};

/// Connection details reported to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
}

/// Adapter surface the engine drives.
#[async_trait]
pub trait SqlDriverAdapter: Queryable {
    async fn start_transaction(
        &self,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<Box<dyn Transaction>>;

    /// Run a multi-statement script, one statement at a time.
    async fn execute_script(&self, script: &str) -> Result<()>;

    fn connection_info(&self) -> ConnectionInfo;

    /// Release every resource held by the adapter.
    async fn dispose(&self) -> Result<()>;
}

/// Temporary database dropped when the adapter using it is disposed.
pub(crate) struct ShadowDatabase {
    pub(crate) admin: Box<dyn SqlDriverAdapter>,
    pub(crate) database: String,
}

impl ShadowDatabase {
    pub(crate) async fn drop_database(self) -> Result<()> {
        let statement = format!("DROP DATABASE {}", quote_identifier(&self.database));
        let dropped = self.admin.execute_script(&statement).await;
        let disposed = self.admin.dispose().await;
        dropped.and(disposed)
    }
}

/// Adapter over a shared [`SqlClient`].
pub struct PgAdapter<C> {
    queryable: PgQueryable<C>,
    options: AdapterOptions,
    shadow: Mutex<Option<ShadowDatabase>>,
}

impl<C> fmt::Debug for PgAdapter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgAdapter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: SqlClient> PgAdapter<C> {
    pub fn new(client: C, options: AdapterOptions) -> Self {
        Self {
            queryable: PgQueryable::new(client),
            options,
            shadow: Mutex::new(None),
        }
    }

    pub(crate) fn with_shadow(client: C, shadow: ShadowDatabase) -> Self {
        Self {
            queryable: PgQueryable::new(client),
            options: AdapterOptions::default(),
            shadow: Mutex::new(Some(shadow)),
        }
    }

    pub fn client(&self) -> &C {
        self.queryable.client()
    }

    async fn open_transaction(
        reserved: &C::Reserved,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<()> {
        reserved
            .execute("BEGIN", &[])
            .await
            .map_err(|err| Error::from_client("start_transaction", err))?;

        if let Some(level) = isolation_level {
            let statement = format!("SET TRANSACTION ISOLATION LEVEL {level}");
            reserved
                .execute(&statement, &[])
                .await
                .map_err(|err| Error::from_client("start_transaction", err))?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: SqlClient> Queryable for PgAdapter<C> {
    async fn query_raw(&self, query: &SqlQuery) -> Result<SqlResultSet> {
        self.queryable.query_raw(query).await
    }

    async fn execute_raw(&self, query: &SqlQuery) -> Result<u64> {
        self.queryable.execute_raw(query).await
    }
}

#[async_trait]
impl<C: SqlClient> SqlDriverAdapter for PgAdapter<C> {
    async fn start_transaction(
        &self,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<Box<dyn Transaction>> {
        let options = TransactionOptions {
            use_phantom_query: false,
        };
        debug!(?options, ?isolation_level, "[pgshim::start_transaction]");

        let reserved = self
            .client()
            .reserve()
            .await
            .map_err(|err| Error::from_client("start_transaction", err))?;

        if let Err(err) = Self::open_transaction(&reserved, isolation_level).await {
            if let Err(rollback) = reserved.execute("ROLLBACK", &[]).await {
                warn!(error = %rollback, "[pgshim::start_transaction] rollback failed");
            }
            reserved.release().await;
            return Err(err);
        }

        Ok(Box::new(PgTransaction::new(reserved, options)))
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        let statements = split_script(script);
        debug!(statements = statements.len(), "[pgshim::execute_script]");
        self.queryable.execute_each(&statements).await
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            schema_name: self.options.schema.clone(),
        }
    }

    async fn dispose(&self) -> Result<()> {
        debug!("[pgshim::dispose]");
        self.client().close().await;

        let shadow = self.shadow.lock().await.take();
        if let Some(shadow) = shadow {
            let database = shadow.database.clone();
            if let Err(err) = shadow.drop_database().await {
                warn!(%database, error = %err, "[pgshim::dispose] failed to drop shadow database");
                return Err(err);
            }
        }
        Ok(())
    }
}
