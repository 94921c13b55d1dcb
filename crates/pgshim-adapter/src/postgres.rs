//! sqlx-backed Postgres client.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, Postgres};
use sqlx::{Either, Executor};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{ClientConnector, ClientError, QueryOutput, ReservedClient, SqlClient, SqlExecutor};
use crate::config::ConnectionConfig;
use crate::decode::decode_row;
use crate::encode::bind_value;
use crate::value::DbValue;
use crate::{Error, Result};

/// Pooled Postgres client.
#[derive(Debug, Clone)]
pub struct PgClient {
    pool: PgPool,
}

impl PgClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SqlExecutor for PgClient {
    async fn execute(&self, sql: &str, args: &[DbValue]) -> std::result::Result<QueryOutput, ClientError> {
        if self.pool.is_closed() {
            return Err(ClientError::Closed);
        }
        run_query(&self.pool, sql, args).await
    }
}

#[async_trait]
impl SqlClient for PgClient {
    type Reserved = PgReserved;

    async fn reserve(&self) -> std::result::Result<PgReserved, ClientError> {
        let connection = self.pool.acquire().await?;
        Ok(PgReserved {
            connection: Mutex::new(Some(connection)),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connection reserved out of a [`PgClient`] pool.
///
/// Releasing rolls back whatever transaction is still open before the
/// connection goes back to the pool. A connection that cannot be rolled back,
/// or whose reservation is dropped without a release, never returns to the
/// pool.
#[derive(Debug)]
pub struct PgReserved {
    connection: Mutex<Option<PoolConnection<Postgres>>>,
}

#[async_trait]
impl SqlExecutor for PgReserved {
    async fn execute(&self, sql: &str, args: &[DbValue]) -> std::result::Result<QueryOutput, ClientError> {
        let mut connection = self.connection.lock().await;
        let connection = connection.as_mut().ok_or(ClientError::Released)?;
        run_query(&mut **connection, sql, args).await
    }
}

#[async_trait]
impl ReservedClient for PgReserved {
    async fn release(&self) {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return;
        };

        // Outside a transaction this is only a server-side warning.
        if let Err(err) = (&mut *connection).execute("ROLLBACK").await {
            warn!(error = %err, "[pgshim::release] rollback failed, closing connection");
            if let Err(err) = connection.close().await {
                debug!(error = %err, "[pgshim::release] close failed");
            }
        }
    }
}

impl Drop for PgReserved {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            drop(connection.detach());
        }
    }
}

/// Opens [`PgClient`] pools, retrying connection faults with exponential
/// backoff.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl ClientConnector for PgConnector {
    type Client = PgClient;

    async fn connect(&self, config: &ConnectionConfig) -> Result<PgClient> {
        config.validate()?;

        let mut options =
            PgConnectOptions::from_str(config.database_url.trim()).map_err(|source| {
                Error::Config {
                    details: format!("invalid database_url: {source}"),
                }
            })?;
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        let mut attempt: usize = 0;
        loop {
            let result = PgPoolOptions::new()
                .max_connections(u32::try_from(config.max_connections).unwrap_or(u32::MAX))
                .acquire_timeout(Duration::from_millis(config.timeout_ms))
                .connect_with(options.clone())
                .await;

            let err = match result.map_err(ClientError::from) {
                Ok(pool) => {
                    debug!(attempt, "[pgshim::connect] pool ready");
                    return Ok(PgClient::new(pool));
                }
                Err(err) => Error::from_client("connect", err),
            };

            if err.structured().is_some() {
                return Err(err);
            }
            if attempt >= config.retry_attempts {
                return Err(Error::Connection {
                    details: format!(
                        "Failed to connect after {} attempt(s): {err}",
                        attempt.saturating_add(1)
                    ),
                });
            }

            warn!(attempt, error = %err, "[pgshim::connect] retrying");
            tokio::time::sleep(backoff(attempt)).await;
            attempt += 1;
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(100 * (1_u64 << attempt.min(6)))
}

async fn run_query<'c, E>(
    executor: E,
    sql: &str,
    args: &[DbValue],
) -> std::result::Result<QueryOutput, ClientError>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = args.iter().fold(sqlx::query(sql), bind_value);

    let mut output = QueryOutput::default();
    #[allow(deprecated)]
    let mut stream = query.fetch_many(executor);
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => {
                let affected = output.rows_affected.unwrap_or(0) + done.rows_affected();
                output.rows_affected = Some(affected);
            }
            Either::Right(row) => output.rows.push(decode_row(&row)?),
        }
    }
    Ok(output)
}
