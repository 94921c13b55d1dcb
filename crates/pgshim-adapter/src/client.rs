//! SQL client capability consumed by the adapter.
//!
//! The adapter never pools, binds or executes on its own; it forwards to an
//! implementation of these traits.

use async_trait::async_trait;
use pgshim_errors::{BackendErrorSource, RawBackendError};
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

use crate::config::ConnectionConfig;
use crate::value::{DbValue, Row};

/// Rows returned by a statement plus the backend's affected-row count, when
/// the client reports one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub rows_affected: Option<u64>,
}

impl QueryOutput {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            rows_affected: None,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected: Some(rows_affected),
        }
    }
}

/// Failures raised by a SQL client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Database error: {}", .0.message)]
    Database(RawBackendError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Client is closed")]
    Closed,

    #[error("Reserved connection was already released")]
    Released,
}

impl BackendErrorSource for ClientError {
    fn backend_error(&self) -> Option<RawBackendError> {
        match self {
            ClientError::Database(raw) => raw.backend_error(),
            ClientError::Sqlx(sqlx::Error::Database(database)) => database
                .try_downcast_ref::<PgDatabaseError>()
                .map(raw_from_postgres),
            _ => None,
        }
    }
}

fn raw_from_postgres(error: &PgDatabaseError) -> RawBackendError {
    RawBackendError {
        code: Some(error.code().to_string()),
        message: error.message().to_string(),
        severity: format!("{:?}", error.severity()).to_uppercase(),
        detail: error.detail().map(str::to_owned),
        column: error.column().map(str::to_owned),
        hint: error.hint().map(str::to_owned),
        constraint: error.constraint().map(str::to_owned),
    }
}

/// Statement execution with positional arguments.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str, args: &[DbValue]) -> Result<QueryOutput, ClientError>;
}

/// Shared client: executes statements, reserves exclusive connections.
#[async_trait]
pub trait SqlClient: SqlExecutor {
    type Reserved: ReservedClient + 'static;

    async fn reserve(&self) -> Result<Self::Reserved, ClientError>;

    /// Tear down the client. Calling it twice is harmless.
    async fn close(&self);
}

/// Exclusive connection taken out of a [`SqlClient`].
#[async_trait]
pub trait ReservedClient: SqlExecutor {
    /// Hand the connection back. Calling it twice is harmless.
    async fn release(&self);
}

/// Builds clients from configuration.
#[async_trait]
pub trait ClientConnector: Send + Sync {
    type Client: SqlClient + 'static;

    async fn connect(&self, config: &ConnectionConfig) -> crate::Result<Self::Client>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_variant_is_a_backend_error() {
        let error = ClientError::Database(RawBackendError::new("23505", "dup", "ERROR"));
        assert_eq!(
            error.backend_error().and_then(|raw| raw.code),
            Some("23505".to_string())
        );
    }

    #[test]
    fn test_faults_are_not_backend_errors() {
        let error = ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "connect timed out",
        ));
        assert!(error.backend_error().is_none());
        assert!(ClientError::Closed.backend_error().is_none());
        assert!(ClientError::Sqlx(sqlx::Error::PoolTimedOut).backend_error().is_none());
    }
}
