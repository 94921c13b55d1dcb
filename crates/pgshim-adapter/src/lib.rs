//! # pgshim-adapter
//!
//! Postgres driver adapter for an ORM query engine.
//!
//! This crate exposes the engine's `Queryable` / `Transaction` /
//! `DriverAdapterFactory` contract on top of a SQL client capability
//! ([`SqlClient`]). Every backend failure is translated into a
//! [`StructuredError`] before it reaches the engine.

pub mod adapter;
pub mod client;
pub mod config;
mod decode;
mod encode;
pub mod factory;
#[cfg(feature = "memory")]
pub mod memory;
pub mod postgres;
pub mod queryable;
pub mod script;
mod sql;
pub mod transaction;
pub mod value;

pub use adapter::{ConnectionInfo, PgAdapter, SqlDriverAdapter};
pub use client::{ClientConnector, ClientError, QueryOutput, ReservedClient, SqlClient, SqlExecutor};
pub use config::{AdapterOptions, ConnectionConfig};
pub use factory::{DriverAdapterFactory, PgAdapterFactory};
#[cfg(feature = "memory")]
pub use memory::{ExecutedStatement, MemoryClient, MemoryConnector};
pub use postgres::{PgClient, PgConnector, PgReserved};
pub use queryable::{ADAPTER_NAME, PROVIDER, PgQueryable, Queryable, SqlQuery, SqlResultSet};
pub use script::split_script;
pub use transaction::{IsolationLevel, PgTransaction, Transaction, TransactionOptions};
pub use value::{ColumnType, DbValue, Row, guess_column_types};

pub use pgshim_errors::{ErrorKind, StructuredError};

use thiserror::Error;

/// Errors surfaced by adapter operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("Connection error: {details}")]
    Connection { details: String },

    /// Backend error translated into the engine's taxonomy.
    #[error(transparent)]
    Driver(#[from] StructuredError),

    /// Client fault that is not a backend error, passed through untranslated.
    #[error("Client error during {context}: {source}")]
    Client {
        context: String,
        #[source]
        source: ClientError,
    },

    #[error("Transaction already closed: {details}")]
    TransactionClosed { details: String },
}

impl Error {
    /// Route a client failure through the error translator.
    pub(crate) fn from_client(context: &str, error: ClientError) -> Self {
        match pgshim_errors::translate(error) {
            Ok(structured) => Error::Driver(structured),
            Err(source) => Error::Client {
                context: context.to_string(),
                source,
            },
        }
    }

    /// Structured error, when the failure came from the backend.
    pub fn structured(&self) -> Option<&StructuredError> {
        match self {
            Error::Driver(structured) => Some(structured),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.structured().map(StructuredError::kind)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
