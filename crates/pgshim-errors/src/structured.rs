//! Structured error kinds surfaced to the ORM layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Constraint reported for a foreign key violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForeignKeyConstraint {
    Fields { fields: Vec<String> },
    Index { index: String },
}

impl fmt::Display for ForeignKeyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fields { fields } => write!(f, "fields: ({})", fields.join(", ")),
            Self::Index { index } => write!(f, "index: {index}"),
        }
    }
}

/// Translated backend error, tagged by `kind` when serialized.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StructuredError {
    #[error(
        "The provided value for the column is too long for the column's type. Column: {}",
        or_unknown(.column)
    )]
    LengthMismatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<String>,
    },

    #[error("Unique constraint failed on the fields: ({})", .fields.join(", "))]
    UniqueConstraintViolation { fields: Vec<String> },

    #[error("Null constraint violation on the fields: ({})", .fields.join(", "))]
    NullConstraintViolation { fields: Vec<String> },

    #[error(
        "Foreign key constraint violated{}",
        .constraint.as_ref().map(|c| format!(" on {c}")).unwrap_or_default()
    )]
    ForeignKeyConstraintViolation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        constraint: Option<ForeignKeyConstraint>,
    },

    #[error("Database `{}` does not exist", or_unknown(.db))]
    DatabaseDoesNotExist {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        db: Option<String>,
    },

    #[error("User was denied access on the database `{}`", or_unknown(.db))]
    DatabaseAccessDenied {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        db: Option<String>,
    },

    #[error("Authentication failed for user `{}`", or_unknown(.user))]
    AuthenticationFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },

    #[error("Transaction failed due to a write conflict or a deadlock")]
    TransactionWriteConflict,

    #[error("The table `{}` does not exist in the current database", or_unknown(.table))]
    TableDoesNotExist {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
    },

    #[error("The column `{}` does not exist in the current database", or_unknown(.column))]
    ColumnNotFound {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<String>,
    },

    #[error("Database `{}` already exists", or_unknown(.db))]
    DatabaseAlreadyExists {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        db: Option<String>,
    },

    #[error("Too many database connections opened: {cause}")]
    TooManyConnections { cause: String },

    #[error("Error in Postgres connection ({code}, {severity}): {message}")]
    Postgres {
        code: String,
        severity: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
}

impl StructuredError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            Self::UniqueConstraintViolation { .. } => ErrorKind::UniqueConstraintViolation,
            Self::NullConstraintViolation { .. } => ErrorKind::NullConstraintViolation,
            Self::ForeignKeyConstraintViolation { .. } => {
                ErrorKind::ForeignKeyConstraintViolation
            }
            Self::DatabaseDoesNotExist { .. } => ErrorKind::DatabaseDoesNotExist,
            Self::DatabaseAccessDenied { .. } => ErrorKind::DatabaseAccessDenied,
            Self::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Self::TransactionWriteConflict => ErrorKind::TransactionWriteConflict,
            Self::TableDoesNotExist { .. } => ErrorKind::TableDoesNotExist,
            Self::ColumnNotFound { .. } => ErrorKind::ColumnNotFound,
            Self::DatabaseAlreadyExists { .. } => ErrorKind::DatabaseAlreadyExists,
            Self::TooManyConnections { .. } => ErrorKind::TooManyConnections,
            Self::Postgres { .. } => ErrorKind::Postgres,
        }
    }
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not available)")
}

/// Closed set of `kind` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    LengthMismatch,
    UniqueConstraintViolation,
    NullConstraintViolation,
    ForeignKeyConstraintViolation,
    DatabaseDoesNotExist,
    DatabaseAccessDenied,
    AuthenticationFailed,
    TransactionWriteConflict,
    TableDoesNotExist,
    ColumnNotFound,
    DatabaseAlreadyExists,
    TooManyConnections,
    Postgres,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 13] = [
        Self::LengthMismatch,
        Self::UniqueConstraintViolation,
        Self::NullConstraintViolation,
        Self::ForeignKeyConstraintViolation,
        Self::DatabaseDoesNotExist,
        Self::DatabaseAccessDenied,
        Self::AuthenticationFailed,
        Self::TransactionWriteConflict,
        Self::TableDoesNotExist,
        Self::ColumnNotFound,
        Self::DatabaseAlreadyExists,
        Self::TooManyConnections,
        Self::Postgres,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LengthMismatch => "LengthMismatch",
            Self::UniqueConstraintViolation => "UniqueConstraintViolation",
            Self::NullConstraintViolation => "NullConstraintViolation",
            Self::ForeignKeyConstraintViolation => "ForeignKeyConstraintViolation",
            Self::DatabaseDoesNotExist => "DatabaseDoesNotExist",
            Self::DatabaseAccessDenied => "DatabaseAccessDenied",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::TransactionWriteConflict => "TransactionWriteConflict",
            Self::TableDoesNotExist => "TableDoesNotExist",
            Self::ColumnNotFound => "ColumnNotFound",
            Self::DatabaseAlreadyExists => "DatabaseAlreadyExists",
            Self::TooManyConnections => "TooManyConnections",
            Self::Postgres => "Postgres",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
