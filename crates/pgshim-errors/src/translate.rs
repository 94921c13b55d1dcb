//! SQLSTATE dispatch.

use crate::extract::{extract_key_list, extract_last_quoted_token, extract_quoted_token};
use crate::raw::{BackendErrorSource, RawBackendError};
use crate::structured::{ForeignKeyConstraint, StructuredError};

type Extractor = fn(&RawBackendError) -> StructuredError;

struct Handler {
    code: &'static str,
    extract: Extractor,
}

static HANDLERS: [Handler; 12] = [
    Handler { code: "22001", extract: length_mismatch },
    Handler { code: "23505", extract: unique_violation },
    Handler { code: "23502", extract: null_violation },
    Handler { code: "23503", extract: foreign_key_violation },
    Handler { code: "3D000", extract: database_does_not_exist },
    Handler { code: "28000", extract: database_access_denied },
    Handler { code: "28P01", extract: authentication_failed },
    Handler { code: "40001", extract: write_conflict },
    Handler { code: "42P01", extract: table_does_not_exist },
    Handler { code: "42703", extract: column_not_found },
    Handler { code: "42P04", extract: database_already_exists },
    Handler { code: "53300", extract: too_many_connections },
];

/// Translate `error` into a structured error.
///
/// Values that do not carry a backend error are returned unchanged in `Err`.
pub fn translate<E: BackendErrorSource>(error: E) -> Result<StructuredError, E> {
    match error.backend_error() {
        Some(raw) => Ok(classify(&raw)),
        None => Err(error),
    }
}

/// Classify an already validated backend error.
pub fn classify(error: &RawBackendError) -> StructuredError {
    match error.code.as_deref().and_then(handler) {
        Some(handler) => (handler.extract)(error),
        None => generic(error),
    }
}

fn handler(code: &str) -> Option<&'static Handler> {
    HANDLERS.iter().find(|handler| handler.code == code)
}

fn key_list(error: &RawBackendError) -> Vec<String> {
    error
        .detail
        .as_deref()
        .map(extract_key_list)
        .unwrap_or_default()
}

fn length_mismatch(error: &RawBackendError) -> StructuredError {
    StructuredError::LengthMismatch {
        column: error.column.clone(),
    }
}

fn unique_violation(error: &RawBackendError) -> StructuredError {
    StructuredError::UniqueConstraintViolation {
        fields: key_list(error),
    }
}

fn null_violation(error: &RawBackendError) -> StructuredError {
    StructuredError::NullConstraintViolation {
        fields: key_list(error),
    }
}

fn foreign_key_violation(error: &RawBackendError) -> StructuredError {
    let constraint = if let Some(column) = &error.column {
        Some(ForeignKeyConstraint::Fields {
            fields: vec![column.clone()],
        })
    } else {
        error
            .constraint
            .as_ref()
            .map(|index| ForeignKeyConstraint::Index {
                index: index.clone(),
            })
    };

    StructuredError::ForeignKeyConstraintViolation { constraint }
}

fn database_does_not_exist(error: &RawBackendError) -> StructuredError {
    StructuredError::DatabaseDoesNotExist {
        db: extract_quoted_token(&error.message, 1),
    }
}

fn database_access_denied(error: &RawBackendError) -> StructuredError {
    StructuredError::DatabaseAccessDenied {
        db: extract_quoted_token(&error.message, 5),
    }
}

fn authentication_failed(error: &RawBackendError) -> StructuredError {
    StructuredError::AuthenticationFailed {
        user: extract_last_quoted_token(&error.message),
    }
}

fn write_conflict(_: &RawBackendError) -> StructuredError {
    StructuredError::TransactionWriteConflict
}

fn table_does_not_exist(error: &RawBackendError) -> StructuredError {
    StructuredError::TableDoesNotExist {
        table: extract_quoted_token(&error.message, 1),
    }
}

fn column_not_found(error: &RawBackendError) -> StructuredError {
    StructuredError::ColumnNotFound {
        column: extract_quoted_token(&error.message, 1),
    }
}

fn database_already_exists(error: &RawBackendError) -> StructuredError {
    StructuredError::DatabaseAlreadyExists {
        db: extract_quoted_token(&error.message, 1),
    }
}

fn too_many_connections(error: &RawBackendError) -> StructuredError {
    StructuredError::TooManyConnections {
        cause: error.message.clone(),
    }
}

fn generic(error: &RawBackendError) -> StructuredError {
    StructuredError::Postgres {
        code: error.code.clone().unwrap_or_else(|| "N/A".to_string()),
        severity: error.severity.clone(),
        message: error.message.clone(),
        detail: error.detail.clone(),
        column: error.column.clone(),
        hint: error.hint.clone(),
    }
}
