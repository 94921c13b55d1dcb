//! Raw backend errors as reported by the SQL client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error fields reported by the Postgres backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBackendError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl RawBackendError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            severity: severity.into(),
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

/// Anything that may carry a raw backend error.
///
/// Returning `None` marks the value as an unrelated fault (network failure,
/// programming error, ...) that must be propagated as-is.
pub trait BackendErrorSource {
    fn backend_error(&self) -> Option<RawBackendError>;
}

impl BackendErrorSource for RawBackendError {
    fn backend_error(&self) -> Option<RawBackendError> {
        self.code.as_ref()?;
        Some(self.clone())
    }
}

impl<T: BackendErrorSource + ?Sized> BackendErrorSource for &T {
    fn backend_error(&self) -> Option<RawBackendError> {
        (**self).backend_error()
    }
}

impl BackendErrorSource for Value {
    fn backend_error(&self) -> Option<RawBackendError> {
        if !is_backend_error(self) {
            return None;
        }

        let text = |field: &str| self.get(field).and_then(Value::as_str).map(str::to_owned);
        Some(RawBackendError {
            code: text("code"),
            message: text("message")?,
            severity: text("severity")?,
            detail: text("detail"),
            column: text("column"),
            hint: text("hint"),
            constraint: text("constraint"),
        })
    }
}

/// Structural check for a dynamically shaped error object.
///
/// `code`, `message` and `severity` must be strings; `detail`, `column` and
/// `hint` must be strings or absent.
pub fn is_backend_error(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    let is_string = |field: &str| object.get(field).is_some_and(Value::is_string);
    let is_optional_string =
        |field: &str| object.get(field).is_none_or(Value::is_string);

    is_string("code")
        && is_string("message")
        && is_string("severity")
        && is_optional_string("detail")
        && is_optional_string("column")
        && is_optional_string("hint")
}
