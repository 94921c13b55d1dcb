//! # pgshim-errors
//!
//! Translation of Postgres backend errors into structured driver adapter errors.
//!
//! Every failure caught by the adapter passes through [`translate`]. Values that
//! carry a recognizable backend error (code, message and severity) are classified
//! by their SQLSTATE code into a [`StructuredError`]. Anything else is handed back
//! untouched so the caller can surface the original fault.

pub mod extract;
pub mod raw;
pub mod structured;
pub mod translate;

pub use extract::{extract_key_list, extract_last_quoted_token, extract_quoted_token};
pub use raw::{BackendErrorSource, RawBackendError, is_backend_error};
pub use structured::{ErrorKind, ForeignKeyConstraint, StructuredError};
pub use translate::{classify, translate};
