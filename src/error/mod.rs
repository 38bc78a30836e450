use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use std::io::Error as IoError;
use ts_rs::TS;

mod crash_id;

pub use crash_id::CrashId;

pub const STORE_UNAVAILABLE: &str = "STORE/UNAVAILABLE";
pub const STORE_PERSIST: &str = "STORE/PERSIST";
pub const STORE_DECODE: &str = "STORE/DECODE";
pub const SINK_LOG_FAILED: &str = "SINK/LOG_FAILED";
pub const SINK_NOTIFY_FAILED: &str = "SINK/NOTIFY_FAILED";
pub const VALIDATION_FIELD_REQUIRED: &str = "VALIDATION/FIELD_REQUIRED";
pub const VALIDATION_MUTATION_IN_FLIGHT: &str = "VALIDATION/MUTATION_IN_FLIGHT";
pub const RUNTIME_PANIC: &str = "RUNTIME/PANIC";

/// Coarse classification of an [`AppError`] code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A read against the store failed.
    StoreUnavailable,
    /// A write against the store failed.
    Persist,
    /// A local precondition failed; the store was never contacted.
    Validation,
    /// Audit or notification side effect failed after a successful write.
    LogSink,
    Other,
}

/// A structured application error that can be serialized and surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../target/bindings/")]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    /// Human friendly message that can be shown directly to the user.
    pub message: String,
    /// Arbitrary key/value pairs that provide additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(type = "Record<string, string>")]
    pub context: HashMap<String, String>,
    /// Optional nested cause that preserves the error chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
    /// Correlation id attached when the error originated from a caught panic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub crash_id: Option<CrashId>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Construct a new application error with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
            crash_id: None,
        }
    }

    pub fn store_unavailable(operation: &'static str, cause: impl Into<AppError>) -> Self {
        AppError::new(STORE_UNAVAILABLE, "Client data could not be loaded.")
            .with_context("operation", operation)
            .with_cause(cause)
    }

    pub fn persist(operation: &'static str, cause: impl Into<AppError>) -> Self {
        AppError::new(STORE_PERSIST, "The change could not be saved.")
            .with_context("operation", operation)
            .with_cause(cause)
    }

    pub fn field_required(field: &'static str) -> Self {
        AppError::new(VALIDATION_FIELD_REQUIRED, format!("{field} is required."))
            .with_context("field", field)
    }

    /// Returns the error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the contextual metadata associated with the error.
    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    /// Returns the nested cause if one is present.
    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn crash_id(&self) -> Option<&CrashId> {
        self.crash_id.as_ref()
    }

    pub fn set_crash_id(&mut self, crash_id: CrashId) {
        self.crash_id = Some(crash_id);
    }

    pub fn kind(&self) -> ErrorKind {
        let code = self.code();
        if code == STORE_UNAVAILABLE {
            ErrorKind::StoreUnavailable
        } else if code == STORE_PERSIST {
            ErrorKind::Persist
        } else if code.starts_with("VALIDATION/") {
            ErrorKind::Validation
        } else if code.starts_with("SINK/") {
            ErrorKind::LogSink
        } else {
            ErrorKind::Other
        }
    }

    /// Adds a contextual key/value pair to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets the nested cause for the error.
    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({:?})", self.code, self.message, self.context)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let code = format!("IO/{:?}", error.kind());
        let mut app_error = AppError::new(code, error.to_string());
        if let Some(os_code) = error.raw_os_error() {
            app_error = app_error.with_context("os_code", os_code.to_string());
        }
        app_error
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
            SqlxError::ColumnNotFound(name) => {
                AppError::new("SQLX/COLUMN_NOT_FOUND", format!("Column not found: {name}"))
            }
            SqlxError::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            SqlxError::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
            SqlxError::Io(err) => AppError::from(err).with_context("source", "sqlx"),
            SqlxError::Database(db) => {
                let code = db
                    .code()
                    .map(|code| format!("Sqlite/{code}"))
                    .unwrap_or_else(|| "SQLX/DATABASE".to_string());
                let mut app_error = AppError::new(code, db.message().to_string());
                if let Some(constraint) = db.constraint() {
                    app_error = app_error.with_context("constraint", constraint.to_string());
                }
                app_error
            }
            SqlxError::ColumnDecode { index, source } => {
                AppError::new("SQLX/COLUMN_DECODE", source.to_string())
                    .with_context("column_index", index.to_string())
            }
            SqlxError::Decode(decode_err) => AppError::new("SQLX/DECODE", decode_err.to_string()),
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}
