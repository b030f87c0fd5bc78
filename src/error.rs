use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Every failure an engine operation can report. Each variant maps to one
/// stable IPC error code via [`EngineError::code`].
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid class name: {0}")]
    InvalidName(String),

    #[error("class already exists: {0}")]
    DuplicateClass(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("no usable student rows after cleaning")]
    EmptyImport,

    #[error("unsupported import format: {0}")]
    UnsupportedFormat(String),

    #[error("roster is empty or missing for class {0}")]
    NoRoster(String),

    #[error("no roll-call session is running")]
    NoSession,

    #[error("roll-call session is already complete")]
    SessionComplete,

    #[error("no statistics row for student {0}")]
    StatNotFound(String),

    #[error("failed to record decision for student {student_id}: {source}")]
    RecordWrite {
        student_id: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("file is locked or not writable: {}", path.display())]
    Permission { path: PathBuf, message: String },

    #[error("storage error: {0}")]
    Storage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidName(_) => "bad_params",
            EngineError::DuplicateClass(_) => "duplicate_class",
            EngineError::ClassNotFound(_) => "class_not_found",
            EngineError::Schema { .. } => "schema_error",
            EngineError::EmptyImport => "empty_import",
            EngineError::UnsupportedFormat(_) => "unsupported_format",
            EngineError::NoRoster(_) => "no_roster",
            EngineError::NoSession => "no_session",
            EngineError::SessionComplete => "session_complete",
            EngineError::StatNotFound(_) => "stat_not_found",
            EngineError::RecordWrite { .. } => "record_write_failed",
            EngineError::Permission { .. } => "permission_denied",
            EngineError::Storage(_) => "storage_error",
        }
    }

    /// Classify a filesystem error raised while touching `path`.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            EngineError::Permission {
                path,
                message: err.to_string(),
            }
        } else {
            EngineError::Storage(format!("{}: {}", path.display(), err))
        }
    }

    /// Classify a SQLite error raised while working on the table at `path`.
    /// Locked, busy and read-only databases are reported as permission
    /// failures so the UI can tell the operator to close the other program.
    pub fn sql(path: impl Into<PathBuf>, err: rusqlite::Error) -> Self {
        let path = path.into();
        match err.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::ReadOnly
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::PermissionDenied,
            ) => EngineError::Permission {
                path,
                message: err.to_string(),
            },
            _ => EngineError::Storage(format!("{}: {}", path.display(), err)),
        }
    }

    /// Structured details for the IPC error payload, when the variant has any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EngineError::Schema { missing } => Some(serde_json::json!({ "missing": missing })),
            EngineError::Permission { path, message } => Some(serde_json::json!({
                "path": path.to_string_lossy(),
                "reason": message,
            })),
            EngineError::RecordWrite { student_id, source } => Some(serde_json::json!({
                "studentId": student_id,
                "cause": source.code(),
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_io_maps_to_permission() {
        let err = EngineError::io(
            "data/x.sqlite3",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.code(), "permission_denied");

        let err = EngineError::io(
            "data/x.sqlite3",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "storage_error");
    }

    #[test]
    fn locked_or_busy_sqlite_maps_to_permission() {
        for code in [
            rusqlite::ffi::SQLITE_BUSY,
            rusqlite::ffi::SQLITE_LOCKED,
            rusqlite::ffi::SQLITE_READONLY,
            rusqlite::ffi::SQLITE_CANTOPEN,
        ] {
            let err = EngineError::sql(
                "data/x_stats.sqlite3",
                rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None),
            );
            assert_eq!(err.code(), "permission_denied", "sqlite code {}", code);
            assert_eq!(
                err.details().and_then(|d| d.get("path").cloned()),
                Some(serde_json::json!("data/x_stats.sqlite3"))
            );
        }

        let err = EngineError::sql(
            "data/x_stats.sqlite3",
            rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_NOTADB), None),
        );
        assert_eq!(err.code(), "storage_error");
    }

    #[test]
    fn schema_error_lists_missing_columns() {
        let err = EngineError::Schema {
            missing: vec!["姓名".to_string()],
        };
        assert_eq!(err.to_string(), "missing required columns: 姓名");
        assert_eq!(
            err.details().and_then(|d| d.pointer("/missing/0").cloned()),
            Some(serde_json::json!("姓名"))
        );
    }
}
