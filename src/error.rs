//! Catalog error types.

use rusqlite::ffi;
use thiserror::Error;

/// Errors raised by the catalog and its storage layer.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A unique column already holds this value (ISBN, category slug, username).
    #[error("{entity} with this {field} already exists")]
    UniqueViolation {
        entity: &'static str,
        field: &'static str,
    },

    /// Delete blocked because dependent rows still reference the record.
    #[error("cannot delete {entity} {id}: referenced by {dependents} record(s)")]
    RestrictedDelete {
        entity: &'static str,
        id: String,
        dependents: i64,
    },

    /// A foreign key points at a row that does not exist.
    #[error("{entity}.{field} references a missing record")]
    MissingReference {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Field value rejected before it reached the database.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("unknown status code: {0:?}")]
    InvalidStatus(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Which constraint class a failed statement tripped, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
    Unique,
    ForeignKey,
    NotNull,
    Check,
}

pub(crate) fn constraint_kind(err: &rusqlite::Error) -> Option<Constraint> {
    match err {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            match inner.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(Constraint::Unique)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Constraint::ForeignKey),
                ffi::SQLITE_CONSTRAINT_NOTNULL => Some(Constraint::NotNull),
                ffi::SQLITE_CONSTRAINT_CHECK => Some(Constraint::Check),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Maps a failed write to a typed error: unique failures become
/// `UniqueViolation` on `unique_field`, foreign key failures become
/// `MissingReference` on `reference_field`.
pub(crate) fn map_write_error(
    err: rusqlite::Error,
    entity: &'static str,
    unique_field: &'static str,
    reference_field: &'static str,
) -> CatalogError {
    match constraint_kind(&err) {
        Some(Constraint::Unique) => CatalogError::UniqueViolation {
            entity,
            field: unique_field,
        },
        Some(Constraint::ForeignKey) => CatalogError::MissingReference {
            entity,
            field: reference_field,
        },
        _ => CatalogError::Sqlite(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn classifies_unique_failures() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err();
        assert_eq!(constraint_kind(&err), Some(Constraint::Unique));

        let mapped = map_write_error(err, "book", "isbn", "author");
        assert!(matches!(
            mapped,
            CatalogError::UniqueViolation { entity: "book", field: "isbn" }
        ));
    }

    #[test]
    fn non_constraint_errors_pass_through() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT * FROM missing", []).unwrap_err();
        assert_eq!(constraint_kind(&err), None);
        assert!(matches!(
            map_write_error(err, "book", "isbn", "author"),
            CatalogError::Sqlite(_)
        ));
    }
}
