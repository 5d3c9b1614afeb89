//! Error normalization: backend-native errors to the portable taxonomy.
//!
//! The uniform zero-rows case is handled before any backend-specific
//! mapping runs; after that each backend gets its own mapping function
//! keyed on native error codes.

use crate::config::BackendKind;
use crate::Error;

/// Map a raw sqlx error into the portable taxonomy. Every store
/// operation routes its terminal error through here exactly once.
pub fn normalize(backend: BackendKind, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::RowNotFound => Error::NotFound,
        sqlx::Error::PoolTimedOut => {
            Error::Unknown("timed out waiting for a pooled connection".to_string())
        }
        sqlx::Error::Database(dbe) => {
            let code = dbe.code().map(|c| c.to_string());
            let message = dbe.message().to_string();
            tracing::debug!(db_type = %backend, code = ?code, %message, "database error");
            match backend {
                BackendKind::Postgres => postgres_error(code.as_deref(), message),
                BackendKind::Mysql => mysql_error(code.as_deref(), message),
                BackendKind::Sqlite => sqlite_error(code.as_deref(), message),
            }
        }
        other => Error::Unknown(other.to_string()),
    }
}

/// Postgres SQLSTATE mapping.
/// (https://www.postgresql.org/docs/current/errcodes-appendix.html)
fn postgres_error(code: Option<&str>, message: String) -> Error {
    match code {
        // unique_violation
        Some("23505") => Error::AlreadyExists(message),
        _ => Error::Unknown(message),
    }
}

/// MySQL SQLSTATE mapping; ER_DUP_ENTRY reports 23000.
fn mysql_error(code: Option<&str>, message: String) -> Error {
    match code {
        Some("23000") => Error::AlreadyExists(message),
        _ => Error::Unknown(message),
    }
}

/// SQLite extended result-code mapping.
fn sqlite_error(code: Option<&str>, message: String) -> Error {
    match code {
        // SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE
        Some("1555") | Some("2067") => Error::AlreadyExists(message),
        _ => Error::Unknown(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_is_uniform_across_backends() {
        for backend in [BackendKind::Postgres, BackendKind::Mysql, BackendKind::Sqlite] {
            assert!(normalize(backend, sqlx::Error::RowNotFound).is_not_found());
        }
    }

    #[test]
    fn test_postgres_unique_violation() {
        let err = postgres_error(Some("23505"), "duplicate key value".to_string());
        assert!(matches!(err, Error::AlreadyExists(_)));

        let err = postgres_error(Some("40001"), "serialization failure".to_string());
        assert!(matches!(err, Error::Unknown(_)));
    }

    #[test]
    fn test_mysql_duplicate_entry() {
        let err = mysql_error(Some("23000"), "Duplicate entry 'Alice'".to_string());
        assert!(matches!(err, Error::AlreadyExists(_)));

        let err = mysql_error(None, "server has gone away".to_string());
        assert!(matches!(err, Error::Unknown(_)));
    }

    #[test]
    fn test_sqlite_constraint_codes() {
        for code in ["1555", "2067"] {
            let err = sqlite_error(Some(code), "UNIQUE constraint failed".to_string());
            assert!(matches!(err, Error::AlreadyExists(_)), "code {code}");
        }

        let err = sqlite_error(Some("5"), "database is locked".to_string());
        assert!(matches!(err, Error::Unknown(_)));
    }
}
