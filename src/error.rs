//! Typed error surface of the storage layer.
//!
//! Callers branch on the variant: validation failures are actionable
//! before any I/O, quota exhaustion is recoverable (sweep, then retry
//! once), duplicate keys indicate a logic error, and everything else is
//! surfaced with operation context. Error messages never carry record
//! payloads or the API key.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A proposed value violates a closed-set or shape rule. Raised
    /// before any I/O; the offending value is included for diagnostics
    /// and is never an API key.
    #[error("invalid value for {field}: {value:?}")]
    Validation { field: &'static str, value: String },

    /// The storage engine reported the database is full (SQLITE_FULL).
    /// Recoverable: the caller may run a retention sweep and retry once.
    #[error("storage quota exceeded while writing to {partition}")]
    QuotaExceeded { partition: &'static str },

    /// The primary key already exists. Not retried: records receive
    /// freshly generated UUIDs, so a collision is a logic error.
    #[error("duplicate key {id} in {partition}")]
    DuplicateKey { partition: &'static str, id: String },

    /// Any other low-level storage failure, with enough context to log
    /// meaningfully.
    #[error("storage failure in {op} on {partition}")]
    Storage {
        partition: &'static str,
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Map an engine error from a write into the public taxonomy.
    ///
    /// SQLite signals a full database with primary result code 13 and
    /// unique-constraint violations via the `UniqueViolation` kind.
    pub(crate) fn from_write(
        partition: &'static str,
        op: &'static str,
        id: &str,
        source: sqlx::Error,
    ) -> StoreError {
        if let sqlx::Error::Database(db_err) = &source {
            if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                return StoreError::DuplicateKey {
                    partition,
                    id: id.to_string(),
                };
            }
            if is_full(db_err.as_ref()) {
                return StoreError::QuotaExceeded { partition };
            }
        }
        StoreError::Storage {
            partition,
            op,
            source,
        }
    }

    pub(crate) fn storage(
        partition: &'static str,
        op: &'static str,
        source: sqlx::Error,
    ) -> StoreError {
        StoreError::Storage {
            partition,
            op,
            source,
        }
    }
}

fn is_full(err: &dyn sqlx::error::DatabaseError) -> bool {
    // Primary code 13 = SQLITE_FULL. The message check covers drivers
    // that only expose the extended code.
    err.code().as_deref() == Some("13") || err.message().contains("database or disk is full")
}
