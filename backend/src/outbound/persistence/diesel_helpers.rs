//! Shared helpers for Diesel repository implementations.
//!
//! This module provides common utilities for database access including:
//! - Classification of Diesel errors into the failures adapters care about
//! - Generic pool/Diesel error mapping onto port error constructors
//! - A transaction error carrier for domain failures detected mid-transaction
//! - Counter and size casts between database and domain types

use diesel::dsl::sql;
use diesel::expression::SqlLiteral;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Integer;
use tracing::debug;

use super::pool::PoolError;

/// The subset of Diesel failures repositories map individually.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DieselFailure {
    /// No row matched a `first`/`get_result` call.
    NotFound,
    /// A unique constraint rejected the write.
    UniqueViolation { constraint: Option<String> },
    /// A foreign key constraint rejected the write.
    ForeignKeyViolation { constraint: Option<String> },
    /// A serializable transaction lost a race.
    SerializationFailure,
    /// The connection dropped mid-operation.
    ClosedConnection,
    /// Anything else.
    Other,
}

/// Classify a Diesel error and emit debug context.
pub(crate) fn classify(error: &DieselError) -> DieselFailure {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
            let constraint = info.constraint_name().map(str::to_owned);
            match kind {
                DatabaseErrorKind::UniqueViolation => DieselFailure::UniqueViolation { constraint },
                DatabaseErrorKind::ForeignKeyViolation => {
                    DieselFailure::ForeignKeyViolation { constraint }
                }
                DatabaseErrorKind::SerializationFailure => DieselFailure::SerializationFailure,
                DatabaseErrorKind::ClosedConnection => DieselFailure::ClosedConnection,
                _ => DieselFailure::Other,
            }
        }
        DieselError::NotFound => {
            debug!("diesel operation found no rows");
            DieselFailure::NotFound
        }
        _ => {
            debug!(
                error_type = %std::any::type_name_of_val(error),
                "diesel operation failed"
            );
            DieselFailure::Other
        }
    }
}

/// Map pool errors into a repository-specific connection error constructor.
pub(crate) fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Map the Diesel failures every repository treats alike.
///
/// `NotFound` and query-builder failures map to query errors, a dropped
/// connection maps to a connection error and a serialization failure maps to
/// the stale-state constructor.
pub(crate) fn map_basic_diesel_error<E, Q, C, S>(
    error: DieselError,
    query: Q,
    connection: C,
    stale: S,
) -> E
where
    Q: Fn(&'static str) -> E,
    C: Fn(&'static str) -> E,
    S: Fn(&'static str) -> E,
{
    match classify(&error) {
        DieselFailure::NotFound => query("record not found"),
        DieselFailure::ClosedConnection => connection("database connection error"),
        DieselFailure::SerializationFailure => stale("concurrent transaction committed first"),
        _ if matches!(error, DieselError::QueryBuilderError(_)) => query("database query error"),
        _ => query("database error"),
    }
}

/// Error carrier for transaction closures.
///
/// Diesel requires the closure error to absorb `diesel::result::Error`; domain
/// failures detected inside the transaction travel as [`TxError::Domain`] and
/// still roll the transaction back.
#[derive(Debug)]
pub(crate) enum TxError<E> {
    Diesel(DieselError),
    Domain(E),
}

impl<E> From<DieselError> for TxError<E> {
    fn from(error: DieselError) -> Self {
        Self::Diesel(error)
    }
}

impl<E> TxError<E> {
    /// Collapse into the port error, mapping Diesel failures with `map`.
    pub(crate) fn resolve(self, map: impl FnOnce(DieselError) -> E) -> E {
        match self {
            Self::Diesel(error) => map(error),
            Self::Domain(error) => error,
        }
    }
}

/// `GREATEST(column + delta, 0)` for a cached counter column.
///
/// `column` is always a static column name and `delta` an integer, so the
/// fragment is safe to splice.
pub(crate) fn shift_counter(column: &'static str, delta: i32) -> SqlLiteral<Integer> {
    sql::<Integer>(&format!("GREATEST({column} + ({delta}), 0)"))
}

/// Cast a stored counter to the domain representation.
///
/// Check constraints keep counters non-negative; a negative value read back
/// is reported as zero.
pub(crate) fn counter(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Cast a stored byte size to the domain representation.
pub(crate) fn size_from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Cast a domain byte size for storage.
pub(crate) fn size_for_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Collect row conversion results, mapping the first error through `map_err`.
pub(crate) fn collect_rows<T, E>(
    results: impl Iterator<Item = Result<T, String>>,
    map_err: impl FnOnce(String) -> E,
) -> Result<Vec<T>, E> {
    results.collect::<Result<Vec<_>, _>>().map_err(map_err)
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[derive(Debug, PartialEq, Eq)]
    enum Mapped {
        Query(&'static str),
        Connection(&'static str),
        Stale(&'static str),
    }

    fn map(error: DieselError) -> Mapped {
        map_basic_diesel_error(error, Mapped::Query, Mapped::Connection, Mapped::Stale)
    }

    fn database_error(kind: DatabaseErrorKind) -> DieselError {
        DieselError::DatabaseError(kind, Box::new("boom".to_owned()))
    }

    #[rstest]
    fn not_found_maps_to_query() {
        assert_eq!(map(DieselError::NotFound), Mapped::Query("record not found"));
    }

    #[rstest]
    fn closed_connection_maps_to_connection() {
        assert!(matches!(
            map(database_error(DatabaseErrorKind::ClosedConnection)),
            Mapped::Connection(_)
        ));
    }

    #[rstest]
    fn serialization_failure_maps_to_stale_state() {
        assert!(matches!(
            map(database_error(DatabaseErrorKind::SerializationFailure)),
            Mapped::Stale(_)
        ));
    }

    #[rstest]
    #[case(DatabaseErrorKind::UniqueViolation)]
    #[case(DatabaseErrorKind::ForeignKeyViolation)]
    fn constraint_violations_are_classified(#[case] kind: DatabaseErrorKind) {
        let failure = classify(&database_error(kind));
        assert!(matches!(
            failure,
            DieselFailure::UniqueViolation { .. } | DieselFailure::ForeignKeyViolation { .. }
        ));
    }

    #[rstest]
    fn pool_errors_use_the_connection_constructor() {
        let mapped = map_basic_pool_error(PoolError::checkout("refused"), |m| m);
        assert_eq!(mapped, "refused");
    }

    #[rstest]
    fn domain_errors_survive_transaction_resolution() {
        let tx: TxError<&str> = TxError::Domain("missing post");
        assert_eq!(tx.resolve(|_| "diesel"), "missing post");

        let tx: TxError<&str> = DieselError::NotFound.into();
        assert_eq!(tx.resolve(|_| "diesel"), "diesel");
    }

    #[rstest]
    fn counter_shift_floors_at_zero() {
        let fragment = diesel::debug_query::<diesel::pg::Pg, _>(&shift_counter("likes_count", -1))
            .to_string();
        assert!(fragment.starts_with("GREATEST(likes_count + (-1), 0)"));
    }

    #[rstest]
    #[case(-3, 0)]
    #[case(0, 0)]
    #[case(7, 7)]
    fn negative_counters_read_as_zero(#[case] raw: i32, #[case] expected: u32) {
        assert_eq!(counter(raw), expected);
    }
}
