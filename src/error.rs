/// Error types for the membership data layer
///
/// Every reconciliation operation returns `Result<T, MembershipError>`. The
/// single error kind wraps the underlying storage fault together with a fixed
/// operation label so that logs and callers can tell which logical step
/// family failed without parsing SQL errors.
///
/// Model-level CRUD (see `models`) stays on plain `sqlx::Error`, mirroring
/// how the rest of the data layer is written; the labeled error is reserved
/// for the multi-step reconciliation operations.

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type MembershipResult<T> = Result<T, MembershipError>;

/// Errors produced by the membership reconciliation engine
#[derive(Debug, Error)]
pub enum MembershipError {
    /// A read or write against the membership store failed.
    ///
    /// `operation` names the reconciliation operation that was in flight.
    /// No partial recovery is attempted: any failure aborts the whole
    /// operation. Idempotent reads may be retried by the caller; the delete
    /// operation must not be blindly retried without re-running it as a whole
    /// (the reported snapshot would otherwise be stale).
    #[error("{operation} failed: {source}")]
    StorageOperationFailed {
        /// Which reconciliation operation failed
        operation: &'static str,

        /// The underlying storage error
        #[source]
        source: sqlx::Error,
    },
}

impl MembershipError {
    /// Builds a `map_err`-friendly constructor bound to an operation label
    pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> MembershipError {
        move |source| MembershipError::StorageOperationFailed { operation, source }
    }

    /// Returns the label of the operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            MembershipError::StorageOperationFailed { operation, .. } => operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display_includes_label() {
        let err = MembershipError::storage("filter_projects_by_user_membership")(
            sqlx::Error::PoolClosed,
        );
        let rendered = err.to_string();
        assert!(rendered.starts_with("filter_projects_by_user_membership failed:"));
    }

    #[test]
    fn test_error_exposes_operation_and_source() {
        let err = MembershipError::storage("delete_pending_memberships_by_user_ids")(
            sqlx::Error::PoolTimedOut,
        );
        assert_eq!(err.operation(), "delete_pending_memberships_by_user_ids");
        assert!(err.source().is_some());
    }
}
