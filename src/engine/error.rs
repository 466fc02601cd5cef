use ulid::Ulid;

use crate::model::Day;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Candidate stay has `end <= start`.
    InvalidInterval { start: Day, end: Day },
    Unauthenticated,
    /// Candidate overlaps the given existing reservation.
    DateConflict(Ulid),
    PersistenceFailure(String),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    EmailTaken(String),
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    LimitExceeded(&'static str),
}

impl EngineError {
    /// Only storage failures are worth retrying; every other rejection
    /// fails the same way for the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::PersistenceFailure(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInterval { .. } => "invalid_interval",
            EngineError::Unauthenticated => "unauthenticated",
            EngineError::DateConflict(_) => "date_conflict",
            EngineError::PersistenceFailure(_) => "persistence_failure",
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::EmailTaken(_) => "email_taken",
            EngineError::InvalidField { .. } => "invalid_field",
            EngineError::LimitExceeded(_) => "limit_exceeded",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: check-out {end} is not after check-in {start}")
            }
            EngineError::Unauthenticated => write!(f, "not signed in"),
            EngineError::DateConflict(id) => write!(f, "dates conflict with reservation: {id}"),
            EngineError::PersistenceFailure(e) => write!(f, "persistence failure: {e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::EmailTaken(email) => write!(f, "email already registered: {email}"),
            EngineError::InvalidField { field, reason } => write!(f, "invalid {field}: {reason}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Failure reported by a reservation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The store refused the write because it overlaps this reservation.
    Conflict(Ulid),
    /// Listing or user referenced by the write does not exist.
    NotFound(Ulid),
    Io(String),
    /// The store turned the write down for a reason retrying won't fix.
    Rejected(EngineError),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Conflict(id) => write!(f, "overlaps reservation {id}"),
            StorageError::NotFound(id) => write!(f, "not found: {id}"),
            StorageError::Io(e) => write!(f, "storage I/O: {e}"),
            StorageError::Rejected(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(id) => EngineError::DateConflict(id),
            StorageError::NotFound(id) => EngineError::NotFound(id),
            StorageError::Io(msg) => EngineError::PersistenceFailure(msg),
            StorageError::Rejected(e) => e,
        }
    }
}

impl From<EngineError> for StorageError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::DateConflict(id) => StorageError::Conflict(id),
            EngineError::NotFound(id) => StorageError::NotFound(id),
            EngineError::PersistenceFailure(msg) => StorageError::Io(msg),
            other => StorageError::Rejected(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_rejections() {
        let id = Ulid::new();
        assert!(matches!(
            EngineError::from(StorageError::Conflict(id)),
            EngineError::DateConflict(got) if got == id
        ));
        assert!(matches!(
            EngineError::from(StorageError::NotFound(id)),
            EngineError::NotFound(got) if got == id
        ));
        let e = EngineError::from(StorageError::Io("disk full".into()));
        assert!(e.is_retryable());
        assert_eq!(e.to_string(), "persistence failure: disk full");
    }

    #[test]
    fn engine_rejections_survive_the_store_boundary() {
        let listing = Ulid::new();
        let rejections = [
            EngineError::LimitExceeded("too many reservations"),
            EngineError::LimitExceeded("stay too long"),
            EngineError::InvalidField {
                field: "total_price",
                reason: "must not be negative",
            },
            EngineError::AlreadyExists(listing),
            EngineError::Unauthenticated,
        ];
        for rejection in rejections {
            let back = EngineError::from(StorageError::from(rejection.clone()));
            assert_eq!(back, rejection);
            assert!(!back.is_retryable(), "{back} must not be retryable");
        }

        let io = StorageError::from(EngineError::PersistenceFailure("fsync".into()));
        assert_eq!(io, StorageError::Io("fsync".into()));
        assert!(EngineError::from(io).is_retryable());
        assert_eq!(
            StorageError::from(EngineError::DateConflict(listing)),
            StorageError::Conflict(listing)
        );
    }

    #[test]
    fn only_persistence_failures_retry() {
        assert!(!EngineError::Unauthenticated.is_retryable());
        assert!(!EngineError::DateConflict(Ulid::new()).is_retryable());
        assert!(!EngineError::LimitExceeded("x").is_retryable());
        assert!(EngineError::PersistenceFailure("x".into()).is_retryable());
    }
}
