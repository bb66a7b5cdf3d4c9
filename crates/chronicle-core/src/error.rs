//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The aggregate's stream has no events.
    #[error("entity not found: {aggregate_type} {id}")]
    EntityNotFound {
        /// Logical aggregate type name.
        aggregate_type: String,
        /// The aggregate that was requested.
        id: Uuid,
    },

    /// The aggregate's stream ends with a tombstone.
    #[error("entity deleted: {aggregate_type} {id}")]
    EntityDeleted {
        /// Logical aggregate type name.
        aggregate_type: String,
        /// The aggregate that was requested.
        id: Uuid,
    },

    /// An aggregate was saved without an assigned identifier.
    #[error("entity exists without identity: {0}")]
    EntityExists(String),

    /// A caller or configuration error that must be fixed, not retried.
    #[error("rule violation: {0}")]
    RuleViolation(String),

    /// A defect: storage corruption, a missing handler, a poison message.
    #[error("unexpected: {0}")]
    Unexpected(String),

    /// A version gap was found while projecting a stream.
    #[error("stream {stream_name} corrupted: expected version {expected}, found {found}")]
    StreamCorrupted {
        /// The stream with the gap.
        stream_name: String,
        /// The version the projector expected next.
        expected: i64,
        /// The version it found instead.
        found: i64,
    },

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` when retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::Infrastructure(_)
        )
    }

    /// Returns `true` for expected outcomes the caller decides on
    /// (missing or deleted entities), as opposed to system errors.
    #[must_use]
    pub fn is_business_outcome(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. } | Self::EntityDeleted { .. })
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_outcomes_are_not_retryable() {
        let not_found = DomainError::EntityNotFound {
            aggregate_type: "ledger".into(),
            id: Uuid::new_v4(),
        };
        let deleted = DomainError::EntityDeleted {
            aggregate_type: "ledger".into(),
            id: Uuid::new_v4(),
        };

        assert!(not_found.is_business_outcome());
        assert!(deleted.is_business_outcome());
        assert!(!not_found.is_retryable());
        assert!(!deleted.is_retryable());
    }

    #[test]
    fn test_defects_are_neither_retryable_nor_business_outcomes() {
        let errors = [
            DomainError::Unexpected("corrupt record".into()),
            DomainError::RuleViolation("projection not configured".into()),
            DomainError::EntityExists("ledger".into()),
            DomainError::StreamCorrupted {
                stream_name: "ledger-1".into(),
                expected: 3,
                found: 5,
            },
        ];

        for err in &errors {
            assert!(!err.is_retryable(), "{err} should not be retryable");
            assert!(!err.is_business_outcome(), "{err} is not a business outcome");
        }
    }

    #[test]
    fn test_infrastructure_and_conflicts_are_retryable() {
        assert!(DomainError::Infrastructure("db down".into()).is_retryable());
        assert!(
            DomainError::ConcurrencyConflict {
                aggregate_id: Uuid::new_v4(),
                expected: 1,
                actual: 2,
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_stream_corrupted_message_names_versions() {
        let err = DomainError::StreamCorrupted {
            stream_name: "ledger-abc".into(),
            expected: 4,
            found: 7,
        };

        assert_eq!(
            err.to_string(),
            "stream ledger-abc corrupted: expected version 4, found 7"
        );
    }
}
