//! Admin tool errors.

use chronicle_core::error::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0} environment variable must be set")]
    MissingVariable(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    InvalidVariable {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("destroy-all removes every event, checkpoint, and message; pass --yes to confirm")]
    ConfirmationRequired,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}
