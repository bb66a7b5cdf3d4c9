//! Operations tooling for a Chronicle deployment.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{CheckpointCommand, Cli, Command, QueueCommand};
pub use commands::{Admin, PgSchemaMigrator, SchemaMigrator, Teardown};
pub use config::AdminConfig;
pub use error::AdminError;
