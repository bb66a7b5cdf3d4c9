//! Command-line surface of `chronicle-admin`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chronicle-admin")]
#[command(about = "Operations tooling for the Chronicle event store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Apply pending SQL migrations
    Migrate,
    /// Inspect or rewind projection checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointCommand,
    },
    /// Inspect message queues
    Queue {
        #[command(subcommand)]
        action: QueueCommand,
    },
    /// Delete every event, checkpoint, and queued message
    DestroyAll {
        /// Confirm the teardown
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CheckpointCommand {
    /// Print the last projected version of a stream
    Show {
        /// Stream name, e.g. ledger-<uuid>
        #[arg(short = 's', long = "stream")]
        stream: String,
    },
    /// Rewind a stream's checkpoint so the next catch-up replays it
    Reset {
        /// Stream name, e.g. ledger-<uuid>
        #[arg(short = 's', long = "stream")]
        stream: String,
        /// Target checkpoint (defaults to 0)
        #[arg(long = "to")]
        to: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum QueueCommand {
    /// Print the number of messages in a queue
    Depth {
        /// Queue name; topic subscriptions are `topic/subscription`
        #[arg(short = 'q', long = "queue")]
        queue: String,
    },
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{CheckpointCommand, Cli, Command, QueueCommand};

    #[test]
    fn test_parses_checkpoint_reset_with_target() {
        let cli = Cli::try_parse_from([
            "chronicle-admin",
            "checkpoint",
            "reset",
            "--stream",
            "ledger-1",
            "--to",
            "4",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Checkpoint {
                action: CheckpointCommand::Reset {
                    stream: "ledger-1".to_owned(),
                    to: Some(4),
                },
            }
        );
    }

    #[test]
    fn test_parses_queue_depth_short_flag() {
        let cli = Cli::try_parse_from(["chronicle-admin", "queue", "depth", "-q", "ledgers/audit"])
            .unwrap();

        assert_eq!(
            cli.command,
            Command::Queue {
                action: QueueCommand::Depth {
                    queue: "ledgers/audit".to_owned(),
                },
            }
        );
    }

    #[test]
    fn test_destroy_all_defaults_to_unconfirmed() {
        let cli = Cli::try_parse_from(["chronicle-admin", "destroy-all"]).unwrap();

        assert_eq!(cli.command, Command::DestroyAll { yes: false });
    }

    #[test]
    fn test_checkpoint_show_requires_stream() {
        let result = Cli::try_parse_from(["chronicle-admin", "checkpoint", "show"]);

        assert!(result.is_err());
    }
}
