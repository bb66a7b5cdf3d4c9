//! Execution of admin commands against the configured stores.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::queue::QueueStore;
use chronicle_core::repository::{CheckpointRepository, EventStore};
use chronicle_event_store::{PgCheckpointRepository, PgEventStore, PgQueueStore};
use chronicle_projector::{ProjectionRegistry, Projector};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::cli::{CheckpointCommand, Command, QueueCommand};
use crate::error::AdminError;

/// Applies the schema migrations.
#[async_trait]
pub trait SchemaMigrator: Send + Sync {
    async fn migrate(&self) -> Result<(), AdminError>;
}

/// Runs the workspace `migrations/` against a pool.
#[derive(Debug, Clone)]
pub struct PgSchemaMigrator {
    pool: PgPool,
}

impl PgSchemaMigrator {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaMigrator for PgSchemaMigrator {
    async fn migrate(&self) -> Result<(), AdminError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// A store `destroy-all` wipes.
#[async_trait]
pub trait Teardown: Send + Sync {
    fn name(&self) -> &'static str;

    async fn destroy_all(&self) -> Result<(), DomainError>;
}

#[async_trait]
impl Teardown for PgEventStore {
    fn name(&self) -> &'static str {
        "change events"
    }

    async fn destroy_all(&self) -> Result<(), DomainError> {
        EventStore::destroy_all(self).await
    }
}

#[async_trait]
impl Teardown for PgCheckpointRepository {
    fn name(&self) -> &'static str {
        "projection checkpoints"
    }

    async fn destroy_all(&self) -> Result<(), DomainError> {
        PgCheckpointRepository::destroy_all(self).await
    }
}

#[async_trait]
impl Teardown for PgQueueStore {
    fn name(&self) -> &'static str {
        "queued messages"
    }

    async fn destroy_all(&self) -> Result<(), DomainError> {
        PgQueueStore::destroy_all(self).await
    }
}

/// The stores an admin command may touch, wired once at startup.
pub struct Admin {
    migrator: Arc<dyn SchemaMigrator>,
    projector: Projector,
    queues: Arc<dyn QueueStore>,
    teardown: Vec<Arc<dyn Teardown>>,
}

impl Admin {
    /// An admin over the given stores, with nothing to tear down yet.
    #[must_use]
    pub fn new(
        migrator: Arc<dyn SchemaMigrator>,
        checkpoints: Arc<dyn CheckpointRepository>,
        queues: Arc<dyn QueueStore>,
    ) -> Self {
        Self {
            migrator,
            // Checkpoint administration needs no registered projection.
            projector: Projector::new(ProjectionRegistry::default(), checkpoints),
            queues,
            teardown: Vec::new(),
        }
    }

    /// Adds a store to the `destroy-all` list.
    #[must_use]
    pub fn with_teardown(mut self, store: Arc<dyn Teardown>) -> Self {
        self.teardown.push(store);
        self
    }

    /// Every store backed by one `PostgreSQL` pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        let checkpoints = Arc::new(PgCheckpointRepository::new(pool.clone()));
        let queues = Arc::new(PgQueueStore::new(pool.clone()));
        Self::new(
            Arc::new(PgSchemaMigrator::new(pool.clone())),
            checkpoints.clone(),
            queues.clone(),
        )
        .with_teardown(Arc::new(PgEventStore::new(pool.clone())))
        .with_teardown(checkpoints)
        .with_teardown(queues)
    }

    /// Runs `command`, writing its human-readable result to `out`.
    ///
    /// # Errors
    ///
    /// - `AdminError::ConfirmationRequired` for `destroy-all` without `--yes`.
    /// - `AdminError::Domain` for store failures or an invalid reset target.
    /// - `AdminError::Migration` if a migration fails.
    pub async fn execute<W: Write>(
        &self,
        command: &Command,
        out: &mut W,
    ) -> Result<(), AdminError> {
        match command {
            Command::Migrate => {
                self.migrator.migrate().await?;
                info!("migrations applied");
                writeln!(out, "migrations applied")?;
            }
            Command::Checkpoint {
                action: CheckpointCommand::Show { stream },
            } => {
                let checkpoint = self.projector.checkpoint(stream).await?;
                writeln!(out, "{stream}: {checkpoint}")?;
            }
            Command::Checkpoint {
                action: CheckpointCommand::Reset { stream, to },
            } => {
                self.projector.reset_checkpoint(stream, *to).await?;
                let checkpoint = self.projector.checkpoint(stream).await?;
                writeln!(out, "{stream}: reset to {checkpoint}")?;
            }
            Command::Queue {
                action: QueueCommand::Depth { queue },
            } => {
                let depth = self.queues.depth(queue).await?;
                writeln!(out, "{queue}: {depth}")?;
            }
            Command::DestroyAll { yes } => {
                if !yes {
                    return Err(AdminError::ConfirmationRequired);
                }
                for store in &self.teardown {
                    store.destroy_all().await?;
                    warn!(store = store.name(), "destroyed");
                    writeln!(out, "destroyed {}", store.name())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chronicle_core::error::DomainError;
    use chronicle_core::event::{ChangeEvent, EventMetadata, stream_name};
    use chronicle_core::queue::QueueStore;
    use chronicle_core::repository::EventStore;
    use chronicle_test_support::{
        InMemoryCheckpointRepository, InMemoryEventStore, InMemoryQueueStore,
        LEDGER_AGGREGATE_TYPE, LedgerEvent,
    };
    use uuid::Uuid;

    use super::{Admin, SchemaMigrator, Teardown};
    use crate::cli::{CheckpointCommand, Command, QueueCommand};
    use crate::error::AdminError;

    #[derive(Default)]
    struct CountingMigrator {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SchemaMigrator for CountingMigrator {
        async fn migrate(&self) -> Result<(), AdminError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Teardown for InMemoryEventStore {
        fn name(&self) -> &'static str {
            "change events"
        }

        async fn destroy_all(&self) -> Result<(), DomainError> {
            EventStore::destroy_all(self).await
        }
    }

    struct Fixture {
        admin: Admin,
        migrator: Arc<CountingMigrator>,
        checkpoints: Arc<InMemoryCheckpointRepository>,
        queues: InMemoryQueueStore,
    }

    fn fixture() -> Fixture {
        let migrator = Arc::new(CountingMigrator::default());
        let checkpoints = Arc::new(InMemoryCheckpointRepository::with_checkpoint("ledger-1", 7));
        let queues = InMemoryQueueStore::default();
        let admin = Admin::new(migrator.clone(), checkpoints.clone(), Arc::new(queues.clone()));
        Fixture {
            admin,
            migrator,
            checkpoints,
            queues,
        }
    }

    async fn run(admin: &Admin, command: Command) -> Result<String, AdminError> {
        let mut out = Vec::new();
        admin.execute(&command, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_migrate_runs_migrator() {
        let f = fixture();

        let output = run(&f.admin, Command::Migrate).await.unwrap();

        assert_eq!(output, "migrations applied\n");
        assert_eq!(f.migrator.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_show_and_reset() {
        // Arrange
        let f = fixture();

        // Act
        let shown = run(
            &f.admin,
            Command::Checkpoint {
                action: CheckpointCommand::Show {
                    stream: "ledger-1".to_owned(),
                },
            },
        )
        .await
        .unwrap();
        let reset = run(
            &f.admin,
            Command::Checkpoint {
                action: CheckpointCommand::Reset {
                    stream: "ledger-1".to_owned(),
                    to: Some(2),
                },
            },
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(shown, "ledger-1: 7\n");
        assert_eq!(reset, "ledger-1: reset to 2\n");
        assert_eq!(f.checkpoints.current("ledger-1"), 2);
    }

    #[tokio::test]
    async fn test_negative_reset_target_is_rejected() {
        let f = fixture();

        let result = run(
            &f.admin,
            Command::Checkpoint {
                action: CheckpointCommand::Reset {
                    stream: "ledger-1".to_owned(),
                    to: Some(-1),
                },
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(AdminError::Domain(DomainError::RuleViolation(_)))
        ));
        assert_eq!(f.checkpoints.current("ledger-1"), 7);
    }

    #[tokio::test]
    async fn test_queue_depth() {
        let f = fixture();
        f.queues.push("payments", Uuid::new_v4(), "{}").await.unwrap();
        f.queues.push("payments", Uuid::new_v4(), "{}").await.unwrap();

        let output = run(
            &f.admin,
            Command::Queue {
                action: QueueCommand::Depth {
                    queue: "payments".to_owned(),
                },
            },
        )
        .await
        .unwrap();

        assert_eq!(output, "payments: 2\n");
    }

    fn seeded_event_store() -> (Arc<InMemoryEventStore>, String) {
        let id = Uuid::new_v4();
        let stream = stream_name(LEDGER_AGGREGATE_TYPE, id);
        let opened = ChangeEvent::pending(
            LEDGER_AGGREGATE_TYPE,
            id,
            1,
            &LedgerEvent::Opened {
                owner: "ada".to_owned(),
            },
            EventMetadata::default(),
        )
        .unwrap();
        let events = Arc::new(InMemoryEventStore::default());
        events.insert_raw(&stream, vec![opened]);
        (events, stream)
    }

    #[tokio::test]
    async fn test_destroy_all_requires_confirmation() {
        let (events, stream) = seeded_event_store();
        let admin = fixture().admin.with_teardown(events.clone());

        let result = run(&admin, Command::DestroyAll { yes: false }).await;

        assert!(matches!(result, Err(AdminError::ConfirmationRequired)));
        assert_eq!(events.stream(&stream).len(), 1);
    }

    #[tokio::test]
    async fn test_destroy_all_wipes_registered_stores() {
        // Arrange
        let (events, stream) = seeded_event_store();
        let admin = fixture().admin.with_teardown(events.clone());

        // Act
        let output = run(&admin, Command::DestroyAll { yes: true }).await.unwrap();

        // Assert
        assert_eq!(output, "destroyed change events\n");
        assert!(events.stream(&stream).is_empty());
    }
}
