//! Projection registry: aggregate type to projection handler, built once at
//! startup from explicit registrations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::ChangeEvent;
use chronicle_core::migrator::EventTypeMigrator;
use chronicle_core::projection::ReadModelProjection;

/// Type-erased projection that accepts stored change-events.
#[async_trait]
pub trait ProjectionHandler: Send + Sync {
    /// Projection identity, used in diagnostics.
    fn name(&self) -> &'static str;

    /// The aggregate type this handler is registered for.
    fn root_aggregate_type(&self) -> &'static str;

    /// Migrates the record and applies it. `Ok(false)` means not handled.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if migration fails, or the
    /// projection's own error.
    async fn handle(&self, record: &ChangeEvent) -> Result<bool, DomainError>;
}

/// A typed projection paired with the migrator for its event type.
struct MigratingProjection<P: ReadModelProjection> {
    projection: Arc<P>,
    migrator: Arc<dyn EventTypeMigrator<P::Event>>,
}

#[async_trait]
impl<P: ReadModelProjection> ProjectionHandler for MigratingProjection<P> {
    fn name(&self) -> &'static str {
        self.projection.name()
    }

    fn root_aggregate_type(&self) -> &'static str {
        self.projection.root_aggregate_type()
    }

    async fn handle(&self, record: &ChangeEvent) -> Result<bool, DomainError> {
        let event = self
            .migrator
            .migrate(&record.event_type, &record.data)
            .map_err(|e| {
                DomainError::RuleViolation(format!(
                    "projection {} cannot migrate event {} (version {}, type {}): {e}",
                    self.projection.name(),
                    record.id,
                    record.version,
                    record.event_type
                ))
            })?;
        self.projection.project_event(&event, record).await
    }
}

/// Projection handlers keyed by aggregate type.
#[derive(Clone, Default)]
pub struct ProjectionRegistry {
    handlers: HashMap<String, Arc<dyn ProjectionHandler>>,
}

impl ProjectionRegistry {
    /// Starts an empty registration list.
    #[must_use]
    pub fn builder() -> ProjectionRegistryBuilder {
        ProjectionRegistryBuilder::default()
    }

    /// The handler registered for `aggregate_type`.
    #[must_use]
    pub fn resolve(&self, aggregate_type: &str) -> Option<&Arc<dyn ProjectionHandler>> {
        self.handlers.get(aggregate_type)
    }

    /// Registered aggregate types, sorted.
    #[must_use]
    pub fn aggregate_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Collects registrations; duplicates are rejected.
#[derive(Default)]
pub struct ProjectionRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ProjectionHandler>>,
}

impl ProjectionRegistryBuilder {
    /// Registers a projection with the migrator for its event type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if a projection is already
    /// registered for the same aggregate type.
    pub fn register<P: ReadModelProjection + 'static>(
        self,
        projection: Arc<P>,
        migrator: Arc<dyn EventTypeMigrator<P::Event>>,
    ) -> Result<Self, DomainError> {
        self.register_handler(Arc::new(MigratingProjection {
            projection,
            migrator,
        }))
    }

    /// Registers an already type-erased handler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` on a duplicate aggregate type.
    pub fn register_handler(
        mut self,
        handler: Arc<dyn ProjectionHandler>,
    ) -> Result<Self, DomainError> {
        let aggregate_type = handler.root_aggregate_type().to_owned();
        if let Some(existing) = self.handlers.get(&aggregate_type) {
            return Err(DomainError::RuleViolation(format!(
                "aggregate type {aggregate_type} already projected by {}; cannot also register {}",
                existing.name(),
                handler.name()
            )));
        }
        self.handlers.insert(aggregate_type, handler);
        Ok(self)
    }

    /// Finishes registration.
    #[must_use]
    pub fn build(self) -> ProjectionRegistry {
        ProjectionRegistry {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chronicle_core::error::DomainError;
    use chronicle_core::event::{ChangeEvent, EventMetadata};
    use chronicle_test_support::{
        LEDGER_AGGREGATE_TYPE, LedgerBalanceProjection, LedgerEvent, ledger_migrator,
    };
    use serde_json::json;
    use uuid::Uuid;

    use super::ProjectionRegistry;

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = ProjectionRegistry::builder()
            .register(
                Arc::new(LedgerBalanceProjection::default()),
                Arc::new(ledger_migrator()),
            )
            .and_then(|builder| {
                builder.register(
                    Arc::new(LedgerBalanceProjection::default()),
                    Arc::new(ledger_migrator()),
                )
            });

        match result {
            Err(DomainError::RuleViolation(message)) => {
                assert!(message.contains(LEDGER_AGGREGATE_TYPE), "{message}");
            }
            Ok(_) => panic!("expected RuleViolation, got a builder"),
            Err(other) => panic!("expected RuleViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_by_aggregate_type() {
        let registry = ProjectionRegistry::builder()
            .register(
                Arc::new(LedgerBalanceProjection::default()),
                Arc::new(ledger_migrator()),
            )
            .unwrap()
            .build();

        assert_eq!(registry.aggregate_types(), vec![LEDGER_AGGREGATE_TYPE]);
        assert_eq!(
            registry.resolve(LEDGER_AGGREGATE_TYPE).unwrap().name(),
            "ledger-balance"
        );
        assert!(registry.resolve("invoice").is_none());
    }

    #[tokio::test]
    async fn test_handler_reports_migration_failure_as_rule_violation() {
        let registry = ProjectionRegistry::builder()
            .register(
                Arc::new(LedgerBalanceProjection::default()),
                Arc::new(ledger_migrator()),
            )
            .unwrap()
            .build();
        let mut record = ChangeEvent::pending(
            LEDGER_AGGREGATE_TYPE,
            Uuid::new_v4(),
            1,
            &LedgerEvent::Closed,
            EventMetadata::default(),
        )
        .unwrap();
        record.event_type = "ledger.v0.unknown".into();
        record.data = json!({"Unknown": {}});

        let result = registry
            .resolve(LEDGER_AGGREGATE_TYPE)
            .unwrap()
            .handle(&record)
            .await;

        assert!(matches!(result, Err(DomainError::RuleViolation(_))));
    }
}
