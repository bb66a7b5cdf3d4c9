//! Event type migration: resolving stored descriptors and payloads into the
//! current in-memory event representation.
//!
//! The same migrator instance is shared by the command store (on load) and
//! the projector (on dispatch), so each migration is defined exactly once.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// Resolves a stored event descriptor and payload into a current event.
///
/// Implementations must be deterministic and free of side effects.
pub trait EventTypeMigrator<E: DomainEvent>: Send + Sync {
    /// Migrates one stored event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if the descriptor is unknown or
    /// the payload cannot be mapped to a current event.
    fn migrate(&self, event_type: &str, data: &Value) -> Result<E, DomainError>;
}

/// Payload transformation applied to a legacy descriptor before it is
/// renamed or deserialized.
pub type Upcaster = Box<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Default migrator: rename table, optional payload upcasters, then `serde`.
///
/// Renames may chain (`v1 -> v2 -> v3`). An upcaster registered for a
/// descriptor runs before that descriptor's rename is followed.
pub struct SerdeEventMigrator<E> {
    renames: HashMap<String, String>,
    upcasters: HashMap<String, Upcaster>,
    _event: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for SerdeEventMigrator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut upcast: Vec<&String> = self.upcasters.keys().collect();
        upcast.sort();
        f.debug_struct("SerdeEventMigrator")
            .field("renames", &self.renames)
            .field("upcasters", &upcast)
            .finish()
    }
}

impl<E> Default for SerdeEventMigrator<E> {
    fn default() -> Self {
        Self {
            renames: HashMap::new(),
            upcasters: HashMap::new(),
            _event: PhantomData,
        }
    }
}

impl<E: DomainEvent> SerdeEventMigrator<E> {
    /// Creates a migrator that only accepts current descriptors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a legacy descriptor onto a newer one.
    #[must_use]
    pub fn rename(mut self, legacy: impl Into<String>, current: impl Into<String>) -> Self {
        self.renames.insert(legacy.into(), current.into());
        self
    }

    /// Registers a payload transformation for a legacy descriptor.
    #[must_use]
    pub fn upcast<F>(mut self, legacy: impl Into<String>, upcaster: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.upcasters.insert(legacy.into(), Box::new(upcaster));
        self
    }

    fn resolve(&self, event_type: &str, data: &Value) -> Result<(String, Value), DomainError> {
        let mut current = event_type.to_owned();
        let mut payload = data.clone();
        let mut visited = HashSet::new();

        loop {
            if !visited.insert(current.clone()) {
                return Err(DomainError::RuleViolation(format!(
                    "event type rename cycle detected at {current} (from {event_type})"
                )));
            }
            if let Some(upcaster) = self.upcasters.get(&current) {
                payload = upcaster(payload).map_err(|reason| {
                    DomainError::RuleViolation(format!(
                        "upcasting {current} failed: {reason}"
                    ))
                })?;
            }
            match self.renames.get(&current) {
                Some(next) => current.clone_from(next),
                None => return Ok((current, payload)),
            }
        }
    }
}

impl<E: DomainEvent> EventTypeMigrator<E> for SerdeEventMigrator<E> {
    fn migrate(&self, event_type: &str, data: &Value) -> Result<E, DomainError> {
        let (resolved, payload) = self.resolve(event_type, data)?;

        let event: E = serde_json::from_value(payload).map_err(|e| {
            DomainError::RuleViolation(format!(
                "cannot migrate event type {event_type} (resolved as {resolved}): {e}"
            ))
        })?;

        if event.event_type() != resolved {
            return Err(DomainError::RuleViolation(format!(
                "event type {event_type} resolved as {resolved} but payload decodes as {}",
                event.event_type()
            )));
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum AccountEvent {
        Opened { owner: String },
        Deposited { amount_cents: i64 },
    }

    impl DomainEvent for AccountEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Opened { .. } => "account.v2.opened",
                Self::Deposited { .. } => "account.v2.deposited",
            }
        }
    }

    #[test]
    fn test_current_descriptor_deserializes_directly() {
        let migrator = SerdeEventMigrator::<AccountEvent>::new();

        let event = migrator
            .migrate("account.v2.opened", &json!({"Opened": {"owner": "ada"}}))
            .unwrap();

        assert_eq!(event, AccountEvent::Opened { owner: "ada".into() });
    }

    #[test]
    fn test_legacy_descriptor_is_renamed_and_upcast() {
        // Arrange: v1 stored whole units under a different variant name.
        let migrator = SerdeEventMigrator::<AccountEvent>::new()
            .upcast("account.v1.credited", |payload| {
                let units = payload["Credited"]["amount"]
                    .as_i64()
                    .ok_or_else(|| "missing amount".to_owned())?;
                Ok(json!({"Deposited": {"amount_cents": units * 100}}))
            })
            .rename("account.v1.credited", "account.v2.deposited");

        // Act
        let event = migrator
            .migrate("account.v1.credited", &json!({"Credited": {"amount": 3}}))
            .unwrap();

        // Assert
        assert_eq!(event, AccountEvent::Deposited { amount_cents: 300 });
    }

    #[test]
    fn test_rename_chain_is_followed() {
        let migrator = SerdeEventMigrator::<AccountEvent>::new()
            .rename("account.v0.created", "account.v1.opened")
            .rename("account.v1.opened", "account.v2.opened");

        let event = migrator
            .migrate("account.v0.created", &json!({"Opened": {"owner": "lin"}}))
            .unwrap();

        assert_eq!(event, AccountEvent::Opened { owner: "lin".into() });
    }

    #[test]
    fn test_unknown_descriptor_is_a_rule_violation() {
        let migrator = SerdeEventMigrator::<AccountEvent>::new();

        let result = migrator.migrate("account.v9.frozen", &json!({"Frozen": {}}));

        assert!(matches!(result, Err(DomainError::RuleViolation(_))));
    }

    #[test]
    fn test_descriptor_payload_mismatch_is_a_rule_violation() {
        let migrator = SerdeEventMigrator::<AccountEvent>::new();

        let result = migrator.migrate(
            "account.v2.opened",
            &json!({"Deposited": {"amount_cents": 5}}),
        );

        match result {
            Err(DomainError::RuleViolation(message)) => {
                assert!(message.contains("account.v2.deposited"), "{message}");
            }
            other => panic!("expected RuleViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_rename_cycle_is_rejected() {
        let migrator = SerdeEventMigrator::<AccountEvent>::new()
            .rename("a", "b")
            .rename("b", "a");

        let result = migrator.migrate("a", &json!({}));

        match result {
            Err(DomainError::RuleViolation(message)) => assert!(message.contains("cycle")),
            other => panic!("expected RuleViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_failing_upcaster_is_a_rule_violation() {
        let migrator = SerdeEventMigrator::<AccountEvent>::new()
            .upcast("account.v1.credited", |_| Err("unsupported shape".to_owned()));

        let result = migrator.migrate("account.v1.credited", &json!({}));

        match result {
            Err(DomainError::RuleViolation(message)) => {
                assert!(message.contains("unsupported shape"));
            }
            other => panic!("expected RuleViolation, got {other:?}"),
        }
    }
}
