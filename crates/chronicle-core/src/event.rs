//! Domain event abstractions and the persisted change-event record.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version of the first event in every stream.
pub const STARTING_VERSION: i64 = 1;

/// Builds the physical stream name for an aggregate.
#[must_use]
pub fn stream_name(aggregate_type: &str, aggregate_id: Uuid) -> String {
    format!("{aggregate_type}-{aggregate_id}")
}

/// Optional metadata carried by a change-event.
///
/// Every field may be absent on records written before it existed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation ID for tracing a command through its effects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// Causation ID linking this event to the event/command that caused it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    /// Tenant on whose behalf the event was raised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Caller that issued the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
}

/// Trait that all domain events implement.
///
/// Events serialize to the JSON payload stored in [`ChangeEvent::data`] and
/// are resolved back through an
/// [`EventTypeMigrator`](crate::migrator::EventTypeMigrator).
pub trait DomainEvent:
    Send + Sync + std::fmt::Debug + Clone + Serialize + DeserializeOwned + 'static
{
    /// Fully-qualified type descriptor (e.g. `ledger.v2.funds_deposited`).
    fn event_type(&self) -> &'static str;

    /// Whether this event permanently deletes its aggregate.
    fn is_tombstone(&self) -> bool {
        false
    }

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the event cannot be serialized.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// A persisted, versioned record of one state transition in a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Physical stream, see [`stream_name`].
    pub stream_name: String,
    /// Logical aggregate type the event belongs to.
    pub root_aggregate_type: String,
    /// Fully-qualified event type descriptor.
    pub event_type: String,
    /// Optional correlation metadata.
    pub metadata: EventMetadata,
    /// Serialized event payload.
    pub data: serde_json::Value,
    /// 1-based, contiguous version within the stream.
    pub version: i64,
    /// Server-assigned persistence timestamp; `None` until persisted.
    pub last_persisted_at: Option<DateTime<Utc>>,
    /// Terminal marker: no further events are valid after it.
    pub is_tombstone: bool,
}

impl ChangeEvent {
    /// Builds a not-yet-persisted record for a newly raised event.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the event payload cannot be serialized.
    pub fn pending<E: DomainEvent>(
        aggregate_type: &str,
        aggregate_id: Uuid,
        version: i64,
        event: &E,
        metadata: EventMetadata,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::now_v7(),
            stream_name: stream_name(aggregate_type, aggregate_id),
            root_aggregate_type: aggregate_type.to_owned(),
            event_type: event.event_type().to_owned(),
            metadata,
            data: event.to_payload()?,
            version,
            last_persisted_at: None,
            is_tombstone: event.is_tombstone(),
        })
    }

    /// Returns the name of the first required field that is empty, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.root_aggregate_type.trim().is_empty() {
            return Some("root_aggregate_type");
        }
        if self.event_type.trim().is_empty() {
            return Some("event_type");
        }
        let empty_payload = match &self.data {
            serde_json::Value::Null => true,
            serde_json::Value::String(s) => s.is_empty(),
            _ => false,
        };
        if empty_payload {
            return Some("data");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum Probe {
        Created { name: String },
        Removed,
    }

    impl DomainEvent for Probe {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Created { .. } => "probe.created",
                Self::Removed => "probe.removed",
            }
        }

        fn is_tombstone(&self) -> bool {
            matches!(self, Self::Removed)
        }
    }

    #[test]
    fn test_stream_name_joins_type_and_id() {
        let id = Uuid::nil();
        assert_eq!(
            stream_name("ledger", id),
            "ledger-00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_pending_record_carries_descriptor_and_tombstone_flag() {
        let id = Uuid::new_v4();

        let created = ChangeEvent::pending(
            "probe",
            id,
            1,
            &Probe::Created { name: "a".into() },
            EventMetadata::default(),
        )
        .unwrap();
        let removed =
            ChangeEvent::pending("probe", id, 2, &Probe::Removed, EventMetadata::default())
                .unwrap();

        assert_eq!(created.stream_name, stream_name("probe", id));
        assert_eq!(created.event_type, "probe.created");
        assert_eq!(created.data, json!({"Created": {"name": "a"}}));
        assert!(created.last_persisted_at.is_none());
        assert!(!created.is_tombstone);
        assert!(removed.is_tombstone);
        assert_eq!(removed.version, 2);
    }

    #[test]
    fn test_missing_field_detects_empty_required_fields() {
        let mut record = ChangeEvent::pending(
            "probe",
            Uuid::new_v4(),
            1,
            &Probe::Created { name: "a".into() },
            EventMetadata::default(),
        )
        .unwrap();
        assert_eq!(record.missing_field(), None);

        record.data = serde_json::Value::Null;
        assert_eq!(record.missing_field(), Some("data"));

        record.event_type = String::new();
        assert_eq!(record.missing_field(), Some("event_type"));

        record.root_aggregate_type = " ".into();
        assert_eq!(record.missing_field(), Some("root_aggregate_type"));
    }

    #[test]
    fn test_metadata_omits_absent_fields() {
        let metadata = EventMetadata {
            correlation_id: None,
            causation_id: None,
            tenant_id: Some("acme".into()),
            caller_id: None,
        };

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value, json!({"tenant_id": "acme"}));

        let decoded: EventMetadata = serde_json::from_value(json!({})).unwrap();
        assert_eq!(decoded, EventMetadata::default());
    }
}
