//! A small sample domain used across the workspace's tests: a `Ledger`
//! aggregate and a balance projection over its events.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::event::{ChangeEvent, DomainEvent};
use chronicle_core::migrator::SerdeEventMigrator;
use chronicle_core::projection::ReadModelProjection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate type name of [`Ledger`].
pub const LEDGER_AGGREGATE_TYPE: &str = "ledger";

/// Descriptor of [`LedgerEvent::Opened`].
pub const LEDGER_OPENED: &str = "ledger.v2.opened";
/// Descriptor of [`LedgerEvent::Deposited`].
pub const LEDGER_DEPOSITED: &str = "ledger.v2.deposited";
/// Descriptor of [`LedgerEvent::Withdrawn`].
pub const LEDGER_WITHDRAWN: &str = "ledger.v2.withdrawn";
/// Descriptor of [`LedgerEvent::Closed`].
pub const LEDGER_CLOSED: &str = "ledger.v2.closed";
/// Legacy descriptor for deposits, stored in whole units.
pub const LEGACY_LEDGER_CREDITED: &str = "ledger.v1.credited";

/// Events raised by a [`Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// The ledger was opened.
    Opened {
        /// Owner name.
        owner: String,
    },
    /// Funds were deposited.
    Deposited {
        /// Amount in cents.
        amount_cents: i64,
    },
    /// Funds were withdrawn.
    Withdrawn {
        /// Amount in cents.
        amount_cents: i64,
    },
    /// The ledger was permanently closed.
    Closed,
}

impl DomainEvent for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Opened { .. } => LEDGER_OPENED,
            Self::Deposited { .. } => LEDGER_DEPOSITED,
            Self::Withdrawn { .. } => LEDGER_WITHDRAWN,
            Self::Closed => LEDGER_CLOSED,
        }
    }

    fn is_tombstone(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// The migrator for ledger events, including the v1 deposit upcast.
#[must_use]
pub fn ledger_migrator() -> SerdeEventMigrator<LedgerEvent> {
    SerdeEventMigrator::new()
        .upcast(LEGACY_LEDGER_CREDITED, |payload| {
            let units = payload["Credited"]["units"]
                .as_i64()
                .ok_or_else(|| "credited payload has no units".to_owned())?;
            Ok(serde_json::json!({ "Deposited": { "amount_cents": units * 100 } }))
        })
        .rename(LEGACY_LEDGER_CREDITED, LEDGER_DEPOSITED)
}

/// A ledger holding a balance in cents.
#[derive(Debug)]
pub struct Ledger {
    id: Option<Uuid>,
    version: i64,
    owner: String,
    balance_cents: i64,
    last_persisted_at: Option<DateTime<Utc>>,
    uncommitted_events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Opens a new ledger, raising `Opened`.
    #[must_use]
    pub fn open(id: Uuid, owner: &str) -> Self {
        let mut ledger = Self::rehydrate(id, None);
        ledger.raise(LedgerEvent::Opened {
            owner: owner.to_owned(),
        });
        ledger
    }

    /// A ledger that was never assigned an identifier.
    #[must_use]
    pub fn unidentified(owner: &str) -> Self {
        let mut ledger = Self {
            id: None,
            version: 0,
            owner: String::new(),
            balance_cents: 0,
            last_persisted_at: None,
            uncommitted_events: Vec::new(),
        };
        ledger.raise(LedgerEvent::Opened {
            owner: owner.to_owned(),
        });
        ledger
    }

    /// Deposits funds.
    pub fn deposit(&mut self, amount_cents: i64) {
        self.raise(LedgerEvent::Deposited { amount_cents });
    }

    /// Withdraws funds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if the balance is insufficient.
    pub fn withdraw(&mut self, amount_cents: i64) -> Result<(), DomainError> {
        if amount_cents > self.balance_cents {
            return Err(DomainError::RuleViolation(format!(
                "insufficient funds: balance {}, requested {amount_cents}",
                self.balance_cents
            )));
        }
        self.raise(LedgerEvent::Withdrawn { amount_cents });
        Ok(())
    }

    /// Closes the ledger permanently.
    pub fn close(&mut self) {
        self.raise(LedgerEvent::Closed);
    }

    /// Owner name.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Current balance, including uncommitted events.
    #[must_use]
    pub fn balance_cents(&self) -> i64 {
        self.balance_cents
    }

    /// Timestamp of the last persisted event seen on load.
    #[must_use]
    pub fn last_persisted_at(&self) -> Option<DateTime<Utc>> {
        self.last_persisted_at
    }

    fn raise(&mut self, event: LedgerEvent) {
        self.mutate(&event);
        self.uncommitted_events.push(event);
    }

    fn mutate(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Opened { owner } => owner.clone_into(&mut self.owner),
            LedgerEvent::Deposited { amount_cents } => self.balance_cents += amount_cents,
            LedgerEvent::Withdrawn { amount_cents } => self.balance_cents -= amount_cents,
            LedgerEvent::Closed => {}
        }
    }
}

impl AggregateRoot for Ledger {
    type Event = LedgerEvent;

    const AGGREGATE_TYPE: &'static str = LEDGER_AGGREGATE_TYPE;

    fn rehydrate(id: Uuid, last_persisted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Some(id),
            version: 0,
            owner: String::new(),
            balance_cents: 0,
            last_persisted_at,
            uncommitted_events: Vec::new(),
        }
    }

    fn aggregate_id(&self) -> Option<Uuid> {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        self.mutate(event);
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    #[allow(clippy::cast_possible_wrap)]
    fn clear_uncommitted_events(&mut self) {
        self.version += self.uncommitted_events.len() as i64;
        self.uncommitted_events.clear();
    }
}

/// Read model row kept by [`LedgerBalanceProjection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBalance {
    /// Owner name.
    pub owner: String,
    /// Balance in cents.
    pub balance_cents: i64,
    /// Whether the ledger was closed.
    pub closed: bool,
}

/// Balance read model per ledger stream.
///
/// Can be told to not recognize some descriptors, to exercise the
/// projector's missing-handler path.
#[derive(Debug, Default)]
pub struct LedgerBalanceProjection {
    balances: Mutex<HashMap<String, LedgerBalance>>,
    applied: Mutex<Vec<(String, i64)>>,
    unhandled: HashSet<&'static str>,
}

impl LedgerBalanceProjection {
    /// A projection that reports `event_type` as not handled.
    #[must_use]
    pub fn ignoring(event_type: &'static str) -> Self {
        Self {
            unhandled: HashSet::from([event_type]),
            ..Self::default()
        }
    }

    /// The read model row for a stream.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn balance(&self, stream_name: &str) -> Option<LedgerBalance> {
        self.balances.lock().unwrap().get(stream_name).cloned()
    }

    /// Every applied `(stream_name, version)`, in application order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn applied(&self) -> Vec<(String, i64)> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReadModelProjection for LedgerBalanceProjection {
    type Event = LedgerEvent;

    fn name(&self) -> &'static str {
        "ledger-balance"
    }

    fn root_aggregate_type(&self) -> &'static str {
        LEDGER_AGGREGATE_TYPE
    }

    async fn project_event(
        &self,
        event: &LedgerEvent,
        record: &ChangeEvent,
    ) -> Result<bool, DomainError> {
        if self.unhandled.contains(event.event_type()) {
            return Ok(false);
        }

        {
            let mut balances = self.balances.lock().unwrap();
            let row = balances.entry(record.stream_name.clone()).or_default();
            match event {
                LedgerEvent::Opened { owner } => owner.clone_into(&mut row.owner),
                LedgerEvent::Deposited { amount_cents } => row.balance_cents += amount_cents,
                LedgerEvent::Withdrawn { amount_cents } => row.balance_cents -= amount_cents,
                LedgerEvent::Closed => row.closed = true,
            }
        }
        self.applied
            .lock()
            .unwrap()
            .push((record.stream_name.clone(), record.version));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::migrator::EventTypeMigrator;
    use serde_json::json;

    #[test]
    fn test_ledger_tracks_balance_and_pending_events() {
        let mut ledger = Ledger::open(Uuid::new_v4(), "ada");
        ledger.deposit(500);
        ledger.withdraw(200).unwrap();

        assert_eq!(ledger.owner(), "ada");
        assert_eq!(ledger.balance_cents(), 300);
        assert_eq!(ledger.uncommitted_events().len(), 3);
        assert_eq!(ledger.version(), 0);

        ledger.clear_uncommitted_events();
        assert_eq!(ledger.version(), 3);
        assert!(ledger.uncommitted_events().is_empty());
    }

    #[test]
    fn test_withdraw_rejects_overdraft() {
        let mut ledger = Ledger::open(Uuid::new_v4(), "ada");

        let result = ledger.withdraw(1);

        assert!(matches!(result, Err(DomainError::RuleViolation(_))));
        assert_eq!(ledger.uncommitted_events().len(), 1);
    }

    #[test]
    fn test_legacy_credit_migrates_to_deposit_in_cents() {
        let event = ledger_migrator()
            .migrate(LEGACY_LEDGER_CREDITED, &json!({"Credited": {"units": 7}}))
            .unwrap();

        assert_eq!(event, LedgerEvent::Deposited { amount_cents: 700 });
    }
}
