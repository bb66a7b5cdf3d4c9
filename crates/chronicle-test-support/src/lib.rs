//! Shared test doubles, in-memory stores, and a sample aggregate for the
//! Chronicle event-sourcing core.

mod clock;
mod ledger;
mod observer;
mod queue;
mod repository;

pub use clock::{FixedCallContext, FixedClock};
pub use ledger::{
    LEDGER_AGGREGATE_TYPE, LEDGER_CLOSED, LEDGER_DEPOSITED, LEDGER_OPENED, LEDGER_WITHDRAWN,
    LEGACY_LEDGER_CREDITED, Ledger, LedgerBalance, LedgerBalanceProjection, LedgerEvent,
    ledger_migrator,
};
pub use observer::{FailingObserver, RecordingObserver};
pub use queue::InMemoryQueueStore;
pub use repository::{
    FailingCheckpointRepository, FailingEventStore, InMemoryCheckpointRepository,
    InMemoryEventStore,
};
