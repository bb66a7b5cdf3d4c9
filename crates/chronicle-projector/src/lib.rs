//! Chronicle Projector.
//!
//! Applies ordered batches of change-events to read-model projections,
//! skipping events already covered by the stream's checkpoint and halting on
//! version gaps. The checkpoint advances only after a whole batch applied.

pub mod projector;
pub mod registry;

pub use projector::{ProjectionOutcome, Projector};
pub use registry::{ProjectionHandler, ProjectionRegistry, ProjectionRegistryBuilder};
