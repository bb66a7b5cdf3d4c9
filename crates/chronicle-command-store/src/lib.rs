//! Chronicle Command Store.
//!
//! Rehydrates aggregates from their event streams and persists the events
//! they raise, publishing a "stream changed" notification after each save.

pub mod command_store;

pub use command_store::CommandStore;
