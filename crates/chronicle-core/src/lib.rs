//! Chronicle core: shared event-sourcing abstractions.
//!
//! This crate defines the fundamental traits and types that the command
//! store, the projector, and the messaging layer depend on. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod context;
pub mod error;
pub mod event;
pub mod migrator;
pub mod notification;
pub mod projection;
pub mod queue;
pub mod repository;
