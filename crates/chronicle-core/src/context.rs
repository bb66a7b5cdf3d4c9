//! Ambient call environment: wall-clock time and caller identity.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Source of timestamps for persisted records and outgoing messages.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Ambient identity of the current call.
pub trait CallContext: Send + Sync {
    /// Tenant the call runs on behalf of.
    fn tenant_id(&self) -> String;

    /// Identifier of the current call.
    fn call_id(&self) -> Uuid;

    /// Identity of the caller.
    fn caller_id(&self) -> String;

    /// Region of the host the call originates from.
    fn origin_host_region(&self) -> String;
}

/// A context with fixed values, typically built once per process.
#[derive(Debug, Clone)]
pub struct StaticCallContext {
    /// Tenant identifier.
    pub tenant_id: String,
    /// Caller identity.
    pub caller_id: String,
    /// Host region.
    pub origin_host_region: String,
}

impl CallContext for StaticCallContext {
    fn tenant_id(&self) -> String {
        self.tenant_id.clone()
    }

    /// A fresh id per call, since a static context spans many calls.
    fn call_id(&self) -> Uuid {
        Uuid::now_v7()
    }

    fn caller_id(&self) -> String {
        self.caller_id.clone()
    }

    fn origin_host_region(&self) -> String {
        self.origin_host_region.clone()
    }
}
