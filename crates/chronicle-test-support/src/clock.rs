//! Deterministic `Clock` and `CallContext` implementations for tests.

use chrono::{DateTime, TimeZone, Utc};
use chronicle_core::context::{CallContext, Clock};
use uuid::Uuid;

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// The timestamp shared by most tests: 2026-01-15 10:00:00 UTC.
    ///
    /// # Panics
    ///
    /// Never; the literal date is valid.
    #[must_use]
    pub fn reference() -> Self {
        Self(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A call context with fixed identity, including a fixed call id.
#[derive(Debug, Clone)]
pub struct FixedCallContext {
    /// Tenant identifier.
    pub tenant_id: String,
    /// Call identifier.
    pub call_id: Uuid,
    /// Caller identity.
    pub caller_id: String,
    /// Host region.
    pub origin_host_region: String,
}

impl Default for FixedCallContext {
    fn default() -> Self {
        Self {
            tenant_id: "tenant-test".to_owned(),
            call_id: Uuid::from_u128(0x0001),
            caller_id: "caller-test".to_owned(),
            origin_host_region: "region-test".to_owned(),
        }
    }
}

impl CallContext for FixedCallContext {
    fn tenant_id(&self) -> String {
        self.tenant_id.clone()
    }

    fn call_id(&self) -> Uuid {
        self.call_id
    }

    fn caller_id(&self) -> String {
        self.caller_id.clone()
    }

    fn origin_host_region(&self) -> String {
        self.origin_host_region.clone()
    }
}
