//! Capability definitions for reconciliation-service.
//!
//! Re-exports the shared auth-context infrastructure from service-core and
//! provides service-specific capability constants.

pub use service_core::grpc::{AuthContext, CapabilityChecker};

/// Reconciliation service capabilities.
pub mod capabilities {
    /// Run and read reconciliation reports.
    pub const RECONCILIATION_QUERY: &str = "reconciliation.report:read";

    /// Confirm a transaction/entry match.
    pub const RECONCILIATION_CONFIRM: &str = "reconciliation.match:confirm";

    /// Undo a confirmed match.
    pub const RECONCILIATION_UNCONFIRM: &str = "reconciliation.match:delete";

    /// Manually link a payer document to a customer.
    pub const RECONCILIATION_LINK: &str = "reconciliation.customer:link";

    /// Trigger a precompute run after a sync.
    pub const RECONCILIATION_PRECOMPUTE: &str = "reconciliation.report:precompute";
}
