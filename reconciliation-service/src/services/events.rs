//! Events published on the tenant channel.

use crate::matching::ReconciliationSummary;
use crate::models::EntryType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Channel carrying a tenant's reconciliation events.
pub fn tenant_channel(tenant_id: &str) -> String {
    format!("tenant:{}:events", tenant_id)
}

/// Tagged event payloads; consumers match on `type` exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconciliationEvent {
    /// A precomputed report for the period is ready in the cache.
    ReconciliationReady {
        date_from: NaiveDate,
        date_to: NaiveDate,
        entry_type: Option<EntryType>,
        summary: ReconciliationSummary,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_event_round_trips_with_a_type_tag() {
        let event = ReconciliationEvent::ReconciliationReady {
            date_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            date_to: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            entry_type: Some(EntryType::Income),
            summary: ReconciliationSummary::default(),
        };

        let raw = serde_json::to_string(&event).unwrap();
        assert!(raw.contains("\"type\":\"reconciliation_ready\""));

        let parsed: ReconciliationEvent = serde_json::from_str(&raw).unwrap();
        match parsed {
            ReconciliationEvent::ReconciliationReady { entry_type, .. } => {
                assert_eq!(entry_type, Some(EntryType::Income));
            }
        }
    }
}
