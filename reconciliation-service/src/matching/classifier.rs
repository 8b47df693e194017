//! Confidence classification of a scored pairing.

use serde::{Deserialize, Serialize};

/// Classification of one bank transaction after a run.
///
/// `Reconciled` is assigned only when a persisted record exists and bypasses
/// scoring entirely; [`classify`] itself never returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Reconciled,
    Auto,
    Partial,
    None,
}

/// Score thresholds separating the tiers. `high` must exceed `medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchThresholds {
    pub high: i32,
    pub medium: i32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            high: 60,
            medium: 35,
        }
    }
}

impl MatchThresholds {
    /// Returns `None` when the thresholds are not strictly ordered.
    pub fn new(high: i32, medium: i32) -> Option<Self> {
        if high > medium {
            Some(Self { high, medium })
        } else {
            None
        }
    }
}

/// Map a score to a tier.
///
/// An independent customer-identity signal (directory hit or manual mapping)
/// promotes an otherwise sub-threshold score to `Partial`: even when amount
/// and name disagree, knowing who paid is actionable for a reviewer.
pub fn classify(score: i32, has_customer_signal: bool, thresholds: &MatchThresholds) -> ConfidenceTier {
    if score >= thresholds.high {
        ConfidenceTier::Auto
    } else if score >= thresholds.medium || has_customer_signal {
        ConfidenceTier::Partial
    } else {
        ConfidenceTier::None
    }
}
