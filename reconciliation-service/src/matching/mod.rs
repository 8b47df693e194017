//! The matching engine.
//!
//! Everything in this module is pure: it receives snapshots of bank
//! transactions, ledger entries, the customer directory and persisted
//! mappings/records, and produces a reconciliation report. Both the
//! synchronous query path and the precompute worker run the exact same code
//! through [`engine::run_matching`].

pub mod classifier;
pub mod directory;
pub mod engine;
pub mod fuzzy;
pub mod normalize;
pub mod payer;
pub mod scorer;

pub use classifier::{classify, ConfidenceTier, MatchThresholds};
pub use directory::CustomerDirectory;
pub use engine::{run_matching, MatchSettings, ReconciliationItem, ReconciliationReport, ReconciliationSummary};
pub use fuzzy::fuzzy_name_match;
pub use normalize::{normalize_document, normalize_name, MIN_DOCUMENT_LEN};
pub use payer::{extract_name_from_description, extract_payer_info};
pub use scorer::{MatchReason, MatchResult, MatchWeights, ScoreBreakdown, Scorer};
