//! Domain models for reconciliation-service.

use crate::grpc::proto;
use crate::matching::{
    ConfidenceTier, MatchReason, MatchResult, ReconciliationItem, ReconciliationSummary,
};
use chrono::{DateTime, NaiveDate, Utc};
use prost_types::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Ledger Entry Models
// ============================================================================

/// Side of a ledger entry in the accounting system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn from_proto(p: proto::EntryType) -> Option<Self> {
        match p {
            proto::EntryType::Income => Some(Self::Income),
            proto::EntryType::Expense => Some(Self::Expense),
            proto::EntryType::Unspecified => None,
        }
    }
}

impl From<EntryType> for proto::EntryType {
    fn from(t: EntryType) -> Self {
        match t {
            EntryType::Income => Self::Income,
            EntryType::Expense => Self::Expense,
        }
    }
}

/// A billing record fetched from the accounting system. Read-only snapshot,
/// refetched per run; a null `payment_date` marks the entry as unpaid and
/// therefore a matching candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: i64,
    pub entry_type: EntryType,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub description: String,
    pub customer_name: String,
    pub customer_document: String,
    pub category: String,
    pub reference: String,
}

impl From<LedgerEntry> for proto::LedgerEntry {
    fn from(e: LedgerEntry) -> Self {
        Self {
            entry_id: e.entry_id,
            entry_type: proto::EntryType::from(e.entry_type).into(),
            due_date: e.due_date.to_string(),
            payment_date: e.payment_date.map(|d| d.to_string()),
            amount: e.amount.to_string(),
            description: e.description,
            customer_name: e.customer_name,
            customer_document: e.customer_document,
            category: e.category,
            reference: e.reference,
        }
    }
}

// ============================================================================
// Bank Transaction Models
// ============================================================================

/// Structured payment metadata carried by the aggregator on some
/// transactions; the raw material for payer identity extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub payer_document: Option<String>,
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
    pub payment_key: Option<String>,
}

/// A bank transaction synced from the Open Finance aggregator. Immutable
/// once synced; reconciliation state is derived by joining
/// `reconciliation_records`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BankTransaction {
    pub transaction_id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: String,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: String,
    pub payment_metadata: Option<sqlx::types::Json<PaymentMetadata>>,
    pub created_utc: DateTime<Utc>,
}

impl BankTransaction {
    pub fn metadata(&self) -> Option<&PaymentMetadata> {
        self.payment_metadata.as_ref().map(|j| &j.0)
    }
}

impl From<BankTransaction> for proto::BankTransaction {
    fn from(t: BankTransaction) -> Self {
        Self {
            transaction_id: t.transaction_id.to_string(),
            account_id: t.account_id,
            transaction_date: t.transaction_date.to_string(),
            description: t.description,
            amount: t.amount.to_string(),
            direction: t.direction,
        }
    }
}

/// Payer identity derived from one transaction's metadata and description.
/// Never persisted; recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayerInfo {
    /// Normalized document digits, length >= 11.
    pub document: Option<String>,
    /// Explicit payer name from metadata.
    pub name: Option<String>,
    pub email: Option<String>,
    pub payment_key: Option<String>,
    /// Name recovered from the description text; lowest-trust signal.
    pub name_from_description: Option<String>,
}

impl PayerInfo {
    /// The best available payer name: explicit metadata name when present,
    /// otherwise the description-derived one.
    pub fn best_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.name_from_description.as_deref())
    }
}

// ============================================================================
// Customer Models
// ============================================================================

/// A customer from the accounting system registry. The `document` field is
/// stored normalized (digits only) by the directory builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: i64,
    pub name: String,
    pub document: String,
}

impl From<Customer> for proto::Customer {
    fn from(c: Customer) -> Self {
        Self {
            customer_id: c.customer_id,
            name: c.name,
            document: c.document,
        }
    }
}

/// Analyst-created link from a normalized payer document to a customer.
/// Consulted on every run as an identity-matching fallback.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CustomerMapping {
    pub mapping_id: Uuid,
    pub tenant_id: Uuid,
    pub payer_document: String,
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_document: String,
    pub created_utc: DateTime<Utc>,
}

impl From<CustomerMapping> for proto::CustomerMapping {
    fn from(m: CustomerMapping) -> Self {
        Self {
            mapping_id: m.mapping_id.to_string(),
            payer_document: m.payer_document,
            customer_id: m.customer_id,
            customer_name: m.customer_name,
            customer_document: m.customer_document,
            created_utc: Some(datetime_to_timestamp(m.created_utc)),
        }
    }
}

// ============================================================================
// Reconciliation Record Models
// ============================================================================

/// A confirmed, persisted link between one bank transaction and one ledger
/// entry. Write-once per transaction; deletion reverts the transaction to
/// matching.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub record_id: Uuid,
    pub tenant_id: Uuid,
    pub bank_transaction_id: Uuid,
    pub ledger_entry_id: i64,
    pub match_score: i32,
    pub customer_id: Option<i64>,
    pub entry_description: String,
    pub customer_name: Option<String>,
    pub paid_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl From<ReconciliationRecord> for proto::ReconciliationRecord {
    fn from(r: ReconciliationRecord) -> Self {
        Self {
            record_id: r.record_id.to_string(),
            bank_transaction_id: r.bank_transaction_id.to_string(),
            ledger_entry_id: r.ledger_entry_id,
            match_score: r.match_score,
            customer_id: r.customer_id,
            entry_description: r.entry_description,
            customer_name: r.customer_name,
            paid_utc: Some(datetime_to_timestamp(r.paid_utc)),
            created_utc: Some(datetime_to_timestamp(r.created_utc)),
        }
    }
}

// ============================================================================
// Tenant Configuration Models
// ============================================================================

/// Per-tenant accounting system credentials.
#[derive(Debug, Clone, FromRow)]
pub struct AccountingIntegration {
    pub tenant_id: Uuid,
    pub base_url: String,
    pub api_token: String,
    pub created_utc: DateTime<Utc>,
}

/// Raw per-tenant scoring configuration as stored; validated and converted
/// into `MatchSettings` by the pipeline.
#[derive(Debug, Clone, FromRow)]
pub struct MatchSettingsRow {
    pub tenant_id: Uuid,
    pub identity_weight: i32,
    pub name_weight: i32,
    pub contact_weight: i32,
    pub amount_weight: i32,
    pub high_threshold: i32,
    pub medium_threshold: i32,
}

// ============================================================================
// Proto Conversions for Matching Output
// ============================================================================

impl From<ConfidenceTier> for proto::ConfidenceTier {
    fn from(t: ConfidenceTier) -> Self {
        match t {
            ConfidenceTier::Reconciled => Self::Reconciled,
            ConfidenceTier::Auto => Self::Auto,
            ConfidenceTier::Partial => Self::Partial,
            ConfidenceTier::None => Self::None,
        }
    }
}

impl From<MatchReason> for proto::MatchReason {
    fn from(r: MatchReason) -> Self {
        Self {
            field: r.field,
            weight: r.weight,
            matched: r.matched,
            details: r.details,
        }
    }
}

impl From<MatchResult> for proto::MatchResult {
    fn from(m: MatchResult) -> Self {
        Self {
            entry: Some(m.entry.into()),
            score: m.score,
            reasons: m.reasons.into_iter().map(|r| r.into()).collect(),
        }
    }
}

impl From<ReconciliationItem> for proto::ReconciliationItem {
    fn from(item: ReconciliationItem) -> Self {
        Self {
            transaction: Some(item.transaction.into()),
            tier: proto::ConfidenceTier::from(item.tier).into(),
            best_match: item.best_match.map(|m| m.into()),
            directory_customer: item.directory_customer.map(|c| c.into()),
            linked_customer: item.linked_customer.map(|m| m.into()),
            record: item.record.map(|r| r.into()),
        }
    }
}

impl From<ReconciliationSummary> for proto::ReconciliationSummary {
    fn from(s: ReconciliationSummary) -> Self {
        Self {
            reconciled_count: s.reconciled_count,
            auto_count: s.auto_count,
            partial_count: s.partial_count,
            none_count: s.none_count,
            total_count: s.total_count,
            auto_amount: s.auto_amount.to_string(),
        }
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}
