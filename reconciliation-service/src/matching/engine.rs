//! The assignment pass: pairs each transaction with its best candidate
//! entry, enforcing one-to-one exclusivity within the run.

use crate::matching::classifier::{classify, ConfidenceTier, MatchThresholds};
use crate::matching::directory::CustomerDirectory;
use crate::matching::payer::extract_payer_info;
use crate::matching::scorer::{MatchResult, MatchWeights, ScoreBreakdown, Scorer};
use crate::models::{
    BankTransaction, Customer, CustomerMapping, LedgerEntry, ReconciliationRecord,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Tenant-configurable scoring weights and thresholds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MatchSettings {
    pub weights: MatchWeights,
    pub thresholds: MatchThresholds,
}

/// One bank transaction's outcome for this run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationItem {
    pub transaction: BankTransaction,
    pub tier: ConfidenceTier,
    pub best_match: Option<MatchResult>,
    pub directory_customer: Option<Customer>,
    pub linked_customer: Option<CustomerMapping>,
    pub record: Option<ReconciliationRecord>,
}

/// Per-tier counts plus the aggregate absolute amount of auto matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub reconciled_count: i32,
    pub auto_count: i32,
    pub partial_count: i32,
    pub none_count: i32,
    pub total_count: i32,
    pub auto_amount: Decimal,
}

/// The output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub items: Vec<ReconciliationItem>,
    pub summary: ReconciliationSummary,
}

/// Run the matching pipeline over in-memory snapshots.
///
/// Pure: both the synchronous query path and the precompute worker call
/// this same function, so the two paths cannot drift. `mappings` is keyed
/// by normalized payer document, `records` by bank transaction id.
///
/// Candidate entries are restricted to unpaid ones when any exist in the
/// fetched set. An entry claimed by one transaction is consumed for the
/// rest of the run; ties between candidates break to the first-seen entry,
/// preserving the listing order of the accounting system.
pub fn run_matching(
    transactions: &[BankTransaction],
    entries: &[LedgerEntry],
    directory: &CustomerDirectory,
    mappings: &HashMap<String, CustomerMapping>,
    records: &HashMap<Uuid, ReconciliationRecord>,
    settings: &MatchSettings,
) -> ReconciliationReport {
    let scorer = Scorer::new(settings.weights);

    let unpaid: Vec<&LedgerEntry> = entries.iter().filter(|e| e.payment_date.is_none()).collect();
    let pool: Vec<&LedgerEntry> = if unpaid.is_empty() {
        entries.iter().collect()
    } else {
        unpaid
    };

    let mut consumed: HashSet<i64> = HashSet::new();
    let mut items: Vec<ReconciliationItem> = Vec::with_capacity(transactions.len());

    for transaction in transactions {
        if let Some(record) = records.get(&transaction.transaction_id) {
            items.push(ReconciliationItem {
                transaction: transaction.clone(),
                tier: ConfidenceTier::Reconciled,
                best_match: None,
                directory_customer: None,
                linked_customer: None,
                record: Some(record.clone()),
            });
            continue;
        }

        let payer = extract_payer_info(transaction.metadata(), &transaction.description);
        let directory_customer = directory.find_for_payer(&payer).cloned();
        let linked_customer = payer
            .document
            .as_deref()
            .and_then(|document| mappings.get(document))
            .cloned();

        let mut best: Option<(&LedgerEntry, ScoreBreakdown)> = None;
        for entry in pool.iter().copied().filter(|e| !consumed.contains(&e.entry_id)) {
            let breakdown = scorer.score(
                &payer,
                transaction.amount,
                entry,
                directory_customer.as_ref(),
                linked_customer.as_ref(),
            );
            let improves = match &best {
                None => true,
                Some((_, current)) => breakdown.score > current.score,
            };
            if improves {
                best = Some((entry, breakdown));
            }
        }

        let has_customer_signal = directory_customer.is_some() || linked_customer.is_some();
        let (tier, best_match) = match best {
            Some((entry, breakdown)) => {
                let tier = classify(breakdown.score, has_customer_signal, &settings.thresholds);
                if tier == ConfidenceTier::None {
                    // a low-confidence pairing is noise, not a match
                    (tier, None)
                } else {
                    consumed.insert(entry.entry_id);
                    (
                        tier,
                        Some(MatchResult {
                            entry: entry.clone(),
                            score: breakdown.score,
                            reasons: breakdown.reasons,
                        }),
                    )
                }
            }
            None => (classify(0, has_customer_signal, &settings.thresholds), None),
        };

        items.push(ReconciliationItem {
            transaction: transaction.clone(),
            tier,
            best_match,
            directory_customer,
            linked_customer,
            record: None,
        });
    }

    let summary = summarize(&items);
    ReconciliationReport { items, summary }
}

fn summarize(items: &[ReconciliationItem]) -> ReconciliationSummary {
    let mut summary = ReconciliationSummary {
        total_count: items.len() as i32,
        ..Default::default()
    };
    for item in items {
        match item.tier {
            ConfidenceTier::Reconciled => summary.reconciled_count += 1,
            ConfidenceTier::Auto => {
                summary.auto_count += 1;
                summary.auto_amount += item.transaction.amount.abs();
            }
            ConfidenceTier::Partial => summary.partial_count += 1,
            ConfidenceTier::None => summary.none_count += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryType, PaymentMetadata};
    use chrono::{NaiveDate, Utc};

    fn transaction(id: u128, amount: &str, document: Option<&str>) -> BankTransaction {
        BankTransaction {
            transaction_id: Uuid::from_u128(id),
            tenant_id: Uuid::from_u128(1),
            account_id: "acc-1".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            description: "PIX RECEBIDO".to_string(),
            amount: amount.parse().unwrap(),
            direction: "credit".to_string(),
            payment_metadata: document.map(|d| {
                sqlx::types::Json(PaymentMetadata {
                    payer_document: Some(d.to_string()),
                    ..Default::default()
                })
            }),
            created_utc: Utc::now(),
        }
    }

    fn ledger_entry(id: i64, amount: &str, customer_document: &str) -> LedgerEntry {
        LedgerEntry {
            entry_id: id,
            entry_type: EntryType::Income,
            due_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            payment_date: None,
            amount: amount.parse().unwrap(),
            description: "Retainer".to_string(),
            customer_name: "Maria da Silva".to_string(),
            customer_document: customer_document.to_string(),
            category: "fees".to_string(),
            reference: "2026-001".to_string(),
        }
    }

    fn record_for(transaction_id: Uuid) -> ReconciliationRecord {
        ReconciliationRecord {
            record_id: Uuid::new_v4(),
            tenant_id: Uuid::from_u128(1),
            bank_transaction_id: transaction_id,
            ledger_entry_id: 99,
            match_score: 80,
            customer_id: None,
            entry_description: "Retainer".to_string(),
            customer_name: None,
            paid_utc: Utc::now(),
            created_utc: Utc::now(),
        }
    }

    fn run(
        transactions: &[BankTransaction],
        entries: &[LedgerEntry],
        records: &HashMap<Uuid, ReconciliationRecord>,
    ) -> ReconciliationReport {
        run_matching(
            transactions,
            entries,
            &CustomerDirectory::default(),
            &HashMap::new(),
            records,
            &MatchSettings::default(),
        )
    }

    #[test]
    fn document_and_amount_match_reaches_auto() {
        let transactions = vec![transaction(10, "500.00", Some("123.456.789-00"))];
        let entries = vec![ledger_entry(1, "500.00", "123.456.789-00")];

        let report = run(&transactions, &entries, &HashMap::new());

        let item = &report.items[0];
        assert_eq!(item.tier, ConfidenceTier::Auto);
        let best = item.best_match.as_ref().unwrap();
        assert_eq!(best.entry.entry_id, 1);
        // identity 40 + amount 20 at minimum
        assert!(best.score >= 60);
        assert_eq!(report.summary.auto_count, 1);
        assert_eq!(report.summary.auto_amount, "500.00".parse().unwrap());
    }

    #[test]
    fn persisted_record_bypasses_scoring() {
        let transactions = vec![transaction(10, "500.00", Some("123.456.789-00"))];
        let entries = vec![ledger_entry(1, "500.00", "123.456.789-00")];
        let mut records = HashMap::new();
        records.insert(transactions[0].transaction_id, record_for(transactions[0].transaction_id));

        let report = run(&transactions, &entries, &records);

        let item = &report.items[0];
        assert_eq!(item.tier, ConfidenceTier::Reconciled);
        assert!(item.best_match.is_none());
        assert!(item.record.is_some());
        assert_eq!(report.summary.reconciled_count, 1);
    }

    #[test]
    fn consumed_entries_are_exclusive_within_the_run() {
        // both transactions best-match the single entry; the first processed
        // claims it regardless of relative score
        let transactions = vec![
            transaction(10, "480.00", Some("123.456.789-00")),
            transaction(11, "500.00", Some("123.456.789-00")),
        ];
        let entries = vec![ledger_entry(1, "500.00", "123.456.789-00")];

        let report = run(&transactions, &entries, &HashMap::new());

        let first = &report.items[0];
        let second = &report.items[1];
        assert_eq!(
            first.best_match.as_ref().unwrap().entry.entry_id,
            1,
            "first transaction claims the entry"
        );
        assert!(second.best_match.is_none(), "entry is consumed for the rest of the run");
    }

    #[test]
    fn unpaid_entries_are_preferred_as_candidates() {
        let mut paid = ledger_entry(1, "500.00", "123.456.789-00");
        paid.payment_date = Some(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let unpaid = ledger_entry(2, "500.00", "123.456.789-00");

        let transactions = vec![transaction(10, "500.00", Some("123.456.789-00"))];
        let report = run(&transactions, &[paid, unpaid], &HashMap::new());

        assert_eq!(
            report.items[0].best_match.as_ref().unwrap().entry.entry_id,
            2
        );
    }

    #[test]
    fn fully_paid_set_falls_back_to_all_entries() {
        let mut paid = ledger_entry(1, "500.00", "123.456.789-00");
        paid.payment_date = Some(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());

        let transactions = vec![transaction(10, "500.00", Some("123.456.789-00"))];
        let report = run(&transactions, &[paid], &HashMap::new());

        assert!(report.items[0].best_match.is_some());
    }

    #[test]
    fn none_tier_surfaces_no_best_match() {
        // no identity, wrong amount, no name: score stays below medium
        let transactions = vec![transaction(10, "100.00", None)];
        let entries = vec![ledger_entry(1, "999.00", "123.456.789-00")];

        let report = run(&transactions, &entries, &HashMap::new());

        let item = &report.items[0];
        assert_eq!(item.tier, ConfidenceTier::None);
        assert!(item.best_match.is_none());
        assert_eq!(report.summary.none_count, 1);
    }

    #[test]
    fn manual_mapping_alone_promotes_to_partial() {
        let transactions = vec![transaction(10, "100.00", Some("999.888.777-66"))];
        let entries = vec![ledger_entry(1, "999999.00", "123.456.789-00")];

        let mut mappings = HashMap::new();
        mappings.insert(
            "99988877766".to_string(),
            CustomerMapping {
                mapping_id: Uuid::new_v4(),
                tenant_id: Uuid::from_u128(1),
                payer_document: "99988877766".to_string(),
                customer_id: 7,
                customer_name: "Someone Unrelated".to_string(),
                customer_document: "99988877766".to_string(),
                created_utc: Utc::now(),
            },
        );

        let report = run_matching(
            &transactions,
            &entries,
            &CustomerDirectory::default(),
            &mappings,
            &HashMap::new(),
            &MatchSettings::default(),
        );

        let item = &report.items[0];
        assert_eq!(item.tier, ConfidenceTier::Partial);
        assert_eq!(item.linked_customer.as_ref().unwrap().customer_id, 7);
    }

    #[test]
    fn summary_counts_every_tier() {
        let reconciled_txn = transaction(10, "500.00", None);
        let auto_txn = transaction(11, "500.00", Some("123.456.789-00"));
        let none_txn = transaction(12, "77.00", None);

        let mut records = HashMap::new();
        records.insert(reconciled_txn.transaction_id, record_for(reconciled_txn.transaction_id));

        let entries = vec![
            ledger_entry(1, "500.00", "123.456.789-00"),
            ledger_entry(2, "881234.00", "000.000.000-00"),
        ];

        let report = run(
            &[reconciled_txn, auto_txn, none_txn],
            &entries,
            &records,
        );

        assert_eq!(report.summary.total_count, 3);
        assert_eq!(report.summary.reconciled_count, 1);
        assert_eq!(report.summary.auto_count, 1);
        assert_eq!(report.summary.none_count, 1);
    }
}
