//! Weighted multi-factor scoring of one bank transaction against one
//! ledger entry.

use crate::matching::fuzzy::fuzzy_name_match;
use crate::matching::normalize::{normalize_document, normalize_name, MIN_DOCUMENT_LEN};
use crate::models::{Customer, CustomerMapping, LedgerEntry, PayerInfo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Directory/mapping name similarity needed for the identity factor.
const IDENTITY_NAME_SIMILARITY: f64 = 0.7;

/// Name similarity below which the name factor awards nothing.
const NAME_SIMILARITY_FLOOR: f64 = 0.4;

/// Share of the contact weight carried by the email sub-signal.
const EMAIL_CONTACT_SHARE: f64 = 0.53;

/// Per-factor point weights. Callers are responsible for keeping the sum at
/// 100; the scorer never renormalizes, so thresholds are interpreted against
/// whatever the configured sum is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub identity: i32,
    pub name: i32,
    pub contact: i32,
    pub amount: i32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            identity: 40,
            name: 25,
            contact: 15,
            amount: 20,
        }
    }
}

impl MatchWeights {
    pub fn total(&self) -> i32 {
        self.identity + self.name + self.contact + self.amount
    }
}

/// One factor's outcome. `weight` holds the points actually awarded, so the
/// four reasons always sum to the total score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReason {
    pub field: String,
    pub weight: i32,
    pub matched: bool,
    pub details: String,
}

/// Score plus the per-factor audit trail, before a candidate is selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: i32,
    pub reasons: Vec<MatchReason>,
}

/// The winning candidate for one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub entry: LedgerEntry,
    pub score: i32,
    pub reasons: Vec<MatchReason>,
}

pub struct Scorer {
    weights: MatchWeights,
}

impl Scorer {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    /// Score one payer/transaction against one candidate ledger entry.
    ///
    /// The reasons list always carries exactly four entries, one per factor
    /// in identity/name/contact/amount order, matched or not.
    pub fn score(
        &self,
        payer: &PayerInfo,
        transaction_amount: Decimal,
        entry: &LedgerEntry,
        directory_customer: Option<&Customer>,
        mapping: Option<&CustomerMapping>,
    ) -> ScoreBreakdown {
        let identity = self.score_identity(payer, entry, directory_customer, mapping);
        let name = self.score_name(payer, entry);
        let contact = self.score_contact(payer);
        let amount = self.score_amount(transaction_amount, entry.amount);

        let score = identity.weight + name.weight + contact.weight + amount.weight;

        ScoreBreakdown {
            score,
            reasons: vec![identity, name, contact, amount],
        }
    }

    /// Identity: fallback chain, first success wins. Direct document
    /// equality, then the directory-found customer, then a manual mapping.
    fn score_identity(
        &self,
        payer: &PayerInfo,
        entry: &LedgerEntry,
        directory_customer: Option<&Customer>,
        mapping: Option<&CustomerMapping>,
    ) -> MatchReason {
        let entry_document = normalize_document(&entry.customer_document);
        let entry_name = normalize_name(&entry.customer_name);

        if let Some(document) = payer.document.as_deref() {
            if document.len() >= MIN_DOCUMENT_LEN
                && entry_document.len() >= MIN_DOCUMENT_LEN
                && document == entry_document
            {
                return MatchReason {
                    field: "identity".to_string(),
                    weight: self.weights.identity,
                    matched: true,
                    details: format!("payer document matches entry customer (...{})", last4(document)),
                };
            }
        }

        if let Some(customer) = directory_customer {
            let customer_name = normalize_name(&customer.name);
            let by_document = customer.document.len() >= MIN_DOCUMENT_LEN
                && customer.document == entry_document;
            let by_name = !customer_name.is_empty()
                && (customer_name == entry_name
                    || fuzzy_name_match(&customer_name, &entry_name) >= IDENTITY_NAME_SIMILARITY);
            if by_document || by_name {
                return MatchReason {
                    field: "identity".to_string(),
                    weight: self.weights.identity,
                    matched: true,
                    details: format!("directory customer '{}' matches entry customer", customer.name),
                };
            }
        }

        if let Some(mapping) = mapping {
            let mapping_document = normalize_document(&mapping.customer_document);
            let by_document = mapping_document.len() >= MIN_DOCUMENT_LEN
                && entry_document.len() >= MIN_DOCUMENT_LEN
                && mapping_document == entry_document;
            let by_name = normalize_name(&mapping.customer_name) == entry_name;
            if by_document || by_name {
                return MatchReason {
                    field: "identity".to_string(),
                    weight: self.weights.identity,
                    matched: true,
                    details: format!("manual link to customer '{}' applies", mapping.customer_name),
                };
            }
        }

        let details = match payer.document.as_deref() {
            Some(document) if document.len() >= 4 => {
                format!("no identity match for payer document ...{}", last4(document))
            }
            _ => "payer identity unavailable".to_string(),
        };

        MatchReason {
            field: "identity".to_string(),
            weight: 0,
            matched: false,
            details,
        }
    }

    /// Name: partial credit proportional to fuzzy similarity.
    fn score_name(&self, payer: &PayerInfo, entry: &LedgerEntry) -> MatchReason {
        let Some(payer_name) = payer.best_name() else {
            return MatchReason {
                field: "name".to_string(),
                weight: 0,
                matched: false,
                details: "no payer name available".to_string(),
            };
        };

        let similarity = fuzzy_name_match(
            &normalize_name(payer_name),
            &normalize_name(&entry.customer_name),
        );

        if similarity >= NAME_SIMILARITY_FLOOR {
            let awarded = (similarity * self.weights.name as f64).round() as i32;
            MatchReason {
                field: "name".to_string(),
                weight: awarded,
                matched: true,
                details: format!(
                    "'{}' ~ '{}' ({:.0}% similar)",
                    payer_name,
                    entry.customer_name,
                    similarity * 100.0
                ),
            }
        } else {
            MatchReason {
                field: "name".to_string(),
                weight: 0,
                matched: false,
                details: format!(
                    "'{}' ~ '{}' ({:.0}% similar, below floor)",
                    payer_name,
                    entry.customer_name,
                    similarity * 100.0
                ),
            }
        }
    }

    /// Contact: two independent presence sub-signals, email and payment key.
    fn score_contact(&self, payer: &PayerInfo) -> MatchReason {
        let email_points = (self.weights.contact as f64 * EMAIL_CONTACT_SHARE).ceil() as i32;
        let key_points = self.weights.contact - email_points;

        let mut awarded = 0;
        let mut signals: Vec<&str> = Vec::new();
        if payer.email.is_some() {
            awarded += email_points;
            signals.push("email");
        }
        if payer.payment_key.is_some() {
            awarded += key_points;
            signals.push("payment key");
        }

        if awarded > 0 {
            MatchReason {
                field: "contact".to_string(),
                weight: awarded,
                matched: true,
                details: format!("payer carries {}", signals.join(" and ")),
            }
        } else {
            MatchReason {
                field: "contact".to_string(),
                weight: 0,
                matched: false,
                details: "no contact signals on payer".to_string(),
            }
        }
    }

    /// Amount: all-or-nothing, 2% tolerance relative to the larger absolute
    /// amount.
    fn score_amount(&self, transaction_amount: Decimal, entry_amount: Decimal) -> MatchReason {
        let a = transaction_amount.abs();
        let b = entry_amount.abs();
        let larger = a.max(b);
        let difference = (a - b).abs();
        let tolerance = larger * Decimal::new(2, 2);

        if difference <= tolerance {
            MatchReason {
                field: "amount".to_string(),
                weight: self.weights.amount,
                matched: true,
                details: format!("{} within 2% of {}", a, b),
            }
        } else {
            MatchReason {
                field: "amount".to_string(),
                weight: 0,
                matched: false,
                details: format!("{} differs from {} by more than 2%", a, b),
            }
        }
    }
}

fn last4(document: &str) -> &str {
    &document[document.len().saturating_sub(4)..]
}
