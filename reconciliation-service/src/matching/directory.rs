//! Indexed customer directory with exact and fuzzy lookup.

use crate::matching::fuzzy::fuzzy_name_match;
use crate::matching::normalize::{normalize_document, normalize_name, MIN_DOCUMENT_LEN};
use crate::models::{Customer, PayerInfo};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Similarity floor for the full-scan fuzzy fallback.
const FUZZY_LOOKUP_FLOOR: f64 = 0.6;

/// The accounting system's customer registry, indexed for O(1) document and
/// name lookup. Built once per run from the paginated registry fetch (or a
/// cache hit) and serialized into the cache between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDirectory {
    customers: Vec<Customer>,
    by_document: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl CustomerDirectory {
    /// Build the indexes from raw registry rows, deduplicating by customer
    /// id and normalizing documents and names.
    pub fn build(raw: Vec<Customer>) -> Self {
        let mut seen: HashSet<i64> = HashSet::new();
        let mut customers: Vec<Customer> = Vec::with_capacity(raw.len());
        for customer in raw {
            if seen.insert(customer.customer_id) {
                customers.push(Customer {
                    customer_id: customer.customer_id,
                    name: customer.name,
                    document: normalize_document(&customer.document),
                });
            }
        }

        let mut by_document = HashMap::new();
        let mut by_name = HashMap::new();
        for (index, customer) in customers.iter().enumerate() {
            if customer.document.len() >= MIN_DOCUMENT_LEN {
                by_document.entry(customer.document.clone()).or_insert(index);
            }
            let name_key = normalize_name(&customer.name);
            if !name_key.is_empty() {
                by_name.entry(name_key).or_insert(index);
            }
        }

        Self {
            customers,
            by_document,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Find the customer behind a payer: exact document match first, then
    /// exact normalized-name match, then the best fuzzy name above the
    /// floor.
    pub fn find_for_payer(&self, payer: &PayerInfo) -> Option<&Customer> {
        if let Some(document) = payer.document.as_deref() {
            if document.len() >= MIN_DOCUMENT_LEN {
                if let Some(&index) = self.by_document.get(document) {
                    return Some(&self.customers[index]);
                }
            }
        }

        let name = normalize_name(payer.best_name()?);
        if name.is_empty() {
            return None;
        }

        if let Some(&index) = self.by_name.get(&name) {
            return Some(&self.customers[index]);
        }

        let mut best: Option<(f64, &Customer)> = None;
        for customer in &self.customers {
            let similarity = fuzzy_name_match(&name, &normalize_name(&customer.name));
            if similarity >= FUZZY_LOOKUP_FLOOR
                && best.map_or(true, |(b, _)| similarity > b)
            {
                best = Some((similarity, customer));
            }
        }
        best.map(|(_, customer)| customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<Customer> {
        vec![
            Customer {
                customer_id: 1,
                name: "Maria da Silva".to_string(),
                document: "123.456.789-00".to_string(),
            },
            Customer {
                customer_id: 2,
                name: "João Carlos Pereira".to_string(),
                document: "987.654.321-00".to_string(),
            },
            Customer {
                customer_id: 3,
                name: "Acme Serviços Ltda".to_string(),
                document: "12.345.678/0001-99".to_string(),
            },
            // duplicate page overlap
            Customer {
                customer_id: 1,
                name: "Maria da Silva".to_string(),
                document: "123.456.789-00".to_string(),
            },
        ]
    }

    #[test]
    fn build_deduplicates_and_normalizes() {
        let directory = CustomerDirectory::build(registry());
        assert_eq!(directory.len(), 3);
    }

    #[test]
    fn finds_by_exact_document() {
        let directory = CustomerDirectory::build(registry());
        let payer = PayerInfo {
            document: Some("12345678900".to_string()),
            name: Some("Someone Else".to_string()),
            ..Default::default()
        };
        let found = directory.find_for_payer(&payer).unwrap();
        assert_eq!(found.customer_id, 1);
    }

    #[test]
    fn falls_back_to_exact_name_when_document_unknown() {
        let directory = CustomerDirectory::build(registry());
        let payer = PayerInfo {
            document: Some("00000000000".to_string()),
            name: Some("joão carlos pereira".to_string()),
            ..Default::default()
        };
        let found = directory.find_for_payer(&payer).unwrap();
        assert_eq!(found.customer_id, 2);
    }

    #[test]
    fn fuzzy_fallback_picks_the_best_candidate() {
        let directory = CustomerDirectory::build(registry());
        let payer = PayerInfo {
            name_from_description: Some("JOAO CARLOS PEREIRA JUNIOR".to_string()),
            ..Default::default()
        };
        let found = directory.find_for_payer(&payer).unwrap();
        assert_eq!(found.customer_id, 2);
    }

    #[test]
    fn returns_none_below_fuzzy_floor() {
        let directory = CustomerDirectory::build(registry());
        let payer = PayerInfo {
            name: Some("Completely Unrelated Person".to_string()),
            ..Default::default()
        };
        assert!(directory.find_for_payer(&payer).is_none());
    }

    #[test]
    fn returns_none_without_any_signal() {
        let directory = CustomerDirectory::build(registry());
        assert!(directory.find_for_payer(&PayerInfo::default()).is_none());
    }
}
