//! Payer identity extraction from transaction metadata and descriptions.

use crate::matching::normalize::{normalize_document, MIN_DOCUMENT_LEN};
use crate::models::{PayerInfo, PaymentMetadata};
use once_cell::sync::Lazy;
use regex::Regex;

/// Description prefixes used by Brazilian banks for incoming transfers,
/// ordered from most to least specific. The capture group holds whatever
/// follows the prefix, usually the counterparty name plus date fragments.
static DESCRIPTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^PIX\s+RECEBIDO\s+(?:DE\s+)?(.+)$",
        r"(?i)^PIX\s+TRANSF\s+(?:RECEBIDA\s+)?(?:DE\s+)?(.+)$",
        r"(?i)^PIX\s+(?:DE|DO|DA)\s+(.+)$",
        r"(?i)^TED\s+RECEBIDA?\s+(?:DE\s+)?(.+)$",
        r"(?i)^TED\s+(?:DE|DO|DA)\s+(.+)$",
        r"(?i)^DOC\s+(?:DE|DO|DA)\s+(.+)$",
        r"(?i)^TRANSF(?:ERENCIA)?\s+RECEBIDA?\s+(?:DE\s+)?(.+)$",
        r"(?i)^TRANSF(?:ERENCIA)?\s+(?:DE|DO|DA)\s+(.+)$",
        r"(?i)^DEP(?:OSITO)?\s+(?:DE|DO|DA)\s+(.+)$",
        r"(?i)^RECEBIMENTO\s+(?:DE\s+)?(.+)$",
        r"(?i)^CREDITO\s+(?:DE|DO|DA)\s+(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid description pattern"))
    .collect()
});

/// Trailing `dd/mm[/yyyy]` and `hh:mm[:ss]` fragments banks append after the
/// counterparty name.
static TRAILING_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\s+\d{1,2}/\d{1,2}(?:/\d{2,4})?|\s+\d{1,2}:\d{2}(?::\d{2})?)+\s*$")
        .expect("valid trailing date/time pattern")
});

/// Derive a [`PayerInfo`] from the aggregator's structured payment metadata
/// plus the free-text description. Pure; recomputed on every run.
pub fn extract_payer_info(metadata: Option<&PaymentMetadata>, description: &str) -> PayerInfo {
    let mut info = PayerInfo::default();

    if let Some(meta) = metadata {
        if let Some(doc) = meta.payer_document.as_deref() {
            let digits = normalize_document(doc);
            if digits.len() >= MIN_DOCUMENT_LEN {
                info.document = Some(digits);
            }
        }

        if let Some(name) = meta.payer_name.as_deref() {
            let trimmed = name.trim();
            if trimmed.len() >= 2 && !trimmed.eq_ignore_ascii_case("null") {
                info.name = Some(trimmed.to_string());
            }
        }

        if let Some(email) = meta.payer_email.as_deref() {
            let trimmed = email.trim();
            if !trimmed.is_empty() {
                info.email = Some(trimmed.to_lowercase());
            }
        }

        if let Some(key) = meta.payment_key.as_deref() {
            let key = key.trim();
            if !key.is_empty() {
                info.payment_key = Some(key.to_string());

                // A PIX key is often the payer's own document or email.
                if info.document.is_none() {
                    let digits = normalize_document(key);
                    if digits.len() == 11 || digits.len() == 14 {
                        info.document = Some(digits);
                    }
                }
                if info.email.is_none() && key.contains('@') {
                    info.email = Some(key.to_lowercase());
                }
            }
        }
    }

    info.name_from_description = extract_name_from_description(description);

    info
}

/// Pull a counterparty name out of a transfer description, if the
/// description follows one of the known conventions. Lowest-trust name
/// source; only consulted when the metadata carries no explicit name.
pub fn extract_name_from_description(description: &str) -> Option<String> {
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    for pattern in DESCRIPTION_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&collapsed) {
            // First matching convention wins; a rejected candidate is not
            // retried against later patterns.
            return caps.get(1).and_then(|m| clean_captured_name(m.as_str()));
        }
    }

    None
}

fn clean_captured_name(raw: &str) -> Option<String> {
    let stripped = TRAILING_DATE_TIME.replace(raw, "");
    let stripped = stripped
        .trim()
        .trim_end_matches(['-', '.', ',', ';', ':', '*', '/'])
        .trim();

    if stripped.len() < 4 {
        return None;
    }
    if !stripped.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let has_word = stripped
        .split_whitespace()
        .any(|t| t.chars().filter(|c| c.is_alphabetic()).count() >= 2);
    if !has_word {
        return None;
    }

    Some(stripped.to_string())
}
