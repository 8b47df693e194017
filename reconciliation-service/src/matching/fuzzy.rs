//! Fuzzy similarity between normalized names.

/// Transfer/payment jargon and short connectives that carry no identity
/// signal when comparing names lifted out of bank descriptions.
const STOPWORDS: &[&str] = &[
    "DA",
    "DE",
    "DO",
    "DAS",
    "DOS",
    "PIX",
    "TED",
    "DOC",
    "TEV",
    "TRANSF",
    "TRANSFERENCIA",
    "PAGAMENTO",
    "PAGTO",
    "PAG",
    "RECEBIDO",
    "RECEBIDA",
    "ENVIADO",
    "ENVIADA",
    "DEPOSITO",
    "DEP",
    "CREDITO",
    "DEBITO",
    "LTDA",
    "EIRELI",
    "MEI",
    "ME",
    "SA",
    "CIA",
];

/// Similarity in `[0.0, 1.0]` between two already-normalized names.
///
/// - identical strings score 1.0
/// - one containing the other scores 0.85
/// - a lone surname/firstname appearing among the other side's tokens
///   scores 0.45
/// - otherwise the token-overlap count divided by the larger token set
pub fn fuzzy_name_match(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(b) || b.contains(a) {
        return 0.85;
    }

    let tokens_a = significant_tokens(a);
    let tokens_b = significant_tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    if tokens_a.len() == 1 || tokens_b.len() == 1 {
        let (single, other) = if tokens_a.len() == 1 {
            (&tokens_a, &tokens_b)
        } else {
            (&tokens_b, &tokens_a)
        };
        return if other.contains(&single[0]) { 0.45 } else { 0.0 };
    }

    let (shorter, longer) = if tokens_a.len() <= tokens_b.len() {
        (&tokens_a, &tokens_b)
    } else {
        (&tokens_b, &tokens_a)
    };
    let overlap = shorter.iter().filter(|t| longer.contains(t)).count();
    overlap as f64 / longer.len() as f64
}

fn significant_tokens(name: &str) -> Vec<&str> {
    name.split_whitespace()
        .filter(|t| t.len() >= 2 && !STOPWORDS.contains(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_score_one() {
        assert_eq!(fuzzy_name_match("MARIA SILVA", "MARIA SILVA"), 1.0);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(fuzzy_name_match("", "MARIA"), 0.0);
        assert_eq!(fuzzy_name_match("MARIA", ""), 0.0);
    }

    #[test]
    fn substring_scores_085() {
        assert_eq!(fuzzy_name_match("MARIA SILVA", "MARIA SILVA SANTOS"), 0.85);
        assert_eq!(fuzzy_name_match("MARIA SILVA SANTOS", "MARIA SILVA"), 0.85);
    }

    #[test]
    fn is_symmetric() {
        let pairs = [
            ("MARIA SILVA SANTOS", "JOAO SILVA PEREIRA"),
            ("SILVA", "MARIA SILVA COSTA"),
            ("ANA BEATRIZ LIMA", "BEATRIZ LIMA ROCHA"),
        ];
        for (a, b) in pairs {
            assert_eq!(fuzzy_name_match(a, b), fuzzy_name_match(b, a));
        }
    }

    #[test]
    fn lone_substring_hits_the_containment_rule_first() {
        assert_eq!(fuzzy_name_match("SILVA", "MARIA SILVA COSTA"), 0.85);
    }

    #[test]
    fn single_token_containment_scores_045() {
        // PIX is discarded, leaving one significant token that is not a
        // substring of the other side
        assert_eq!(fuzzy_name_match("PIX SILVA", "MARIA SILVA COSTA"), 0.45);
        assert_eq!(fuzzy_name_match("PIX SILVA", "MARIA COSTA LIMA"), 0.0);
    }

    #[test]
    fn overlap_ratio_uses_larger_token_set() {
        // {BEATRIZ, LIMA} against {ANA, BEATRIZ, COSTA, LIMA}: 2 of 4
        let sim = fuzzy_name_match("BEATRIZ LIMA", "ANA BEATRIZ COSTA LIMA");
        assert!((sim - 0.5).abs() < 1e-9);
    }

    #[test]
    fn banking_jargon_is_ignored() {
        // PIX/RECEBIDO/DE are noise; only MARIA and SILVA count
        assert_eq!(
            fuzzy_name_match("PIX RECEBIDO MARIA SILVA", "MARIA DE SILVA"),
            1.0
        );
    }
}
