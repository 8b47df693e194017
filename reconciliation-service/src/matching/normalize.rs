//! Document and name normalization.

/// Minimum digit count for a usable tax document (CPF has 11, CNPJ 14).
pub const MIN_DOCUMENT_LEN: usize = 11;

/// Keep only digit characters.
pub fn normalize_document(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Uppercase, fold diacritics, drop everything but letters, collapse
/// whitespace runs to single spaces.
pub fn normalize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.chars() {
        let c = fold_diacritic(c);
        if c.is_ascii_alphabetic() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c.to_ascii_uppercase());
        } else if c.is_whitespace() {
            pending_space = true;
        }
        // any other character is dropped
    }
    out
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keeps_only_digits() {
        assert_eq!(normalize_document("123.456.789-00"), "12345678900");
        assert_eq!(normalize_document("12.345.678/0001-99"), "12345678000199");
        assert_eq!(normalize_document("abc"), "");
    }

    #[test]
    fn document_normalization_is_idempotent() {
        let once = normalize_document("123.456.789-00");
        assert_eq!(normalize_document(&once), once);
    }

    #[test]
    fn name_folds_case_and_diacritics() {
        assert_eq!(normalize_name("José da Silva"), "JOSE DA SILVA");
        assert_eq!(normalize_name("JOSE DA SILVA"), "JOSE DA SILVA");
        assert_eq!(normalize_name("Ângela  Conceição"), "ANGELA CONCEICAO");
    }

    #[test]
    fn name_drops_non_letters_and_collapses_whitespace() {
        assert_eq!(normalize_name("  Maria\t P.  Souza 123 "), "MARIA P SOUZA");
        assert_eq!(normalize_name("***"), "");
    }

    #[test]
    fn name_normalization_is_idempotent() {
        let once = normalize_name("José  da   Silva");
        assert_eq!(normalize_name(&once), once);
    }
}
