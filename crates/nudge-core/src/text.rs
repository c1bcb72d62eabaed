//! Text normalization helpers
//!
//! Keyword matching, category keys and insight dedup all compare text after
//! folding: lowercase, diacritics stripped, whitespace collapsed.

/// Fold a string for comparison
pub fn fold(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(strip_diacritic(c));
    }

    out
}

/// Map a lowercase accented Latin letter to its base letter
fn strip_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// Format a money amount for user-facing text
pub fn money(amount: f64) -> String {
    format!("R$ {:.2}", amount)
}

/// Format a percentage with one decimal, dropping a trailing ".0"
pub fn percent(value: f64) -> String {
    let s = format!("{:.1}", value);
    match s.strip_suffix(".0") {
        Some(whole) => format!("{}%", whole),
        None => format!("{}%", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_case_accents_and_spacing() {
        assert_eq!(fold("  Alimentação   FORA de Casa "), "alimentacao fora de casa");
        assert_eq!(fold("Café\tda manhã"), "cafe da manha");
        assert_eq!(fold(""), "");
    }

    #[test]
    fn test_percent_format() {
        assert_eq!(percent(25.0), "25%");
        assert_eq!(percent(12.345), "12.3%");
        assert_eq!(percent(-8.0), "-8%");
    }

    #[test]
    fn test_money_format() {
        assert_eq!(money(1500.0), "R$ 1500.00");
    }
}
