//! Text normalization for Turkish exam content.

/// Lowercase with Turkish dotted/dotless I rules (`I` -> `ı`, `İ` -> `i`).
pub fn turkish_lowercase(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'I' => out.push('ı'),
            'İ' => out.push('i'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

fn fold_diacritic(c: char) -> char {
    match c {
        'ş' => 's',
        'ğ' => 'g',
        'ı' => 'i',
        'ö' => 'o',
        'ü' => 'u',
        'ç' => 'c',
        'â' => 'a',
        'î' => 'i',
        'û' => 'u',
        _ => c,
    }
}

/// Matching key: Turkish-lowercased, diacritics folded, only alphanumerics
/// kept. Tolerates the spacing and accent losses of on-device recognition.
pub fn matching_key(s: &str) -> String {
    turkish_lowercase(s)
        .chars()
        .map(fold_diacritic)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Length in characters of the common prefix of two strings.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// First `n` characters of `s`.
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turkish_lowercase_dotted_i() {
        assert_eq!(turkish_lowercase("İSTANBUL IRMAK"), "istanbul ırmak");
    }

    #[test]
    fn test_matching_key_folds_accents_and_spacing() {
        assert_eq!(matching_key("Aşağıdakilerden  hangisi?"), "asagidakilerdenhangisi");
        assert_eq!(matching_key("ASAGIDAKILERDEN hangisi"), "asagidakilerdenhangisi");
    }

    #[test]
    fn test_common_prefix_len_counts_chars() {
        assert_eq!(common_prefix_len("sorular", "soruya"), 4);
        assert_eq!(common_prefix_len("", "abc"), 0);
    }

    #[test]
    fn test_char_prefix_multibyte() {
        assert_eq!(char_prefix("çğüş", 2), "çğ");
        assert_eq!(char_prefix("ab", 5), "ab");
    }
}
