//! Text normalization for keyword matching.
//!
//! Questions arrive in Vietnamese with or without tone marks ("rắn độc",
//! "ran doc"), so every matcher works on a folded form: lowercase, diacritics
//! removed, punctuation turned into spaces, whitespace collapsed.

use core::ops::RangeInclusive;

/// Unicode block of combining diacritical marks.
const COMBINING_MARKS: RangeInclusive<char> = '\u{0300}'..='\u{036f}';

/// Strip a single lowercase character of its diacritics.
///
/// Covers the full Vietnamese vowel set plus `đ`, and the Latin-1 accents that
/// show up in scientific and place names.
fn fold_char(character: char) -> char {
    match character {
        'à' | 'á' | 'ạ' | 'ả' | 'ã' | 'â' | 'ầ' | 'ấ' | 'ậ' | 'ẩ' | 'ẫ' | 'ă' | 'ằ' | 'ắ'
        | 'ặ' | 'ẳ' | 'ẵ' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ẹ' | 'ẻ' | 'ẽ' | 'ê' | 'ề' | 'ế' | 'ệ' | 'ể' | 'ễ' | 'ë' => 'e',
        'ì' | 'í' | 'ị' | 'ỉ' | 'ĩ' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ọ' | 'ỏ' | 'õ' | 'ô' | 'ồ' | 'ố' | 'ộ' | 'ổ' | 'ỗ' | 'ơ' | 'ờ' | 'ớ'
        | 'ợ' | 'ở' | 'ỡ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'ụ' | 'ủ' | 'ũ' | 'ư' | 'ừ' | 'ứ' | 'ự' | 'ử' | 'ữ' | 'û' | 'ü' => 'u',
        'ỳ' | 'ý' | 'ỵ' | 'ỷ' | 'ỹ' | 'ÿ' => 'y',
        'đ' => 'd',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Fold text into the canonical matching form.
///
/// ```
/// use serpens_core::text::fold;
/// assert_eq!(fold("  Rắn ĐỘC ở Việt-Nam? "), "ran doc o viet nam");
/// ```
#[must_use]
pub fn fold(text: &str) -> String {
    collapse(
        text.chars()
            .flat_map(char::to_lowercase)
            // Decomposed input carries its tone marks as combining characters.
            .filter(|character| !COMBINING_MARKS.contains(character))
            .map(fold_char),
    )
}

/// Lowercase text with punctuation turned into spaces and whitespace
/// collapsed, keeping every diacritic.
///
/// ```
/// use serpens_core::text::lower;
/// assert_eq!(lower("  Rắn ĐỘC ở Việt-Nam? "), "rắn độc ở việt nam");
/// ```
#[must_use]
pub fn lower(text: &str) -> String {
    collapse(text.chars().flat_map(char::to_lowercase))
}

/// Whether `text` carries any diacritic, precomposed or combining.
#[must_use]
pub fn has_diacritics(text: &str) -> bool {
    text.chars()
        .flat_map(char::to_lowercase)
        .any(|character| COMBINING_MARKS.contains(&character) || fold_char(character) != character)
}

/// Join alphanumeric runs with single spaces. Combining marks stay attached to
/// the letter before them.
fn collapse(characters: impl Iterator<Item = char>) -> String {
    let mut collapsed = String::new();
    let mut pending_space = false;

    for character in characters {
        if character.is_alphanumeric() || COMBINING_MARKS.contains(&character) {
            if pending_space && !collapsed.is_empty() {
                collapsed.push(' ');
            }
            pending_space = false;
            collapsed.push(character);
        } else {
            pending_space = true;
        }
    }

    collapsed
}

/// Truncate to at most `max_chars` characters on a char boundary, appending an
/// ellipsis when anything was cut.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_owned();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_vietnamese() {
        assert_eq!(fold("Liệt kê các loài rắn không độc"), "liet ke cac loai ran khong doc");
        assert_eq!(fold("Rắn hổ mang chúa"), "ran ho mang chua");
        assert_eq!(fold("ĐÀ NẴNG"), "da nang");
        // Same word in decomposed form: "độc" as d-stroke, o, dot below, circumflex.
        assert_eq!(fold("\u{111}o\u{323}\u{302}c"), "doc");
    }

    #[test]
    fn test_fold_punctuation_and_whitespace() {
        assert_eq!(fold("non-venomous,\tsnakes!!"), "non venomous snakes");
        assert_eq!(fold("   "), "");
        assert_eq!(fold("Naja naja (Linnaeus, 1758)"), "naja naja linnaeus 1758");
    }

    #[test]
    fn test_lower_keeps_tone_marks() {
        assert_eq!(lower("Đọc về RẮN ráo!"), "đọc về rắn ráo");
        assert_eq!(lower("non-venomous,\tsnakes"), "non venomous snakes");
        assert_ne!(lower("rắn sống dọc bờ suối"), lower("rắn sống độc bờ suối"));
    }

    #[test]
    fn test_has_diacritics() {
        assert!(has_diacritics("Rắn độc"));
        assert!(has_diacritics("\u{111}o\u{323}\u{302}c"));
        assert!(has_diacritics("ÚC"));
        assert!(!has_diacritics("ran doc o viet nam?"));
        assert!(!has_diacritics("harmless snakes"));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("rắn lục đuôi đỏ", 5), "rắn l...");
        assert_eq!(truncate_chars("ngắn", 10), "ngắn");
    }
}
