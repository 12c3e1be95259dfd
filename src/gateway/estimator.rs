//! Usage cost estimation
//!
//! Converts outgoing text into the unit measure used for quota accounting.
//! Units are weighted character counts, not provider token counts: CJK text
//! costs roughly double the model tokens per character versus Latin text,
//! so ideographs are weighted 2:1.

/// CJK Unified Ideographs block.
const CJK_START: char = '\u{4e00}';
const CJK_END: char = '\u{9fff}';

/// Estimate the quota cost of a piece of text in units
///
/// Each character contributes 2 units if it falls in the CJK Unified
/// Ideographs range (U+4E00..=U+9FFF), else 1 unit. Pure and additive:
/// `estimate(a) + estimate(b) == estimate(ab)` for any concatenation.
///
/// # Arguments
///
/// * `text` - The fully assembled outgoing text
///
/// # Examples
///
/// ```
/// use chatgate::gateway::estimator::estimate;
///
/// assert_eq!(estimate("hello"), 5);
/// assert_eq!(estimate("你好"), 4);
/// ```
pub fn estimate(text: &str) -> u64 {
    text.chars()
        .map(|c| if (CJK_START..=CJK_END).contains(&c) { 2 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_costs_nothing() {
        assert_eq!(estimate(""), 0);
    }

    #[test]
    fn test_latin_counts_one_per_char() {
        assert_eq!(estimate("a"), 1);
        assert_eq!(estimate("hello world"), 11);
    }

    #[test]
    fn test_cjk_counts_two_per_char() {
        assert_eq!(estimate("中"), 2);
        assert_eq!(estimate("你好世界"), 8);
    }

    #[test]
    fn test_range_boundaries() {
        // First and last ideographs in the block are weighted.
        assert_eq!(estimate("\u{4e00}"), 2);
        assert_eq!(estimate("\u{9fff}"), 2);
        // Neighbors just outside the block are not.
        assert_eq!(estimate("\u{4dff}"), 1);
        assert_eq!(estimate("\u{a000}"), 1);
    }

    #[test]
    fn test_mixed_text() {
        // 2 ideographs + 5 latin chars + 1 space
        assert_eq!(estimate("中文 hello"), 10);
    }

    #[test]
    fn test_other_non_ascii_counts_one() {
        assert_eq!(estimate("é"), 1);
        assert_eq!(estimate("русский"), 7);
        // Kana is outside the unified ideograph block.
        assert_eq!(estimate("ひらがな"), 4);
    }

    #[test]
    fn test_additive_by_character() {
        let a = "search results\n";
        let b = "你好";
        let concatenated = format!("{}{}", a, b);
        assert_eq!(estimate(&concatenated), estimate(a) + estimate(b));
    }

    #[test]
    fn test_newlines_and_punctuation_count() {
        assert_eq!(estimate("a\nb"), 3);
    }
}
