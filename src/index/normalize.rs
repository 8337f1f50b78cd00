//! Key normalization rules.
//!
//! Indexes normalize keys both when they are added and when they are searched,
//! so a rule must be deterministic and idempotent.

use std::fmt::Debug;
use std::sync::Arc;

use ahash::AHashMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// A key normalization rule.
pub trait KeyNormalizer: Send + Sync + Debug {
    /// Normalize a key or query fragment.
    fn normalize(&self, text: &str) -> String;

    /// Get the name of this rule.
    fn name(&self) -> &'static str;
}

/// Trims and lowercases keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseNormalizer;

impl KeyNormalizer for LowercaseNormalizer {
    fn normalize(&self, text: &str) -> String {
        text.trim().to_lowercase()
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

lazy_static! {
    /// Katakana to hiragana, including the iteration marks.
    static ref KANA_FOLD: AHashMap<char, char> = {
        let mut map = AHashMap::new();
        for codepoint in 0x30A1u32..=0x30F6 {
            if let (Some(katakana), Some(hiragana)) =
                (char::from_u32(codepoint), char::from_u32(codepoint - 0x60))
            {
                map.insert(katakana, hiragana);
            }
        }
        map.insert('ヽ', 'ゝ');
        map.insert('ヾ', 'ゞ');
        map
    };
}

/// Width and kana folding for Japanese keys.
///
/// NFKC folds half-width katakana, full-width Latin and the ideographic
/// space, then the result is trimmed, lowercased and katakana is mapped onto
/// hiragana.
#[derive(Debug, Clone, Copy, Default)]
pub struct JapaneseNormalizer;

impl KeyNormalizer for JapaneseNormalizer {
    fn normalize(&self, text: &str) -> String {
        let folded: String = text.nfkc().collect();
        folded
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| KANA_FOLD.get(&c).copied().unwrap_or(c))
            .collect()
    }

    fn name(&self) -> &'static str {
        "japanese"
    }
}

/// Serializable choice of rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    Lowercase,
    Japanese,
}

impl Normalization {
    /// Build the rule.
    pub fn normalizer(self) -> Arc<dyn KeyNormalizer> {
        match self {
            Normalization::Lowercase => Arc::new(LowercaseNormalizer),
            Normalization::Japanese => Arc::new(JapaneseNormalizer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase() {
        assert_eq!(LowercaseNormalizer.normalize("Cat's BACK"), "cat's back");
    }

    #[test]
    fn test_japanese_folds_kana_and_width() {
        let rule = JapaneseNormalizer;
        assert_eq!(rule.normalize("ネコ"), "ねこ");
        // Half-width katakana with a voiced mark.
        assert_eq!(rule.normalize("ｶﾞｯｺｳ"), "がっこう");
        assert_eq!(rule.normalize("ＡＢＣ"), "abc");
        assert_eq!(rule.normalize("猫背"), "猫背");
        // The prolonged sound mark is not kana and stays.
        assert_eq!(rule.normalize("コーヒー"), "こーひー");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        assert_eq!(LowercaseNormalizer.normalize("  Dog\t"), "dog");
        assert_eq!(JapaneseNormalizer.normalize("\u{3000}猫\u{3000}"), "猫");
        assert!(JapaneseNormalizer.normalize("\u{3000}").is_empty());
    }

    #[test]
    fn test_japanese_is_idempotent() {
        let rule = JapaneseNormalizer;
        for text in ["ﾃｽﾄ", "テスト", "Ｔｅｓｔ", "ヽヾ"] {
            let once = rule.normalize(text);
            assert_eq!(rule.normalize(&once), once);
        }
    }

    #[test]
    fn test_normalization_choice() {
        assert_eq!(Normalization::Lowercase.normalizer().name(), "lowercase");
        assert_eq!(Normalization::Japanese.normalizer().name(), "japanese");
        let parsed: Normalization = serde_json::from_str("\"japanese\"").unwrap();
        assert_eq!(parsed, Normalization::Japanese);
    }
}
