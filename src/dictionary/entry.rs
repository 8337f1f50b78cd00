//! Dictionary entry structure.

use serde::{Deserialize, Serialize};

use crate::search::SearchField;

/// One dictionary entry: its written forms, readings and glosses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Written forms, usually containing kanji.
    #[serde(default)]
    pub headwords: Vec<String>,
    /// Kana renderings of the headwords.
    #[serde(default)]
    pub readings: Vec<String>,
    /// Target-language glosses.
    #[serde(default)]
    pub meanings: Vec<String>,
}

impl Entry {
    /// Create a new empty entry.
    pub fn new() -> Self {
        Entry::default()
    }

    /// Create a builder for constructing entries.
    pub fn builder() -> EntryBuilder {
        EntryBuilder::new()
    }

    /// The strings stored for `field`.
    pub fn field(&self, field: SearchField) -> &[String] {
        match field {
            SearchField::Headword => &self.headwords,
            SearchField::Reading => &self.readings,
            SearchField::Meaning => &self.meanings,
        }
    }

    /// Every string of the entry, in record order.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.headwords
            .iter()
            .chain(&self.readings)
            .chain(&self.meanings)
            .map(String::as_str)
    }

    /// Check if the entry has no strings at all.
    pub fn is_empty(&self) -> bool {
        self.headwords.is_empty() && self.readings.is_empty() && self.meanings.is_empty()
    }
}

/// A builder for constructing entries in a fluent manner.
#[derive(Debug, Default)]
pub struct EntryBuilder {
    entry: Entry,
}

impl EntryBuilder {
    pub fn new() -> Self {
        EntryBuilder::default()
    }

    pub fn headword<S: Into<String>>(mut self, headword: S) -> Self {
        self.entry.headwords.push(headword.into());
        self
    }

    pub fn reading<S: Into<String>>(mut self, reading: S) -> Self {
        self.entry.readings.push(reading.into());
        self
    }

    pub fn meaning<S: Into<String>>(mut self, meaning: S) -> Self {
        self.entry.meanings.push(meaning.into());
        self
    }

    pub fn build(self) -> Entry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_fields() {
        let entry = Entry::builder()
            .headword("猫")
            .reading("ねこ")
            .meaning("cat")
            .meaning("pussy")
            .build();
        assert_eq!(entry.field(SearchField::Headword), ["猫"]);
        assert_eq!(entry.field(SearchField::Meaning).len(), 2);
        assert_eq!(
            entry.strings().collect::<Vec<_>>(),
            vec!["猫", "ねこ", "cat", "pussy"]
        );
        assert!(!entry.is_empty());
        assert!(Entry::new().is_empty());
    }

    #[test]
    fn test_json_missing_fields_default() {
        let entry: Entry = serde_json::from_str(r#"{"headwords": ["犬"]}"#).unwrap();
        assert_eq!(entry.headwords, vec!["犬"]);
        assert!(entry.readings.is_empty());
        assert!(entry.meanings.is_empty());
    }
}
