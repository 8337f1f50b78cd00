//! Turning a query into one lazy ID stream over a set of field indexes.

use log::debug;

use crate::error::Result;
use crate::index::Index;
use crate::search::flags::{SearchField, SearchFlags};
use crate::search::query::{SearchPiece, split_query};
use crate::set::{IdStream, intersection, subtraction, union};

/// Evaluates queries against the indexes of one dictionary.
///
/// Each piece is looked up in every selected field and the per-field results
/// are unioned. Positive pieces are intersected and the union of the
/// subtractive pieces is removed from that intersection.
#[derive(Debug, Default)]
pub struct SearchStrategy<'a> {
    indexes: Vec<(SearchField, &'a dyn Index)>,
}

impl<'a> SearchStrategy<'a> {
    pub fn new() -> Self {
        SearchStrategy {
            indexes: Vec::new(),
        }
    }

    /// Register the index that answers queries for `field`.
    pub fn with_index(mut self, field: SearchField, index: &'a dyn Index) -> Self {
        self.indexes.push((field, index));
        self
    }

    /// Split and evaluate `query`.
    pub fn search(&self, query: &str, flags: SearchFlags) -> Result<IdStream> {
        let pieces = split_query(query, flags)?;
        debug!("query {query:?} split into {} pieces", pieces.len());
        self.search_pieces(&pieces)
    }

    /// Evaluate already split pieces.
    pub fn search_pieces(&self, pieces: &[SearchPiece]) -> Result<IdStream> {
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for piece in pieces {
            let found = self.search_piece(piece)?;
            if piece.subtractive {
                negative.push(found);
            } else {
                positive.push(found);
            }
        }

        let matched = intersection(positive);
        if negative.is_empty() {
            return Ok(matched);
        }
        Ok(subtraction(matched, union(negative)))
    }

    /// Union of one piece's matches across its fields.
    fn search_piece(&self, piece: &SearchPiece) -> Result<IdStream> {
        let mode = piece.flags.match_mode();
        let mut found = Vec::new();
        for (field, index) in &self.indexes {
            if !piece.flags.contains(field.flag()) {
                continue;
            }
            // A piece made only of characters the field's normalizer drops
            // cannot match any key there.
            if index.normalizer().normalize(&piece.text).is_empty() {
                continue;
            }
            debug!(
                "searching {} for {:?} ({mode:?})",
                field.name(),
                piece.text
            );
            found.push(index.search(&piece.text, mode)?);
        }
        Ok(union(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JitenError;
    use crate::index::{
        IndexBackend, JapaneseNormalizer, LowercaseNormalizer, MatchMode, MemoryHashIndex,
    };
    use std::sync::Arc;

    fn headwords() -> MemoryHashIndex {
        let mut index = MemoryHashIndex::new(Arc::new(JapaneseNormalizer));
        index.add("犬", &[1]).unwrap();
        index.add("猫", &[2, 3]).unwrap();
        index.add("猫背", &[3]).unwrap();
        index.finished_adding().unwrap();
        index
    }

    fn meanings() -> Box<dyn Index> {
        let mut index = IndexBackend::Trie.create(Arc::new(LowercaseNormalizer));
        index.add("dog", &[1]).unwrap();
        index.add("cat", &[2, 3]).unwrap();
        index.add("back", &[3]).unwrap();
        index.add("hunchback", &[3]).unwrap();
        index.finished_adding().unwrap();
        index
    }

    fn exact(fields: SearchFlags) -> SearchFlags {
        SearchFlags::new(fields, MatchMode::Exact)
    }

    #[test]
    fn test_subtractive_piece() {
        let index = headwords();
        let strategy = SearchStrategy::new().with_index(SearchField::Headword, &index);
        let ids: Vec<u32> = strategy
            .search("猫 -猫背", exact(SearchFlags::HEADWORD))
            .unwrap()
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_positive_pieces_intersect() {
        let meanings = meanings();
        let strategy = SearchStrategy::new().with_index(SearchField::Meaning, meanings.as_ref());
        let ids: Vec<u32> = strategy
            .search("cat back", exact(SearchFlags::MEANING))
            .unwrap()
            .collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_fields_are_unioned() {
        let headwords = headwords();
        let meanings = meanings();
        let strategy = SearchStrategy::new()
            .with_index(SearchField::Headword, &headwords)
            .with_index(SearchField::Meaning, meanings.as_ref());

        let both: Vec<u32> = strategy
            .search("犬", exact(SearchFlags::ALL_FIELDS))
            .unwrap()
            .collect();
        assert_eq!(both, vec![1]);

        let suffix: Vec<u32> = strategy
            .search("*back", exact(SearchFlags::ALL_FIELDS))
            .unwrap()
            .collect();
        assert_eq!(suffix, vec![3]);

        // Only the headword field is selected, so the meaning is not found.
        let headword_only: Vec<u32> = strategy
            .search("dog", exact(SearchFlags::HEADWORD))
            .unwrap()
            .collect();
        assert!(headword_only.is_empty());
    }

    #[test]
    fn test_piece_normalizing_to_nothing_matches_nothing() {
        let index = headwords();
        let strategy = SearchStrategy::new().with_index(SearchField::Headword, &index);
        let ids: Vec<u32> = strategy
            .search("猫 \"\u{3000}\"", exact(SearchFlags::HEADWORD))
            .unwrap()
            .collect();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_only_subtractive_is_error() {
        let index = headwords();
        let strategy = SearchStrategy::new().with_index(SearchField::Headword, &index);
        assert!(matches!(
            strategy.search("-猫", exact(SearchFlags::HEADWORD)),
            Err(JitenError::Query(_))
        ));
    }
}
