//! Packed trie index.
//!
//! Keys are mapped through a per-index alphabet of at most 255 code units so
//! every edge is one byte. Region layout:
//!
//! ```text
//! u8  alphabet_size
//! alphabet_size x (u16 unit, u8 code)
//! u32 trie_length, trie bytes          see [`node`]
//! u32 array_length, id arrays          i32 count + count x u32 each
//! ```
//!
//! The trie is held in memory once frozen or loaded.

pub mod builder;
pub mod node;
pub mod search;

use std::sync::Arc;

use log::debug;

use crate::error::{JitenError, Result};
use crate::index::accumulator::{FrozenEntries, KeyAccumulator, normalize_key};
use crate::index::{
    Index, IndexBackend, KeyNormalizer, MatchMode, RegionReader, RegionSource, RegionWriter,
    not_searchable,
};
use crate::set::IdStream;

use node::{NodeView, Target};

/// A trie in its packed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTrie {
    /// `(unit, code)` pairs sorted by unit.
    pub(crate) alphabet: Vec<(u16, u8)>,
    pub(crate) trie: Vec<u8>,
    pub(crate) arrays: Vec<u8>,
    pub(crate) key_count: usize,
}

impl CompiledTrie {
    /// Map a query onto the alphabet. `None` if some unit is not in it.
    fn encode_query(&self, text: &str) -> Option<Vec<u8>> {
        text.encode_utf16()
            .map(|unit| {
                self.alphabet
                    .binary_search_by_key(&unit, |&(u, _)| u)
                    .ok()
                    .map(|position| self.alphabet[position].1)
            })
            .collect()
    }

    fn write(&self, writer: &mut RegionWriter) -> Result<()> {
        writer.write_u8(self.alphabet.len() as u8)?;
        for &(unit, code) in &self.alphabet {
            writer.write_u16(unit)?;
            writer.write_u8(code)?;
        }
        writer.write_u32(self.trie.len() as u32)?;
        writer.write_raw(&self.trie)?;
        writer.write_u32(self.arrays.len() as u32)?;
        writer.write_raw(&self.arrays)?;
        Ok(())
    }

    fn read(reader: &mut RegionReader) -> Result<Self> {
        let alphabet_size = reader.read_u8()? as usize;
        let mut alphabet = Vec::with_capacity(alphabet_size);
        for rank in 0..alphabet_size {
            let unit = reader.read_u16()?;
            let code = reader.read_u8()?;
            if code as usize != rank || alphabet.last().is_some_and(|&(prev, _)| prev >= unit) {
                return Err(JitenError::format("trie alphabet is not ranked"));
            }
            alphabet.push((unit, code));
        }

        let trie = read_block(reader, "trie")?;
        let arrays = read_block(reader, "trie array region")?;
        let key_count = count_keys(&trie)?;
        Ok(CompiledTrie {
            alphabet,
            trie,
            arrays,
            key_count,
        })
    }
}

fn read_block(reader: &mut RegionReader, what: &str) -> Result<Vec<u8>> {
    let length = reader.read_u32()? as u64;
    if length > reader.remaining() {
        return Err(JitenError::format(format!(
            "{what} length {length} exceeds file length"
        )));
    }
    reader.read_raw(length as usize)
}

/// Count stored keys, checking every node on the way.
fn count_keys(trie: &[u8]) -> Result<usize> {
    let mut count = 0;
    let mut pending = vec![0usize];
    while let Some(offset) = pending.pop() {
        let node = NodeView::read(trie, offset)?;
        if node.value()?.is_some() {
            count += 1;
        }
        for index in 0..node.child_count() {
            match node.child(index)? {
                Target::Leaf(_) => count += 1,
                Target::Node(child) => pending.push(child),
            }
        }
    }
    Ok(count)
}

/// Trie-backed index.
#[derive(Debug)]
pub struct TrieIndex {
    normalizer: Arc<dyn KeyNormalizer>,
    accumulator: KeyAccumulator,
    frozen: Option<FrozenEntries>,
    compiled: Option<CompiledTrie>,
}

impl TrieIndex {
    pub fn new(normalizer: Arc<dyn KeyNormalizer>) -> Self {
        TrieIndex {
            accumulator: KeyAccumulator::new(Arc::clone(&normalizer)),
            normalizer,
            frozen: None,
            compiled: None,
        }
    }

    /// Number of distinct code units, once frozen or loaded.
    pub fn alphabet_size(&self) -> Option<usize> {
        self.compiled.as_ref().map(|compiled| compiled.alphabet.len())
    }
}

impl Index for TrieIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::Trie
    }

    fn normalizer(&self) -> &dyn KeyNormalizer {
        self.normalizer.as_ref()
    }

    fn create_new(&mut self) {
        self.accumulator = KeyAccumulator::new(Arc::clone(&self.normalizer));
        self.frozen = None;
        self.compiled = None;
    }

    fn add(&mut self, key: &str, ids: &[u32]) -> Result<()> {
        if self.compiled.is_some() {
            return Err(JitenError::invalid_operation(
                "index is frozen; call create_new before adding keys",
            ));
        }
        self.accumulator.add(key, ids)
    }

    fn finished_adding(&mut self) -> Result<()> {
        if self.compiled.is_some() {
            return Err(JitenError::invalid_operation("index is already frozen"));
        }
        let frozen = self.accumulator.freeze();
        self.compiled = Some(builder::compile(&frozen, None)?);
        self.frozen = Some(frozen);
        Ok(())
    }

    fn save(&self, writer: &mut RegionWriter, remap: Option<&[u32]>) -> Result<()> {
        match (&self.frozen, &self.compiled, remap) {
            (Some(frozen), _, Some(_)) => builder::compile(frozen, remap)?.write(writer),
            (_, Some(compiled), None) => compiled.write(writer),
            (None, Some(_), Some(_)) => Err(JitenError::invalid_operation(
                "a loaded trie index cannot be saved with an id remap",
            )),
            (_, None, _) => Err(not_searchable()),
        }
    }

    fn load(&mut self, reader: &mut RegionReader, source: &RegionSource) -> Result<()> {
        let compiled = CompiledTrie::read(reader)?;
        debug!(
            "loaded trie index from {}: {} keys, {} trie bytes",
            source.file_name,
            compiled.key_count,
            compiled.trie.len()
        );
        self.accumulator = KeyAccumulator::new(Arc::clone(&self.normalizer));
        self.frozen = None;
        self.compiled = Some(compiled);
        Ok(())
    }

    fn search(&self, text: &str, mode: MatchMode) -> Result<IdStream> {
        let compiled = self.compiled.as_ref().ok_or_else(not_searchable)?;
        let query = normalize_key(self.normalizer.as_ref(), text)?;
        let Some(codes) = compiled.encode_query(&query) else {
            return Ok(IdStream::empty());
        };

        let (trie, arrays) = (&compiled.trie[..], &compiled.arrays[..]);
        match mode {
            MatchMode::Exact => search::exact(trie, arrays, &codes),
            MatchMode::Prefix => search::starts_with(trie, arrays, &codes),
            MatchMode::Suffix => search::ends_with_or_contains(trie, arrays, &codes, true),
            MatchMode::Substring => search::ends_with_or_contains(trie, arrays, &codes, false),
        }
    }

    fn key_count(&self) -> usize {
        match &self.compiled {
            Some(compiled) => compiled.key_count,
            None => self.accumulator.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{JapaneseNormalizer, LowercaseNormalizer};
    use crate::storage::{MemoryStorage, Storage, StructReader, StructWriter};

    fn built(pairs: &[(&str, &[u32])]) -> TrieIndex {
        let mut index = TrieIndex::new(Arc::new(LowercaseNormalizer));
        for (key, ids) in pairs {
            index.add(key, ids).unwrap();
        }
        index.finished_adding().unwrap();
        index
    }

    fn ids(index: &dyn Index, text: &str, mode: MatchMode) -> Vec<u32> {
        index.search(text, mode).unwrap().collect()
    }

    fn reload(index: &TrieIndex, remap: Option<&[u32]>) -> TrieIndex {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = StructWriter::new(storage.create_output("r.dcwi").unwrap());
        index.save(&mut writer, remap).unwrap();
        writer.close().unwrap();

        let mut reader = StructReader::new(storage.open_input("r.dcwi").unwrap()).unwrap();
        let mut loaded = TrieIndex::new(Arc::new(LowercaseNormalizer));
        loaded
            .load(&mut reader, &RegionSource::new(storage, "r.dcwi"))
            .unwrap();
        assert_eq!(reader.remaining(), 0);
        loaded
    }

    #[test]
    fn test_prefix_and_exact() {
        let index = built(&[("test", &[10]), ("testing", &[11]), ("tests", &[12])]);
        for index in [&index, &reload(&index, None)] {
            assert_eq!(ids(index, "test", MatchMode::Prefix), vec![10, 11, 12]);
            assert_eq!(ids(index, "test", MatchMode::Exact), vec![10]);
            assert!(ids(index, "tes", MatchMode::Exact).is_empty());
            assert!(ids(index, "testings", MatchMode::Prefix).is_empty());
        }
    }

    #[test]
    fn test_suffix_and_contains() {
        let index = built(&[("test", &[10]), ("testing", &[11]), ("tests", &[12]), ("contest", &[13])]);
        assert_eq!(ids(&index, "test", MatchMode::Suffix), vec![10, 13]);
        assert_eq!(ids(&index, "st", MatchMode::Substring), vec![10, 11, 12, 13]);
        assert_eq!(ids(&index, "ing", MatchMode::Suffix), vec![11]);
        assert_eq!(ids(&index, "ts", MatchMode::Suffix), vec![12]);
    }

    #[test]
    fn test_repeated_symbol_queries() {
        let index = built(&[("aab", &[1]), ("aaab", &[2]), ("abab", &[3]), ("aaaa", &[4])]);
        assert_eq!(ids(&index, "aab", MatchMode::Suffix), vec![1, 2]);
        assert_eq!(ids(&index, "aab", MatchMode::Substring), vec![1, 2]);
        assert_eq!(ids(&index, "aa", MatchMode::Suffix), vec![4]);
        assert_eq!(ids(&index, "aaa", MatchMode::Substring), vec![2, 4]);
        assert_eq!(ids(&index, "bab", MatchMode::Suffix), vec![3]);
    }

    #[test]
    fn test_unknown_unit_matches_nothing() {
        let index = built(&[("cat", &[1])]);
        assert!(ids(&index, "dog", MatchMode::Substring).is_empty());
    }

    #[test]
    fn test_remapped_save() {
        let index = built(&[("a", &[0]), ("ab", &[0, 1])]);
        let loaded = reload(&index, Some(&[500, 300]));
        assert_eq!(ids(&loaded, "a", MatchMode::Exact), vec![500]);
        assert_eq!(ids(&loaded, "a", MatchMode::Prefix), vec![300, 500]);
        assert_eq!(loaded.key_count(), 2);
    }

    #[test]
    fn test_japanese_keys() {
        let mut index = TrieIndex::new(Arc::new(JapaneseNormalizer));
        index.add("ねこ", &[2]).unwrap();
        index.add("ネコぜ", &[5]).unwrap();
        index.finished_adding().unwrap();
        assert_eq!(ids(&index, "ネコ", MatchMode::Prefix), vec![2, 5]);
        assert_eq!(ids(&index, "ｾﾞ", MatchMode::Suffix), vec![5]);
    }

    #[test]
    fn test_empty_index() {
        let index = built(&[]);
        assert_eq!(index.key_count(), 0);
        let loaded = reload(&index, None);
        assert!(ids(&loaded, "a", MatchMode::Prefix).is_empty());
    }

    #[test]
    fn test_corrupt_alphabet_rejected() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let mut writer = StructWriter::new(storage.create_output("bad").unwrap());
        writer.write_u8(2).unwrap();
        writer.write_u16('b' as u16).unwrap();
        writer.write_u8(0).unwrap();
        writer.write_u16('a' as u16).unwrap();
        writer.write_u8(1).unwrap();
        writer.close().unwrap();

        let mut reader = StructReader::new(storage.open_input("bad").unwrap()).unwrap();
        let mut index = TrieIndex::new(Arc::new(LowercaseNormalizer));
        let err = index
            .load(&mut reader, &RegionSource::new(storage, "bad"))
            .unwrap_err();
        assert!(err.is_format_error());
    }
}
