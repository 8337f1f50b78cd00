//! Fully in-memory hash index.
//!
//! The region is a count of pairs, each a UTF-16 key followed by its ID array.
//! Loading reads everything into a map. Non-exact searches scan every key, so
//! this backend suits small key sets.

use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::error::{JitenError, Result};
use crate::index::accumulator::{KeyAccumulator, normalize_key};
use crate::index::{
    Index, IndexBackend, KeyNormalizer, MatchMode, RegionReader, RegionSource, RegionWriter,
    not_searchable, remap_ids,
};
use crate::set::{IdStream, union};

#[derive(Debug)]
pub struct MemoryHashIndex {
    normalizer: Arc<dyn KeyNormalizer>,
    accumulator: KeyAccumulator,
    entries: Option<AHashMap<String, Arc<[u32]>>>,
}

impl MemoryHashIndex {
    pub fn new(normalizer: Arc<dyn KeyNormalizer>) -> Self {
        MemoryHashIndex {
            accumulator: KeyAccumulator::new(Arc::clone(&normalizer)),
            normalizer,
            entries: None,
        }
    }

    fn entries(&self) -> Result<&AHashMap<String, Arc<[u32]>>> {
        self.entries.as_ref().ok_or_else(not_searchable)
    }
}

impl Index for MemoryHashIndex {
    fn backend(&self) -> IndexBackend {
        IndexBackend::MemoryHash
    }

    fn normalizer(&self) -> &dyn KeyNormalizer {
        self.normalizer.as_ref()
    }

    fn create_new(&mut self) {
        self.accumulator = KeyAccumulator::new(Arc::clone(&self.normalizer));
        self.entries = None;
    }

    fn add(&mut self, key: &str, ids: &[u32]) -> Result<()> {
        if self.entries.is_some() {
            return Err(JitenError::invalid_operation(
                "index is frozen; call create_new before adding keys",
            ));
        }
        self.accumulator.add(key, ids)
    }

    fn finished_adding(&mut self) -> Result<()> {
        if self.entries.is_some() {
            return Err(JitenError::invalid_operation("index is already frozen"));
        }
        self.entries = Some(self.accumulator.freeze().into_iter().collect());
        Ok(())
    }

    fn save(&self, writer: &mut RegionWriter, remap: Option<&[u32]>) -> Result<()> {
        let entries = self.entries()?;
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort_unstable();

        writer.write_count(keys.len())?;
        for key in keys {
            writer.write_utf16(key)?;
            writer.write_id_array(&remap_ids(&entries[key], remap)?)?;
        }
        debug!("saved memory hash index with {} keys", entries.len());
        Ok(())
    }

    fn load(&mut self, reader: &mut RegionReader, _source: &RegionSource) -> Result<()> {
        // Smallest pair: one-byte varint length, one unit, and an i32 count.
        let count = reader.read_count("memory hash key", 7)?;
        let mut entries = AHashMap::with_capacity(count);
        for _ in 0..count {
            let key = reader.read_utf16()?;
            let ids = reader.read_id_array()?;
            if key.is_empty() || ids.is_empty() {
                return Err(JitenError::format("empty key or id array in memory hash index"));
            }
            if entries.insert(key, Arc::from(ids)).is_some() {
                return Err(JitenError::format("duplicate key in memory hash index"));
            }
        }

        self.accumulator = KeyAccumulator::new(Arc::clone(&self.normalizer));
        self.entries = Some(entries);
        Ok(())
    }

    fn search(&self, text: &str, mode: MatchMode) -> Result<IdStream> {
        let entries = self.entries()?;
        let query = normalize_key(self.normalizer.as_ref(), text)?;

        if mode == MatchMode::Exact {
            return Ok(entries
                .get(&query)
                .map(|ids| IdStream::from_sorted(Arc::clone(ids)))
                .unwrap_or_else(IdStream::empty));
        }

        let matches = entries
            .iter()
            .filter(|(key, _)| mode.matches(key, &query))
            .map(|(_, ids)| IdStream::from_sorted(Arc::clone(ids)))
            .collect();
        Ok(union(matches))
    }

    fn key_count(&self) -> usize {
        match &self.entries {
            Some(entries) => entries.len(),
            None => self.accumulator.len(),
        }
    }
}
