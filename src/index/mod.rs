//! Key to entry-ID indexes.
//!
//! Every backend follows the same two-phase life cycle. During accumulation
//! keys are added with [`Index::add`]; [`Index::finished_adding`] freezes them
//! and makes the index searchable in memory. A frozen index can be written
//! with [`Index::save`], and a saved region can be read back with
//! [`Index::load`] into a fresh instance of the same backend.

pub mod accumulator;
pub mod disk_hash;
pub mod memory_hash;
pub mod normalize;
pub mod trie;

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{JitenError, Result};
use crate::set::IdStream;
use crate::storage::{Storage, StorageConfig, StorageInput, StorageOutput, StructReader, StructWriter};

pub use accumulator::KeyAccumulator;
pub use disk_hash::DiskHashIndex;
pub use memory_hash::MemoryHashIndex;
pub use normalize::{JapaneseNormalizer, KeyNormalizer, LowercaseNormalizer, Normalization};
pub use trie::TrieIndex;

/// How a query key is compared against index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Key equals the query.
    Exact,
    /// Key starts with the query.
    Prefix,
    /// Key ends with the query.
    Suffix,
    /// Key contains the query.
    Substring,
}

/// Storage layout of an index region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    MemoryHash,
    DiskHash,
    Trie,
}

impl IndexBackend {
    /// Tag byte stored in index files.
    pub fn code(self) -> u8 {
        match self {
            IndexBackend::MemoryHash => 0,
            IndexBackend::DiskHash => 1,
            IndexBackend::Trie => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(IndexBackend::MemoryHash),
            1 => Ok(IndexBackend::DiskHash),
            2 => Ok(IndexBackend::Trie),
            other => Err(JitenError::format(format!("unknown index backend {other}"))),
        }
    }

    /// Create an empty index of this backend.
    pub fn create(self, normalizer: Arc<dyn KeyNormalizer>) -> Box<dyn Index> {
        match self {
            IndexBackend::MemoryHash => Box::new(MemoryHashIndex::new(normalizer)),
            IndexBackend::DiskHash => Box::new(DiskHashIndex::new(normalizer)),
            IndexBackend::Trie => Box::new(TrieIndex::new(normalizer)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexBackend::MemoryHash => "memory_hash",
            IndexBackend::DiskHash => "disk_hash",
            IndexBackend::Trie => "trie",
        }
    }
}

/// Where a region being loaded lives, for backends that keep reading the
/// file after [`Index::load`] returns.
#[derive(Debug, Clone)]
pub struct RegionSource {
    pub storage: Arc<dyn Storage>,
    pub file_name: String,
    pub point_buffer_size: usize,
    pub scan_buffer_size: usize,
}

impl RegionSource {
    pub fn new(storage: Arc<dyn Storage>, file_name: impl Into<String>) -> Self {
        let defaults = StorageConfig::default();
        RegionSource {
            storage,
            file_name: file_name.into(),
            point_buffer_size: defaults.point_buffer_size,
            scan_buffer_size: defaults.scan_buffer_size,
        }
    }

    /// Override the reader buffer sizes.
    pub fn with_buffers(mut self, config: &StorageConfig) -> Self {
        self.point_buffer_size = config.point_buffer_size;
        self.scan_buffer_size = config.scan_buffer_size;
        self
    }

    pub(crate) fn open_point_reader(&self) -> Result<Box<dyn StorageInput>> {
        self.storage
            .open_input_with_buffer(&self.file_name, self.point_buffer_size)
    }

    pub(crate) fn open_scan_reader(&self) -> Result<Box<dyn StorageInput>> {
        self.storage
            .open_input_with_buffer(&self.file_name, self.scan_buffer_size)
    }
}

/// Writer type every index region is saved through.
pub type RegionWriter = StructWriter<Box<dyn StorageOutput>>;

/// Reader type every index region is loaded through.
pub type RegionReader = StructReader<Box<dyn StorageInput>>;

/// A normalized key to sorted ID set map.
pub trait Index: Send + Sync + Debug {
    /// The backend this index writes.
    fn backend(&self) -> IndexBackend;

    /// Normalizer applied to keys and queries.
    fn normalizer(&self) -> &dyn KeyNormalizer;

    /// Drop all keys and any loaded region and start accumulating.
    fn create_new(&mut self);

    /// Add sorted, duplicate-free `ids` under `key`, merging with any IDs
    /// already stored for the normalized key.
    fn add(&mut self, key: &str, ids: &[u32]) -> Result<()>;

    /// Freeze the accumulated keys. The index becomes searchable.
    fn finished_adding(&mut self) -> Result<()>;

    /// Write the region. With `remap`, every stored ID `i` is written as
    /// `remap[i]`.
    fn save(&self, writer: &mut RegionWriter, remap: Option<&[u32]>) -> Result<()>;

    /// Read a region written by [`Index::save`], leaving `reader` just past it.
    fn load(&mut self, reader: &mut RegionReader, source: &RegionSource) -> Result<()>;

    /// Find the IDs of keys matching `text` under `mode`.
    fn search(&self, text: &str, mode: MatchMode) -> Result<IdStream>;

    /// Number of distinct keys.
    fn key_count(&self) -> usize;
}

/// Apply an ordinal to ID remapping, keeping the result sorted.
pub fn remap_ids(ids: &[u32], remap: Option<&[u32]>) -> Result<Vec<u32>> {
    let Some(remap) = remap else {
        return Ok(ids.to_vec());
    };

    let mut mapped = Vec::with_capacity(ids.len());
    for &id in ids {
        let target = remap.get(id as usize).copied().ok_or_else(|| {
            JitenError::invalid_argument(format!("id {id} is outside the remap table"))
        })?;
        mapped.push(target);
    }
    mapped.sort_unstable();
    mapped.dedup();
    Ok(mapped)
}

impl MatchMode {
    /// Whether `key` matches `query` under this mode.
    pub fn matches(self, key: &str, query: &str) -> bool {
        match self {
            MatchMode::Exact => key == query,
            MatchMode::Prefix => key.starts_with(query),
            MatchMode::Suffix => key.ends_with(query),
            MatchMode::Substring => key.contains(query),
        }
    }
}

fn not_searchable() -> JitenError {
    JitenError::invalid_operation("index searched before finished_adding or load")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_codes() {
        for backend in [IndexBackend::MemoryHash, IndexBackend::DiskHash, IndexBackend::Trie] {
            assert_eq!(IndexBackend::from_code(backend.code()).unwrap(), backend);
        }
        assert!(IndexBackend::from_code(9).unwrap_err().is_format_error());
    }

    #[test]
    fn test_match_modes() {
        assert!(MatchMode::Exact.matches("猫", "猫"));
        assert!(!MatchMode::Exact.matches("猫背", "猫"));
        assert!(MatchMode::Prefix.matches("猫背", "猫"));
        assert!(MatchMode::Suffix.matches("猫背", "背"));
        assert!(MatchMode::Substring.matches("testing", "sti"));
        assert!(!MatchMode::Suffix.matches("猫背", "猫"));
    }

    #[test]
    fn test_remap_ids() {
        let remap = [100, 50, 300];
        assert_eq!(remap_ids(&[0, 1, 2], Some(&remap)).unwrap(), vec![50, 100, 300]);
        assert_eq!(remap_ids(&[2], None).unwrap(), vec![2]);
        assert!(remap_ids(&[3], Some(&remap)).is_err());
    }
}
