//! Opening and querying a built dictionary.

use std::sync::{Arc, Mutex};

use log::{debug, info};
use serde::Serialize;

use crate::compress::StringCompressor;
use crate::dictionary::config::DictionaryConfig;
use crate::dictionary::entry::Entry;
use crate::dictionary::header::{FileKind, read_header};
use crate::dictionary::record::read_record;
use crate::error::{JitenError, Result};
use crate::index::{Index, IndexBackend, RegionReader, RegionSource};
use crate::search::{SearchField, SearchFlags, SearchStrategy};
use crate::set::IdStream;
use crate::storage::{CHECKSUM_TRAILER_LEN, Storage, StructReader, verify_checksum};

/// A loaded dictionary: its string compressor, entry records and one index
/// per field.
#[derive(Debug)]
pub struct Dictionary {
    name: String,
    compressor: StringCompressor,
    data: Mutex<RegionReader>,
    /// First byte of the first record.
    records_start: u64,
    /// One past the last record byte.
    records_end: u64,
    indexes: Vec<(SearchField, Box<dyn Index>)>,
}

/// Shape of one loaded field index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub field: SearchField,
    pub backend: IndexBackend,
    pub key_count: usize,
}

/// Description of a dictionary's files.
#[derive(Debug, Clone, Serialize)]
pub struct DictionaryInfo {
    pub name: String,
    pub data_bytes: u64,
    pub index_bytes: u64,
    pub data_checksum_ok: bool,
    pub index_checksum_ok: bool,
    pub alphabet_size: usize,
    pub indexes: Vec<IndexInfo>,
}

impl Dictionary {
    /// Open the `name` dictionary in `storage`.
    ///
    /// The index backends come from the index file. Normalization rules and
    /// checksum verification come from `config`.
    pub fn open(storage: Arc<dyn Storage>, name: &str, config: &DictionaryConfig) -> Result<Self> {
        let data_name = FileKind::WordData.file_name(name);
        let index_name = FileKind::WordIndex.file_name(name);

        if config.verify_checksum_on_open {
            for file_name in [&data_name, &index_name] {
                if !verify_checksum(storage.as_ref(), file_name)? {
                    return Err(JitenError::format(format!(
                        "checksum mismatch in {file_name}"
                    )));
                }
            }
            debug!("checksums verified for {name}");
        }

        let mut data = StructReader::new(storage.open_input(&data_name)?)?;
        read_header(&mut data, FileKind::WordData)?;
        let mut compressor = StringCompressor::new();
        compressor.load(&mut data)?;
        let records_start = data.position();
        let records_end = data.size().saturating_sub(CHECKSUM_TRAILER_LEN);

        let indexes = Self::load_indexes(storage, &index_name, config)?;

        info!(
            "opened dictionary {name}: {} record bytes, {} indexes",
            records_end.saturating_sub(records_start),
            indexes.len()
        );
        Ok(Dictionary {
            name: name.to_string(),
            compressor,
            data: Mutex::new(data),
            records_start,
            records_end,
            indexes,
        })
    }

    fn load_indexes(
        storage: Arc<dyn Storage>,
        index_name: &str,
        config: &DictionaryConfig,
    ) -> Result<Vec<(SearchField, Box<dyn Index>)>> {
        let mut reader = StructReader::new(storage.open_input(index_name)?)?;
        read_header(&mut reader, FileKind::WordIndex)?;
        let source = RegionSource::new(storage, index_name);

        let count = reader.read_u8()?;
        let mut indexes: Vec<(SearchField, Box<dyn Index>)> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let field = SearchField::from_code(reader.read_u8()?)?;
            let backend = IndexBackend::from_code(reader.read_u8()?)?;
            if indexes.iter().any(|(existing, _)| *existing == field) {
                return Err(JitenError::format(format!(
                    "index file has two {} indexes",
                    field.name()
                )));
            }

            let settings = config.field(field);
            if settings.backend != backend {
                debug!(
                    "{} index stored as {}, configured as {}",
                    field.name(),
                    backend.name(),
                    settings.backend.name()
                );
            }
            let mut index = backend.create(settings.normalization.normalizer());
            index.load(&mut reader, &source)?;
            indexes.push((field, index));
        }

        if reader.remaining() != 0 {
            return Err(JitenError::format(format!(
                "{} unexpected bytes after the last index",
                reader.remaining()
            )));
        }
        Ok(indexes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index loaded for `field`, if any.
    pub fn index(&self, field: SearchField) -> Option<&dyn Index> {
        self.indexes
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, index)| index.as_ref())
    }

    /// Search with a query such as `猫 -猫背` or `"cat's back"`.
    ///
    /// The returned stream is lazy; no index work beyond the lookups themselves
    /// happens until it is pulled.
    pub fn search(&self, query: &str, flags: SearchFlags) -> Result<IdStream> {
        let strategy = self
            .indexes
            .iter()
            .fold(SearchStrategy::new(), |strategy, (field, index)| {
                strategy.with_index(*field, index.as_ref())
            });
        strategy.search(query, flags)
    }

    /// Search and resolve at most `limit` matching entries.
    pub fn search_entries(
        &self,
        query: &str,
        flags: SearchFlags,
        limit: usize,
    ) -> Result<Vec<(u32, Entry)>> {
        let mut entries = Vec::new();
        for id in self.search(query, flags)?.take(limit) {
            entries.push((id, self.get_entry_by_id(id)?));
        }
        Ok(entries)
    }

    /// Read the entry whose record starts at `id`.
    pub fn get_entry_by_id(&self, id: u32) -> Result<Entry> {
        let offset = id as u64;
        if offset < self.records_start || offset >= self.records_end {
            return Err(JitenError::invalid_argument(format!(
                "entry id {id} is outside the record region"
            )));
        }

        let mut data = self
            .data
            .lock()
            .map_err(|_| JitenError::storage("record reader lock poisoned"))?;
        data.seek_to(offset)?;
        read_record(&mut data, &self.compressor)
    }

    /// Sizes, checksum state and index shapes of the dictionary.
    pub fn info(&self, storage: &dyn Storage) -> Result<DictionaryInfo> {
        let data_name = FileKind::WordData.file_name(&self.name);
        let index_name = FileKind::WordIndex.file_name(&self.name);
        Ok(DictionaryInfo {
            name: self.name.clone(),
            data_bytes: storage.file_size(&data_name)?,
            index_bytes: storage.file_size(&index_name)?,
            data_checksum_ok: verify_checksum(storage, &data_name)?,
            index_checksum_ok: verify_checksum(storage, &index_name)?,
            alphabet_size: self.compressor.alphabet_size(),
            indexes: self
                .indexes
                .iter()
                .map(|(field, index)| IndexInfo {
                    field: *field,
                    backend: index.backend(),
                    key_count: index.key_count(),
                })
                .collect(),
        })
    }
}
