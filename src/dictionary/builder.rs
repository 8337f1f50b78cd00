//! Building the word data and word index files of a dictionary.

use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::compress::StringCompressor;
use crate::dictionary::config::DictionaryConfig;
use crate::dictionary::entry::Entry;
use crate::dictionary::header::{FileKind, write_header};
use crate::dictionary::record::write_record;
use crate::error::{JitenError, Result};
use crate::index::{Index, RegionWriter};
use crate::search::SearchField;
use crate::storage::{Storage, StructWriter};

/// Summary of a finished build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub entry_count: usize,
    pub data_bytes: u64,
    pub index_bytes: u64,
    pub alphabet_size: usize,
    /// Distinct keys per field index.
    pub key_counts: Vec<(SearchField, usize)>,
}

/// Collects entries and writes them out as a dictionary.
#[derive(Debug)]
pub struct DictionaryBuilder {
    config: DictionaryConfig,
    entries: Vec<Entry>,
}

impl DictionaryBuilder {
    pub fn new(config: DictionaryConfig) -> Self {
        DictionaryBuilder {
            config,
            entries: Vec::new(),
        }
    }

    /// Queue an entry. Entries keep the order they are added in.
    pub fn add_entry(&mut self, entry: Entry) -> Result<()> {
        if entry.is_empty() {
            return Err(JitenError::invalid_argument(
                "entry has no headword, reading or meaning",
            ));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Write `<name>.dcwd` and `<name>.dcwi` into `storage`.
    ///
    /// Both files are written under temporary names and only renamed into
    /// place once both are complete.
    pub fn build(&self, storage: &dyn Storage, name: &str) -> Result<BuildSummary> {
        let start = Instant::now();
        let mut temp_files = Vec::new();
        let result = self.build_into(storage, name, &mut temp_files);

        match result {
            Ok(summary) => {
                for (placed, (temp_name, kind)) in temp_files.iter().enumerate() {
                    if let Err(e) = storage.rename_file(temp_name, &kind.file_name(name)) {
                        // A new data file next to an old index would resolve
                        // IDs against the wrong records.
                        for (_, kind) in &temp_files[..placed] {
                            remove_quietly(storage, &kind.file_name(name));
                        }
                        for (temp_name, _) in &temp_files[placed..] {
                            remove_quietly(storage, temp_name);
                        }
                        warn!("failed to move dictionary {name} into place: {e}");
                        return Err(e);
                    }
                }
                info!(
                    "built dictionary {name}: {} entries, {} data bytes, {} index bytes in {:?}",
                    summary.entry_count,
                    summary.data_bytes,
                    summary.index_bytes,
                    start.elapsed()
                );
                Ok(summary)
            }
            Err(e) => {
                for (temp_name, _) in &temp_files {
                    remove_quietly(storage, temp_name);
                }
                Err(e)
            }
        }
    }

    fn build_into(
        &self,
        storage: &dyn Storage,
        name: &str,
        temp_files: &mut Vec<(String, FileKind)>,
    ) -> Result<BuildSummary> {
        let compressor = self.build_compressor()?;

        // Word data: header, compressor, then one record per entry.
        let (data_name, output) = storage.create_temp_output(&FileKind::WordData.file_name(name))?;
        temp_files.push((data_name, FileKind::WordData));
        let mut writer: RegionWriter = StructWriter::new(output);
        write_header(&mut writer, FileKind::WordData)?;
        compressor.save(&mut writer)?;

        let mut offsets = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let offset = u32::try_from(writer.position()).map_err(|_| {
                JitenError::invalid_operation("word data file exceeds 4 GiB of records")
            })?;
            offsets.push(offset);
            write_record(&mut writer, &compressor, entry)?;
        }
        let data_bytes = writer.position();
        writer.close()?;
        debug!("wrote {} records in {data_bytes} bytes", offsets.len());

        // Word index: header, index count, then one tagged region per field.
        let indexes = self.build_indexes()?;
        let (index_name, output) =
            storage.create_temp_output(&FileKind::WordIndex.file_name(name))?;
        temp_files.push((index_name, FileKind::WordIndex));
        let mut writer: RegionWriter = StructWriter::new(output);
        write_header(&mut writer, FileKind::WordIndex)?;
        writer.write_u8(indexes.len() as u8)?;
        for (field, index) in &indexes {
            let start = writer.position();
            writer.write_u8(field.code())?;
            writer.write_u8(index.backend().code())?;
            index.save(&mut writer, Some(offsets.as_slice()))?;
            debug!(
                "saved {} index ({}) with {} keys in {} bytes",
                field.name(),
                index.backend().name(),
                index.key_count(),
                writer.position() - start
            );
        }
        let index_bytes = writer.position();
        writer.close()?;

        Ok(BuildSummary {
            entry_count: self.entries.len(),
            data_bytes,
            index_bytes,
            alphabet_size: compressor.alphabet_size(),
            key_counts: indexes
                .iter()
                .map(|(field, index)| (*field, index.key_count()))
                .collect(),
        })
    }

    fn build_compressor(&self) -> Result<StringCompressor> {
        let mut compressor = StringCompressor::new();
        for text in self.entries.iter().flat_map(Entry::strings) {
            compressor.add_string(Some(text))?;
        }
        compressor.finished_adding()?;
        debug!(
            "string compressor: {} symbols, {} tree words",
            compressor.alphabet_size(),
            compressor.tree_word_count()
        );
        Ok(compressor)
    }

    /// One frozen index per field, keyed by entry ordinal.
    fn build_indexes(&self) -> Result<Vec<(SearchField, Box<dyn Index>)>> {
        let mut indexes = Vec::with_capacity(SearchField::ALL.len());
        for field in SearchField::ALL {
            let settings = self.config.field(field);
            let mut index = settings.backend.create(settings.normalization.normalizer());

            for (ordinal, entry) in self.entries.iter().enumerate() {
                let ids = [ordinal as u32];
                for key in index_keys(field, entry) {
                    if index.normalizer().normalize(key).is_empty() {
                        debug!("skipping {} key {key:?}: empty once normalized", field.name());
                        continue;
                    }
                    index.add(key, &ids)?;
                }
            }
            index.finished_adding()?;
            indexes.push((field, index));
        }
        Ok(indexes)
    }
}

fn remove_quietly(storage: &dyn Storage, file_name: &str) {
    if let Err(e) = storage.delete_file(file_name) {
        warn!("failed to remove {file_name}: {e}");
    }
}

/// Temporary files of an interrupted build of dictionary `name`.
pub fn leftover_temp_files(storage: &dyn Storage, name: &str) -> Result<Vec<String>> {
    let prefixes: Vec<String> = [FileKind::WordData, FileKind::WordIndex]
        .iter()
        .map(|kind| format!("{}_", kind.file_name(name)))
        .collect();
    Ok(storage
        .list_files()?
        .into_iter()
        .filter(|file| file.ends_with(".tmp") && prefixes.iter().any(|p| file.starts_with(p)))
        .collect())
}

/// Keys an entry contributes to `field`. Meanings are indexed whole and
/// word by word.
fn index_keys(field: SearchField, entry: &Entry) -> Vec<&str> {
    let strings = entry.field(field);
    if field != SearchField::Meaning {
        return strings.iter().map(String::as_str).collect();
    }

    let mut keys = Vec::new();
    for gloss in strings {
        keys.push(gloss.as_str());
        let words: Vec<&str> = gloss.unicode_words().collect();
        if words.len() > 1 {
            keys.extend(words);
        }
    }
    keys
}
