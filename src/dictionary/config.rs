//! Dictionary configuration: the index layout used for each field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{JitenError, Result};
use crate::index::{IndexBackend, Normalization};
use crate::search::SearchField;

/// Backend and normalization rule for one field's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIndexConfig {
    pub backend: IndexBackend,
    pub normalization: Normalization,
}

impl FieldIndexConfig {
    pub fn new(backend: IndexBackend, normalization: Normalization) -> Self {
        FieldIndexConfig {
            backend,
            normalization,
        }
    }
}

/// Configuration for building and opening a dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Index for headwords.
    pub headword: FieldIndexConfig,

    /// Index for readings.
    pub reading: FieldIndexConfig,

    /// Index for meaning words and whole glosses.
    pub meaning: FieldIndexConfig,

    /// Check the CRC32 trailers of both files when opening.
    pub verify_checksum_on_open: bool,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        DictionaryConfig {
            headword: FieldIndexConfig::new(IndexBackend::DiskHash, Normalization::Japanese),
            reading: FieldIndexConfig::new(IndexBackend::Trie, Normalization::Japanese),
            meaning: FieldIndexConfig::new(IndexBackend::DiskHash, Normalization::Lowercase),
            verify_checksum_on_open: false,
        }
    }
}

impl DictionaryConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            JitenError::storage(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// The index settings for `field`.
    pub fn field(&self, field: SearchField) -> FieldIndexConfig {
        match field {
            SearchField::Headword => self.headword,
            SearchField::Reading => self.reading,
            SearchField::Meaning => self.meaning,
        }
    }
}
