//! Dictionary files: entry records plus one index per field.
//!
//! A dictionary named `name` is stored as two files:
//!
//! - `name.dcwd`: header, string compressor, then the entry records. An
//!   entry's ID is the byte offset of its record in this file.
//! - `name.dcwi`: header, index count, then per index a field tag, a backend
//!   tag and the backend's region.

pub mod builder;
pub mod config;
pub mod entry;
pub mod header;
pub mod reader;
pub mod record;

pub use builder::{BuildSummary, DictionaryBuilder, leftover_temp_files};
pub use config::{DictionaryConfig, FieldIndexConfig};
pub use entry::{Entry, EntryBuilder};
pub use header::{FORMAT_VERSION, FileKind};
pub use reader::{Dictionary, DictionaryInfo, IndexInfo};
