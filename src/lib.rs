//! # Jiten
//!
//! A compact dictionary lookup engine.
//!
//! ## Features
//!
//! - Huffman-compressed entry records
//! - Three index backends: in-memory hash, disk-resident open hash and packed trie
//! - Exact, prefix, suffix and substring matching
//! - Lazy set algebra over sorted entry IDs for multi-term queries
//! - Pluggable storage backends

pub mod cli;
pub mod compress;
pub mod dictionary;
pub mod error;
pub mod index;
pub mod search;
pub mod set;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::dictionary::{Dictionary, DictionaryBuilder, DictionaryConfig, Entry};
    pub use crate::error::{JitenError, Result};
    pub use crate::index::{Index, IndexBackend, MatchMode, Normalization};
    pub use crate::search::{SearchField, SearchFlags};
    pub use crate::set::IdStream;
    pub use crate::storage::{FileStorage, MemoryStorage, Storage, StorageConfig};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
