//! Storage abstraction trait and common types.

use std::io::{self, Read, Seek, Write};

use crate::error::{JitenError, Result};

/// A trait for storage backends that hold dictionary files.
///
/// Dictionary files are written once and then only read, so the interface is
/// a small set of whole-file operations plus seekable streams.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a file for reading with the configured default buffer size.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Open a file for reading with an explicit read buffer size.
    ///
    /// Disk-resident indexes keep a small-buffer reader for point lookups and
    /// a large-buffer reader for full scans.
    fn open_input_with_buffer(&self, name: &str, buffer_size: usize)
    -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any existing content.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Rename a file, replacing the destination if it exists.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Create a temporary file.
    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)>;

    /// Close the storage and release resources.
    fn close(&mut self) -> Result<()>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;

    /// Close the input stream.
    fn close(&mut self) -> Result<()>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Seek + Send + std::fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Get the current position in the output stream.
    fn position(&self) -> Result<u64>;

    /// Close the output stream.
    fn close(&mut self) -> Result<()>;
}

// Implement StorageOutput for Box<dyn StorageOutput> to allow trait objects
impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn position(&self) -> Result<u64> {
        self.as_ref().position()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

// Implement StorageInput for Box<dyn StorageInput> to allow trait objects
impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Configuration for storage backends.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Buffer size for sequential I/O operations.
    pub buffer_size: usize,

    /// Read buffer for random point lookups.
    pub point_buffer_size: usize,

    /// Read buffer for full-table scans.
    pub scan_buffer_size: usize,

    /// Whether to sync writes immediately.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            buffer_size: 65536,
            point_buffer_size: 4096,
            scan_buffer_size: 65536,
            sync_writes: false,
        }
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// A backend without an underlying filesystem has no file of this name.
    FileNotFound(String),

    /// No free temporary name was found for this prefix.
    TempNamesExhausted(String),

    /// Storage is closed.
    StorageClosed,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::TempNamesExhausted(prefix) => {
                write!(f, "Could not create a temporary file for {prefix}")
            }
            StorageError::StorageClosed => write!(f, "Storage is closed"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for JitenError {
    fn from(err: StorageError) -> Self {
        match err {
            // Missing files look the same whichever backend holds them.
            StorageError::FileNotFound(_) => {
                JitenError::Io(io::Error::new(io::ErrorKind::NotFound, err.to_string()))
            }
            other => JitenError::storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();

        assert_eq!(config.buffer_size, 65536);
        assert!(config.point_buffer_size < config.scan_buffer_size);
        assert!(!config.sync_writes);
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("words.dcwd".to_string());
        assert_eq!(err.to_string(), "File not found: words.dcwd");

        let err = StorageError::TempNamesExhausted("words.dcwd".to_string());
        assert_eq!(
            err.to_string(),
            "Could not create a temporary file for words.dcwd"
        );

        let err = StorageError::StorageClosed;
        assert_eq!(err.to_string(), "Storage is closed");

        let converted: JitenError = StorageError::StorageClosed.into();
        assert_eq!(converted.to_string(), "Storage error: Storage is closed");
    }

    #[test]
    fn test_missing_file_converts_to_not_found() {
        let converted: JitenError = StorageError::FileNotFound("words.dcwd".to_string()).into();
        match converted {
            JitenError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert!(e.to_string().contains("words.dcwd"));
            }
            other => panic!("expected I/O error, got {other:?}"),
        }
    }
}
