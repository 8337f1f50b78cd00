//! In-memory storage implementation for testing and ephemeral dictionaries.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{JitenError, Result};
use crate::storage::traits::{Storage, StorageConfig, StorageError, StorageInput, StorageOutput};

type FileMap = Arc<Mutex<HashMap<String, Arc<[u8]>>>>;

/// An in-memory storage implementation.
///
/// Finalized files are shared as `Arc<[u8]>`, so opening many readers over the
/// same file does not copy it.
#[derive(Debug)]
pub struct MemoryStorage {
    files: FileMap,
    config: StorageConfig,
    closed: bool,
}

impl MemoryStorage {
    /// Create a new memory storage.
    pub fn new(config: StorageConfig) -> Self {
        MemoryStorage {
            files: Arc::new(Mutex::new(HashMap::new())),
            config,
            closed: false,
        }
    }

    /// The storage configuration. `buffer_size` is the initial capacity of
    /// every output.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Create a new memory storage with default configuration.
    pub fn new_default() -> Self {
        Self::new(StorageConfig::default())
    }

    /// Check if the storage is closed.
    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(StorageError::StorageClosed.into())
        } else {
            Ok(())
        }
    }

    fn lock_files(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<[u8]>>>> {
        lock(&self.files)
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> Result<usize> {
        Ok(self.lock_files()?.len())
    }

    /// Replace the raw bytes of a file.
    pub fn put_file(&self, name: &str, data: Vec<u8>) -> Result<()> {
        self.check_closed()?;
        self.lock_files()?.insert(name.to_string(), Arc::from(data));
        Ok(())
    }

    /// Copy out the raw bytes of a file.
    pub fn file_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let files = self.lock_files()?;
        files
            .get(name)
            .map(|data| data.to_vec())
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()).into())
    }
}

fn lock(files: &FileMap) -> Result<MutexGuard<'_, HashMap<String, Arc<[u8]>>>> {
    files
        .lock()
        .map_err(|_| JitenError::storage("memory storage lock poisoned"))
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.check_closed()?;

        let files = self.lock_files()?;
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(Box::new(MemoryInput::new(Arc::clone(data))))
    }

    fn open_input_with_buffer(
        &self,
        name: &str,
        _buffer_size: usize,
    ) -> Result<Box<dyn StorageInput>> {
        self.open_input(name)
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.check_closed()?;

        Ok(Box::new(MemoryOutput::new(
            name.to_string(),
            Arc::clone(&self.files),
            self.config.buffer_size,
        )))
    }

    fn file_exists(&self, name: &str) -> bool {
        if self.closed {
            return false;
        }

        self.lock_files()
            .map(|files| files.contains_key(name))
            .unwrap_or(false)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.check_closed()?;
        self.lock_files()?.remove(name);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.check_closed()?;

        let files = self.lock_files()?;
        let mut file_names: Vec<String> = files.keys().cloned().collect();
        file_names.sort();
        Ok(file_names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.check_closed()?;

        let files = self.lock_files()?;
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(data.len() as u64)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.check_closed()?;

        let mut files = self.lock_files()?;
        let data = files
            .remove(old_name)
            .ok_or_else(|| StorageError::FileNotFound(old_name.to_string()))?;

        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn create_temp_output(&self, prefix: &str) -> Result<(String, Box<dyn StorageOutput>)> {
        self.check_closed()?;

        let mut counter = 0;
        let mut temp_name;

        loop {
            temp_name = format!("{prefix}_{counter}.tmp");
            if !self.file_exists(&temp_name) {
                break;
            }
            counter += 1;

            if counter > 10000 {
                return Err(StorageError::TempNamesExhausted(prefix.to_string()).into());
            }
        }

        // Reserve the name so a second temp output does not reuse it
        self.lock_files()?.insert(temp_name.clone(), Arc::from(Vec::new()));

        let output = self.create_output(&temp_name)?;
        Ok((temp_name, output))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// A memory-based input implementation.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<Arc<[u8]>>,
    size: u64,
}

impl MemoryInput {
    fn new(data: Arc<[u8]>) -> Self {
        let size = data.len() as u64;
        MemoryInput {
            cursor: Cursor::new(data),
            size,
        }
    }
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A memory-based output implementation.
///
/// Bytes are published to the owning storage on `close` (or drop).
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    cursor: Cursor<Vec<u8>>,
    files: FileMap,
    closed: bool,
}

impl MemoryOutput {
    fn new(name: String, files: FileMap, capacity: usize) -> Self {
        MemoryOutput {
            name,
            cursor: Cursor::new(Vec::with_capacity(capacity)),
            files,
            closed: false,
        }
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }

        self.cursor.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryOutput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }

        self.cursor.seek(pos)
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.cursor.position())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            let data: Arc<[u8]> = Arc::from(self.cursor.get_ref().as_slice());
            lock(&self.files)?.insert(self.name.clone(), data);
            self.closed = true;
        }
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        // Ensure the file is stored when the output is dropped
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new_default();

        let mut output = storage.create_output("test.bin").unwrap();
        output.write_all(b"Hello, Memory!").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("test.bin").unwrap();
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();

        assert_eq!(buffer, b"Hello, Memory!");
        assert_eq!(storage.file_count().unwrap(), 1);
    }

    #[test]
    fn test_seek_back_overwrites() {
        let storage = MemoryStorage::new_default();

        let mut output = storage.create_output("patch.bin").unwrap();
        output.write_all(&[1, 2, 3, 4]).unwrap();
        output.seek(SeekFrom::Start(1)).unwrap();
        output.write_all(&[9]).unwrap();
        assert_eq!(output.position().unwrap(), 2);
        output.seek(SeekFrom::End(0)).unwrap();
        output.write_all(&[5]).unwrap();
        output.close().unwrap();

        assert_eq!(storage.file_bytes("patch.bin").unwrap(), vec![1, 9, 3, 4, 5]);
    }

    #[test]
    fn test_rename_and_delete() {
        let storage = MemoryStorage::new_default();

        let (temp_name, mut output) = storage.create_temp_output("words").unwrap();
        output.write_all(b"data").unwrap();
        output.close().unwrap();

        storage.rename_file(&temp_name, "words.dcwd").unwrap();
        assert!(!storage.file_exists(&temp_name));
        assert_eq!(storage.file_size("words.dcwd").unwrap(), 4);

        storage.delete_file("words.dcwd").unwrap();
        assert!(!storage.file_exists("words.dcwd"));
        assert!(storage.open_input("words.dcwd").is_err());
    }

    #[test]
    fn test_outputs_start_with_configured_capacity() {
        let config = StorageConfig {
            buffer_size: 128,
            ..StorageConfig::default()
        };
        let storage = MemoryStorage::new(config);
        assert_eq!(storage.config().buffer_size, 128);

        let output = MemoryOutput::new("sized.bin".to_string(), Arc::clone(&storage.files), 128);
        assert!(output.cursor.get_ref().capacity() >= 128);
    }

    #[test]
    fn test_dropped_output_is_published() {
        let storage = MemoryStorage::new_default();
        {
            let mut output = storage.create_output("dropped.bin").unwrap();
            output.write_all(&[42]).unwrap();
        }
        assert_eq!(storage.file_bytes("dropped.bin").unwrap(), vec![42]);
    }
}
