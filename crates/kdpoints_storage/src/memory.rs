//! In-memory directory for testing.

use crate::directory::{check_range, validate_name, Directory, IndexInput, IndexOutput};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

type FileBuffer = Arc<RwLock<Vec<u8>>>;

/// An in-memory directory.
///
/// This directory keeps every file in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral segments that don't need persistence
///
/// Clones share the same files.
///
/// # Example
///
/// ```rust
/// use kdpoints_storage::{Directory, MemoryDirectory};
///
/// let dir = MemoryDirectory::new();
/// let mut out = dir.create_output("_0.kdm").unwrap();
/// assert_eq!(out.write_bytes(b"test data").unwrap(), 0);
/// drop(out);
/// assert_eq!(dir.open_input("_0.kdm").unwrap().len(), 9);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    files: Arc<RwLock<BTreeMap<String, FileBuffer>>>,
}

impl MemoryDirectory {
    /// Creates a new empty in-memory directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a file's bytes.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn file_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.files.read().get(name).map(|buf| buf.read().clone())
    }

    /// Replaces (or creates) a file with the given bytes.
    ///
    /// Useful for simulating corruption.
    pub fn replace_file(&self, name: &str, data: Vec<u8>) {
        self.files
            .write()
            .insert(name.to_string(), Arc::new(RwLock::new(data)));
    }

    /// Returns the total number of bytes held by all files.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files
            .read()
            .values()
            .map(|buf| buf.read().len() as u64)
            .sum()
    }
}

impl Directory for MemoryDirectory {
    fn create_output(&self, name: &str) -> StorageResult<Box<dyn IndexOutput>> {
        validate_name(name)?;
        let mut files = self.files.write();
        if files.contains_key(name) {
            return Err(StorageError::already_exists(name));
        }
        let buffer: FileBuffer = Arc::default();
        files.insert(name.to_string(), Arc::clone(&buffer));

        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer,
        }))
    }

    fn open_input(&self, name: &str) -> StorageResult<Arc<dyn IndexInput>> {
        validate_name(name)?;
        let files = self.files.read();
        let buffer = files.get(name).ok_or_else(|| StorageError::not_found(name))?;
        let data: Arc<[u8]> = Arc::from(buffer.read().as_slice());

        Ok(Arc::new(MemoryInput {
            name: name.to_string(),
            data,
        }))
    }

    fn delete_file(&self, name: &str) -> StorageResult<()> {
        self.files
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(name))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn list_all(&self) -> StorageResult<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }
}

#[derive(Debug)]
struct MemoryOutput {
    name: String,
    buffer: FileBuffer,
}

impl IndexOutput for MemoryOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_bytes(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut buffer = self.buffer.write();
        let offset = buffer.len() as u64;
        buffer.extend_from_slice(data);
        Ok(offset)
    }

    fn position(&self) -> u64 {
        self.buffer.read().len() as u64
    }

    fn flush(&mut self) -> StorageResult<()> {
        // Nothing is buffered outside the shared file
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

/// Snapshot of a file taken when it was opened.
#[derive(Debug)]
struct MemoryInput {
    name: String,
    data: Arc<[u8]>,
}

impl IndexInput for MemoryInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        check_range(&self.name, offset, len, self.data.len() as u64)?;
        let start = offset as usize;
        Ok(self.data[start..start + len].to_vec())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}
