//! Directory and file handle traits.

use crate::error::{StorageError, StorageResult};
use std::sync::Arc;

/// A write-once output file.
///
/// Bytes are appended front to back. Once the handle is dropped the file
/// is never written again.
///
/// # Invariants
///
/// - `write_bytes` returns the offset where the bytes landed
/// - `position` is the offset of the next write (the bytes written so far)
/// - `sync` makes every written byte durable
pub trait IndexOutput: Send {
    /// Returns the file name this output writes to.
    fn name(&self) -> &str;

    /// Appends bytes to the file, returning the offset they were written at.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_bytes(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Returns the number of bytes written so far.
    fn position(&self) -> u64;

    /// Pushes pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;
}

/// A read-only view of a sealed file.
///
/// Inputs are shared between readers and must be `Send + Sync`.
pub trait IndexInput: Send + Sync + std::fmt::Debug {
    /// Returns the file name this input reads from.
    fn name(&self) -> &str;

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if the range extends beyond the
    /// file, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Returns the length of the file in bytes.
    fn len(&self) -> u64;

    /// Returns true if the file is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let len = usize::try_from(self.len()).map_err(|_| StorageError::ReadPastEnd {
            name: self.name().to_string(),
            offset: 0,
            len: usize::MAX,
            size: self.len(),
        })?;
        self.read_at(0, len)
    }
}

/// A flat namespace of segment files.
///
/// # Implementors
///
/// - [`super::MemoryDirectory`] - For testing
/// - [`super::FsDirectory`] - For persistent storage
pub trait Directory: Send + Sync + std::fmt::Debug {
    /// Creates a new write-once output.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if the name is taken, or an
    /// I/O error if the file cannot be allocated.
    fn create_output(&self, name: &str) -> StorageResult<Box<dyn IndexOutput>>;

    /// Opens an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist.
    fn open_input(&self, name: &str) -> StorageResult<Arc<dyn IndexInput>>;

    /// Deletes a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist.
    fn delete_file(&self, name: &str) -> StorageResult<()>;

    /// Returns true if a file with this name exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Lists all file names, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    fn list_all(&self) -> StorageResult<Vec<String>>;
}

/// Rejects names that would escape a flat directory.
pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".."
    {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Checks a read range against a file size.
pub(crate) fn check_range(name: &str, offset: u64, len: usize, size: u64) -> StorageResult<()> {
    let end = offset.saturating_add(len as u64);
    if offset > size || end > size {
        return Err(StorageError::ReadPastEnd {
            name: name.to_string(),
            offset,
            len,
            size,
        });
    }
    Ok(())
}
