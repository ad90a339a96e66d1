//! File-system directory for persistent segments.

use crate::directory::{check_range, validate_name, Directory, IndexInput, IndexOutput};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A directory backed by a folder on disk.
///
/// # Durability
///
/// - `IndexOutput::flush()` calls `File::flush()` to push data to the OS
/// - `IndexOutput::sync()` calls `File::sync_all()` to ensure data is on disk
/// - [`FsDirectory::sync_dir`] makes newly created names durable
///
/// # Example
///
/// ```no_run
/// use kdpoints_storage::{Directory, FsDirectory};
/// use std::path::Path;
///
/// let dir = FsDirectory::open(Path::new("index")).unwrap();
/// let mut out = dir.create_output("_0.kdm").unwrap();
/// out.write_bytes(b"persistent data").unwrap();
/// out.sync().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FsDirectory {
    path: PathBuf,
}

impl FsDirectory {
    /// Opens a directory, creating it (and its parents) if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the path
    /// exists but is not a directory.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Returns the path to the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syncs the directory entry itself so created files survive a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or synced.
    pub fn sync_dir(&self) -> StorageResult<()> {
        #[cfg(unix)]
        {
            File::open(&self.path)?.sync_all()?;
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.path.join(name))
    }
}

impl Directory for FsDirectory {
    fn create_output(&self, name: &str) -> StorageResult<Box<dyn IndexOutput>> {
        let path = self.resolve(name)?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => StorageError::already_exists(name),
                _ => StorageError::Io(e),
            })?;

        tracing::trace!(file = name, "created output");
        Ok(Box::new(FsOutput {
            name: name.to_string(),
            file,
            position: 0,
        }))
    }

    fn open_input(&self, name: &str) -> StorageResult<Arc<dyn IndexInput>> {
        let path = self.resolve(name)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::not_found(name),
            _ => StorageError::Io(e),
        })?;
        let size = file.metadata()?.len();

        Ok(Arc::new(FsInput {
            name: name.to_string(),
            file: RwLock::new(file),
            size,
        }))
    }

    fn delete_file(&self, name: &str) -> StorageResult<()> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::not_found(name),
            _ => StorageError::Io(e),
        })
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn list_all(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[derive(Debug)]
struct FsOutput {
    name: String,
    file: File,
    position: u64,
}

impl IndexOutput for FsOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_bytes(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.position;
        if data.is_empty() {
            return Ok(offset);
        }
        self.file.write_all(data)?;
        self.position += data.len() as u64;
        Ok(offset)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Sealed files never change size, so it is captured once at open.
#[derive(Debug)]
struct FsInput {
    name: String,
    file: RwLock<File>,
    size: u64,
}

impl IndexInput for FsInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        check_range(&self.name, offset, len, self.size)?;
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn len(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_read_back() {
        let tmp = tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();

        let mut out = dir.create_output("_0.kdd").unwrap();
        assert_eq!(out.write_bytes(b"hello").unwrap(), 0);
        assert_eq!(out.write_bytes(b" world").unwrap(), 5);
        assert_eq!(out.position(), 11);
        out.sync().unwrap();
        drop(out);

        let input = dir.open_input("_0.kdd").unwrap();
        assert_eq!(input.len(), 11);
        assert_eq!(input.read_at(0, 11).unwrap(), b"hello world");
        assert_eq!(input.read_at(6, 5).unwrap(), b"world");
        assert_eq!(input.read_all().unwrap(), b"hello world");
    }

    #[test]
    fn create_twice_fails() {
        let tmp = tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();

        drop(dir.create_output("_0.kdm").unwrap());
        let result = dir.create_output("_0.kdm");
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn open_missing_fails() {
        let tmp = tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();

        let result = dir.open_input("missing.kdi");
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn read_past_end_fails() {
        let tmp = tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();

        let mut out = dir.create_output("f").unwrap();
        out.write_bytes(b"hello").unwrap();
        out.sync().unwrap();
        drop(out);

        let input = dir.open_input("f").unwrap();
        assert!(matches!(
            input.read_at(3, 10),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(input.read_at(5, 0).unwrap().is_empty());
    }

    #[test]
    fn list_and_delete() {
        let tmp = tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();

        drop(dir.create_output("b").unwrap());
        drop(dir.create_output("a").unwrap());
        assert_eq!(dir.list_all().unwrap(), vec!["a", "b"]);

        dir.delete_file("a").unwrap();
        assert!(!dir.file_exists("a"));
        assert!(dir.file_exists("b"));
        assert!(matches!(
            dir.delete_file("a"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn open_creates_nested_dirs() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("segment");

        let dir = FsDirectory::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.path(), path);
        dir.sync_dir().unwrap();
    }

    #[test]
    fn rejects_path_escape() {
        let tmp = tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();

        assert!(matches!(
            dir.create_output("../escape"),
            Err(StorageError::InvalidName { .. })
        ));
        assert!(!dir.file_exists(".."));
    }
}
