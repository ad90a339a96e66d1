//! # kdpoints storage
//!
//! Directory abstraction for the files that make up a segment.
//!
//! A [`Directory`] hands out write-once [`IndexOutput`]s and shared,
//! read-only [`IndexInput`]s by file name. Like every layer below the
//! codecs, it stores **opaque bytes**: it knows nothing about headers,
//! footers, version numbers or tree nodes.
//!
//! ## Design Principles
//!
//! - Files are written exactly once, front to back, and never modified
//! - Creating a file that already exists is an error
//! - Inputs are `Send + Sync` so any number of readers can share one
//! - File naming beyond the caller-supplied name is out of scope
//!
//! ## Available Directories
//!
//! - [`MemoryDirectory`] - For testing and ephemeral segments
//! - [`FsDirectory`] - For persistent segments using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use kdpoints_storage::{Directory, MemoryDirectory};
//!
//! let dir = MemoryDirectory::new();
//! let mut out = dir.create_output("_0.kdd").unwrap();
//! out.write_bytes(b"hello world").unwrap();
//! out.sync().unwrap();
//! drop(out);
//!
//! let input = dir.open_input("_0.kdd").unwrap();
//! assert_eq!(input.read_at(6, 5).unwrap(), b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod file;
mod memory;

pub use directory::{Directory, IndexInput, IndexOutput};
pub use error::{StorageError, StorageResult};
pub use file::FsDirectory;
pub use memory::MemoryDirectory;
