//! # kdpoints format
//!
//! Versioned on-disk format for a segment's multi-dimensional points.
//!
//! This crate provides:
//! - The version table binding each format version to the tree engine
//!   protocol it was introduced with
//! - [`PointsFormat`], the single entry point producing writers and
//!   readers bound to a version
//! - [`PointsWriter`] / [`PointsReader`] over three cooperating files
//!
//! ## Files
//!
//! | File  | Ext   | Contents                                 |
//! |-------|-------|------------------------------------------|
//! | Meta  | `kdm` | per-field records, end marker, lengths   |
//! | Index | `kdi` | inner tree nodes of every field          |
//! | Data  | `kdd` | leaf blocks of every field               |
//!
//! All three start with a header recording the same format version and
//! end with a checksum footer. A reader that finds the versions disagree
//! reports corruption; it never picks one.
//!
//! ## Example
//!
//! ```rust
//! use kdpoints_format::{
//!     FieldInfo, FieldInfos, FieldPoints, PointsFormat, SegmentInfo, SegmentWriteState,
//! };
//! use kdpoints_bkd::{PointRangeVisitor, PointValues};
//! use kdpoints_storage::MemoryDirectory;
//! use std::sync::Arc;
//!
//! let field = FieldInfo::new("price", 0, 1, 4);
//! let state = SegmentWriteState::new(
//!     Arc::new(MemoryDirectory::new()),
//!     SegmentInfo::new("_0", 3),
//!     FieldInfos::from_fields([field.clone()]).unwrap(),
//! );
//!
//! let format = PointsFormat::new();
//! let mut writer = format.fields_writer(&state).unwrap();
//! let mut points = FieldPoints::new(&field).unwrap();
//! for (doc, price) in [(0, 10u32), (1, 25), (2, 40)] {
//!     points.add(doc, &price.to_be_bytes()).unwrap();
//! }
//! writer.write_field(&points).unwrap();
//! writer.finish().unwrap();
//!
//! let reader = format.fields_reader(&state.read_state()).unwrap();
//! let values = reader.values("price").unwrap();
//! let config = *values.config();
//! let mut query = PointRangeVisitor::new(config, &20u32.to_be_bytes(), &40u32.to_be_bytes()).unwrap();
//! values.intersect(&mut query).unwrap();
//! assert_eq!(query.into_doc_ids(), vec![1, 2]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod format;
mod reader;
mod segment;
pub mod version;
mod writer;

pub use config::PointsConfig;
pub use error::{PointsError, PointsResult};
pub use format::{
    read_segment_header, PointsFormat, SegmentFiles, SegmentHeader, DATA_CODEC_NAME,
    DATA_EXTENSION, INDEX_CODEC_NAME, INDEX_EXTENSION, META_CODEC_NAME, META_EXTENSION,
};
pub use reader::PointsReader;
pub use segment::{FieldInfo, FieldInfos, SegmentInfo, SegmentReadState, SegmentWriteState};
pub use version::{
    FormatVersion, VERSION_BKD_VECTORIZED_BPV24, VERSION_CURRENT, VERSION_START, VERSION_TABLE,
};
pub use writer::{DocMap, FieldPoints, MergeSource, PointsWriter};
