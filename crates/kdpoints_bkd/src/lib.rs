//! # kdpoints BKD
//!
//! Block KD-tree engine used by the points format.
//!
//! This crate provides:
//! - [`PointBuffer`] to collect a field's points before flush
//! - [`TreeEngine`], the seam the format drives, and [`BkdEngine`]
//! - [`PointValues`] / [`IntersectVisitor`] for query-time traversal
//! - Protocol versions gating the on-disk leaf layout
//!
//! ## Files
//!
//! A tree spans three outputs owned by the caller:
//!
//! ```text
//! meta:  per-field record (header, shape, bounds, counts, offsets)
//! index: inner nodes, pre-order
//! data:  leaf blocks (doc ids + prefix-compressed values)
//! ```
//!
//! The engine never opens or names files itself.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod docids;
pub mod encoding;
mod engine;
mod error;
mod points;
mod reader;
mod version;
mod visitor;
mod writer;

pub use config::{
    BkdConfig, PointConfig, DEFAULT_MAX_POINTS_IN_LEAF_NODE, MAX_BYTES_PER_DIM, MAX_DIMS,
    MAX_INDEX_DIMS, MAX_POINTS_IN_LEAF_NODE,
};
pub use docids::DocIdEncoding;
pub use engine::{BkdEngine, FieldOutputs, FieldSummary, PointValues, TreeEngine, TreeInputs};
pub use error::{BkdError, BkdResult};
pub use points::PointBuffer;
pub use reader::BkdTree;
pub use version::{
    ProtocolVersion, BKD_CODEC_NAME, VERSION_CURRENT, VERSION_META_FILE, VERSION_MIN_SUPPORTED,
    VERSION_VECTORIZE_BPV24_AND_INTRODUCE_BPV21,
};
pub use visitor::{IntersectVisitor, PointRangeVisitor, Relation};
