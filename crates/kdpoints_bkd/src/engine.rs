//! The capability seam between a points format and its tree engine.

use crate::config::{BkdConfig, PointConfig};
use crate::error::BkdResult;
use crate::points::PointBuffer;
use crate::reader::{self, BkdTree};
use crate::version::ProtocolVersion;
use crate::visitor::IntersectVisitor;
use crate::writer;
use kdpoints_codec::{ChecksumOutput, DataReader, SegmentId};
use kdpoints_storage::IndexInput;
use std::fmt;
use std::sync::Arc;

/// Read access to one field's points.
pub trait PointValues: Send + Sync + fmt::Debug {
    /// Shape of the points.
    fn config(&self) -> &PointConfig;

    /// Total number of dimensions.
    fn num_dimensions(&self) -> usize {
        self.config().num_dims
    }

    /// Number of dimensions the tree splits on.
    fn num_index_dimensions(&self) -> usize {
        self.config().num_index_dims
    }

    /// Bytes per dimension.
    fn bytes_per_dimension(&self) -> usize {
        self.config().bytes_per_dim
    }

    /// Total number of points.
    fn size(&self) -> u64;

    /// Number of documents with at least one point.
    fn doc_count(&self) -> u32;

    /// Per-dimension minimum over the indexed dimensions.
    fn min_packed_value(&self) -> &[u8];

    /// Per-dimension maximum over the indexed dimensions.
    fn max_packed_value(&self) -> &[u8];

    /// Walks the tree, reporting matching points to `visitor`.
    ///
    /// # Errors
    ///
    /// Returns an error if a leaf cannot be read or decoded.
    fn intersect(&self, visitor: &mut dyn IntersectVisitor) -> BkdResult<()>;

    /// Estimates how many points `visitor` would see, without reading
    /// any leaf.
    fn estimate_point_count(&self, visitor: &dyn IntersectVisitor) -> u64;
}

/// Where a field's tree is written.
pub struct FieldOutputs<'a> {
    /// Per-field record sink.
    pub meta: &'a mut ChecksumOutput,
    /// Inner node sink.
    pub index: &'a mut ChecksumOutput,
    /// Leaf block sink.
    pub data: &'a mut ChecksumOutput,
    /// Segment the tree belongs to.
    pub segment_id: &'a SegmentId,
    /// Segment suffix.
    pub suffix: &'a str,
}

/// Files a field's tree is read from.
#[derive(Debug, Clone)]
pub struct TreeInputs {
    /// Inner node file.
    pub index: Arc<dyn IndexInput>,
    /// Leaf block file.
    pub data: Arc<dyn IndexInput>,
    /// Segment the tree must belong to.
    pub segment_id: SegmentId,
    /// Segment suffix.
    pub suffix: String,
}

/// Counts reported after a field's tree was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSummary {
    /// Number of points written.
    pub point_count: u64,
    /// Number of distinct documents.
    pub doc_count: u32,
    /// Number of leaf blocks.
    pub num_leaves: u32,
}

/// A tree engine: builds trees from points and opens them for query.
///
/// Every call carries the protocol version the caller resolved; the
/// engine must write exactly that protocol and must refuse to read a
/// tree recorded under another.
pub trait TreeEngine: Clone + Default + Send + Sync + fmt::Debug + 'static {
    /// Handle to one opened tree.
    type Tree: PointValues;

    /// Returns true if the engine can read and write `protocol`.
    fn supports(&self, protocol: ProtocolVersion) -> bool;

    /// Builds a tree from `points`, writing it through `out`.
    ///
    /// Returns `None` without writing anything if there are no points.
    ///
    /// # Errors
    ///
    /// Returns an error on unsupported protocols, invalid configuration,
    /// or write failures.
    fn build(
        &self,
        protocol: ProtocolVersion,
        config: &BkdConfig,
        points: &PointBuffer,
        out: FieldOutputs<'_>,
    ) -> BkdResult<Option<FieldSummary>>;

    /// Opens the tree whose record starts at the reader's position.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed or was written under
    /// a different protocol.
    fn open(
        &self,
        protocol: ProtocolVersion,
        meta: &mut DataReader<'_>,
        inputs: &TreeInputs,
    ) -> BkdResult<Self::Tree>;
}

/// The block KD-tree engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct BkdEngine;

impl TreeEngine for BkdEngine {
    type Tree = BkdTree;

    fn supports(&self, protocol: ProtocolVersion) -> bool {
        protocol.is_supported()
    }

    fn build(
        &self,
        protocol: ProtocolVersion,
        config: &BkdConfig,
        points: &PointBuffer,
        out: FieldOutputs<'_>,
    ) -> BkdResult<Option<FieldSummary>> {
        writer::write_field(protocol, config, points, out)
    }

    fn open(
        &self,
        protocol: ProtocolVersion,
        meta: &mut DataReader<'_>,
        inputs: &TreeInputs,
    ) -> BkdResult<Self::Tree> {
        reader::open_field(protocol, meta, inputs)
    }
}
