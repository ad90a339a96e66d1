//! Opening and querying a written tree.
//!
//! The inner nodes of a field are loaded eagerly when the field is
//! opened; leaf blocks stay in the data file and are read on demand.

use crate::config::{PointConfig, MAX_POINTS_IN_LEAF_NODE};
use crate::docids::{read_doc_ids, DocIdEncoding};
use crate::engine::{PointValues, TreeInputs};
use crate::error::{BkdError, BkdResult};
use crate::version::{ProtocolVersion, BKD_CODEC_NAME, VERSION_CURRENT, VERSION_MIN_SUPPORTED};
use crate::visitor::{IntersectVisitor, Relation};
use crate::writer::{NODE_INNER, NODE_LEAF};
use kdpoints_codec::{check_index_header, DataReader, FOOTER_LENGTH};
use kdpoints_storage::IndexInput;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Deepest tree the reader accepts.
const MAX_DEPTH: usize = 64;

#[derive(Debug)]
enum Node {
    Inner {
        split_dim: usize,
        split_value: Vec<u8>,
        right: usize,
        point_count: u64,
    },
    Leaf {
        fp: u64,
        len: usize,
        point_count: u32,
    },
}

impl Node {
    fn point_count(&self) -> u64 {
        match self {
            Self::Inner { point_count, .. } => *point_count,
            Self::Leaf { point_count, .. } => u64::from(*point_count),
        }
    }
}

/// An opened block KD-tree for one field.
#[derive(Debug)]
pub struct BkdTree {
    protocol: ProtocolVersion,
    config: PointConfig,
    max_points_in_leaf_node: usize,
    num_leaves: u32,
    min_packed: Vec<u8>,
    max_packed: Vec<u8>,
    point_count: u64,
    doc_count: u32,
    index_length: u64,
    data_start_fp: u64,
    index_start_fp: u64,
    nodes: Vec<Node>,
    data: Arc<dyn IndexInput>,
}

/// Reads one per-field record and loads the tree's inner nodes.
pub(crate) fn open_field(
    protocol: ProtocolVersion,
    meta: &mut DataReader<'_>,
    inputs: &TreeInputs,
) -> BkdResult<BkdTree> {
    protocol.ensure_supported()?;
    let recorded = check_index_header(
        meta,
        BKD_CODEC_NAME,
        VERSION_MIN_SUPPORTED.get(),
        VERSION_CURRENT.get(),
        &inputs.segment_id,
        &inputs.suffix,
    )?;
    if recorded != protocol.get() {
        return Err(BkdError::corrupt(format!(
            "tree written with protocol {recorded}, expected {protocol}"
        )));
    }

    let num_dims = meta.read_vint()? as usize;
    let num_index_dims = meta.read_vint()? as usize;
    let max_points_in_leaf_node = meta.read_vint()? as usize;
    let bytes_per_dim = meta.read_vint()? as usize;
    let config = PointConfig::new(num_dims, num_index_dims, bytes_per_dim)
        .map_err(|e| BkdError::corrupt(format!("bad point shape: {e}")))?;
    if max_points_in_leaf_node == 0 || max_points_in_leaf_node > MAX_POINTS_IN_LEAF_NODE {
        return Err(BkdError::corrupt(format!(
            "bad max points per leaf: {max_points_in_leaf_node}"
        )));
    }

    let num_leaves = meta.read_vint()?;
    let index_bytes_len = config.packed_index_bytes_length();
    let min_packed = meta.read_slice(index_bytes_len)?.to_vec();
    let max_packed = meta.read_slice(index_bytes_len)?.to_vec();
    let point_count = meta.read_vlong()?;
    let doc_count = meta.read_vint()?;
    let index_length = meta.read_vlong()?;
    let data_start_fp = meta.read_u64()?;
    let index_start_fp = meta.read_u64()?;

    if num_leaves == 0 || point_count == 0 {
        return Err(BkdError::corrupt("tree has no points"));
    }
    if u64::from(doc_count) > point_count {
        return Err(BkdError::corrupt(format!(
            "doc count {doc_count} exceeds point count {point_count}"
        )));
    }
    for dim in 0..num_index_dims {
        let range = config.dim_range(dim);
        if min_packed[range.clone()] > max_packed[range] {
            return Err(BkdError::corrupt(format!("min exceeds max in dimension {dim}")));
        }
    }

    let index_end = index_start_fp
        .checked_add(index_length)
        .ok_or_else(|| BkdError::corrupt("index range overflows"))?;
    if index_end > inputs.index.len().saturating_sub(FOOTER_LENGTH as u64) {
        return Err(BkdError::corrupt(format!(
            "index range {index_start_fp}..{index_end} exceeds {}",
            inputs.index.name()
        )));
    }
    let index_len = usize::try_from(index_length)
        .map_err(|_| BkdError::corrupt("index length overflows usize"))?;
    let index_bytes = inputs.index.read_at(index_start_fp, index_len)?;

    let mut tree = BkdTree {
        protocol,
        config,
        max_points_in_leaf_node,
        num_leaves,
        min_packed,
        max_packed,
        point_count,
        doc_count,
        index_length,
        data_start_fp,
        index_start_fp,
        nodes: Vec::new(),
        data: Arc::clone(&inputs.data),
    };

    let mut r = DataReader::new(&index_bytes);
    tree.parse_node(&mut r, 0)?;
    if !r.is_exhausted() {
        return Err(BkdError::corrupt(format!(
            "{} trailing bytes after tree index",
            r.remaining()
        )));
    }
    let leaves = tree
        .nodes
        .iter()
        .filter(|n| matches!(n, Node::Leaf { .. }))
        .count();
    if leaves != num_leaves as usize {
        return Err(BkdError::corrupt(format!(
            "index holds {leaves} leaves, expected {num_leaves}"
        )));
    }
    if tree.nodes[0].point_count() != point_count {
        return Err(BkdError::corrupt(format!(
            "leaves hold {} points, expected {point_count}",
            tree.nodes[0].point_count()
        )));
    }

    tracing::trace!(
        protocol = protocol.get(),
        points = point_count,
        leaves = num_leaves,
        "opened point tree"
    );
    Ok(tree)
}

impl BkdTree {
    /// Parses the subtree at the reader's position, returning its node id.
    fn parse_node(&mut self, r: &mut DataReader<'_>, depth: usize) -> BkdResult<usize> {
        if depth > MAX_DEPTH {
            return Err(BkdError::corrupt("tree is too deep"));
        }
        if self.nodes.len() >= 2 * self.num_leaves as usize {
            return Err(BkdError::corrupt("tree has more nodes than its leaves allow"));
        }
        let id = self.nodes.len();
        match r.read_u8()? {
            NODE_LEAF => {
                let fp = r.read_vlong()?;
                let len = r.read_vlong()?;
                let point_count = r.read_vint()?;
                self.check_leaf(fp, len, point_count)?;
                self.nodes.push(Node::Leaf {
                    fp,
                    len: len as usize,
                    point_count,
                });
            }
            NODE_INNER => {
                let split_dim = r.read_u8()? as usize;
                if split_dim >= self.config.num_index_dims {
                    return Err(BkdError::corrupt(format!("bad split dimension {split_dim}")));
                }
                let split_value = r.read_slice(self.config.bytes_per_dim)?.to_vec();
                self.nodes.push(Node::Inner {
                    split_dim,
                    split_value,
                    right: 0,
                    point_count: 0,
                });
                let left = self.parse_node(r, depth + 1)?;
                let right = self.parse_node(r, depth + 1)?;
                let total = self.nodes[left].point_count() + self.nodes[right].point_count();
                if let Node::Inner {
                    right: r_slot,
                    point_count,
                    ..
                } = &mut self.nodes[id]
                {
                    *r_slot = right;
                    *point_count = total;
                }
            }
            other => return Err(BkdError::corrupt(format!("unknown node tag {other}"))),
        }
        Ok(id)
    }

    fn check_leaf(&self, fp: u64, len: u64, point_count: u32) -> BkdResult<()> {
        if point_count == 0 || point_count as usize > self.max_points_in_leaf_node {
            return Err(BkdError::corrupt(format!(
                "leaf holds {point_count} points, limit is {}",
                self.max_points_in_leaf_node
            )));
        }
        let end = fp.checked_add(len);
        let limit = self.data.len().saturating_sub(FOOTER_LENGTH as u64);
        if fp < self.data_start_fp || end.map_or(true, |end| end > limit) {
            return Err(BkdError::corrupt(format!(
                "leaf at {fp} (+{len}) lies outside {}",
                self.data.name()
            )));
        }
        Ok(())
    }

    fn read_block(&self, fp: u64, len: usize) -> BkdResult<Vec<u8>> {
        Ok(self.data.read_at(fp, len)?)
    }

    /// Reads a leaf's doc ids only.
    fn read_leaf_docs(
        &self,
        block: &[u8],
        expected: u32,
        docs: &mut Vec<u32>,
    ) -> BkdResult<(DocIdEncoding, usize)> {
        let mut r = DataReader::new(block);
        let count = r.read_vint()?;
        if count != expected {
            return Err(BkdError::corrupt(format!(
                "leaf holds {count} points, index says {expected}"
            )));
        }
        docs.clear();
        let encoding = read_doc_ids(self.protocol, &mut r, count as usize, docs)?;
        Ok((encoding, r.position()))
    }

    /// Reads a full leaf: doc ids and packed values.
    fn read_leaf(
        &self,
        fp: u64,
        len: usize,
        expected: u32,
        docs: &mut Vec<u32>,
        values: &mut Vec<u8>,
    ) -> BkdResult<()> {
        let block = self.read_block(fp, len)?;
        let (_, offset) = self.read_leaf_docs(&block, expected, docs)?;
        let mut r = DataReader::new(&block[offset..]);

        let pc = self.config;
        let mut prefixes = Vec::with_capacity(pc.num_dims);
        for dim in 0..pc.num_dims {
            let prefix_len = r.read_u8()? as usize;
            if prefix_len > pc.bytes_per_dim {
                return Err(BkdError::corrupt(format!(
                    "prefix of {prefix_len} bytes in dimension {dim}"
                )));
            }
            prefixes.push(r.read_slice(prefix_len)?);
        }

        let packed_len = pc.packed_bytes_length();
        values.clear();
        values.resize(docs.len() * packed_len, 0);
        for point in values.chunks_exact_mut(packed_len) {
            for (dim, prefix) in prefixes.iter().enumerate() {
                let range = pc.dim_range(dim);
                let value = &mut point[range];
                value[..prefix.len()].copy_from_slice(prefix);
                r.read_into(&mut value[prefix.len()..])?;
            }
        }
        if !r.is_exhausted() {
            return Err(BkdError::corrupt("trailing bytes in leaf block"));
        }
        Ok(())
    }

    fn intersect_node(
        &self,
        id: usize,
        cell_min: &mut [u8],
        cell_max: &mut [u8],
        visitor: &mut dyn IntersectVisitor,
        scratch: &mut (Vec<u32>, Vec<u8>),
    ) -> BkdResult<()> {
        match visitor.compare(cell_min, cell_max) {
            Relation::CellOutsideQuery => Ok(()),
            Relation::CellInsideQuery => self.visit_all(id, visitor, &mut scratch.0),
            Relation::CellCrossesQuery => match &self.nodes[id] {
                Node::Leaf {
                    fp,
                    len,
                    point_count,
                } => {
                    let (docs, values) = scratch;
                    self.read_leaf(*fp, *len, *point_count, docs, values)?;
                    visitor.grow(docs.len());
                    let packed_len = self.config.packed_bytes_length();
                    for (&doc, value) in docs.iter().zip(values.chunks_exact(packed_len)) {
                        visitor.visit_with_value(doc, value);
                    }
                    Ok(())
                }
                Node::Inner {
                    split_dim,
                    split_value,
                    right,
                    ..
                } => {
                    let range = self.config.dim_range(*split_dim);

                    let saved = cell_max[range.clone()].to_vec();
                    cell_max[range.clone()].copy_from_slice(split_value);
                    self.intersect_node(id + 1, cell_min, cell_max, visitor, scratch)?;
                    cell_max[range.clone()].copy_from_slice(&saved);

                    let saved = cell_min[range.clone()].to_vec();
                    cell_min[range.clone()].copy_from_slice(split_value);
                    self.intersect_node(*right, cell_min, cell_max, visitor, scratch)?;
                    cell_min[range].copy_from_slice(&saved);
                    Ok(())
                }
            },
        }
    }

    fn visit_all(
        &self,
        id: usize,
        visitor: &mut dyn IntersectVisitor,
        docs: &mut Vec<u32>,
    ) -> BkdResult<()> {
        match &self.nodes[id] {
            Node::Leaf {
                fp,
                len,
                point_count,
            } => {
                let block = self.read_block(*fp, *len)?;
                self.read_leaf_docs(&block, *point_count, docs)?;
                visitor.grow(docs.len());
                for &doc in docs.iter() {
                    visitor.visit(doc);
                }
                Ok(())
            }
            Node::Inner { right, .. } => {
                self.visit_all(id + 1, visitor, docs)?;
                self.visit_all(*right, visitor, docs)
            }
        }
    }

    fn estimate_node(
        &self,
        id: usize,
        cell_min: &mut [u8],
        cell_max: &mut [u8],
        visitor: &dyn IntersectVisitor,
    ) -> u64 {
        match visitor.compare(cell_min, cell_max) {
            Relation::CellOutsideQuery => 0,
            Relation::CellInsideQuery => self.nodes[id].point_count(),
            Relation::CellCrossesQuery => match &self.nodes[id] {
                Node::Leaf { point_count, .. } => u64::from(point_count.div_ceil(2)),
                Node::Inner {
                    split_dim,
                    split_value,
                    right,
                    ..
                } => {
                    let range = self.config.dim_range(*split_dim);

                    let saved = cell_max[range.clone()].to_vec();
                    cell_max[range.clone()].copy_from_slice(split_value);
                    let left = self.estimate_node(id + 1, cell_min, cell_max, visitor);
                    cell_max[range.clone()].copy_from_slice(&saved);

                    let saved = cell_min[range.clone()].to_vec();
                    cell_min[range.clone()].copy_from_slice(split_value);
                    let right = self.estimate_node(*right, cell_min, cell_max, visitor);
                    cell_min[range].copy_from_slice(&saved);
                    left + right
                }
            },
        }
    }

    fn leaves(&self) -> impl Iterator<Item = (u64, usize, u32)> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            Node::Leaf {
                fp,
                len,
                point_count,
            } => Some((*fp, *len, *point_count)),
            Node::Inner { .. } => None,
        })
    }

    /// Calls `f` for every point, leaf by leaf in tree order.
    ///
    /// # Errors
    ///
    /// Returns an error if a leaf cannot be read or decoded.
    pub fn for_each_point(&self, f: &mut dyn FnMut(u32, &[u8])) -> BkdResult<()> {
        let mut docs = Vec::new();
        let mut values = Vec::new();
        let packed_len = self.config.packed_bytes_length();
        for (fp, len, count) in self.leaves() {
            self.read_leaf(fp, len, count, &mut docs, &mut values)?;
            for (&doc, value) in docs.iter().zip(values.chunks_exact(packed_len)) {
                f(doc, value);
            }
        }
        Ok(())
    }

    /// Doc id encodings used by the leaves of this tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a leaf cannot be read or decoded.
    pub fn leaf_doc_id_encodings(&self) -> BkdResult<BTreeSet<DocIdEncoding>> {
        let mut docs = Vec::new();
        let mut encodings = BTreeSet::new();
        for (fp, len, count) in self.leaves() {
            let block = self.read_block(fp, len)?;
            let (encoding, _) = self.read_leaf_docs(&block, count, &mut docs)?;
            encodings.insert(encoding);
        }
        Ok(encodings)
    }

    /// Decodes every leaf and checks it against the index.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::Corrupt`] for the first leaf that does not
    /// decode cleanly or holds values outside the recorded bounds.
    pub fn validate_leaves(&self) -> BkdResult<()> {
        let mut docs = Vec::new();
        let mut values = Vec::new();
        let pc = self.config;
        for (fp, len, count) in self.leaves() {
            self.read_leaf(fp, len, count, &mut docs, &mut values)?;
            for value in values.chunks_exact(pc.packed_bytes_length()) {
                for dim in 0..pc.num_index_dims {
                    let range = pc.dim_range(dim);
                    if value[range.clone()] < self.min_packed[range.clone()]
                        || value[range.clone()] > self.max_packed[range]
                    {
                        return Err(BkdError::corrupt(format!(
                            "leaf at {fp} holds a value outside the bounds of dimension {dim}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Protocol the tree was written with.
    #[must_use]
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Number of leaf blocks.
    #[must_use]
    pub fn num_leaves(&self) -> u32 {
        self.num_leaves
    }

    /// Maximum number of points per leaf the tree was built with.
    #[must_use]
    pub fn max_points_in_leaf_node(&self) -> usize {
        self.max_points_in_leaf_node
    }

    /// Byte length of the inner node section in the index file.
    #[must_use]
    pub fn index_length(&self) -> u64 {
        self.index_length
    }

    /// Offset of the inner node section in the index file.
    #[must_use]
    pub fn index_start_fp(&self) -> u64 {
        self.index_start_fp
    }

    /// Offset of the first leaf in the data file.
    #[must_use]
    pub fn data_start_fp(&self) -> u64 {
        self.data_start_fp
    }
}

impl PointValues for BkdTree {
    fn config(&self) -> &PointConfig {
        &self.config
    }

    fn size(&self) -> u64 {
        self.point_count
    }

    fn doc_count(&self) -> u32 {
        self.doc_count
    }

    fn min_packed_value(&self) -> &[u8] {
        &self.min_packed
    }

    fn max_packed_value(&self) -> &[u8] {
        &self.max_packed
    }

    fn intersect(&self, visitor: &mut dyn IntersectVisitor) -> BkdResult<()> {
        let mut cell_min = self.min_packed.clone();
        let mut cell_max = self.max_packed.clone();
        let mut scratch = (Vec::new(), Vec::new());
        self.intersect_node(0, &mut cell_min, &mut cell_max, visitor, &mut scratch)
    }

    fn estimate_point_count(&self, visitor: &dyn IntersectVisitor) -> u64 {
        let mut cell_min = self.min_packed.clone();
        let mut cell_max = self.max_packed.clone();
        self.estimate_node(0, &mut cell_min, &mut cell_max, visitor)
    }
}
