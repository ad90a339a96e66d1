//! Tree construction.
//!
//! Points are split recursively on the indexed dimension with the widest
//! spread until a range fits in one leaf. Leaves are written to the data
//! file in order; the inner nodes are written to the index file in
//! pre-order; a per-field record locating both goes to the meta file.
//!
//! ## Index node layout
//!
//! ```text
//! Inner { tag: u8 = 1, split_dim: u8, split_value: [u8; bytes_per_dim] }
//! Leaf  { tag: u8 = 0, data_fp: vlong, block_len: vlong, point_count: vint }
//! ```
//!
//! ## Leaf block layout
//!
//! ```text
//! point_count: vint
//! doc ids (see docids)
//! per dim: prefix_len: u8, prefix: [u8; prefix_len]
//! per point, per dim: suffix: [u8; bytes_per_dim - prefix_len]
//! ```

use crate::config::{BkdConfig, PointConfig};
use crate::docids::write_doc_ids;
use crate::engine::{FieldOutputs, FieldSummary};
use crate::error::{BkdError, BkdResult};
use crate::points::PointBuffer;
use crate::version::{ProtocolVersion, BKD_CODEC_NAME};
use kdpoints_codec::{write_index_header, ChecksumOutput, DataWriter};
use std::cmp::Ordering;

pub(crate) const NODE_LEAF: u8 = 0;
pub(crate) const NODE_INNER: u8 = 1;

/// Builds and writes the tree for one field.
///
/// Returns `None` without writing anything when the buffer is empty.
pub(crate) fn write_field(
    protocol: ProtocolVersion,
    config: &BkdConfig,
    points: &PointBuffer,
    out: FieldOutputs<'_>,
) -> BkdResult<Option<FieldSummary>> {
    protocol.ensure_supported()?;
    config.validate()?;
    let pc = *points.config();
    pc.validate()?;
    if points.is_empty() {
        return Ok(None);
    }
    let count = u32::try_from(points.len())
        .map_err(|_| BkdError::invalid_argument("too many points for one field"))?;

    let data_start_fp = out.data.position();
    let index_start_fp = out.index.position();

    let mut order: Vec<u32> = (0..count).collect();
    let mut builder = TreeBuilder {
        protocol,
        pc,
        max_leaf: config.max_points_in_leaf_node,
        points,
        data: out.data,
        index: DataWriter::new(),
        scratch: DataWriter::new(),
        docs: Vec::new(),
        num_leaves: 0,
    };
    builder.build(&mut order)?;
    let num_leaves = builder.num_leaves;
    let index = builder.index;

    out.index.write_data(&index)?;
    let index_length = out.index.position() - index_start_fp;

    let (min_packed, max_packed) = bounds(points, &pc);
    let doc_count = u32::try_from(points.doc_count())
        .map_err(|_| BkdError::invalid_argument("too many documents for one field"))?;

    let mut meta = DataWriter::new();
    write_index_header(
        &mut meta,
        BKD_CODEC_NAME,
        protocol.get(),
        out.segment_id,
        out.suffix,
    )?;
    meta.write_vint(pc.num_dims as u32);
    meta.write_vint(pc.num_index_dims as u32);
    meta.write_vint(config.max_points_in_leaf_node as u32);
    meta.write_vint(pc.bytes_per_dim as u32);
    meta.write_vint(num_leaves);
    meta.write_bytes(&min_packed);
    meta.write_bytes(&max_packed);
    meta.write_vlong(u64::from(count));
    meta.write_vint(doc_count);
    meta.write_vlong(index_length);
    meta.write_u64(data_start_fp);
    meta.write_u64(index_start_fp);
    out.meta.write_data(&meta)?;

    tracing::trace!(
        protocol = protocol.get(),
        points = count,
        leaves = num_leaves,
        index_length,
        "wrote point tree"
    );

    Ok(Some(FieldSummary {
        point_count: u64::from(count),
        doc_count,
        num_leaves,
    }))
}

/// Per-dimension minimum and maximum over the indexed dimensions.
fn bounds(points: &PointBuffer, pc: &PointConfig) -> (Vec<u8>, Vec<u8>) {
    let mut min = points.packed_value(0)[..pc.packed_index_bytes_length()].to_vec();
    let mut max = min.clone();
    for i in 1..points.len() {
        for dim in 0..pc.num_index_dims {
            let range = pc.dim_range(dim);
            let value = points.dim_value(i, dim);
            if value < &min[range.clone()] {
                min[range.clone()].copy_from_slice(value);
            }
            if value > &max[range.clone()] {
                max[range].copy_from_slice(value);
            }
        }
    }
    (min, max)
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

struct TreeBuilder<'a> {
    protocol: ProtocolVersion,
    pc: PointConfig,
    max_leaf: usize,
    points: &'a PointBuffer,
    data: &'a mut ChecksumOutput,
    index: DataWriter,
    scratch: DataWriter,
    docs: Vec<u32>,
    num_leaves: u32,
}

impl TreeBuilder<'_> {
    fn build(&mut self, order: &mut [u32]) -> BkdResult<()> {
        if order.len() <= self.max_leaf {
            return self.write_leaf(order);
        }

        let dim = self.split_dimension(order);
        let points = self.points;
        order.sort_unstable_by(|&a, &b| {
            let (a, b) = (a as usize, b as usize);
            points
                .dim_value(a, dim)
                .cmp(points.dim_value(b, dim))
                .then_with(|| points.doc_id(a).cmp(&points.doc_id(b)))
                .then(a.cmp(&b))
        });

        let mid = order.len() / 2;
        self.index.write_u8(NODE_INNER);
        self.index.write_u8(dim as u8);
        self.index
            .write_bytes(points.dim_value(order[mid] as usize, dim));

        let (left, right) = order.split_at_mut(mid);
        self.build(left)?;
        self.build(right)
    }

    /// Chooses the indexed dimension whose values differ earliest, breaking
    /// ties by the larger spread at the first differing byte.
    fn split_dimension(&self, order: &[u32]) -> usize {
        let mut best_dim = 0;
        let mut best: Option<(usize, u8)> = None;
        for dim in 0..self.pc.num_index_dims {
            let mut min = self.points.dim_value(order[0] as usize, dim);
            let mut max = min;
            for &i in &order[1..] {
                let value = self.points.dim_value(i as usize, dim);
                if value < min {
                    min = value;
                }
                if value > max {
                    max = value;
                }
            }
            let prefix = common_prefix(min, max);
            if prefix == self.pc.bytes_per_dim {
                continue;
            }
            let spread = max[prefix] - min[prefix];
            let better = match best {
                None => true,
                Some((best_prefix, best_spread)) => match prefix.cmp(&best_prefix) {
                    Ordering::Less => true,
                    Ordering::Equal => spread > best_spread,
                    Ordering::Greater => false,
                },
            };
            if better {
                best = Some((prefix, spread));
                best_dim = dim;
            }
        }
        best_dim
    }

    fn write_leaf(&mut self, order: &[u32]) -> BkdResult<()> {
        let points = self.points;
        let pc = self.pc;

        self.scratch.clear();
        self.scratch.write_vint(order.len() as u32);

        self.docs.clear();
        self.docs
            .extend(order.iter().map(|&i| points.doc_id(i as usize)));
        write_doc_ids(self.protocol, &self.docs, &mut self.scratch);

        let first = points.packed_value(order[0] as usize);
        let mut prefixes = Vec::with_capacity(pc.num_dims);
        for dim in 0..pc.num_dims {
            let range = pc.dim_range(dim);
            let prefix = order[1..].iter().fold(pc.bytes_per_dim, |acc, &i| {
                acc.min(common_prefix(
                    &first[range.clone()],
                    points.dim_value(i as usize, dim),
                ))
            });
            self.scratch.write_u8(prefix as u8);
            self.scratch
                .write_bytes(&first[range.start..range.start + prefix]);
            prefixes.push(prefix);
        }
        for &i in order {
            for (dim, &prefix) in prefixes.iter().enumerate() {
                self.scratch
                    .write_bytes(&points.dim_value(i as usize, dim)[prefix..]);
            }
        }

        let fp = self.data.write_data(&self.scratch)?;
        self.index.write_u8(NODE_LEAF);
        self.index.write_vlong(fp);
        self.index.write_vlong(self.scratch.len() as u64);
        self.index.write_vint(order.len() as u32);
        self.num_leaves += 1;
        Ok(())
    }
}
