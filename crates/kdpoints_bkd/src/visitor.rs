//! Query-time traversal API.

use crate::config::PointConfig;
use crate::error::{BkdError, BkdResult};

/// How a tree cell relates to a query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Every point in the cell matches.
    CellInsideQuery,
    /// No point in the cell matches.
    CellOutsideQuery,
    /// Some points may match; each must be checked.
    CellCrossesQuery,
}

/// Callback interface driven by [`crate::PointValues::intersect`].
///
/// The tree calls `compare` with the bounds of each cell it reaches
/// (indexed dimensions only). Cells fully inside the query are reported
/// through `visit`, crossing leaves through `visit_with_value`.
pub trait IntersectVisitor {
    /// Called for every point in a cell that lies fully inside the query.
    fn visit(&mut self, doc_id: u32);

    /// Called for every point in a leaf that crosses the query.
    fn visit_with_value(&mut self, doc_id: u32, packed_value: &[u8]);

    /// Relates the cell `[min_packed, max_packed]` to the query.
    fn compare(&self, min_packed: &[u8], max_packed: &[u8]) -> Relation;

    /// Hint that `count` more points are about to be visited.
    fn grow(&mut self, _count: usize) {}
}

/// An inclusive box query collecting matching doc ids.
///
/// `lower` and `upper` are full packed values; every dimension, indexed
/// or not, is filtered.
#[derive(Debug, Clone)]
pub struct PointRangeVisitor {
    config: PointConfig,
    lower: Vec<u8>,
    upper: Vec<u8>,
    filters_data_dims: bool,
    doc_ids: Vec<u32>,
}

impl PointRangeVisitor {
    /// Creates a range visitor.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::InvalidArgument`] if a bound has the wrong
    /// length.
    pub fn new(config: PointConfig, lower: &[u8], upper: &[u8]) -> BkdResult<Self> {
        let len = config.packed_bytes_length();
        if lower.len() != len || upper.len() != len {
            return Err(BkdError::invalid_argument(format!(
                "range bounds must be {len} bytes, got {} and {}",
                lower.len(),
                upper.len()
            )));
        }
        let index_len = config.packed_index_bytes_length();
        let filters_data_dims = lower[index_len..].iter().any(|&b| b != 0x00)
            || upper[index_len..].iter().any(|&b| b != 0xFF);

        Ok(Self {
            config,
            lower: lower.to_vec(),
            upper: upper.to_vec(),
            filters_data_dims,
            doc_ids: Vec::new(),
        })
    }

    /// Returns true if the packed value lies inside the box.
    #[must_use]
    pub fn matches(&self, packed_value: &[u8]) -> bool {
        (0..self.config.num_dims).all(|dim| {
            let range = self.config.dim_range(dim);
            let value = &packed_value[range.clone()];
            value >= &self.lower[range.clone()] && value <= &self.upper[range]
        })
    }

    /// Doc ids collected so far, in visit order.
    #[must_use]
    pub fn doc_ids(&self) -> &[u32] {
        &self.doc_ids
    }

    /// Consumes the visitor, returning sorted distinct doc ids.
    #[must_use]
    pub fn into_doc_ids(mut self) -> Vec<u32> {
        self.doc_ids.sort_unstable();
        self.doc_ids.dedup();
        self.doc_ids
    }
}

impl IntersectVisitor for PointRangeVisitor {
    fn visit(&mut self, doc_id: u32) {
        self.doc_ids.push(doc_id);
    }

    fn visit_with_value(&mut self, doc_id: u32, packed_value: &[u8]) {
        if self.matches(packed_value) {
            self.doc_ids.push(doc_id);
        }
    }

    fn compare(&self, min_packed: &[u8], max_packed: &[u8]) -> Relation {
        let mut inside = true;
        for dim in 0..self.config.num_index_dims {
            let range = self.config.dim_range(dim);
            let (lo, hi) = (&self.lower[range.clone()], &self.upper[range.clone()]);
            let (min, max) = (&min_packed[range.clone()], &max_packed[range]);
            if min > hi || max < lo {
                return Relation::CellOutsideQuery;
            }
            inside &= min >= lo && max <= hi;
        }
        if inside && !self.filters_data_dims {
            Relation::CellInsideQuery
        } else {
            Relation::CellCrossesQuery
        }
    }

    fn grow(&mut self, count: usize) {
        self.doc_ids.reserve(count);
    }
}
