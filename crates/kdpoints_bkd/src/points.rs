//! In-memory buffer of one field's points.

use crate::config::PointConfig;
use crate::error::{BkdError, BkdResult};

/// Points accumulated for one field before the tree is built.
///
/// Values are stored packed: `num_dims` big-endian sortable encodings of
/// `bytes_per_dim` bytes each, back to back.
#[derive(Debug, Clone)]
pub struct PointBuffer {
    config: PointConfig,
    packed: Vec<u8>,
    doc_ids: Vec<u32>,
}

impl PointBuffer {
    /// Creates an empty buffer for points of the given shape.
    #[must_use]
    pub fn new(config: PointConfig) -> Self {
        Self {
            config,
            packed: Vec::new(),
            doc_ids: Vec::new(),
        }
    }

    /// Adds one point.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::InvalidArgument`] if the packed value has the
    /// wrong length.
    pub fn add(&mut self, doc_id: u32, packed_value: &[u8]) -> BkdResult<()> {
        let expected = self.config.packed_bytes_length();
        if packed_value.len() != expected {
            return Err(BkdError::invalid_argument(format!(
                "packed value must be {expected} bytes, got {}",
                packed_value.len()
            )));
        }
        self.packed.extend_from_slice(packed_value);
        self.doc_ids.push(doc_id);
        Ok(())
    }

    /// Shape of the points.
    #[must_use]
    pub fn config(&self) -> &PointConfig {
        &self.config
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    /// Returns true if no point was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Packed value of point `index`.
    #[must_use]
    pub fn packed_value(&self, index: usize) -> &[u8] {
        let len = self.config.packed_bytes_length();
        &self.packed[index * len..(index + 1) * len]
    }

    /// Value of one dimension of point `index`.
    #[must_use]
    pub fn dim_value(&self, index: usize, dim: usize) -> &[u8] {
        &self.packed_value(index)[self.config.dim_range(dim)]
    }

    /// Doc id of point `index`.
    #[must_use]
    pub fn doc_id(&self, index: usize) -> u32 {
        self.doc_ids[index]
    }

    /// Largest doc id, if any point was added.
    #[must_use]
    pub fn max_doc_id(&self) -> Option<u32> {
        self.doc_ids.iter().copied().max()
    }

    /// Number of distinct documents with at least one point.
    #[must_use]
    pub fn doc_count(&self) -> usize {
        let mut docs = self.doc_ids.clone();
        docs.sort_unstable();
        docs.dedup();
        docs.len()
    }

    /// Iterates `(doc_id, packed_value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        self.doc_ids
            .iter()
            .copied()
            .zip(self.packed.chunks_exact(self.config.packed_bytes_length()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_read_back() {
        let config = PointConfig::indexed(2, 2).unwrap();
        let mut buf = PointBuffer::new(config);
        buf.add(3, &[0, 1, 0, 2]).unwrap();
        buf.add(3, &[0, 5, 0, 6]).unwrap();
        buf.add(7, &[0, 9, 0, 9]).unwrap();

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.dim_value(1, 1), &[0, 6]);
        assert_eq!(buf.doc_id(2), 7);
        assert_eq!(buf.max_doc_id(), Some(7));
        assert_eq!(buf.doc_count(), 2);

        let collected: Vec<_> = buf.iter().map(|(d, v)| (d, v.to_vec())).collect();
        assert_eq!(collected[0], (3, vec![0, 1, 0, 2]));
    }

    #[test]
    fn rejects_wrong_length() {
        let mut buf = PointBuffer::new(PointConfig::indexed(1, 8).unwrap());
        assert!(matches!(
            buf.add(0, &[1, 2, 3]),
            Err(BkdError::InvalidArgument { .. })
        ));
        assert!(buf.is_empty());
        assert_eq!(buf.max_doc_id(), None);
    }
}
