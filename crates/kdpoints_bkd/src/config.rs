//! Tree and field shape configuration.

use crate::error::{BkdError, BkdResult};

/// Maximum number of dimensions a point may have.
pub const MAX_DIMS: usize = 16;

/// Maximum number of dimensions the tree may split on.
pub const MAX_INDEX_DIMS: usize = 8;

/// Maximum number of bytes per dimension.
pub const MAX_BYTES_PER_DIM: usize = 16;

/// Default number of points per leaf block.
pub const DEFAULT_MAX_POINTS_IN_LEAF_NODE: usize = 512;

/// Upper bound on points per leaf block.
pub const MAX_POINTS_IN_LEAF_NODE: usize = 65_535;

/// Shape of the points in one field.
///
/// Only the first `num_index_dims` dimensions drive splitting; the rest
/// are stored alongside each point as data-only dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointConfig {
    /// Total number of dimensions.
    pub num_dims: usize,
    /// Number of dimensions the tree splits on.
    pub num_index_dims: usize,
    /// Bytes per dimension.
    pub bytes_per_dim: usize,
}

impl PointConfig {
    /// Creates a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::InvalidArgument`] if any count is out of range.
    pub fn new(num_dims: usize, num_index_dims: usize, bytes_per_dim: usize) -> BkdResult<Self> {
        let config = Self {
            num_dims,
            num_index_dims,
            bytes_per_dim,
        };
        config.validate()?;
        Ok(config)
    }

    /// Creates a config where every dimension is indexed.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::InvalidArgument`] if any count is out of range.
    pub fn indexed(num_dims: usize, bytes_per_dim: usize) -> BkdResult<Self> {
        Self::new(num_dims, num_dims.min(MAX_INDEX_DIMS), bytes_per_dim)
    }

    /// Checks the dimension and byte limits.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::InvalidArgument`] if any count is out of range.
    pub fn validate(&self) -> BkdResult<()> {
        if self.num_dims == 0 || self.num_dims > MAX_DIMS {
            return Err(BkdError::invalid_argument(format!(
                "num_dims must be 1..={MAX_DIMS}, got {}",
                self.num_dims
            )));
        }
        if self.num_index_dims == 0
            || self.num_index_dims > MAX_INDEX_DIMS
            || self.num_index_dims > self.num_dims
        {
            return Err(BkdError::invalid_argument(format!(
                "num_index_dims must be 1..={} and <= num_dims ({}), got {}",
                MAX_INDEX_DIMS, self.num_dims, self.num_index_dims
            )));
        }
        if self.bytes_per_dim == 0 || self.bytes_per_dim > MAX_BYTES_PER_DIM {
            return Err(BkdError::invalid_argument(format!(
                "bytes_per_dim must be 1..={MAX_BYTES_PER_DIM}, got {}",
                self.bytes_per_dim
            )));
        }
        Ok(())
    }

    /// Length of a full packed value.
    #[must_use]
    pub const fn packed_bytes_length(&self) -> usize {
        self.num_dims * self.bytes_per_dim
    }

    /// Length of the indexed prefix of a packed value.
    #[must_use]
    pub const fn packed_index_bytes_length(&self) -> usize {
        self.num_index_dims * self.bytes_per_dim
    }

    /// Byte range of one dimension inside a packed value.
    #[must_use]
    pub const fn dim_range(&self, dim: usize) -> std::ops::Range<usize> {
        let start = dim * self.bytes_per_dim;
        start..start + self.bytes_per_dim
    }
}

/// Tuning knobs for tree construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BkdConfig {
    /// Maximum number of points in one leaf block.
    pub max_points_in_leaf_node: usize,
}

impl Default for BkdConfig {
    fn default() -> Self {
        Self {
            max_points_in_leaf_node: DEFAULT_MAX_POINTS_IN_LEAF_NODE,
        }
    }
}

impl BkdConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of points per leaf.
    #[must_use]
    pub const fn max_points_in_leaf_node(mut self, value: usize) -> Self {
        self.max_points_in_leaf_node = value;
        self
    }

    /// Checks that the leaf size is usable.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::InvalidArgument`] for a leaf size outside
    /// `1..=MAX_POINTS_IN_LEAF_NODE`.
    pub fn validate(&self) -> BkdResult<()> {
        if self.max_points_in_leaf_node == 0
            || self.max_points_in_leaf_node > MAX_POINTS_IN_LEAF_NODE
        {
            return Err(BkdError::invalid_argument(format!(
                "max_points_in_leaf_node must be 1..={MAX_POINTS_IN_LEAF_NODE}, got {}",
                self.max_points_in_leaf_node
            )));
        }
        Ok(())
    }
}
