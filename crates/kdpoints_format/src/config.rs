//! Points format configuration.

use crate::error::{PointsError, PointsResult};
use kdpoints_bkd::BkdConfig;

/// Configuration for writing points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsConfig {
    /// Tree engine tuning.
    pub bkd: BkdConfig,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            bkd: BkdConfig::default(),
        }
    }
}

impl PointsConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of points per leaf block.
    #[must_use]
    pub const fn max_points_in_leaf_node(mut self, value: usize) -> Self {
        self.bkd.max_points_in_leaf_node = value;
        self
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] for out of range values.
    pub fn validate(&self) -> PointsResult<()> {
        self.bkd
            .validate()
            .map_err(|e| PointsError::invalid_argument(e.to_string()))
    }
}
