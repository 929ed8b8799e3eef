//! Grid construction and export configuration.
//!
//! Both structs deserialize with defaults for missing fields so they can be
//! embedded in a surrounding pipeline's configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// Default number of points per shard for the sharded build.
pub const DEFAULT_SHARD_SIZE: usize = 1 << 16;

/// How each bin summarizes its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulation {
    /// Running sums: constant memory per bin, raw points are not recoverable.
    #[default]
    RunningSum,
    /// Keep the source index of every point so that exact means and PCA
    /// normals can be recomputed at export time.
    RawIndices,
}

/// Configuration for grid construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Cell edge length, shared by every dimension.
    pub bin_size: f64,
    /// Per-bin accumulation strategy.
    pub accumulation: Accumulation,
    /// Build shard grids on the rayon pool and merge them.
    pub parallel: bool,
    /// Points per shard when `parallel` is set.
    pub shard_size: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            bin_size: 1.0,
            accumulation: Accumulation::RunningSum,
            parallel: false,
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }
}

impl GridConfig {
    /// Create a configuration with the given bin size and defaults otherwise.
    pub fn new(bin_size: f64) -> Self {
        Self {
            bin_size,
            ..Default::default()
        }
    }

    /// Check the values that do not depend on the input arrays.
    pub fn validate(&self) -> Result<()> {
        if !(self.bin_size.is_finite() && self.bin_size > 0.0) {
            return Err(GridError::InvalidBinSize(self.bin_size));
        }
        if self.parallel && self.shard_size == 0 {
            return Err(GridError::InvalidShardSize);
        }
        Ok(())
    }
}

/// Inclusion thresholds applied by every export call.
///
/// Both thresholds are inclusive: a bin holding exactly `min_points_in_bin`
/// points is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportThresholds {
    /// Bins with fewer points are dropped.
    pub min_points_in_bin: usize,
    /// Bins with fewer distinct labels are dropped. Ignored when the grid
    /// does not track labels.
    pub min_different_labels_in_bin: usize,
}

impl Default for ExportThresholds {
    fn default() -> Self {
        Self {
            min_points_in_bin: 1,
            min_different_labels_in_bin: 1,
        }
    }
}

impl ExportThresholds {
    /// Thresholds with a minimum point count and the default label threshold.
    pub fn min_points(min_points_in_bin: usize) -> Self {
        Self {
            min_points_in_bin,
            ..Default::default()
        }
    }

    /// Set the minimum number of distinct labels.
    pub fn with_min_labels(mut self, min_different_labels_in_bin: usize) -> Self {
        self.min_different_labels_in_bin = min_different_labels_in_bin;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bin_size() {
        assert!(GridConfig::new(0.5).validate().is_ok());
        assert_eq!(
            GridConfig::new(0.0).validate(),
            Err(GridError::InvalidBinSize(0.0))
        );
        assert_eq!(
            GridConfig::new(-1.0).validate(),
            Err(GridError::InvalidBinSize(-1.0))
        );
        assert!(GridConfig::new(f64::NAN).validate().is_err());
        assert!(GridConfig::new(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_validate_shard_size() {
        let config = GridConfig {
            parallel: true,
            shard_size: 0,
            ..GridConfig::new(1.0)
        };
        assert_eq!(config.validate(), Err(GridError::InvalidShardSize));

        // Shard size is irrelevant for sequential builds
        let config = GridConfig {
            parallel: false,
            shard_size: 0,
            ..GridConfig::new(1.0)
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: GridConfig =
            serde_json::from_str(r#"{ "bin_size": 0.25, "accumulation": "raw_indices" }"#)
                .unwrap();
        assert_eq!(config.bin_size, 0.25);
        assert_eq!(config.accumulation, Accumulation::RawIndices);
        assert!(!config.parallel);
        assert_eq!(config.shard_size, DEFAULT_SHARD_SIZE);

        let thresholds: ExportThresholds =
            serde_json::from_str(r#"{ "min_points_in_bin": 4 }"#).unwrap();
        assert_eq!(thresholds.min_points_in_bin, 4);
        assert_eq!(thresholds.min_different_labels_in_bin, 1);
    }

    #[test]
    fn test_threshold_helpers() {
        let thresholds = ExportThresholds::min_points(3).with_min_labels(2);
        assert_eq!(thresholds.min_points_in_bin, 3);
        assert_eq!(thresholds.min_different_labels_in_bin, 2);
        assert_eq!(ExportThresholds::default(), ExportThresholds::min_points(1));
    }
}
