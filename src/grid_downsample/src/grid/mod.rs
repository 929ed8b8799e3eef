//! Spatial hash grid construction.
//!
//! Points are bucketed into axis-aligned cells of edge `bin_size`. Each
//! occupied cell keeps a [`BinState`] updated by the grid's accumulator.
//!
//! # Architecture
//!
//! 1. Validate the configuration and the attribute columns against the points
//! 2. Fold every point into its bin (single pass, or sharded on rayon)
//! 3. Freeze the bins in first-appearance order; exports read them only
//!
//! A grid borrows its input points: raw-index grids read positions back at
//! export time.

pub mod accumulate;
pub mod types;

pub use types::{BinState, GridKey, Label, PointStats};

use std::collections::HashMap;

use nalgebra::{DMatrix, Matrix3xX};
use tracing::debug;

use crate::config::{Accumulation, GridConfig};
use crate::error::{Attribute, GridError, Result};
use crate::scalar::Real;

use self::accumulate::{accumulate, accumulate_sharded, Accumulator, BinTable};
use self::types::fill_key;

/// Builder for [`SpatialHashGrid`].
///
/// Attribute columns are optional; each one supplied switches on the
/// matching per-bin statistic.
#[derive(Debug, Clone)]
pub struct GridBuilder<'a, T: Real> {
    config: GridConfig,
    normals: Option<&'a DMatrix<T>>,
    colors: Option<&'a Matrix3xX<f32>>,
    labels: Option<&'a [Label]>,
}

impl<'a, T: Real> GridBuilder<'a, T> {
    /// Create a builder with the given bin size and default settings.
    pub fn new(bin_size: f64) -> Self {
        Self::from_config(GridConfig::new(bin_size))
    }

    /// Create a builder from a full configuration.
    pub fn from_config(config: GridConfig) -> Self {
        Self {
            config,
            normals: None,
            colors: None,
            labels: None,
        }
    }

    /// Set the bin size.
    pub fn bin_size(mut self, bin_size: f64) -> Self {
        self.config.bin_size = bin_size;
        self
    }

    /// Set the accumulation strategy.
    pub fn accumulation(mut self, accumulation: Accumulation) -> Self {
        self.config.accumulation = accumulation;
        self
    }

    /// Enable or disable the sharded parallel build.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set the number of points per shard for the parallel build.
    pub fn shard_size(mut self, shard_size: usize) -> Self {
        self.config.shard_size = shard_size;
        self
    }

    /// Accumulate per-point normals (`D x N`).
    pub fn normals(mut self, normals: &'a DMatrix<T>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Accumulate per-point colors (`3 x N`).
    pub fn colors(mut self, colors: &'a Matrix3xX<f32>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Track the distinct labels of each bin (one label per point).
    ///
    /// Labels are integer class ids; any `i32` value, negative included, is a
    /// distinct class.
    pub fn labels(mut self, labels: &'a [Label]) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Validate the inputs and build the grid.
    pub fn build(self, points: &'a DMatrix<T>) -> Result<SpatialHashGrid<'a, T>> {
        self.config.validate()?;
        let bin_size = self.checked_bin_size()?;
        self.check_columns(points)?;

        let acc = Accumulator::new(
            points,
            self.normals,
            self.colors,
            self.labels,
            self.config.accumulation,
        );

        let BinTable { lookup, bins } = if self.config.parallel {
            accumulate_sharded(&acc, bin_size, self.config.shard_size)
        } else {
            accumulate(&acc, bin_size)
        };

        debug!(
            points = points.ncols(),
            bins = bins.len(),
            dim = points.nrows(),
            bin_size = self.config.bin_size,
            accumulation = ?self.config.accumulation,
            parallel = self.config.parallel,
            "built spatial hash grid"
        );

        Ok(SpatialHashGrid {
            points,
            bin_size,
            config: self.config,
            tracks_normals: self.normals.is_some(),
            tracks_colors: self.colors.is_some(),
            tracks_labels: self.labels.is_some(),
            lookup,
            bins,
        })
    }

    /// Bin size in the point scalar type. A value that underflows or
    /// overflows the scalar is rejected like a non-positive one.
    fn checked_bin_size(&self) -> Result<T> {
        let bin_size: T = nalgebra::convert(self.config.bin_size);
        if bin_size > T::zero() && bin_size.is_finite() {
            Ok(bin_size)
        } else {
            Err(GridError::InvalidBinSize(self.config.bin_size))
        }
    }

    fn check_columns(&self, points: &DMatrix<T>) -> Result<()> {
        let expected = points.ncols();
        if points.nrows() == 0 {
            return Err(GridError::ZeroDimension);
        }

        if let Some(normals) = self.normals {
            if self.config.accumulation == Accumulation::RawIndices {
                return Err(GridError::NormalsWithRawIndices);
            }
            if normals.ncols() != expected {
                return Err(GridError::AttributeLengthMismatch {
                    attribute: Attribute::Normals,
                    expected,
                    actual: normals.ncols(),
                });
            }
            if normals.nrows() != points.nrows() {
                return Err(GridError::NormalDimensionMismatch {
                    expected: points.nrows(),
                    actual: normals.nrows(),
                });
            }
        }

        if let Some(colors) = self.colors {
            if colors.ncols() != expected {
                return Err(GridError::AttributeLengthMismatch {
                    attribute: Attribute::Colors,
                    expected,
                    actual: colors.ncols(),
                });
            }
        }

        if let Some(labels) = self.labels {
            if labels.len() != expected {
                return Err(GridError::AttributeLengthMismatch {
                    attribute: Attribute::Labels,
                    expected,
                    actual: labels.len(),
                });
            }
        }

        Ok(())
    }
}

/// A built grid of occupied bins.
///
/// Immutable once built. Bins are kept in the order in which their first
/// point appeared in the input; every export emits columns in this order.
#[derive(Debug)]
pub struct SpatialHashGrid<'a, T: Real> {
    pub(crate) points: &'a DMatrix<T>,
    pub(crate) bin_size: T,
    pub(crate) config: GridConfig,
    pub(crate) tracks_normals: bool,
    pub(crate) tracks_colors: bool,
    pub(crate) tracks_labels: bool,
    lookup: HashMap<GridKey, usize>,
    pub(crate) bins: Vec<(GridKey, BinState<T>)>,
}

impl<'a, T: Real> SpatialHashGrid<'a, T> {
    /// Build a points-only grid with running sums.
    ///
    /// # Example
    /// ```
    /// use grid_downsample::{ExportThresholds, SpatialHashGrid};
    /// use nalgebra::DMatrix;
    ///
    /// let points = DMatrix::from_column_slice(2, 3, &[0.0, 0.0, 0.05, 0.05, 2.0, 2.0]);
    /// let grid = SpatialHashGrid::new(&points, 1.0).unwrap();
    /// assert_eq!(grid.len(), 2);
    ///
    /// let downsampled = grid.points(&ExportThresholds::min_points(2));
    /// assert_eq!(downsampled.ncols(), 1);
    /// ```
    pub fn new(points: &'a DMatrix<T>, bin_size: f64) -> Result<Self> {
        GridBuilder::new(bin_size).build(points)
    }

    /// Start configuring a grid.
    pub fn builder(bin_size: f64) -> GridBuilder<'a, T> {
        GridBuilder::new(bin_size)
    }

    /// Number of occupied bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Check if the grid has no bins (empty input).
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Point dimension.
    pub fn dim(&self) -> usize {
        self.points.nrows()
    }

    /// Number of input points.
    pub fn point_count(&self) -> usize {
        self.points.ncols()
    }

    /// Bin edge length.
    pub fn bin_size(&self) -> T {
        self.bin_size
    }

    /// Configuration used to build this grid.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Accumulation strategy used to build this grid.
    pub fn accumulation(&self) -> Accumulation {
        self.config.accumulation
    }

    /// Whether exports can produce normals, either from accumulated normals
    /// or by PCA over raw indices.
    pub fn has_normals(&self) -> bool {
        self.tracks_normals || self.accumulation() == Accumulation::RawIndices
    }

    /// Whether colors were accumulated.
    pub fn has_colors(&self) -> bool {
        self.tracks_colors
    }

    /// Whether labels were tracked.
    pub fn has_labels(&self) -> bool {
        self.tracks_labels
    }

    /// Iterate over bins in export order.
    pub fn bins(&self) -> impl ExactSizeIterator<Item = (&GridKey, &BinState<T>)> {
        self.bins.iter().map(|(key, state)| (key, state))
    }

    /// Get a bin by its key.
    pub fn get(&self, key: &GridKey) -> Option<&BinState<T>> {
        self.get_by_coords(key.as_slice())
    }

    /// Get a bin by raw cell coordinates.
    pub fn get_by_coords(&self, coords: &[i64]) -> Option<&BinState<T>> {
        self.lookup.get(coords).map(|&slot| &self.bins[slot].1)
    }

    /// Get the bin containing a point, if that bin is occupied.
    pub fn get_by_point<'p>(&self, point: impl IntoIterator<Item = &'p T>) -> Option<&BinState<T>>
    where
        T: 'p,
    {
        let mut coords = Vec::with_capacity(self.dim());
        fill_key(&mut coords, point, self.bin_size);
        self.get_by_coords(&coords)
    }
}
