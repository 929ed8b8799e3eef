//! Downsampling exports over a built grid.
//!
//! Every export is a read-only pass over the grid's bins in their fixed
//! order. A bin is dropped when it fails the [`ExportThresholds`]; every
//! retained bin contributes exactly one column to each requested output, so
//! column `j` of the points, normals and colors refers to the same bin.
//!
//! Per-bin reductions run on the rayon pool. Collecting an indexed parallel
//! iterator keeps bin order, so results do not depend on scheduling.

mod normals;

use nalgebra::{DMatrix, DVector, Matrix3xX, Vector3};
use rayon::prelude::*;
use tracing::debug;

use crate::config::ExportThresholds;
use crate::grid::{BinState, GridKey, PointStats, SpatialHashGrid};
use crate::scalar::Real;

use self::normals::{estimate_normal, mean_normal, raw_mean};

/// Output columns requested from an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channels {
    pub points: bool,
    pub normals: bool,
    pub colors: bool,
}

impl Channels {
    pub const POINTS: Self = Self {
        points: true,
        normals: false,
        colors: false,
    };
    pub const NORMALS: Self = Self {
        points: false,
        normals: true,
        colors: false,
    };
    pub const COLORS: Self = Self {
        points: false,
        normals: false,
        colors: true,
    };
    pub const ALL: Self = Self {
        points: true,
        normals: true,
        colors: true,
    };

    /// Channels requested by either set.
    pub fn union(self, other: Self) -> Self {
        Self {
            points: self.points || other.points,
            normals: self.normals || other.normals,
            colors: self.colors || other.colors,
        }
    }
}

/// Result of an export: one column per retained bin.
///
/// A channel is `Some` when it was requested and the grid can produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct Downsampled<T: Real> {
    /// Key of each retained bin.
    pub keys: Vec<GridKey>,
    /// Number of input points in each retained bin.
    pub point_counts: Vec<usize>,
    /// Mean position per bin (`D x M`).
    pub points: Option<DMatrix<T>>,
    /// Unit normal per bin (`D x M`).
    pub normals: Option<DMatrix<T>>,
    /// Mean color per bin (`3 x M`).
    pub colors: Option<Matrix3xX<f32>>,
}

impl<T: Real> Downsampled<T> {
    /// Number of retained bins.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Reduction of one retained bin.
struct Sample<T: Real> {
    point: Option<DVector<T>>,
    normal: Option<DVector<T>>,
    color: Option<Vector3<f32>>,
}

impl<'a, T: Real> SpatialHashGrid<'a, T> {
    /// Channels this grid can produce.
    pub fn available_channels(&self) -> Channels {
        Channels {
            points: true,
            normals: self.has_normals(),
            colors: self.has_colors(),
        }
    }

    /// Whether a bin passes the thresholds.
    ///
    /// The label threshold applies only when labels are tracked.
    pub fn retains(&self, state: &BinState<T>, thresholds: &ExportThresholds) -> bool {
        state.point_count() >= thresholds.min_points_in_bin
            && state
                .distinct_labels()
                .map_or(true, |n| n >= thresholds.min_different_labels_in_bin)
    }

    /// Reduce every retained bin in a single pass.
    ///
    /// Requested channels the grid cannot produce come back as `None`.
    pub fn downsample(&self, thresholds: &ExportThresholds, requested: Channels) -> Downsampled<T> {
        let available = self.available_channels();
        let channels = Channels {
            points: requested.points,
            normals: requested.normals && available.normals,
            colors: requested.colors && available.colors,
        };

        let samples: Vec<Option<Sample<T>>> = self
            .bins
            .par_iter()
            .map(|(_, state)| {
                self.retains(state, thresholds)
                    .then(|| self.reduce(state, channels))
            })
            .collect();

        let retained = samples.iter().filter(|s| s.is_some()).count();
        let dim = self.dim();

        let mut out = Downsampled {
            keys: Vec::with_capacity(retained),
            point_counts: Vec::with_capacity(retained),
            points: channels.points.then(|| DMatrix::zeros(dim, retained)),
            normals: channels.normals.then(|| DMatrix::zeros(dim, retained)),
            colors: channels.colors.then(|| Matrix3xX::zeros(retained)),
        };

        let kept = self
            .bins
            .iter()
            .zip(samples)
            .filter_map(|((key, state), sample)| sample.map(|s| (key, state, s)));
        for (col, (key, state, sample)) in kept.enumerate() {
            out.keys.push(key.clone());
            out.point_counts.push(state.point_count());
            if let (Some(m), Some(p)) = (out.points.as_mut(), sample.point) {
                m.set_column(col, &p);
            }
            if let (Some(m), Some(n)) = (out.normals.as_mut(), sample.normal) {
                m.set_column(col, &n);
            }
            if let (Some(m), Some(c)) = (out.colors.as_mut(), sample.color) {
                m.set_column(col, &c);
            }
        }

        debug!(
            bins = self.bins.len(),
            retained,
            excluded = self.bins.len() - retained,
            min_points_in_bin = thresholds.min_points_in_bin,
            min_different_labels_in_bin = thresholds.min_different_labels_in_bin,
            "exported downsampled bins"
        );

        out
    }

    /// Mean position of every retained bin (`D x M`).
    pub fn points(&self, thresholds: &ExportThresholds) -> DMatrix<T> {
        self.downsample(thresholds, Channels::POINTS)
            .points
            .unwrap_or_else(|| DMatrix::zeros(self.dim(), 0))
    }

    /// Normal of every retained bin, or `None` if the grid has no normal
    /// source.
    ///
    /// Running-sum grids average the supplied normals and rescale them to
    /// unit length without reorienting them. Raw-index grids estimate normals
    /// by PCA, oriented so that `dot(normal, mean) <= 0`.
    pub fn normals(&self, thresholds: &ExportThresholds) -> Option<DMatrix<T>> {
        self.downsample(thresholds, Channels::NORMALS).normals
    }

    /// Mean color of every retained bin, or `None` if colors were not
    /// accumulated.
    pub fn colors(&self, thresholds: &ExportThresholds) -> Option<Matrix3xX<f32>> {
        self.downsample(thresholds, Channels::COLORS).colors
    }

    /// Points and normals of the same bins.
    pub fn points_normals(&self, thresholds: &ExportThresholds) -> Option<(DMatrix<T>, DMatrix<T>)> {
        let out = self.downsample(thresholds, Channels::POINTS.union(Channels::NORMALS));
        Some((out.points?, out.normals?))
    }

    /// Points and colors of the same bins.
    pub fn points_colors(
        &self,
        thresholds: &ExportThresholds,
    ) -> Option<(DMatrix<T>, Matrix3xX<f32>)> {
        let out = self.downsample(thresholds, Channels::POINTS.union(Channels::COLORS));
        Some((out.points?, out.colors?))
    }

    /// Points, normals and colors of the same bins.
    pub fn points_normals_colors(
        &self,
        thresholds: &ExportThresholds,
    ) -> Option<(DMatrix<T>, DMatrix<T>, Matrix3xX<f32>)> {
        let out = self.downsample(thresholds, Channels::ALL);
        Some((out.points?, out.normals?, out.colors?))
    }

    fn reduce(&self, state: &BinState<T>, channels: Channels) -> Sample<T> {
        let count = state.point_count();
        let scale = T::one() / T::from_count(count);

        // Raw-index grids need the mean for PCA even when points are not
        // requested.
        let mean = match state.points() {
            PointStats::Sum(sum) => channels.points.then(|| sum * scale),
            PointStats::Indices(indices) => (channels.points || channels.normals)
                .then(|| raw_mean(self.points, indices)),
        };

        let normal = if channels.normals {
            match (state.points(), state.normal_sum(), &mean) {
                (_, Some(sum), _) => Some(mean_normal(sum, count)),
                (PointStats::Indices(indices), None, Some(mean)) => {
                    Some(estimate_normal(self.points, indices, mean))
                }
                _ => None,
            }
        } else {
            None
        };

        let color = if channels.colors {
            state.color_sum().map(|sum| sum * (1.0 / count as f32))
        } else {
            None
        };

        Sample {
            point: if channels.points { mean } else { None },
            normal,
            color,
        }
    }
}
