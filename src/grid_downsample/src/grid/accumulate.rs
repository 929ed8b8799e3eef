//! Per-bin accumulation and the build passes.
//!
//! A build walks the input columns once, folding each point into the bin its
//! key selects. The sharded variant runs that walk on contiguous ranges in
//! parallel and merges the partial tables in range order, which reproduces
//! the sequential bin order exactly.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use nalgebra::{DMatrix, DVector, Matrix3xX, Vector3};
use rayon::prelude::*;
use tracing::trace;

use super::types::{fill_key, BinState, GridKey, Label, PointStats};
use crate::config::Accumulation;
use crate::scalar::Real;

/// Fold operation for one grid.
///
/// Holds the validated input columns and the accumulation mode. The optional
/// columns switch the matching sub-accumulators on; each one updates only its
/// own field of [`BinState`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Accumulator<'a, T: Real> {
    points: &'a DMatrix<T>,
    normals: Option<&'a DMatrix<T>>,
    colors: Option<&'a Matrix3xX<f32>>,
    labels: Option<&'a [Label]>,
    mode: Accumulation,
}

impl<'a, T: Real> Accumulator<'a, T> {
    /// Columns must already have been checked against `points`.
    pub(crate) fn new(
        points: &'a DMatrix<T>,
        normals: Option<&'a DMatrix<T>>,
        colors: Option<&'a Matrix3xX<f32>>,
        labels: Option<&'a [Label]>,
        mode: Accumulation,
    ) -> Self {
        Self {
            points,
            normals,
            colors,
            labels,
            mode,
        }
    }

    /// State of a freshly created bin.
    pub fn init(&self) -> BinState<T> {
        let dim = self.points.nrows();
        let points = match self.mode {
            Accumulation::RunningSum => PointStats::Sum(DVector::zeros(dim)),
            Accumulation::RawIndices => PointStats::Indices(Vec::new()),
        };

        BinState {
            point_count: 0,
            points,
            normal_sum: self.normals.map(|_| DVector::zeros(dim)),
            color_sum: self.colors.map(|_| Vector3::zeros()),
            labels: self.labels.map(|_| BTreeSet::new()),
        }
    }

    /// Fold point `index` into `state`.
    pub fn fold(&self, state: &mut BinState<T>, index: usize) {
        state.point_count += 1;

        match &mut state.points {
            PointStats::Sum(sum) => *sum += self.points.column(index),
            PointStats::Indices(indices) => indices.push(index),
        }

        if let (Some(sum), Some(normals)) = (state.normal_sum.as_mut(), self.normals) {
            *sum += normals.column(index);
        }
        if let (Some(sum), Some(colors)) = (state.color_sum.as_mut(), self.colors) {
            *sum += colors.column(index);
        }
        if let (Some(set), Some(labels)) = (state.labels.as_mut(), self.labels) {
            set.insert(labels[index]);
        }
    }

    /// Number of input points.
    pub fn len(&self) -> usize {
        self.points.ncols()
    }
}

impl<T: Real> BinState<T> {
    /// Combine the state of the same bin built from a later shard.
    ///
    /// Sums and counts add, label sets union, index lists concatenate.
    pub(crate) fn merge(&mut self, other: BinState<T>) {
        self.point_count += other.point_count;

        match (&mut self.points, other.points) {
            (PointStats::Sum(a), PointStats::Sum(b)) => *a += b,
            (PointStats::Indices(a), PointStats::Indices(b)) => a.extend(b),
            _ => unreachable!("bins of one grid share an accumulation mode"),
        }

        if let (Some(a), Some(b)) = (self.normal_sum.as_mut(), other.normal_sum) {
            *a += b;
        }
        if let (Some(a), Some(b)) = (self.color_sum.as_mut(), other.color_sum) {
            *a += b;
        }
        if let (Some(a), Some(b)) = (self.labels.as_mut(), other.labels) {
            a.extend(b);
        }
    }
}

/// Occupied bins in first-appearance order plus a key index into them.
#[derive(Debug)]
pub(crate) struct BinTable<T: Real> {
    pub(crate) lookup: HashMap<GridKey, usize>,
    pub(crate) bins: Vec<(GridKey, BinState<T>)>,
}

impl<T: Real> BinTable<T> {
    fn new() -> Self {
        Self {
            lookup: HashMap::new(),
            bins: Vec::new(),
        }
    }

    fn insert(&mut self, key: GridKey, state: BinState<T>) {
        self.lookup.insert(key.clone(), self.bins.len());
        self.bins.push((key, state));
    }
}

/// Fold the points in `range` into a new table.
pub(crate) fn accumulate_range<T: Real>(
    acc: &Accumulator<'_, T>,
    bin_size: T,
    range: Range<usize>,
) -> BinTable<T> {
    let mut table = BinTable::new();
    let mut scratch = Vec::with_capacity(acc.points.nrows());

    for index in range {
        fill_key(&mut scratch, acc.points.column(index).iter(), bin_size);

        let slot = match table.lookup.get(scratch.as_slice()) {
            Some(&slot) => slot,
            None => {
                table.insert(GridKey::from(scratch.as_slice()), acc.init());
                table.bins.len() - 1
            }
        };

        acc.fold(&mut table.bins[slot].1, index);
    }

    table
}

/// Fold all points with a single-threaded pass.
pub(crate) fn accumulate<T: Real>(acc: &Accumulator<'_, T>, bin_size: T) -> BinTable<T> {
    accumulate_range(acc, bin_size, 0..acc.len())
}

/// Fold all points by building one table per contiguous shard in parallel,
/// then merging the shard tables in shard order.
///
/// `shard_size` must be non-zero.
pub(crate) fn accumulate_sharded<T: Real>(
    acc: &Accumulator<'_, T>,
    bin_size: T,
    shard_size: usize,
) -> BinTable<T> {
    let n = acc.len();
    let shards: Vec<Range<usize>> = (0..n)
        .step_by(shard_size)
        .map(|start| start..(start + shard_size).min(n))
        .collect();

    // Phase 1: independent shard tables (parallel)
    let tables: Vec<BinTable<T>> = shards
        .into_par_iter()
        .map(|range| accumulate_range(acc, bin_size, range))
        .collect();

    // Phase 2: merge by key in shard order
    let mut merged = BinTable::new();
    for (shard, table) in tables.into_iter().enumerate() {
        trace!(shard, bins = table.bins.len(), "merging shard table");
        for (key, state) in table.bins {
            match merged.lookup.get(&key) {
                Some(&slot) => merged.bins[slot].1.merge(state),
                None => merged.insert(key, state),
            }
        }
    }

    merged
}
