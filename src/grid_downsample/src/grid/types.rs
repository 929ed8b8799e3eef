//! Type definitions for grid cells and their accumulated state.

use std::borrow::Borrow;
use std::collections::BTreeSet;

use nalgebra::{DVector, Vector3};

use crate::scalar::Real;

/// Class id attached to a point.
///
/// Labels are compared exactly, so fractional class values must be mapped to
/// integer ids before they are supplied.
pub type Label = i32;

/// Integer cell coordinates, one entry per dimension.
///
/// Keys are compared on every component, so two cells are merged only when
/// all their coordinates agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridKey(Box<[i64]>);

impl GridKey {
    /// Create a key from raw cell coordinates.
    pub fn new(coords: impl Into<Box<[i64]>>) -> Self {
        Self(coords.into())
    }

    /// Compute the key of the cell containing a point.
    ///
    /// `key[i] = floor(point[i] / bin_size)`. The caller guarantees that
    /// `bin_size` is positive.
    pub fn from_point<'a, T: Real>(point: impl IntoIterator<Item = &'a T>, bin_size: T) -> Self {
        let mut coords = Vec::new();
        fill_key(&mut coords, point, bin_size);
        Self(coords.into_boxed_slice())
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Cell coordinates.
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Minimum corner of the cell in world coordinates.
    pub fn lower_corner<T: Real>(&self, bin_size: T) -> DVector<T> {
        DVector::from_iterator(
            self.0.len(),
            self.0
                .iter()
                .map(|&k| nalgebra::convert::<f64, T>(k as f64) * bin_size),
        )
    }
}

impl Borrow<[i64]> for GridKey {
    fn borrow(&self) -> &[i64] {
        &self.0
    }
}

impl From<&[i64]> for GridKey {
    fn from(coords: &[i64]) -> Self {
        Self(coords.into())
    }
}

/// Write the cell coordinates of `point` into `buf`, replacing its contents.
///
/// Used by the build loop to look up existing bins without allocating.
#[inline]
pub(crate) fn fill_key<'a, T: Real>(
    buf: &mut Vec<i64>,
    point: impl IntoIterator<Item = &'a T>,
    bin_size: T,
) {
    buf.clear();
    buf.extend(point.into_iter().map(|&c| c.bin_index(bin_size)));
}

/// Position statistic of a bin, one variant per accumulation strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum PointStats<T: Real> {
    /// Running sum of positions.
    Sum(DVector<T>),
    /// Source indices in input order; positions are read back at export.
    Indices(Vec<usize>),
}

/// Statistics accumulated for one occupied bin.
///
/// Which optional fields are present is decided once per grid by the
/// accumulator; every bin of a grid has the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct BinState<T: Real> {
    pub(crate) point_count: usize,
    pub(crate) points: PointStats<T>,
    pub(crate) normal_sum: Option<DVector<T>>,
    pub(crate) color_sum: Option<Vector3<f32>>,
    pub(crate) labels: Option<BTreeSet<Label>>,
}

impl<T: Real> BinState<T> {
    /// Number of points folded into this bin. Always at least 1 once built.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Position statistic.
    pub fn points(&self) -> &PointStats<T> {
        &self.points
    }

    /// Sum of point positions (running-sum accumulation only).
    pub fn point_sum(&self) -> Option<&DVector<T>> {
        match &self.points {
            PointStats::Sum(sum) => Some(sum),
            PointStats::Indices(_) => None,
        }
    }

    /// Source indices of the points in this bin, in input order
    /// (raw-index accumulation only).
    pub fn indices(&self) -> Option<&[usize]> {
        match &self.points {
            PointStats::Sum(_) => None,
            PointStats::Indices(indices) => Some(indices),
        }
    }

    /// Unnormalized sum of supplied normals.
    pub fn normal_sum(&self) -> Option<&DVector<T>> {
        self.normal_sum.as_ref()
    }

    /// Sum of supplied colors.
    pub fn color_sum(&self) -> Option<&Vector3<f32>> {
        self.color_sum.as_ref()
    }

    /// Distinct labels seen in this bin.
    pub fn labels(&self) -> Option<&BTreeSet<Label>> {
        self.labels.as_ref()
    }

    /// Number of distinct labels, if labels are tracked.
    pub fn distinct_labels(&self) -> Option<usize> {
        self.labels.as_ref().map(BTreeSet::len)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_key_from_point() {
        let key = GridKey::from_point(&[0.0_f64, 0.0, 0.0], 2.0);
        assert_eq!(key.as_slice(), &[0, 0, 0]);

        let key = GridKey::from_point(&[3.5_f64, 5.1, 1.9], 2.0);
        assert_eq!(key.as_slice(), &[1, 2, 0]);

        // Negative coordinates round down, not toward zero
        let key = GridKey::from_point(&[-3.5_f32, -1.1, -0.1], 2.0);
        assert_eq!(key.as_slice(), &[-2, -1, -1]);
    }

    #[test]
    fn test_grid_key_any_dimension() {
        let key = GridKey::from_point(&[0.5_f64, 1.5], 1.0);
        assert_eq!(key.dim(), 2);
        assert_eq!(key.as_slice(), &[0, 1]);

        let key = GridKey::from_point(&[0.1_f64, 1.1, 2.1, 3.1, -4.1], 1.0);
        assert_eq!(key.dim(), 5);
        assert_eq!(key.as_slice(), &[0, 1, 2, 3, -5]);
    }

    #[test]
    fn test_grid_key_borrowed_lookup() {
        let mut map: HashMap<GridKey, usize> = HashMap::new();
        map.insert(GridKey::new(vec![1_i64, -2, 3]), 7);

        let probe: &[i64] = &[1, -2, 3];
        assert_eq!(map.get(probe), Some(&7));

        // Keys that differ in a single component never collide
        let probe: &[i64] = &[1, -2, 4];
        assert_eq!(map.get(probe), None);
    }

    #[test]
    fn test_fill_key_reuses_buffer() {
        let mut buf = vec![9, 9, 9, 9];
        fill_key(&mut buf, &[0.25_f64, -0.25], 0.5);
        assert_eq!(buf, vec![0, -1]);
    }

    #[test]
    fn test_lower_corner() {
        let key = GridKey::new(vec![1_i64, -2, 0]);
        let corner = key.lower_corner(0.5_f64);
        assert_relative_eq!(corner[0], 0.5);
        assert_relative_eq!(corner[1], -1.0);
        assert_relative_eq!(corner[2], 0.0);
    }
}
