//! Normal reduction for a single bin.

use nalgebra::{DMatrix, DVector};

use crate::scalar::Real;

/// Mean of accumulated normals, rescaled to unit length.
///
/// No orientation is imposed. A zero sum stays zero.
pub(crate) fn mean_normal<T: Real>(normal_sum: &DVector<T>, count: usize) -> DVector<T> {
    let mean = normal_sum * (T::one() / T::from_count(count));
    let norm = mean.norm();
    if norm > T::zero() {
        mean / norm
    } else {
        mean
    }
}

/// Exact mean of the columns of `points` selected by `indices`.
///
/// `indices` must not be empty.
pub(crate) fn raw_mean<T: Real>(points: &DMatrix<T>, indices: &[usize]) -> DVector<T> {
    let mut mean = DVector::zeros(points.nrows());
    for &i in indices {
        mean += points.column(i);
    }
    mean * (T::one() / T::from_count(indices.len()))
}

/// Covariance of the selected columns about `mean`, divided by their count.
pub(crate) fn raw_covariance<T: Real>(
    points: &DMatrix<T>,
    indices: &[usize],
    mean: &DVector<T>,
) -> DMatrix<T> {
    let dim = points.nrows();
    let mut covariance = DMatrix::zeros(dim, dim);
    for &i in indices {
        let diff = points.column(i) - mean;
        covariance += &diff * diff.transpose();
    }
    covariance * (T::one() / T::from_count(indices.len()))
}

/// Surface normal of the selected points by PCA.
///
/// The normal is the eigenvector of the smallest covariance eigenvalue (the
/// lowest index wins ties), flipped so that `dot(normal, mean) <= 0`: with no
/// viewpoint available the normal faces away from the origin side of the bin.
pub(crate) fn estimate_normal<T: Real>(
    points: &DMatrix<T>,
    indices: &[usize],
    mean: &DVector<T>,
) -> DVector<T> {
    let eigen = raw_covariance(points, indices, mean).symmetric_eigen();

    let mut smallest = 0;
    for (i, value) in eigen.eigenvalues.iter().enumerate() {
        if *value < eigen.eigenvalues[smallest] {
            smallest = i;
        }
    }

    let normal = eigen.eigenvectors.column(smallest).into_owned();
    orient_against(normal, mean)
}

/// Flip `normal` if it points along `reference`.
pub(crate) fn orient_against<T: Real>(normal: DVector<T>, reference: &DVector<T>) -> DVector<T> {
    if normal.dot(reference) > T::zero() {
        -normal
    } else {
        normal
    }
}
