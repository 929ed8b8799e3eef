//! Synthetic point clouds for tests.
//!
//! All generators return column matrices (one point per column) and are
//! deterministic: random clouds take an explicit seed.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Pack fixed-size points into a `D x N` matrix.
pub fn columns<const D: usize>(points: &[[f64; D]]) -> DMatrix<f64> {
    DMatrix::from_fn(D, points.len(), |row, col| points[col][row])
}

/// Concatenate point sets with the same dimension.
pub fn hstack(parts: &[DMatrix<f64>]) -> DMatrix<f64> {
    let dim = parts.first().map_or(0, |m| m.nrows());
    let total = parts.iter().map(|m| m.ncols()).sum();
    let mut out = DMatrix::zeros(dim, total);

    let mut offset = 0;
    for part in parts {
        out.columns_mut(offset, part.ncols()).copy_from(part);
        offset += part.ncols();
    }
    out
}

/// Gaussian cluster of `count` points around `center`.
pub fn generate_clustered_points(
    center: &[f64],
    spread: f64,
    count: usize,
    seed: u64,
) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(0.0, spread).unwrap();

    DMatrix::from_fn(center.len(), count, |row, _| {
        center[row] + dist.sample(&mut rng)
    })
}

/// Half-cube made of three orthogonal planes (XY, YZ, ZX) meeting at the
/// origin, each `length` wide with points every `interval`.
///
/// Approximately `3 * (length / interval + 1)^2` points.
pub fn make_half_cubic_cloud(length: f64, interval: f64) -> DMatrix<f64> {
    let per_line = (length / interval) as usize + 1;
    let mut points = Vec::with_capacity(3 * per_line * per_line);

    for i in 0..per_line {
        for j in 0..per_line {
            let u = interval * j as f64;
            let v = interval * i as f64;

            // XY plane (z=0)
            points.push([u, v, 0.0]);
            // YZ plane (x=0)
            points.push([0.0, u, v]);
            // ZX plane (y=0)
            points.push([u, 0.0, v]);
        }
    }

    columns(&points)
}

/// Flat grid of points on the plane `z = height`, covering
/// `[x0, x0 + extent] x [y0, y0 + extent]`.
pub fn make_plane_patch(
    x0: f64,
    y0: f64,
    height: f64,
    extent: f64,
    interval: f64,
) -> DMatrix<f64> {
    let per_line = (extent / interval) as usize + 1;
    let mut points = Vec::with_capacity(per_line * per_line);

    for i in 0..per_line {
        for j in 0..per_line {
            points.push([x0 + interval * j as f64, y0 + interval * i as f64, height]);
        }
    }

    columns(&points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_layout() {
        let m = columns(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(0, 1)], 3.0);
        assert_eq!(m[(1, 2)], 6.0);
    }

    #[test]
    fn test_hstack() {
        let a = columns(&[[1.0, 2.0]]);
        let b = columns(&[[3.0, 4.0], [5.0, 6.0]]);
        let m = hstack(&[a, b]);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(0, 2)], 5.0);
    }

    #[test]
    fn test_half_cubic_size() {
        let cloud = make_half_cubic_cloud(2.0, 0.5);
        assert_eq!(cloud.nrows(), 3);
        assert_eq!(cloud.ncols(), 3 * 5 * 5);
    }

    #[test]
    fn test_clustered_points_deterministic() {
        let a = generate_clustered_points(&[0.0, 0.0, 0.0], 1.0, 10, 42);
        let b = generate_clustered_points(&[0.0, 0.0, 0.0], 1.0, 10, 42);
        assert_eq!(a, b);
    }
}
