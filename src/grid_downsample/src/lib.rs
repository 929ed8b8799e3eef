//! Spatial grid accumulation and bin-wise reduction for point cloud
//! downsampling.
//!
//! Points of any fixed dimension are bucketed into axis-aligned cells of a
//! given edge length. Each occupied cell accumulates statistics about the
//! points that fell into it, and an export reduces every cell that passes a
//! set of thresholds to one representative point, normal, and color.
//!
//! # Architecture
//!
//! - Build: [`GridBuilder`] validates the inputs and folds each point into its
//!   bin, either in one pass or in rayon shards merged in input order
//! - Export: [`SpatialHashGrid::downsample`] and its convenience wrappers
//!   reduce the retained bins in parallel
//!
//! Two accumulation strategies are available. [`Accumulation::RunningSum`]
//! keeps O(D) sums per bin; [`Accumulation::RawIndices`] keeps the member
//! indices so that normals can be estimated by PCA.
//!
//! # Usage
//!
//! ```
//! use grid_downsample::{Accumulation, ExportThresholds, GridBuilder};
//! use nalgebra::DMatrix;
//!
//! let points = DMatrix::from_column_slice(3, 4, &[
//!     0.1, 0.1, 0.0,
//!     0.4, 0.2, 0.0,
//!     0.3, 0.7, 0.0,
//!     5.0, 5.0, 5.0,
//! ]);
//!
//! let grid = GridBuilder::new(1.0)
//!     .accumulation(Accumulation::RawIndices)
//!     .build(&points)?;
//!
//! let (means, normals) = grid
//!     .points_normals(&ExportThresholds::min_points(2))
//!     .expect("raw-index grids always estimate normals");
//! assert_eq!(means.ncols(), 1);
//! assert_eq!(normals.ncols(), 1);
//! # Ok::<(), grid_downsample::GridError>(())
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod scalar;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Accumulation, ExportThresholds, GridConfig, DEFAULT_SHARD_SIZE};
pub use error::{Attribute, GridError, Result};
pub use export::{Channels, Downsampled};
pub use grid::{BinState, GridBuilder, GridKey, Label, PointStats, SpatialHashGrid};
pub use scalar::Real;
