//! Errors raised while building a grid.
//!
//! Every variant is a configuration error: it is detected once, before any
//! point is folded, and no grid is produced. A built grid never fails.

use std::fmt;

use thiserror::Error;

/// Per-point attribute that can be accumulated alongside the positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Normals,
    Colors,
    Labels,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Attribute::Normals => "normals",
            Attribute::Colors => "colors",
            Attribute::Labels => "labels",
        };
        f.write_str(name)
    }
}

/// Errors from grid construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("bin size must be positive and finite, got {0}")]
    InvalidBinSize(f64),

    #[error("point set has zero rows; at least one dimension is required")]
    ZeroDimension,

    #[error("{attribute} have {actual} columns but the point set has {expected}")]
    AttributeLengthMismatch {
        attribute: Attribute,
        expected: usize,
        actual: usize,
    },

    #[error("normals have {actual} rows but points have {expected}")]
    NormalDimensionMismatch { expected: usize, actual: usize },

    #[error("raw index accumulation estimates normals itself; supplied normals cannot be folded")]
    NormalsWithRawIndices,

    #[error("shard size must be at least 1")]
    InvalidShardSize,
}

/// Result alias for grid construction.
pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridError::InvalidBinSize(-0.5);
        assert_eq!(err.to_string(), "bin size must be positive and finite, got -0.5");

        let err = GridError::AttributeLengthMismatch {
            attribute: Attribute::Colors,
            expected: 10,
            actual: 9,
        };
        assert_eq!(
            err.to_string(),
            "colors have 9 columns but the point set has 10"
        );

        let err = GridError::NormalDimensionMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "normals have 2 rows but points have 3");
    }
}
