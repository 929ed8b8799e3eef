//! Scalar types accepted for point coordinates.

use nalgebra::RealField;

/// Floating-point scalar usable as a point coordinate.
///
/// Implemented for `f32` and `f64`. Colors are always accumulated in `f32`
/// regardless of this type.
pub trait Real: RealField + Copy + Send + Sync + 'static {
    /// Cell index of a single coordinate: `floor(self / bin_size)`.
    ///
    /// Out-of-range and non-finite quotients saturate (NaN maps to 0). Points
    /// whose quotient exceeds the `i64` range on an axis therefore share the
    /// boundary cell on that axis.
    fn bin_index(self, bin_size: Self) -> i64;

    /// Converts a bin population into the scalar type.
    fn from_count(count: usize) -> Self;
}

macro_rules! impl_real {
    ($($t:ty),*) => {$(
        impl Real for $t {
            #[inline]
            fn bin_index(self, bin_size: Self) -> i64 {
                (self / bin_size).floor() as i64
            }

            #[inline]
            fn from_count(count: usize) -> Self {
                count as $t
            }
        }
    )*};
}

impl_real!(f32, f64);
