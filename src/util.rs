use na::{Matrix3, Vector3};

use crate::types::Float;

/// Skew-symmetric matrix of v, such that skew_symmetric(v) * u = v x u
#[rustfmt::skip]
pub fn skew_symmetric(v: &Vector3<Float>) -> Matrix3<Float> {
    Matrix3::new(
        0.,   -v.z,  v.y,
        v.z,   0.,  -v.x,
        -v.y,  v.x,  0.,
    )
}

/// Panics if any component of a vector or matrix is NaN or infinite.
///
/// A non-finite spatial quantity means the configuration or an upstream
/// solver is already corrupt, so the current computation cannot continue.
#[macro_export]
macro_rules! assert_finite {
    ($value:expr, $what:expr) => {
        if !$value.iter().all(|x| x.is_finite()) {
            panic!("{} contains NaN or Inf: {}", $what, $value);
        }
    };
}

#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $tolerance:expr) => {
        match (&$left, &$right, &$tolerance) {
            (left, right, tol) => {
                let diff: $crate::types::Float = $crate::types::Float::abs(*left - *right);
                if diff > *tol {
                    panic!(
                        "assertion failed: {} ~= {} \
                        (tolerance: {}, difference: {})",
                        left, right, tol, diff
                    );
                }
            }
        }
    };
}

/// Element-wise `assert_close!`. Both sides are borrowed, so owned
/// matrices stay usable and temporaries live until the check is done.
#[macro_export]
macro_rules! assert_vec_close {
    ($left:expr, $right:expr, $tolerance:expr) => {
        match (&$left, &$right, &$tolerance) {
            (left, right, tol) => {
                assert_eq!(left.len(), right.len(), "length mismatch");
                for (a, b) in left.iter().zip(right.iter()) {
                    $crate::assert_close!(*a, *b, *tol);
                }
            }
        }
    };
}
