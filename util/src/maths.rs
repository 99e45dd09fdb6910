//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
///
/// The value is not limited to the source range, so the result can fall
/// outside the target range.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Limit a value to a symmetric range `[-bound, bound]`.
pub fn clamp_sym<T>(value: T, bound: T) -> T
where
    T: Float,
{
    let bound = bound.abs();

    if value > bound {
        bound
    } else if value < -bound {
        -bound
    } else {
        value
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// Due to floating point round-off the result can equal `rhs.abs()` when
/// `lhs` is a tiny negative number, callers that need a half-open range must
/// check for this.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Normalise an angle in degrees into the half-open range `[0, 360)`.
pub fn norm_deg_360<T>(value: T) -> T
where
    T: Float,
{
    let full: T = T::from(360.0).unwrap_or_else(T::max_value);

    let r = rem_euclid(value, full);

    if r >= full {
        T::zero()
    } else {
        r
    }
}

/// Get the signed angular distance in degrees from `a` to `b`.
///
/// The result is the shortest rotation in the range `[-180, 180]`, positive
/// when `b` is clockwise of `a` (compass convention).
pub fn get_ang_dist_deg<T>(a: T, b: T) -> T
where
    T: Float,
{
    let full: T = T::from(360.0).unwrap_or_else(T::max_value);
    let half: T = T::from(180.0).unwrap_or_else(T::max_value);

    let d = norm_deg_360(b - a);

    if d > half {
        d - full
    } else {
        d
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((-30f64, 30f64), (2f64, 126f64), 0f64), 64f64);
        assert_eq!(lin_map((-30f64, 30f64), (2f64, 126f64), 30f64), 126f64);
        assert_eq!(lin_map((-1f64, 1f64), (2f64, 126f64), -1f64), 2f64);
    }

    #[test]
    fn test_clamp_sym() {
        assert_eq!(clamp_sym(12.0, 10.0), 10.0);
        assert_eq!(clamp_sym(-12.0, 10.0), -10.0);
        assert_eq!(clamp_sym(3.0, -10.0), 3.0);
    }

    #[test]
    fn test_norm_deg_360() {
        assert_eq!(norm_deg_360(-90f64), 270f64);
        assert_eq!(norm_deg_360(360f64), 0f64);
        assert_eq!(norm_deg_360(725f64), 5f64);

        // Tiny negative angles must not produce exactly 360
        let r = norm_deg_360(-1e-15f64);
        assert!(r >= 0.0 && r < 360.0);
    }

    #[test]
    fn test_get_ang_dist_deg() {
        assert_eq!(get_ang_dist_deg(10f64, 20f64), 10f64);
        assert_eq!(get_ang_dist_deg(20f64, 10f64), -10f64);
        assert_eq!(get_ang_dist_deg(350f64, 10f64), 20f64);
        assert_eq!(get_ang_dist_deg(10f64, 350f64), -20f64);
        assert_eq!(get_ang_dist_deg(0f64, 180f64), 180f64);
    }
}
