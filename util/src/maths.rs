//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Inverse cosine with the input clamped into `[-1, 1]`.
///
/// Dot products of two unit vectors can land just outside the domain of
/// `acos` due to rounding (e.g. `1.0000001`), which would otherwise yield
/// NaN.
pub fn clamped_acos<T>(value: T) -> T
where
    T: Float
{
    value.max(-T::one()).min(T::one()).acos()
}

/// Round a value to the given number of decimal places.
///
/// The exact binary value is rounded, so a literal such as `0.6795` (stored as
/// `0.67949999...`) rounds down. Non-finite values are returned unchanged.
pub fn round_dp(value: f64, decimal_places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }

    format!("{:.*}", decimal_places, value)
        .parse()
        .unwrap_or(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamped_acos() {
        assert_eq!(clamped_acos(1.0000001f64), 0f64);
        assert_eq!(clamped_acos(-1.0000001f64), std::f64::consts::PI);
        assert!((clamped_acos(0f64) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!(!clamped_acos(1.5f64).is_nan());
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(round_dp(0.67849, 3), 0.678);
        assert_eq!(round_dp(-0.1236, 3), -0.124);
        assert_eq!(round_dp(1.0, 3), 1.0);
    }

    #[test]
    fn test_round_dp_binary_ties() {
        // Neither literal is exactly representable, both sit just below the half
        assert_eq!(round_dp(0.6795, 3), 0.679);
        assert_eq!(round_dp(0.0905, 3), 0.09);
        assert_eq!(round_dp(-0.6795, 3), -0.679);

        assert!(round_dp(f64::NAN, 3).is_nan());
        assert_eq!(round_dp(f64::INFINITY, 3), f64::INFINITY);
    }
}
