//! Small numeric helpers used across the leaklens crates.

/// Arithmetic mean of a slice, or `None` for an empty slice.
///
/// Accumulates in `f64` regardless of input length.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Whole-number progress percentage, `round(100 * done / total)`.
///
/// A zero total reports 100 so that empty work is never shown as stalled.
#[must_use]
pub fn percentage(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (100.0 * done as f64 / total as f64).round() as u8
}

/// Returns `true` when every value in the slice is NaN or infinite.
#[must_use]
pub fn all_non_finite(values: &[f64]) -> bool {
    !values.is_empty() && values.iter().all(|v| !v.is_finite())
}

/// Two scores compare equal when they differ by at most this epsilon.
pub const SCORE_EPSILON: f64 = 1e-12;

/// Compares two candidate scores with the deterministic tie-break epsilon.
#[must_use]
pub fn scores_tied(a: f64, b: f64) -> bool {
    (a - b).abs() <= SCORE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[3.0]), Some(3.0));
        assert!((mean(&[1.0, 2.0, 3.0]).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 10), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(10, 10), 100);
        assert_eq!(percentage(0, 0), 100);
    }

    #[test]
    fn test_all_non_finite() {
        assert!(all_non_finite(&[f64::NAN, f64::INFINITY]));
        assert!(!all_non_finite(&[f64::NAN, 1.0]));
        assert!(!all_non_finite(&[]));
    }

    #[test]
    fn test_scores_tied() {
        assert!(scores_tied(0.5, 0.5 + 1e-13));
        assert!(!scores_tied(0.5, 0.5 + 1e-9));
    }
}
