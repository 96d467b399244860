//! Global multiplicative bias correction.

/// Smallest and largest factor [`bias_factor`] returns.
pub const BIAS_BOUNDS: (f64, f64) = (0.5, 2.0);

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// `mean(actual) / mean(predicted)`, clamped to [`BIAS_BOUNDS`].
///
/// An infinite ratio resolves to the nearest bound and an undefined one
/// (empty inputs, `0 / 0`) to `1.0`.
pub fn bias_factor(actual: &[f64], predicted: &[f64]) -> f64 {
    let ratio = mean(actual) / mean(predicted);
    if ratio.is_nan() {
        return 1.0;
    }
    ratio.clamp(BIAS_BOUNDS.0, BIAS_BOUNDS.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_of_means() {
        let factor = bias_factor(&[110.0, 130.0], &[100.0, 100.0]);
        assert!((factor - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_to_bounds() {
        assert_eq!(bias_factor(&[1000.0], &[100.0]), 2.0);
        assert_eq!(bias_factor(&[10.0], &[100.0]), 0.5);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(bias_factor(&[100.0], &[0.0]), 2.0);
        assert_eq!(bias_factor(&[], &[]), 1.0);
        assert_eq!(bias_factor(&[0.0], &[0.0]), 1.0);
    }
}
