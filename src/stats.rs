#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStats {
    pub mean: f64,
    pub std: f64,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// n - 1 denominator
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

pub fn describe(values: &[f64]) -> Option<RollingStats> {
    Some(RollingStats {
        mean: mean(values)?,
        std: sample_std(values)?,
    })
}

/// Window of `window` values ending at `end` inclusive.
pub fn trailing(values: &[f64], end: usize, window: usize) -> Option<RollingStats> {
    if window == 0 || end >= values.len() || end + 1 < window {
        return None;
    }
    describe(&values[end + 1 - window..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_std_uses_n_minus_one() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138089935).abs() < 1e-6);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn constant_values_have_exact_zero_spread() {
        let stats = describe(&[1000.0; 7]).unwrap();
        assert_eq!(stats.mean, 1000.0);
        assert_eq!(stats.std, 0.0);
    }

    #[test]
    fn trailing_is_undefined_before_a_full_window() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(trailing(&values, 5, 7), None);

        let stats = trailing(&values, 6, 7).unwrap();
        assert!((stats.mean - 4.0).abs() < 1e-12);

        let stats = trailing(&values, 9, 7).unwrap();
        assert!((stats.mean - 7.0).abs() < 1e-12);
        assert_eq!(trailing(&values, 10, 7), None);
    }
}
