//! Mean and population variance over one burst of sensor reads.

use crate::error::EncoderError;

/// Summary of one sample burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub mean: f32,
    /// Population variance (mean squared deviation), deg^2.
    pub variance: f32,
    pub count: usize,
}

/// Compute mean and population variance of `samples`.
///
/// Two-pass in `f64`. A single sample has variance 0; an empty slice is an error.
pub fn compute_stats(samples: &[f32]) -> Result<SampleStats, EncoderError> {
    if samples.is_empty() {
        return Err(EncoderError::NoSamples);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&s| {
            let d = f64::from(s) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Ok(SampleStats {
        mean: mean as f32,
        variance: variance as f32,
        count: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_rejected() {
        assert_eq!(compute_stats(&[]), Err(EncoderError::NoSamples));
    }

    #[test]
    fn single_sample_has_zero_variance() {
        let s = compute_stats(&[42.5]).unwrap();
        assert_eq!(s.mean, 42.5);
        assert_eq!(s.variance, 0.0);
        assert_eq!(s.count, 1);
    }

    #[test]
    fn population_not_sample_variance() {
        // Deviations +-1 around 2: population variance 2/3, sample variance would be 1.
        let s = compute_stats(&[1.0, 2.0, 3.0]).unwrap();
        assert!((s.mean - 2.0).abs() < 1e-6);
        assert!((s.variance - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn five_equal_samples_are_noise_free() {
        let s = compute_stats(&[30.0; 5]).unwrap();
        assert_eq!(s.mean, 30.0);
        assert_eq!(s.variance, 0.0);
    }
}
