//! Module for the Monte Carlo variance-component simulation.
use ndarray::{Array1, Array2};
use ndarray_linalg::{Cholesky, UPLO};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;
use thiserror::Error;

use crate::{FixedEffects, I2Result};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Degenerate variance: {0}")]
    DegenerateVariance(String),
    #[error("Linear algebra error: {0}")]
    LinAlg(String),
}

/// Draws a seeded Monte Carlo sample of random effects and splits total
/// variance into a between-study component (v1) and a within-study
/// component (v2), reporting I-squared = v1 / (v1 + v2).
///
/// One random-effect pair (Mu_0, Mu_1) ~ N((0,0), cov) is drawn per
/// observation, aligned with the exposure vector `x` by row order. The RNG
/// is seeded locally on entry, so two calls with identical inputs return
/// bit-for-bit identical results regardless of call history.
///
/// `cov` is expected to have passed [`crate::screen::screen_covariance`];
/// a non-positive-definite matrix surfaces here as [`SimError::LinAlg`].
pub fn simulate_variance_components(
    fixed: &FixedEffects,
    cov: &Array2<f64>,
    x: &Array1<f64>,
    n_aver: f64,
    seed: u64,
) -> Result<I2Result, SimError> {
    let n_obs = x.len();
    if n_obs < 2 {
        return Err(SimError::DegenerateVariance(format!(
            "need at least 2 observations for a sample variance, got {}", n_obs
        )));
    }

    // Lower-triangular factor L with cov = L * L^T; maps iid standard
    // normals onto the target bivariate normal.
    let chol = cov
        .cholesky(UPLO::Lower)
        .map_err(|e| SimError::LinAlg(e.to_string()))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let std_normal = Normal::new(0.0, 1.0).unwrap();

    log::info!("Drawing {} bivariate normal samples (seed = {})", n_obs, seed);

    let mut mu_0 = Array1::zeros(n_obs);
    let mut mu_1 = Array1::zeros(n_obs);
    for i in 0..n_obs {
        let z0: f64 = std_normal.sample(&mut rng);
        let z1: f64 = std_normal.sample(&mut rng);
        mu_0[i] = chol[[0, 0]] * z0;
        mu_1[i] = chol[[1, 0]] * z0 + chol[[1, 1]] * z1;
    }

    // Between-study component: unbiased sample variance of the simulated
    // slopes shifted by the fixed-effect slope.
    let slope_draws = mu_1.mapv(|m| m + fixed.beta1);
    let v1 = sample_variance(&slope_draws);

    // Within-study component: binomial variance of the fitted probabilities
    // on the linear-predictor scale, scaled by the average study size.
    let mut v2_sum = 0.0;
    for i in 0..n_obs {
        let y_est = (fixed.beta0 + mu_0[i]) + (fixed.beta1 + mu_1[i]) * x[i];
        let p_est = 1.0 / (1.0 + (-y_est).exp());
        v2_sum += (1.0 / n_aver) * p_est * (1.0 - p_est);
    }
    let v2 = v2_sum / n_obs as f64;

    let total = v1 + v2;
    if total == 0.0 || !total.is_finite() {
        return Err(SimError::DegenerateVariance(format!(
            "v1 + v2 = {} (v1 = {}, v2 = {}); I-squared is undefined", total, v1, v2
        )));
    }

    let i_squared = v1 / total;
    log::info!("Variance components: v1 = {}, v2 = {}, I-squared = {}", v1, v2, i_squared);

    Ok(I2Result { v1, v2, i_squared })
}

/// Unbiased (n-1 denominator) sample variance.
fn sample_variance(values: &Array1<f64>) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.sum() / n as f64;
    values.mapv(|v| (v - mean) * (v - mean)).sum() / (n - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn alternating_exposure(n: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| (i % 2) as f64))
    }

    #[test]
    fn sample_variance_matches_hand_computation() {
        let values = array![1.0, 2.0, 3.0, 4.0];
        // mean 2.5, squared deviations 2.25 + 0.25 + 0.25 + 2.25 = 5.0
        assert_abs_diff_eq!(sample_variance(&values), 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn result_is_a_valid_ratio() {
        let fixed = FixedEffects { beta0: -1.0, beta1: 0.5 };
        let cov = array![[0.2, 0.0], [0.0, 0.1]];
        let x = alternating_exposure(10);

        let res = simulate_variance_components(&fixed, &cov, &x, 5.0, crate::DEFAULT_SEED).unwrap();

        assert!(res.v1.is_finite() && res.v1 >= 0.0);
        assert!(res.v2.is_finite() && res.v2 >= 0.0);
        assert!((0.0..=1.0).contains(&res.i_squared));
    }

    #[test]
    fn identical_seeds_reproduce_bit_for_bit() {
        let fixed = FixedEffects { beta0: -1.0, beta1: 0.5 };
        let cov = array![[0.2, 0.0], [0.0, 0.1]];
        let x = alternating_exposure(50);

        let a = simulate_variance_components(&fixed, &cov, &x, 5.0, 4321).unwrap();
        let b = simulate_variance_components(&fixed, &cov, &x, 5.0, 4321).unwrap();

        assert_eq!(a.v1.to_bits(), b.v1.to_bits());
        assert_eq!(a.v2.to_bits(), b.v2.to_bits());
        assert_eq!(a.i_squared.to_bits(), b.i_squared.to_bits());
    }

    #[test]
    fn different_seeds_differ() {
        let fixed = FixedEffects { beta0: -1.0, beta1: 0.5 };
        let cov = array![[0.2, 0.0], [0.0, 0.1]];
        let x = alternating_exposure(50);

        let a = simulate_variance_components(&fixed, &cov, &x, 5.0, 4321).unwrap();
        let b = simulate_variance_components(&fixed, &cov, &x, 5.0, 1234).unwrap();

        assert_ne!(a.i_squared.to_bits(), b.i_squared.to_bits());
    }

    #[test]
    fn correlated_covariance_is_sampled() {
        let fixed = FixedEffects { beta0: 0.0, beta1: 0.0 };
        let cov = array![[0.2, 0.05], [0.05, 0.1]];
        let x = alternating_exposure(100);

        let res = simulate_variance_components(&fixed, &cov, &x, 10.0, 99).unwrap();
        assert!((0.0..=1.0).contains(&res.i_squared));
    }

    #[test]
    fn single_observation_is_degenerate() {
        let fixed = FixedEffects { beta0: 0.0, beta1: 0.0 };
        let cov = array![[0.2, 0.0], [0.0, 0.1]];
        let x = array![1.0];

        assert!(matches!(
            simulate_variance_components(&fixed, &cov, &x, 1.0, 4321),
            Err(SimError::DegenerateVariance(_))
        ));
    }

    #[test]
    fn non_finite_average_study_size_is_degenerate() {
        let fixed = FixedEffects { beta0: 0.0, beta1: 0.0 };
        let cov = array![[0.2, 0.0], [0.0, 0.1]];
        let x = alternating_exposure(10);

        assert!(matches!(
            simulate_variance_components(&fixed, &cov, &x, f64::NAN, 4321),
            Err(SimError::DegenerateVariance(_))
        ));
    }

    #[test]
    fn non_positive_definite_covariance_is_a_linalg_error() {
        // The screener catches this first in the pipeline; a direct library
        // call must still fail cleanly.
        let fixed = FixedEffects { beta0: 0.0, beta1: 0.0 };
        let cov = array![[0.0, 0.0], [0.0, 0.0]];
        let x = alternating_exposure(10);

        assert!(matches!(
            simulate_variance_components(&fixed, &cov, &x, 5.0, 4321),
            Err(SimError::LinAlg(_))
        ));
    }
}
