//! # IPD-I2-RUST Crate
//!
//! This library contains the core numeric logic for estimating the I-squared
//! heterogeneity statistic of a one-stage individual-participant-data (IPD)
//! meta-analysis of a binary outcome. The binary `estimate-i2` calls
//! functions from this library.
//!
//! The mixed-effects logistic regression itself is fit externally; this crate
//! consumes its fixed-effect estimates and random-effects covariance matrix
//! and runs a deterministic Monte Carlo simulation to split total variance
//! into between-study (v1) and within-study (v2) components.

// Re-export key modules
pub mod io;
pub mod sample_size;
pub mod screen;
pub mod simulate;

/// Default seed for the Monte Carlo draw. Results are bit-for-bit
/// reproducible for a fixed seed; callers needing independent replicates
/// must pass their own.
pub const DEFAULT_SEED: u64 = 4321;

/// Fixed-effect estimates from the external mixed-model fit.
/// Positional contract: row 1 of the estimates table is the intercept,
/// row 2 the slope.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FixedEffects {
    /// Intercept estimate (beta0)
    pub beta0: f64,
    /// Slope estimate (beta1)
    pub beta1: f64,
}

/// Per-study sample-size statistics derived from the study dataset.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SampleSizeSummary {
    /// Number of distinct studies (distinct subject-id values)
    pub n_subj: usize,
    /// Total number of observations (rows)
    pub n_obs: usize,
    /// Average observations per study, n_obs / n_subj (true division)
    pub n_aver: f64,
}

/// Output of the variance-component simulation.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct I2Result {
    /// Between-study variance component
    pub v1: f64,
    /// Within-study variance component
    pub v2: f64,
    /// I-squared estimate, v1 / (v1 + v2)
    pub i_squared: f64,
}
