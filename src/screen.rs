//! Module for screening the random-effects covariance matrix.
use ndarray::Array2;
use ndarray_linalg::{Cholesky, EigValsh, UPLO};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("Covariance matrix is not positive-definite: {0}")]
    NonPositiveDefinite(String),
    #[error("Invalid dimensions: {0}")]
    Dimensions(String),
}

/// Relative tolerance for the symmetry check.
const SYMMETRY_TOL: f64 = 1e-8;

/// Validates that `cov` is a symmetric positive-definite 2x2 matrix.
///
/// Runs two independent checks and requires both to pass: a Cholesky
/// factorisation in Result-returning mode, and a symmetric eigenvalue
/// computation with every eigenvalue strictly positive. Near-singular
/// matrices can slip past one check and not the other, so neither is
/// short-circuited. On success the matrix is used unchanged downstream.
pub fn screen_covariance(cov: &Array2<f64>) -> Result<(), ScreenError> {
    if cov.dim() != (2, 2) {
        return Err(ScreenError::Dimensions(format!(
            "Covariance matrix is {} x {}; expected 2 x 2",
            cov.nrows(), cov.ncols()
        )));
    }

    let scale = cov.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let asymmetry = (cov[[0, 1]] - cov[[1, 0]]).abs();
    if asymmetry > SYMMETRY_TOL * (1.0 + scale) {
        return Err(ScreenError::NonPositiveDefinite(format!(
            "matrix is not symmetric (|cov[0,1] - cov[1,0]| = {:.3e})", asymmetry
        )));
    }

    // Both checks run unconditionally; either failing is a hard stop.
    let chol_result = cov.cholesky(UPLO::Lower);
    let eig_result = cov.eigvalsh(UPLO::Lower);

    if let Err(e) = chol_result {
        return Err(ScreenError::NonPositiveDefinite(format!(
            "Cholesky factorisation failed ({})", e
        )));
    }

    let eigenvalues = eig_result.map_err(|e| {
        ScreenError::NonPositiveDefinite(format!("eigenvalue computation failed ({})", e))
    })?;

    if let Some(bad) = eigenvalues.iter().find(|&&lambda| lambda <= 0.0) {
        return Err(ScreenError::NonPositiveDefinite(format!(
            "eigenvalue {} is not strictly positive (eigenvalues: {:?})",
            bad,
            eigenvalues.to_vec()
        )));
    }

    log::info!("Covariance screening passed (eigenvalues: {:?})", eigenvalues.to_vec());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn identity_passes() {
        let cov = array![[1.0, 0.0], [0.0, 1.0]];
        assert!(screen_covariance(&cov).is_ok());
    }

    #[test]
    fn realistic_diagonal_passes() {
        let cov = array![[0.2, 0.0], [0.0, 0.1]];
        assert!(screen_covariance(&cov).is_ok());
    }

    #[test]
    fn indefinite_matrix_fails() {
        // Eigenvalues -1 and 3
        let cov = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(matches!(
            screen_covariance(&cov),
            Err(ScreenError::NonPositiveDefinite(_))
        ));
    }

    #[test]
    fn zero_matrix_fails() {
        let cov = array![[0.0, 0.0], [0.0, 0.0]];
        assert!(matches!(
            screen_covariance(&cov),
            Err(ScreenError::NonPositiveDefinite(_))
        ));
    }

    #[test]
    fn asymmetric_matrix_fails() {
        let cov = array![[1.0, 0.3], [0.0, 1.0]];
        assert!(matches!(
            screen_covariance(&cov),
            Err(ScreenError::NonPositiveDefinite(_))
        ));
    }

    #[test]
    fn wrong_shape_is_a_dimension_error() {
        let cov = Array2::<f64>::eye(3);
        assert!(matches!(
            screen_covariance(&cov),
            Err(ScreenError::Dimensions(_))
        ));
    }
}
