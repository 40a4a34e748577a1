//! Module for configuration validation and tabular input loading.
use polars::prelude::*;
use std::path::{Path, PathBuf};
use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::FixedEffects;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("Missing required parameter: '{0}' is empty or unset")]
    MissingParameter(String),
    #[error("Dataset not found: {0}")]
    NotFound(String),
    #[error("Unexpected table shape: {0}")]
    Shape(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Names the inputs of one I-squared estimation run.
/// `validate` must pass before any table is opened.
#[derive(Debug, Clone)]
pub struct I2Config {
    /// Path to the study dataset (subject id, exposure, ...)
    pub dataset: PathBuf,
    /// Subject-id column name in `dataset`
    pub subj_id_name: String,
    /// Exposure column name in `dataset`
    pub x_name: String,
    /// Path to the fixed-effect estimates table (column "Estimate")
    pub paraest_mat: PathBuf,
    /// Path to the 2x2 random-effects covariance table
    pub g_mat: PathBuf,
    /// Seed for the Monte Carlo draw
    pub seed: u64,
}

impl I2Config {
    /// Checks that every required name is set and every referenced table
    /// exists on disk. Runs before any dataset I/O so that a bad call fails
    /// on the precondition, not on a parse error halfway through.
    pub fn validate(&self) -> Result<(), IoError> {
        let names = [
            ("dataset", self.dataset.as_os_str().is_empty()),
            ("subj_id_name", self.subj_id_name.is_empty()),
            ("x_name", self.x_name.is_empty()),
            ("paraest_mat", self.paraest_mat.as_os_str().is_empty()),
            ("g_mat", self.g_mat.as_os_str().is_empty()),
        ];
        for (name, missing) in names {
            if missing {
                return Err(IoError::MissingParameter(name.to_string()));
            }
        }

        for path in [&self.dataset, &self.paraest_mat, &self.g_mat] {
            if !path.exists() {
                return Err(IoError::NotFound(path.to_string_lossy().into()));
            }
        }

        Ok(())
    }
}

/// Loads a tab-separated table with a header row into a DataFrame.
pub fn read_table(path: &Path) -> Result<DataFrame, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_string_lossy().into()));
    }

    log::info!("Loading table: {:?}", path);

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(b'\t')
        )
        .try_into_reader_with_file_path(Some(path.into()))?
        .finish()?;

    log::info!("Loaded {} rows and {} columns from {:?}", df.height(), df.width(), path);

    Ok(df)
}

/// Extracts the exposure column as a float vector, aligned by row order.
pub fn exposure_vector(df: &DataFrame, x_name: &str) -> Result<Array1<f64>, IoError> {
    // Cast to Float64 so integer-coded 0/1 exposures are accepted too.
    let x_series = df.column(x_name)?.cast(&DataType::Float64)?;
    let x_vec: Vec<f64> = x_series
        .f64()?
        .into_iter()
        .collect::<Option<Vec<f64>>>()
        .ok_or(IoError::Shape(format!(
            "Exposure column '{}' contains nulls or non-numeric values", x_name
        )))?;

    log::debug!("Exposure vector has {} values", x_vec.len());

    Ok(Array1::from_vec(x_vec))
}

/// Reads the fixed-effect estimates from the "Estimate" column.
/// Positional contract: row 1 is the intercept, row 2 the slope. The table
/// may carry further rows (covariate coefficients); only the first two are
/// used. Fewer than two rows is a shape error, never a silent default.
pub fn load_parameter_estimates(path: &Path) -> Result<FixedEffects, IoError> {
    let df = read_table(path)?;

    if df.height() < 2 {
        return Err(IoError::Shape(format!(
            "Estimates table {:?} has {} rows; expected at least 2 (intercept, slope)",
            path, df.height()
        )));
    }

    let est_series = df.column("Estimate")?.cast(&DataType::Float64)?;
    let est = est_series.f64()?;

    let beta0 = est.get(0).ok_or(IoError::Shape(
        "Estimates table row 1 (intercept) is null".to_string(),
    ))?;
    let beta1 = est.get(1).ok_or(IoError::Shape(
        "Estimates table row 2 (slope) is null".to_string(),
    ))?;

    log::info!("Fixed effects: beta0 = {}, beta1 = {}", beta0, beta1);

    Ok(FixedEffects { beta0, beta1 })
}

/// Reads the 2x2 random-effects covariance matrix. The table must have
/// exactly two columns and two rows; columns map to matrix columns in order.
pub fn load_covariance_matrix(path: &Path) -> Result<Array2<f64>, IoError> {
    let df = read_table(path)?;

    if df.width() != 2 || df.height() != 2 {
        return Err(IoError::Shape(format!(
            "Covariance table {:?} is {} x {}; expected exactly 2 x 2",
            path, df.height(), df.width()
        )));
    }

    let mut cov = Array2::zeros((2, 2));
    for (j, column) in df.get_columns().iter().enumerate() {
        let vals = column.cast(&DataType::Float64)?;
        let vals = vals.f64()?;
        for i in 0..2 {
            cov[[i, j]] = vals.get(i).ok_or(IoError::Shape(format!(
                "Covariance table cell [{}, {}] is null", i, j
            )))?;
        }
    }

    log::info!("Covariance matrix: [[{}, {}], [{}, {}]]",
              cov[[0, 0]], cov[[0, 1]], cov[[1, 0]], cov[[1, 1]]);

    Ok(cov)
}
