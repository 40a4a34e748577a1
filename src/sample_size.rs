//! Module for deriving per-study sample-size statistics.
use polars::prelude::*;
use thiserror::Error;

use crate::SampleSizeSummary;

#[derive(Error, Debug)]
pub enum SampleSizeError {
    #[error("Empty dataset: zero distinct studies in subject-id column '{0}'")]
    EmptyDataset(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Computes the number of distinct studies, the total observation count and
/// the average observations per study from the study dataset.
///
/// `n_obs` comes from the DataFrame height, which polars tracks as metadata;
/// `count_rows_scan` is the sequential equivalent and must agree exactly.
/// `n_aver` uses true floating-point division: its precision feeds directly
/// into the within-study variance component.
pub fn estimate_sample_size(
    df: &DataFrame,
    subj_id_name: &str,
) -> Result<SampleSizeSummary, SampleSizeError> {
    // Cast subject IDs to string to handle both numeric and string IDs
    let subj_series = df.column(subj_id_name)?.cast(&DataType::String)?;
    let n_subj = subj_series.str()?.unique()?.len();

    if n_subj == 0 {
        return Err(SampleSizeError::EmptyDataset(subj_id_name.to_string()));
    }

    let n_obs = df.height();
    let n_aver = n_obs as f64 / n_subj as f64;

    log::info!("Sample size: n_subj = {}, n_obs = {}, n_aver = {}", n_subj, n_obs, n_aver);

    Ok(SampleSizeSummary { n_subj, n_obs, n_aver })
}

/// Counts rows one by one over the subject-id column. Slow path kept so the
/// metadata-based count can be cross-checked; the counter starts at zero and
/// every row increments it, null or not.
pub fn count_rows_scan(df: &DataFrame, subj_id_name: &str) -> Result<usize, SampleSizeError> {
    let subj_series = df.column(subj_id_name)?.cast(&DataType::String)?;
    let mut n_obs: usize = 0;
    for _row in subj_series.str()?.into_iter() {
        n_obs += 1;
    }
    Ok(n_obs)
}
