//! Estimate I-squared for a one-stage IPD meta-analysis.
//!
//! Takes the study dataset together with the fixed-effect estimates and
//! random-effects covariance matrix produced by an external mixed-effects
//! logistic regression fit, and reports the estimated proportion of total
//! variance attributable to between-study heterogeneity.

use clap::Parser;
use csv::WriterBuilder;
use ipd_i2_rust::{
    io::{exposure_vector, load_covariance_matrix, load_parameter_estimates, read_table, I2Config},
    sample_size::estimate_sample_size,
    screen::screen_covariance,
    simulate::simulate_variance_components,
    DEFAULT_SEED,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "estimate-i2",
    version,
    about = "Estimates the I-squared heterogeneity statistic for one-stage IPD meta-analysis of binary outcomes"
)]
struct Cli {
    /// Path to the study dataset (tab-separated, with header)
    #[arg(long, required = true)]
    dataset: PathBuf,

    /// Column name in the dataset for the subject (study) identifier
    #[arg(long, required = true)]
    subj_id_col: String,

    /// Column name in the dataset for the exposure/treatment indicator
    #[arg(long, required = true)]
    x_col: String,

    /// Path to the fixed-effect estimates table (column 'Estimate'; row 1 = intercept, row 2 = slope)
    #[arg(long, required = true)]
    paraest_file: PathBuf,

    /// Path to the 2x2 random-effects covariance table (two columns, two rows)
    #[arg(long, required = true)]
    gmat_file: PathBuf,

    /// Seed for the Monte Carlo draw (fixed seed gives reproducible results)
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Optional path for a tab-separated result file (v1, v2, i_squared)
    #[arg(long)]
    output_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    log::info!("Starting I-squared estimation for {:?}", cli.dataset);

    // ===================================================================
    // 1. Validate configuration before any dataset I/O
    // ===================================================================
    let config = I2Config {
        dataset: cli.dataset,
        subj_id_name: cli.subj_id_col,
        x_name: cli.x_col,
        paraest_mat: cli.paraest_file,
        g_mat: cli.gmat_file,
        seed: cli.seed,
    };
    config.validate()?;

    // ===================================================================
    // 2. Load the study dataset and derive sample-size statistics
    // ===================================================================
    let study_df = read_table(&config.dataset)?;
    let summary = estimate_sample_size(&study_df, &config.subj_id_name)?;
    let x = exposure_vector(&study_df, &config.x_name)?;

    // ===================================================================
    // 3. Load and screen the model outputs
    // ===================================================================
    let fixed = load_parameter_estimates(&config.paraest_mat)?;
    let cov = load_covariance_matrix(&config.g_mat)?;
    screen_covariance(&cov)?;

    // ===================================================================
    // 4. Simulate random effects and report I-squared
    // ===================================================================
    let result = simulate_variance_components(&fixed, &cov, &x, summary.n_aver, config.seed)?;

    println!("n_subj = {}, n_obs = {}, n_aver = {}", summary.n_subj, summary.n_obs, summary.n_aver);
    println!("v1 (between-study) = {}", result.v1);
    println!("v2 (within-study)  = {}", result.v2);
    println!("i_squared_est      = {}", result.i_squared);

    if let Some(output_file) = cli.output_file {
        log::info!("Writing result to {:?}", output_file);
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&output_file)?;
        writer.serialize(&result)?;
        writer.flush()?;
    }

    log::info!("I-squared estimation completed successfully.");
    Ok(())
}
