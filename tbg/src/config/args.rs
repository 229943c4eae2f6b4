//! Command-line argument parsing

use clap::Parser;

/// Band structures and optical observables of twisted bilayer graphene
/// from a YAML configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Override grid points along each reciprocal vector
    #[arg(long)]
    pub kp_num: Option<usize>,

    /// Override the twist angle of the continuum model (degrees)
    #[arg(long)]
    pub twist_angle: Option<f64>,

    /// Override the cache directory
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Do not read or write cached results
    #[arg(long)]
    pub no_cache: bool,

    /// Recompute and overwrite cached results
    #[arg(long)]
    pub refresh: bool,

    /// Write all computed observables as JSON to this file
    #[arg(short, long)]
    pub export: Option<String>,
}
