use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the feature table (will over-write the config file)
    #[arg(short, long)]
    pub features_file: Option<PathBuf>,

    /// Path to the metabolite library (will over-write the config file)
    #[arg(short, long)]
    pub metabolites_file: Option<PathBuf>,

    /// Path to an extra property table keyed by accession
    #[arg(short, long)]
    pub properties_file: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Mass tolerance in ppm
    #[arg(long)]
    pub tolerance_ppm: Option<f64>,

    /// Number of candidates to write per feature
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Number of worker threads, defaults to all cores
    #[arg(short, long)]
    pub threads: Option<usize>,
}
