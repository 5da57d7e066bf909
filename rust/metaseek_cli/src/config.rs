use metaseek::adducts::{
    default_adduct_specs,
    AdductPriors,
    AdductSpec,
    AdductTable,
};
use metaseek::matching::DEFAULT_TOLERANCE_PPM;
use metaseek::rt_prediction::RtModelConfig;
use metaseek::scoring::{
    EnsembleWeights,
    OutputFormat,
    NEUTRAL_RT_SCORE,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

use crate::cli::Cli;
use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub rt_model: Option<RtModelConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct InputConfig {
    pub features: Option<PathBuf>,
    pub metabolites: Option<PathBuf>,
    #[serde(default)]
    pub properties: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_tolerance_ppm")]
    pub tolerance_ppm: f64,
    #[serde(default)]
    pub weights: EnsembleWeights,
    /// Replaces the built-in adduct table when set.
    #[serde(default)]
    pub adducts: Option<Vec<AdductSpec>>,
    /// Replaces the built-in priors when set.
    #[serde(default)]
    pub adduct_priors: Option<HashMap<String, f64>>,
    #[serde(default = "default_neutral_rt_score")]
    pub neutral_rt_score: f64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_use_mz_index")]
    pub use_mz_index: bool,
}

fn default_tolerance_ppm() -> f64 {
    DEFAULT_TOLERANCE_PPM
}

fn default_neutral_rt_score() -> f64 {
    NEUTRAL_RT_SCORE
}

fn default_chunk_size() -> usize {
    256
}

fn default_use_mz_index() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tolerance_ppm: default_tolerance_ppm(),
            weights: EnsembleWeights::default(),
            adducts: None,
            adduct_priors: None,
            neutral_rt_score: default_neutral_rt_score(),
            chunk_size: default_chunk_size(),
            use_mz_index: default_use_mz_index(),
        }
    }
}

impl AnalysisConfig {
    pub fn adduct_table(&self) -> Result<AdductTable, CliError> {
        let table = match &self.adducts {
            Some(specs) => AdductTable::from_specs(specs)?,
            None => AdductTable::from_specs(&default_adduct_specs())?,
        };
        Ok(table)
    }

    /// Priors are checked against `table` so drift between the two shows up
    /// before the run instead of as dropped candidates.
    pub fn adduct_priors(&self, table: &AdductTable) -> Result<AdductPriors, CliError> {
        let priors = match &self.adduct_priors {
            Some(x) => AdductPriors::new(x.clone())?,
            None => AdductPriors::default(),
        };
        let missing = priors.missing_for(table);
        if !missing.is_empty() {
            warn!(
                "No prior for adducts {:?}, their candidates will be dropped while scoring",
                missing
            );
        }
        Ok(priors)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Input paths after configuration and command line are merged.
#[derive(Debug, Clone)]
pub struct ResolvedInputs {
    pub features: PathBuf,
    pub metabolites: PathBuf,
    pub properties: Option<PathBuf>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, CliError> {
        serde_json::from_str(json).map_err(|e| CliError::ParseError { msg: e.to_string() })
    }

    /// Command line values take precedence over the configuration file.
    pub fn apply_cli_args(&mut self, args: &Cli) {
        if let Some(x) = &args.features_file {
            self.input.features = Some(x.clone());
        }
        if let Some(x) = &args.metabolites_file {
            self.input.metabolites = Some(x.clone());
        }
        if let Some(x) = &args.properties_file {
            self.input.properties = Some(x.clone());
        }
        if let Some(x) = args.tolerance_ppm {
            self.analysis.tolerance_ppm = x;
        }
        if let Some(dir) = &args.output_dir {
            match self.output.as_mut() {
                Some(out) => out.directory = dir.clone(),
                None => {
                    self.output = Some(OutputConfig {
                        directory: dir.clone(),
                        top_k: None,
                        format: OutputFormat::default(),
                    })
                }
            }
        }
        if let (Some(k), Some(out)) = (args.top_k, self.output.as_mut()) {
            out.top_k = Some(k);
        }
    }

    pub fn resolved_inputs(&self) -> Result<ResolvedInputs, CliError> {
        let missing = |what: &str| CliError::Config {
            source: format!(
                "No {} provided, please provide one in either the config file or with the command line",
                what
            ),
        };
        Ok(ResolvedInputs {
            features: self.input.features.clone().ok_or_else(|| missing("feature table"))?,
            metabolites: self
                .input
                .metabolites
                .clone()
                .ok_or_else(|| missing("metabolite library"))?,
            properties: self.input.properties.clone(),
        })
    }

    pub fn output_config(&self) -> Result<OutputConfig, CliError> {
        self.output.clone().ok_or_else(|| CliError::Config {
            source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
        })
    }

    /// Checks every numeric setting once, before any input is read.
    pub fn validate(&self) -> Result<(), CliError> {
        self.analysis.weights.validate()?;
        let tol = self.analysis.tolerance_ppm;
        if !tol.is_finite() || tol <= 0.0 {
            return Err(metaseek::errors::ScoringError::InvalidTolerance { value: tol }.into());
        }
        if self.analysis.chunk_size == 0 {
            return Err(CliError::Config {
                source: "chunk_size must be > 0".to_string(),
            });
        }
        if let Some(OutputConfig { top_k: Some(0), .. }) = self.output {
            return Err(CliError::Config {
                source: "top_k must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
