//! Retention time prediction collaborators.
//!
//! Models are trained elsewhere and exported; here they are only evaluated.
//! The scorer sees a single [`RtPredictor`], no matter how many models are
//! combined behind it.

mod ensemble;
mod linear;
mod tree_ensemble;

pub use ensemble::EnsembleRtModel;
pub use linear::LinearRtModel;
pub use tree_ensemble::{
    RegressionTree,
    TreeAggregation,
    TreeEnsembleRtModel,
    TreeNode,
};

use crate::errors::RtModelError;
use crate::properties::DescriptorVector;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};

/// Predicted retention time (minutes) and its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RtPrediction {
    pub mean_rt: f64,
    pub stddev: f64,
}

impl RtPrediction {
    /// Only finite means with a finite, strictly positive spread are usable.
    pub fn is_usable(&self) -> bool {
        self.mean_rt.is_finite() && self.stddev.is_finite() && self.stddev > 0.0
    }

    /// Unnormalized Gaussian likelihood of `observed_rt`, 1.0 at the mean.
    ///
    /// ```
    /// use metaseek::rt_prediction::RtPrediction;
    /// let pred = RtPrediction { mean_rt: 5.0, stddev: 0.5 };
    /// assert_eq!(pred.likelihood(5.0), 1.0);
    /// assert!((pred.likelihood(5.5) - (-0.5f64).exp()).abs() < 1e-12);
    /// ```
    pub fn likelihood(&self, observed_rt: f64) -> f64 {
        let z = (observed_rt - self.mean_rt) / self.stddev;
        (-0.5 * z * z).exp()
    }
}

pub trait RtPredictor: Send + Sync {
    /// `None` when the model cannot predict for these descriptors.
    fn predict(&self, descriptors: &DescriptorVector) -> Option<RtPrediction>;

    fn predict_batch(&self, batch: &[DescriptorVector]) -> Vec<Option<RtPrediction>> {
        batch.par_iter().map(|x| self.predict(x)).collect()
    }
}

/// Predictor used when no model is configured; every candidate gets the
/// neutral retention time score.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRtModel;

impl RtPredictor for NullRtModel {
    fn predict(&self, _descriptors: &DescriptorVector) -> Option<RtPrediction> {
        None
    }
}

/// How a model is referenced from a run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RtModelConfig {
    #[serde(rename = "linear")]
    Linear { path: PathBuf },
    #[serde(rename = "tree_ensemble")]
    TreeEnsemble { path: PathBuf },
    #[serde(rename = "ensemble")]
    Ensemble { members: Vec<WeightedModelConfig> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedModelConfig {
    #[serde(flatten)]
    pub model: RtModelConfig,
    #[serde(default = "default_member_weight")]
    pub weight: f64,
}

fn default_member_weight() -> f64 {
    1.0
}

impl RtModelConfig {
    pub fn load(&self) -> Result<Box<dyn RtPredictor>, RtModelError> {
        match self {
            RtModelConfig::Linear { path } => Ok(Box::new(LinearRtModel::from_file(path)?)),
            RtModelConfig::TreeEnsemble { path } => {
                Ok(Box::new(TreeEnsembleRtModel::from_file(path)?))
            }
            RtModelConfig::Ensemble { members } => {
                let mut ensemble = EnsembleRtModel::empty();
                for member in members.iter() {
                    ensemble = ensemble.with_member(member.model.load()?, member.weight)?;
                }
                Ok(Box::new(ensemble))
            }
        }
    }
}

pub(crate) fn read_model_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RtModelError> {
    let file = std::fs::File::open(path).map_err(|e| RtModelError::FileReadingError {
        source: e,
        path: path.to_path_buf(),
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
        RtModelError::ModelParsingError {
            source: e,
            path: Some(path.to_path_buf()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_likelihood_is_symmetric_and_decreasing() {
        let pred = RtPrediction {
            mean_rt: 4.0,
            stddev: 1.0,
        };
        assert!((pred.likelihood(3.0) - pred.likelihood(5.0)).abs() < 1e-15);
        assert!(pred.likelihood(4.5) > pred.likelihood(5.0));
        assert!(pred.likelihood(100.0) < 1e-100);
    }

    #[test]
    fn test_usable() {
        let ok = RtPrediction {
            mean_rt: 4.0,
            stddev: 1.0,
        };
        assert!(ok.is_usable());
        assert!(!RtPrediction { stddev: 0.0, ..ok }.is_usable());
        assert!(!RtPrediction { stddev: f64::NAN, ..ok }.is_usable());
        assert!(!RtPrediction { mean_rt: f64::INFINITY, ..ok }.is_usable());
    }

    #[test]
    fn test_config_parsing() {
        let json = r#"{
            "type": "ensemble",
            "members": [
                {"type": "linear", "path": "rt_linear.json", "weight": 0.5},
                {"type": "tree_ensemble", "path": "rt_forest.json"}
            ]
        }"#;
        let config: RtModelConfig = serde_json::from_str(json).unwrap();
        match config {
            RtModelConfig::Ensemble { members } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].weight, 0.5);
                assert_eq!(members[1].weight, 1.0);
                assert!(matches!(members[1].model, RtModelConfig::TreeEnsemble { .. }));
            }
            other => panic!("Unexpected config {:?}", other),
        }
    }
}
