//! Tree ensembles exported from random forest or gradient boosting trainers.
//!
//! ```json
//! {
//!   "aggregation": "mean",
//!   "base_score": 0.0,
//!   "residual_stddev": 0.8,
//!   "trees": [
//!     {"nodes": [
//!       {"feature": "logp", "threshold": 0.5, "left": 1, "right": 2, "missing_left": true},
//!       {"value": 3.2},
//!       {"value": 6.9}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Splits send `value <= threshold` to the left child. Missing (NaN)
//! descriptors follow the direction learned for that node.

use super::{
    read_model_json,
    RtPrediction,
    RtPredictor,
};
use crate::errors::RtModelError;
use crate::properties::{
    descriptor_index,
    DescriptorVector,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: String,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_missing_left")]
        missing_left: bool,
    },
    Leaf {
        value: f64,
    },
}

fn default_missing_left() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResolvedNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        missing_left: bool,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct SerTree {
    nodes: Vec<TreeNode>,
}

/// A single regression tree stored as a flat node array, root at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<ResolvedNode>,
}

impl RegressionTree {
    /// Resolves descriptor names and checks the node links.
    ///
    /// Children must point forward in the array, which rules out cycles.
    pub fn new(nodes: Vec<TreeNode>, tree: usize) -> Result<Self, RtModelError> {
        let invalid = |reason: String| RtModelError::InvalidTree { tree, reason };
        if nodes.is_empty() {
            return Err(invalid("tree has no nodes".into()));
        }

        let num_nodes = nodes.len();
        let mut resolved = Vec::with_capacity(num_nodes);
        for (i, node) in nodes.into_iter().enumerate() {
            let node = match node {
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(invalid(format!("leaf {} has non-finite value", i)));
                    }
                    ResolvedNode::Leaf { value }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let feature = descriptor_index(&feature)
                        .ok_or(RtModelError::UnknownDescriptor { name: feature })?;
                    for child in [left, right] {
                        if child <= i || child >= num_nodes {
                            return Err(invalid(format!(
                                "node {} points to invalid child {}",
                                i, child
                            )));
                        }
                    }
                    if threshold.is_nan() {
                        return Err(invalid(format!("node {} has NaN threshold", i)));
                    }
                    ResolvedNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                        missing_left,
                    }
                }
            };
            resolved.push(node);
        }

        Ok(Self { nodes: resolved })
    }

    pub fn predict(&self, descriptors: &DescriptorVector) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                ResolvedNode::Leaf { value } => return value,
                ResolvedNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let value = descriptors.0[feature];
                    let go_left = if value.is_nan() {
                        missing_left
                    } else {
                        value <= threshold
                    };
                    idx = if go_left { left } else { right };
                }
            }
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeAggregation {
    /// Random forest style averaging.
    #[default]
    Mean,
    /// Boosting style sum of tree outputs on top of `base_score`.
    Sum,
}

#[derive(Debug, Clone, Deserialize)]
struct SerTreeEnsemble {
    #[serde(default)]
    aggregation: TreeAggregation,
    #[serde(default)]
    base_score: f64,
    residual_stddev: f64,
    trees: Vec<SerTree>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsembleRtModel {
    trees: Vec<RegressionTree>,
    aggregation: TreeAggregation,
    base_score: f64,
    residual_stddev: f64,
}

impl TreeEnsembleRtModel {
    pub fn new(
        trees: Vec<RegressionTree>,
        aggregation: TreeAggregation,
        base_score: f64,
        residual_stddev: f64,
    ) -> Result<Self, RtModelError> {
        if !residual_stddev.is_finite() || residual_stddev <= 0.0 {
            return Err(RtModelError::InvalidStddev {
                value: residual_stddev,
            });
        }
        if trees.is_empty() {
            return Err(RtModelError::InvalidTree {
                tree: 0,
                reason: "ensemble has no trees".into(),
            });
        }
        Ok(Self {
            trees,
            aggregation,
            base_score,
            residual_stddev,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, RtModelError> {
        let ser: SerTreeEnsemble = serde_json::from_str(json)
            .map_err(|e| RtModelError::ModelParsingError { source: e, path: None })?;
        Self::from_ser(ser)
    }

    pub fn from_file(path: &Path) -> Result<Self, RtModelError> {
        Self::from_ser(read_model_json(path)?)
    }

    fn from_ser(ser: SerTreeEnsemble) -> Result<Self, RtModelError> {
        let trees = ser
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| RegressionTree::new(t.nodes, i))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(trees, ser.aggregation, ser.base_score, ser.residual_stddev)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl RtPredictor for TreeEnsembleRtModel {
    fn predict(&self, descriptors: &DescriptorVector) -> Option<RtPrediction> {
        let total: f64 = self.trees.iter().map(|t| t.predict(descriptors)).sum();
        let mean_rt = match self.aggregation {
            TreeAggregation::Mean => self.base_score + total / self.trees.len() as f64,
            TreeAggregation::Sum => self.base_score + total,
        };
        Some(RtPrediction {
            mean_rt,
            stddev: self.residual_stddev,
        })
    }
}
