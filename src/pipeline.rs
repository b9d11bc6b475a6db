//! Serialized classification pipeline and inference
//!
//! The artifact holds the fitted state of a two-stage pipeline: a column
//! preprocessor (median-impute + standardize for numerics, most-frequent
//! impute + one-hot for categoricals) feeding a binary classifier (logistic
//! regression or a random forest of probability-leaf trees). Everything here
//! is inference only: the fitted state was produced elsewhere and this code
//! never refits or mutates it.
//!
//! The rest of the system talks to the pipeline through [`AttritionModel`],
//! a single probability-of-the-positive-class capability, and never sees
//! classifier internals.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::CellValue;
use crate::row::AssembledRow;

/// Artifact format revision this build understands
pub const FORMAT_VERSION: u32 = 1;

/// Errors raised while applying the pipeline to a row
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("feature {feature} expects a numeric value, got {got}")]
    TypeMismatch { feature: String, got: String },

    #[error("row has no value for pipeline feature {0}")]
    MissingFeature(String),

    #[error("classifier expects {expected} encoded features, row encoded to {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("malformed tree: node index {index} out of range ({len} nodes)")]
    MalformedTree { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Probability-of-attrition capability the rest of the system depends on
pub trait AttritionModel {
    /// Probability of the positive (attrition) class for one assembled row
    fn probability_of(&self, row: &AssembledRow) -> Result<f64>;
}

/// Fitted state for one numeric feature: impute with the training median,
/// then standardize with the training mean and standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStage {
    pub name: String,
    pub median: f64,
    pub mean: f64,
    pub std: f64,
}

impl NumericStage {
    fn encode(&self, cell: &CellValue) -> Result<f64> {
        let value = match cell {
            CellValue::Numeric(v) => *v,
            CellValue::Missing => self.median,
            CellValue::Text(s) => {
                return Err(ModelError::TypeMismatch {
                    feature: self.name.clone(),
                    got: format!("{s:?}"),
                })
            }
        };
        let centered = value - self.mean;
        // A constant training column has std 0; pass the centered value
        // through instead of dividing
        if self.std > 0.0 {
            Ok(centered / self.std)
        } else {
            Ok(centered)
        }
    }
}

/// Fitted state for one categorical feature: impute with the training modal
/// value, then one-hot against the observed category list. Categories unseen
/// at training time encode to all-zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStage {
    pub name: String,
    pub mode: String,
    pub categories: Vec<String>,
}

impl CategoricalStage {
    fn encode_into(&self, cell: &CellValue, out: &mut Vec<f64>) {
        let key = cell.category_key().unwrap_or_else(|| self.mode.clone());
        for category in &self.categories {
            out.push(if *category == key { 1.0 } else { 0.0 });
        }
    }

    fn width(&self) -> usize {
        self.categories.len()
    }
}

/// Fitted column preprocessor: numerics first, then one one-hot block per
/// categorical feature, matching the training-time transform order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub numeric: Vec<NumericStage>,
    pub categorical: Vec<CategoricalStage>,
}

impl Preprocessor {
    /// Width of the encoded feature vector
    pub fn encoded_width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(CategoricalStage::width).sum::<usize>()
    }

    /// Transform one assembled row into the encoded feature vector
    pub fn transform(&self, row: &AssembledRow) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.encoded_width());
        for stage in &self.numeric {
            let cell = row
                .get(&stage.name)
                .ok_or_else(|| ModelError::MissingFeature(stage.name.clone()))?;
            out.push(stage.encode(cell)?);
        }
        for stage in &self.categorical {
            let cell = row
                .get(&stage.name)
                .ok_or_else(|| ModelError::MissingFeature(stage.name.clone()))?;
            stage.encode_into(cell, &mut out);
        }
        Ok(out)
    }
}

/// A node in a serialized decision tree (flat array, index-linked)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        probability: f64,
    },
}

/// One decision tree over the encoded feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk from the root to a leaf for one encoded sample
    fn leaf_probability(&self, sample: &[f64]) -> Result<f64> {
        let mut index = 0usize;
        // Each hop moves strictly deeper; nodes.len() hops means a cycle
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(index).ok_or(ModelError::MalformedTree {
                index,
                len: self.nodes.len(),
            })?;
            match node {
                TreeNode::Leaf { probability } => return Ok(*probability),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value =
                        sample
                            .get(*feature)
                            .copied()
                            .ok_or(ModelError::WidthMismatch {
                                expected: feature + 1,
                                actual: sample.len(),
                            })?;
                    index = if value < *threshold { *left } else { *right };
                }
            }
        }
        Err(ModelError::MalformedTree {
            index,
            len: self.nodes.len(),
        })
    }
}

/// Classifier head of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    /// Logistic regression: sigmoid(w·x + b)
    Logistic { weights: Vec<f64>, intercept: f64 },
    /// Random forest: mean of per-tree leaf probabilities
    Forest { trees: Vec<DecisionTree> },
}

impl Classifier {
    fn probability(&self, sample: &[f64]) -> Result<f64> {
        match self {
            Classifier::Logistic { weights, intercept } => {
                if weights.len() != sample.len() {
                    return Err(ModelError::WidthMismatch {
                        expected: weights.len(),
                        actual: sample.len(),
                    });
                }
                let z: f64 = weights
                    .iter()
                    .zip(sample.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
                    + intercept;
                Ok(sigmoid(z))
            }
            Classifier::Forest { trees } => {
                if trees.is_empty() {
                    return Ok(0.0);
                }
                let mut total = 0.0;
                for tree in trees {
                    total += tree.leaf_probability(sample)?;
                }
                Ok(total / trees.len() as f64)
            }
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Classifier::Logistic { .. } => "LogisticRegression",
            Classifier::Forest { .. } => "RandomForestClassifier",
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// The deserialized trained pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub format_version: u32,
    /// Feature list the pipeline was fit against; must agree with the
    /// sibling features.json, which stays authoritative
    pub features: Vec<String>,
    pub preprocessor: Preprocessor,
    pub classifier: Classifier,
}

impl PipelineArtifact {
    /// Human-readable step list for the technical page
    pub fn step_summary(&self) -> Vec<String> {
        vec![
            format!(
                "pre: ColumnPreprocessor ({} numeric, {} categorical, {} encoded)",
                self.preprocessor.numeric.len(),
                self.preprocessor.categorical.len(),
                self.preprocessor.encoded_width()
            ),
            format!("clf: {}", self.classifier.kind_name()),
        ]
    }
}

impl AttritionModel for PipelineArtifact {
    fn probability_of(&self, row: &AssembledRow) -> Result<f64> {
        let encoded = self.preprocessor.transform(row)?;
        self.classifier.probability(&encoded)
    }
}
