//! Project path layout and dataset resolution
//!
//! Artifacts and data live at fixed locations under a project root. The
//! reference dataset is resolved through an ordered candidate chain
//! (ready, processed, raw) where the first existing file wins.

use std::path::{Path, PathBuf};

/// Fixed file layout under a project root directory
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serialized pipeline artifact
    pub fn model_file(&self) -> PathBuf {
        self.root.join("artifacts").join("v1").join("pipeline.json")
    }

    /// Ordered feature list the pipeline was fit against
    pub fn features_file(&self) -> PathBuf {
        self.root.join("artifacts").join("v1").join("features.json")
    }

    /// Dataset candidates in resolution order (first existing wins)
    pub fn dataset_candidates(&self) -> Vec<PathBuf> {
        let data = self.root.join("data");
        vec![
            data.join("processed").join("hr_attrition_ready.csv"),
            data.join("processed").join("hr_attrition.csv"),
            data.join("raw").join("hr_attrition.csv"),
        ]
    }

    /// Pre-rendered ROC curve image (optional)
    pub fn roc_curve_asset(&self) -> PathBuf {
        self.root.join("assets").join("roc_curve.png")
    }

    /// Pre-rendered confusion matrix at threshold 0.50 (optional)
    pub fn confusion_matrix_asset(&self) -> PathBuf {
        self.root.join("assets").join("confusion_matrix_050.png")
    }

    /// Pre-computed threshold metrics table (optional)
    pub fn threshold_metrics_asset(&self) -> PathBuf {
        self.root.join("assets").join("threshold_metrics.csv")
    }
}

/// Return the first candidate path that exists on disk
pub fn resolve_first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}
