//! Artifact store: trained pipeline + feature schema
//!
//! Both files load once at startup and are held immutable for the process
//! lifetime. The features.json array is the authoritative schema; the copy
//! embedded in the pipeline artifact must agree with it, name for name and
//! position for position.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::pipeline::{PipelineArtifact, FORMAT_VERSION};
use crate::schema::FeatureSchema;

/// Errors raised while loading model artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },

    #[error("artifact format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error(
        "feature list embedded in the pipeline disagrees with features.json \
         (pipeline: {pipeline_features:?}, schema: {schema_features:?})"
    )]
    SchemaDisagreement {
        pipeline_features: Vec<String>,
        schema_features: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// The loaded, immutable model artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    schema: FeatureSchema,
    pipeline: PipelineArtifact,
}

impl ArtifactStore {
    /// Load and cross-check both artifact files.
    ///
    /// Fails closed on any absence or disagreement; the caller must not
    /// render a prediction form without a store.
    pub fn load(model_file: &Path, features_file: &Path) -> Result<Self> {
        let schema: FeatureSchema = read_json(features_file)?;
        let pipeline: PipelineArtifact = read_json(model_file)?;

        if pipeline.format_version != FORMAT_VERSION {
            return Err(ArtifactError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: pipeline.format_version,
            });
        }
        if pipeline.features != schema.names() {
            return Err(ArtifactError::SchemaDisagreement {
                pipeline_features: pipeline.features.clone(),
                schema_features: schema.names().to_vec(),
            });
        }

        debug!(
            model = %model_file.display(),
            features = schema.len(),
            "loaded model artifacts"
        );
        Ok(Self { schema, pipeline })
    }

    /// Authoritative ordered feature schema
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn pipeline(&self) -> &PipelineArtifact {
        &self.pipeline
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| ArtifactError::Malformed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Classifier, NumericStage, Preprocessor};
    use tempfile::TempDir;

    fn toy_artifact(features: Vec<String>) -> PipelineArtifact {
        PipelineArtifact {
            format_version: FORMAT_VERSION,
            features: features.clone(),
            preprocessor: Preprocessor {
                numeric: features
                    .iter()
                    .map(|name| NumericStage {
                        name: name.clone(),
                        median: 0.0,
                        mean: 0.0,
                        std: 1.0,
                    })
                    .collect(),
                categorical: vec![],
            },
            classifier: Classifier::Logistic {
                weights: vec![0.0; features.len()],
                intercept: 0.0,
            },
        }
    }

    fn write_artifacts(
        dir: &TempDir,
        pipeline: &PipelineArtifact,
        features: &[&str],
    ) -> (PathBuf, PathBuf) {
        let model = dir.path().join("pipeline.json");
        let feats = dir.path().join("features.json");
        std::fs::write(&model, serde_json::to_string(pipeline).unwrap()).unwrap();
        std::fs::write(&feats, serde_json::to_string(&features).unwrap()).unwrap();
        (model, feats)
    }

    #[test]
    fn test_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let artifact = toy_artifact(vec!["Age".to_string()]);
        let (model, feats) = write_artifacts(&dir, &artifact, &["Age"]);

        let store = ArtifactStore::load(&model, &feats).unwrap();
        assert_eq!(store.schema().names(), &["Age".to_string()]);
        assert_eq!(store.pipeline(), &artifact);
    }

    #[test]
    fn test_missing_model_file() {
        let dir = TempDir::new().unwrap();
        let feats = dir.path().join("features.json");
        std::fs::write(&feats, r#"["Age"]"#).unwrap();

        let err = ArtifactStore::load(&dir.path().join("pipeline.json"), &feats).unwrap_err();
        match err {
            ArtifactError::NotFound(path) => assert!(path.ends_with("pipeline.json")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_features_file() {
        let dir = TempDir::new().unwrap();
        let artifact = toy_artifact(vec!["Age".to_string()]);
        let model = dir.path().join("pipeline.json");
        std::fs::write(&model, serde_json::to_string(&artifact).unwrap()).unwrap();

        let err = ArtifactStore::load(&model, &dir.path().join("features.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn test_malformed_features_file() {
        let dir = TempDir::new().unwrap();
        let artifact = toy_artifact(vec!["Age".to_string()]);
        let (model, feats) = write_artifacts(&dir, &artifact, &["Age"]);
        std::fs::write(&feats, "not json").unwrap();

        let err = ArtifactStore::load(&model, &feats).unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { .. }));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut artifact = toy_artifact(vec!["Age".to_string()]);
        artifact.format_version = FORMAT_VERSION + 1;
        let (model, feats) = write_artifacts(&dir, &artifact, &["Age"]);

        let err = ArtifactStore::load(&model, &feats).unwrap_err();
        match err {
            ArtifactError::VersionMismatch { expected, found } => {
                assert_eq!(expected, FORMAT_VERSION);
                assert_eq!(found, FORMAT_VERSION + 1);
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_disagreement() {
        let dir = TempDir::new().unwrap();
        let artifact = toy_artifact(vec!["Age".to_string()]);
        let (model, feats) = write_artifacts(&dir, &artifact, &["Age", "OverTime"]);

        let err = ArtifactStore::load(&model, &feats).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaDisagreement { .. }));
    }

    #[test]
    fn test_order_disagreement_is_rejected() {
        // Same names, different order: the positional contract is broken
        let dir = TempDir::new().unwrap();
        let artifact = toy_artifact(vec!["Age".to_string(), "OverTime".to_string()]);
        let (model, feats) = write_artifacts(&dir, &artifact, &["OverTime", "Age"]);

        let err = ArtifactStore::load(&model, &feats).unwrap_err();
        assert!(matches!(err, ArtifactError::SchemaDisagreement { .. }));
    }
}
