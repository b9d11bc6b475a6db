//! Risk banding over the attrition probability
//!
//! A probability maps onto a three-level band through two cut points. The
//! defaults (0.35 and 0.60) are business example values subject to
//! stakeholder tuning, so they are named constants overridable per call
//! rather than literals buried in the mapping.

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::{AttritionModel, ModelError};
use crate::row::AssembledRow;

/// Default lower cut: probabilities below this are Low risk
pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 0.35;
/// Default upper cut: probabilities at or above this are High risk
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.60;

/// Stated performance goal for the trained classifier (ROC AUC)
pub const AUC_GOAL: f64 = 0.75;

/// Errors raised while scoring a prediction request
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("prediction failed: {source}")]
    PredictionFailed {
        #[source]
        source: ModelError,
    },

    #[error("invalid risk thresholds: medium {medium} and high {high} must satisfy 0 <= medium < high <= 1")]
    InvalidThresholds { medium: f64, high: f64 },
}

pub type Result<T> = std::result::Result<T, ScoreError>;

/// Three-level risk category derived from the attrition probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskBand::Low => write!(f, "Low"),
            RiskBand::Medium => write!(f, "Medium"),
            RiskBand::High => write!(f, "High"),
        }
    }
}

/// Band cut points; both bounds live in [0,1] with medium strictly below high
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: DEFAULT_MEDIUM_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl RiskThresholds {
    pub fn new(medium: f64, high: f64) -> Result<Self> {
        let candidate = Self { medium, high };
        candidate.validate()?;
        Ok(candidate)
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.medium && self.medium < self.high && self.high <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(ScoreError::InvalidThresholds {
                medium: self.medium,
                high: self.high,
            })
        }
    }

    /// Deterministic step function: Low below medium, Medium in
    /// [medium, high), High at or above high
    pub fn band_for(&self, probability: f64) -> RiskBand {
        if probability < self.medium {
            RiskBand::Low
        } else if probability < self.high {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }
}

/// One prediction: the raw probability plus its band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub band: RiskBand,
}

/// Score one assembled row against the model.
///
/// A model failure (unknown category, type mismatch, malformed artifact)
/// surfaces as [`ScoreError::PredictionFailed`] with the cause attached;
/// no fallback probability is ever fabricated.
pub fn score(
    model: &dyn AttritionModel,
    row: &AssembledRow,
    thresholds: RiskThresholds,
) -> Result<Prediction> {
    thresholds.validate()?;
    let probability = model
        .probability_of(row)
        .map_err(|source| ScoreError::PredictionFailed { source })?;
    Ok(Prediction {
        probability,
        band: thresholds.band_for(probability),
    })
}
