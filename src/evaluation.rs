//! Threshold evaluation over the reference dataset
//!
//! Predicted label is 1 exactly when the model probability clears the
//! decision threshold. From the 2x2 confusion counts the four summary
//! metrics follow the standard definitions, reporting 0 where a denominator
//! vanishes. Everything here is a pure function of (probabilities, labels,
//! threshold): re-running a sweep never refits or mutates the model.

use serde::Serialize;
use thiserror::Error;

use crate::dataset::{CellValue, ReferenceDataset};
use crate::pipeline::{AttritionModel, ModelError};
use crate::row::AssembledRow;
use crate::schema::ValidatedSchema;

/// Default threshold grid spacing for the sweep table
pub const DEFAULT_SWEEP_STEP: f64 = 0.05;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("probability and label counts differ: {probabilities} vs {labels}")]
    LengthMismatch { probabilities: usize, labels: usize },

    #[error("sweep step must lie in (0, 1], got {0}")]
    BadStep(f64),

    #[error("dataset has no column {0}; the schema was validated against different data")]
    MissingColumn(String),

    #[error("prediction failed on dataset row {row}: {source}")]
    Prediction {
        row: usize,
        #[source]
        source: ModelError,
    },
}

pub type Result<T> = std::result::Result<T, EvaluationError>;

/// 2x2 confusion counts against known binary labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub true_positives: u64,
}

impl ConfusionMatrix {
    pub fn total(&self) -> u64 {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    pub fn predicted_positives(&self) -> u64 {
        self.true_positives + self.false_positives
    }

    /// Render the count table for the technical page
    pub fn format(&self, threshold: f64) -> String {
        let mut out = String::new();
        out.push_str(&format!("Confusion matrix @ threshold = {threshold:.2}\n"));
        out.push_str("                 predicted Stay  predicted Leave\n");
        out.push_str(&format!(
            "actual Stay  (0)  {:>14}  {:>15}\n",
            self.true_negatives, self.false_positives
        ));
        out.push_str(&format!(
            "actual Leave (1)  {:>14}  {:>15}\n",
            self.false_negatives, self.true_positives
        ));
        out
    }
}

/// Metrics row for one decision threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

/// Predicted labels at a threshold: 1 iff probability >= t
pub fn predict_labels(probabilities: &[f64], threshold: f64) -> Vec<u8> {
    probabilities
        .iter()
        .map(|p| u8::from(*p >= threshold))
        .collect()
}

/// Confusion counts of predicted vs true labels
pub fn confusion_matrix(predicted: &[u8], labels: &[u8]) -> Result<ConfusionMatrix> {
    if predicted.len() != labels.len() {
        return Err(EvaluationError::LengthMismatch {
            probabilities: predicted.len(),
            labels: labels.len(),
        });
    }
    let mut cm = ConfusionMatrix {
        true_negatives: 0,
        false_positives: 0,
        false_negatives: 0,
        true_positives: 0,
    };
    for (&pred, &actual) in predicted.iter().zip(labels.iter()) {
        match (actual, pred) {
            (0, 0) => cm.true_negatives += 1,
            (0, _) => cm.false_positives += 1,
            (_, 0) => cm.false_negatives += 1,
            _ => cm.true_positives += 1,
        }
    }
    Ok(cm)
}

/// Evaluate one threshold over pre-computed probabilities
pub fn evaluate_at(probabilities: &[f64], labels: &[u8], threshold: f64) -> Result<ThresholdMetrics> {
    let predicted = predict_labels(probabilities, threshold);
    let cm = confusion_matrix(&predicted, labels)?;

    let total = cm.total();
    let accuracy = if total > 0 {
        (cm.true_positives + cm.true_negatives) as f64 / total as f64
    } else {
        0.0
    };
    let precision = ratio_or_zero(cm.true_positives, cm.true_positives + cm.false_positives);
    let recall = ratio_or_zero(cm.true_positives, cm.true_positives + cm.false_negatives);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(ThresholdMetrics {
        threshold,
        accuracy,
        precision,
        recall,
        f1,
        confusion: cm,
    })
}

fn ratio_or_zero(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Sweep table: one metrics row per threshold on a regular grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepTable {
    pub rows: Vec<ThresholdMetrics>,
}

impl SweepTable {
    /// Row with the best F1 score (first on ties)
    pub fn best_f1(&self) -> Option<&ThresholdMetrics> {
        self.rows
            .iter()
            .reduce(|best, row| if row.f1 > best.f1 { row } else { best })
    }

    /// Render the table as CSV (header row then one row per threshold)
    pub fn to_csv(&self) -> String {
        let mut out = String::from("threshold,accuracy,precision,recall,f1\n");
        for row in &self.rows {
            out.push_str(&format!(
                "{:.2},{:.4},{:.4},{:.4},{:.4}\n",
                row.threshold, row.accuracy, row.precision, row.recall, row.f1
            ));
        }
        out
    }

    /// Render the table for terminal display, marking the best-F1 row
    pub fn format(&self) -> String {
        let best = self.best_f1().map(|r| r.threshold);
        let mut out = String::from("threshold  accuracy  precision  recall      f1\n");
        for row in &self.rows {
            let marker = if Some(row.threshold) == best { "  <- best f1" } else { "" };
            out.push_str(&format!(
                "{:>9.2}  {:>8.3}  {:>9.3}  {:>6.3}  {:>6.3}{}\n",
                row.threshold, row.accuracy, row.precision, row.recall, row.f1, marker
            ));
        }
        out
    }
}

/// Evaluate every threshold on a 0.0..=1.0 grid with the given step
pub fn sweep(probabilities: &[f64], labels: &[u8], step: f64) -> Result<SweepTable> {
    if !(step > 0.0 && step <= 1.0) {
        return Err(EvaluationError::BadStep(step));
    }
    let n = (1.0 / step).round() as usize;
    let mut rows = Vec::with_capacity(n + 1);
    for i in 0..=n {
        // Multiply instead of accumulating so the grid stays exact
        let threshold = (i as f64 * step).min(1.0);
        rows.push(evaluate_at(probabilities, labels, threshold)?);
    }
    Ok(SweepTable { rows })
}

/// Model probability for every dataset row, columns looked up schema-wise.
///
/// Row order follows the dataset; probabilities pair positionally with
/// [`ReferenceDataset::labels`].
pub fn dataset_probabilities(
    model: &dyn AttritionModel,
    schema: &ValidatedSchema,
    data: &ReferenceDataset,
) -> Result<Vec<f64>> {
    let mut columns: Vec<&[CellValue]> = Vec::with_capacity(schema.len());
    for name in schema.names() {
        let column = data
            .column(name)
            .ok_or_else(|| EvaluationError::MissingColumn(name.clone()))?;
        columns.push(column);
    }

    let mut probabilities = Vec::with_capacity(data.n_rows());
    for row_index in 0..data.n_rows() {
        let values: Vec<CellValue> = columns.iter().map(|col| col[row_index].clone()).collect();
        let row = AssembledRow::from_schema_values(schema, values);
        let p = model
            .probability_of(&row)
            .map_err(|source| EvaluationError::Prediction {
                row: row_index + 1,
                source,
            })?;
        probabilities.push(p);
    }
    Ok(probabilities)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== CONFUSION / METRICS TESTS ====================

    #[test]
    fn test_spec_case_four_rows_at_half() {
        let labels = [1u8, 0, 1, 0];
        let probabilities = [0.9, 0.8, 0.4, 0.1];
        let m = evaluate_at(&probabilities, &labels, 0.5).unwrap();

        assert_eq!(m.confusion.true_positives, 1);
        assert_eq!(m.confusion.false_positives, 1);
        assert_eq!(m.confusion.false_negatives, 1);
        assert_eq!(m.confusion.true_negatives, 1);
        assert_eq!(m.accuracy, 0.5);
        assert_eq!(m.precision, 0.5);
        assert_eq!(m.recall, 0.5);
        assert_eq!(m.f1, 0.5);
    }

    #[test]
    fn test_threshold_zero_predicts_all_positive() {
        let labels = [1u8, 0, 1];
        let probabilities = [0.0, 0.2, 0.9];
        let m = evaluate_at(&probabilities, &labels, 0.0).unwrap();
        assert_eq!(m.confusion.predicted_positives(), 3);
        assert_eq!(m.recall, 1.0);
    }

    #[test]
    fn test_threshold_above_max_predicts_all_negative() {
        let labels = [1u8, 0, 1];
        let probabilities = [0.3, 0.2, 0.9];
        let m = evaluate_at(&probabilities, &labels, 0.95).unwrap();
        assert_eq!(m.confusion.predicted_positives(), 0);
        // Precision undefined with zero predicted positives: report 0
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = evaluate_at(&[0.5, 0.6], &[1], 0.5).unwrap_err();
        assert!(matches!(err, EvaluationError::LengthMismatch { .. }));
    }

    #[test]
    fn test_idempotent_byte_identical() {
        let labels = [1u8, 0, 1, 0, 1];
        let probabilities = [0.9, 0.8, 0.4, 0.1, 0.55];
        let a = evaluate_at(&probabilities, &labels, 0.5).unwrap();
        let b = evaluate_at(&probabilities, &labels, 0.5).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.f1.to_bits(), b.f1.to_bits());
    }

    // ==================== SWEEP TESTS ====================

    #[test]
    fn test_sweep_grid_size_and_endpoints() {
        let labels = [1u8, 0];
        let probabilities = [0.9, 0.1];
        let table = sweep(&probabilities, &labels, 0.05).unwrap();
        assert_eq!(table.rows.len(), 21);
        assert_eq!(table.rows[0].threshold, 0.0);
        assert_eq!(table.rows[20].threshold, 1.0);
    }

    #[test]
    fn test_sweep_rejects_bad_step() {
        assert!(matches!(
            sweep(&[0.5], &[1], 0.0),
            Err(EvaluationError::BadStep(_))
        ));
        assert!(matches!(
            sweep(&[0.5], &[1], 1.5),
            Err(EvaluationError::BadStep(_))
        ));
    }

    #[test]
    fn test_sweep_monotone_predicted_positives() {
        let labels = [1u8, 0, 1, 0, 1, 0];
        let probabilities = [0.9, 0.8, 0.7, 0.4, 0.3, 0.1];
        let table = sweep(&probabilities, &labels, 0.1).unwrap();

        for pair in table.rows.windows(2) {
            assert!(
                pair[0].confusion.predicted_positives()
                    >= pair[1].confusion.predicted_positives(),
                "positives must not grow as the threshold rises"
            );
        }
    }

    #[test]
    fn test_best_f1_picks_maximum() {
        let labels = [1u8, 1, 0, 0];
        let probabilities = [0.9, 0.8, 0.3, 0.2];
        let table = sweep(&probabilities, &labels, 0.25).unwrap();
        let best = table.best_f1().unwrap();
        // A threshold separating 0.3 from 0.8 classifies perfectly
        assert_eq!(best.f1, 1.0);
    }

    #[test]
    fn test_csv_rendering() {
        let labels = [1u8, 0];
        let probabilities = [0.9, 0.1];
        let table = sweep(&probabilities, &labels, 0.5).unwrap();
        let csv = table.to_csv();

        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("threshold,accuracy,precision,recall,f1"));
        assert_eq!(lines.next(), Some("0.00,0.5000,0.5000,1.0000,0.6667"));
        assert_eq!(csv.lines().count(), 4); // header + 3 thresholds
    }

    // ==================== DATASET SCORING TESTS ====================

    #[test]
    fn test_dataset_probabilities_follow_row_order() {
        use crate::schema::FeatureSchema;
        use std::io::Write;

        struct AgeEcho;
        impl AttritionModel for AgeEcho {
            fn probability_of(&self, row: &AssembledRow) -> crate::pipeline::Result<f64> {
                match row.get("Age") {
                    Some(CellValue::Numeric(v)) => Ok(*v / 100.0),
                    _ => Err(ModelError::MissingFeature("Age".to_string())),
                }
            }
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Age,Attrition\n20,No\n40,Yes\n60,No\n").unwrap();
        file.flush().unwrap();
        let data = ReferenceDataset::load(file.path()).unwrap();

        let schema = FeatureSchema::new(vec!["Age".to_string()])
            .validate_against(data.column_names())
            .unwrap();

        let probabilities = dataset_probabilities(&AgeEcho, &schema, &data).unwrap();
        assert_eq!(probabilities, vec![0.2, 0.4, 0.6]);
    }

    // ==================== PROPERTY-BASED TESTS ====================

    #[test]
    fn test_threshold_monotonicity_property() {
        use proptest::prelude::*;

        proptest::proptest!(|(
            probabilities in proptest::collection::vec(0.0f64..=1.0, 1..60),
            t1 in 0.0f64..=1.0,
            t2 in 0.0f64..=1.0,
        )| {
            let (low, high) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            let at_low = predict_labels(&probabilities, low).iter().map(|&v| v as usize).sum::<usize>();
            let at_high = predict_labels(&probabilities, high).iter().map(|&v| v as usize).sum::<usize>();
            prop_assert!(at_low >= at_high);
        });
    }

    #[test]
    fn test_metrics_bounded_property() {
        use proptest::prelude::*;

        proptest::proptest!(|(
            probabilities in proptest::collection::vec(0.0f64..=1.0, 1..40),
            threshold in 0.0f64..=1.0,
        )| {
            let labels: Vec<u8> = probabilities.iter().enumerate().map(|(i, _)| (i % 2) as u8).collect();
            let m = evaluate_at(&probabilities, &labels, threshold).unwrap();
            for value in [m.accuracy, m.precision, m.recall, m.f1] {
                prop_assert!((0.0..=1.0).contains(&value));
            }
            prop_assert_eq!(m.confusion.total() as usize, probabilities.len());
        });
    }
}
