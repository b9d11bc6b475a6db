//! Feature schema loading and validation
//!
//! The schema is the ordered list of input-column names the pipeline was fit
//! against, persisted as a flat JSON array next to the model artifact. Order
//! is significant: the pipeline's column transforms were fit positionally, so
//! inference input must reproduce the order and name set exactly.
//!
//! Validation fails closed: if the reference data cannot supply every
//! required feature, no form is built and no prediction runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference data is missing one or more features the pipeline requires
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("reference data is missing required features: {}", missing.join(", "))]
pub struct SchemaMismatch {
    /// Every required feature absent from the available columns
    pub missing: Vec<String>,
}

/// Ordered feature names fixed at training time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check every required feature against the available column set.
    ///
    /// Succeeds with a [`ValidatedSchema`] that downstream stages (form
    /// building, row assembly) accept as proof the contract holds. Fails
    /// with the complete list of missing names, never a prefix.
    pub fn validate_against<S: AsRef<str>>(
        &self,
        available: &[S],
    ) -> Result<ValidatedSchema, SchemaMismatch> {
        let missing: Vec<String> = self
            .names
            .iter()
            .filter(|f| !available.iter().any(|c| c.as_ref() == f.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(ValidatedSchema {
                names: self.names.clone(),
            })
        } else {
            Err(SchemaMismatch { missing })
        }
    }
}

/// A feature schema that has been checked against a concrete column set.
///
/// Only [`FeatureSchema::validate_against`] constructs this, so holding one
/// is proof the reference data can supply every required feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSchema {
    names: Vec<String>,
}

impl ValidatedSchema {
    /// Authoritative ordered feature list for all downstream steps
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_all_present() {
        let schema = FeatureSchema::new(vec!["Age".into(), "OverTime".into()]);
        let validated = schema.validate_against(&["OverTime", "Age", "Extra"]).unwrap();
        // Order follows the schema, not the column set
        assert_eq!(validated.names(), &["Age".to_string(), "OverTime".to_string()]);
    }

    #[test]
    fn test_validate_reports_every_missing_name() {
        let schema = FeatureSchema::new(vec![
            "Age".into(),
            "OverTime".into(),
            "JobRole".into(),
        ]);
        let err = schema.validate_against(&["Age"]).unwrap_err();
        assert_eq!(err.missing, vec!["OverTime".to_string(), "JobRole".to_string()]);
    }

    #[test]
    fn test_validate_missing_overtime_concrete_case() {
        // Schema ["Age","OverTime"] against columns {"Age","MonthlyIncome"}
        let schema = FeatureSchema::new(vec!["Age".into(), "OverTime".into()]);
        let err = schema
            .validate_against(&["Age", "MonthlyIncome"])
            .unwrap_err();
        assert_eq!(err.missing, vec!["OverTime".to_string()]);
        assert!(err.to_string().contains("OverTime"));
    }

    #[test]
    fn test_empty_schema_always_validates() {
        let schema = FeatureSchema::new(vec![]);
        let validated = schema.validate_against::<&str>(&[]).unwrap();
        assert!(validated.is_empty());
    }

    #[test]
    fn test_schema_serializes_as_flat_array() {
        let schema = FeatureSchema::new(vec!["Age".into(), "OverTime".into()]);
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"["Age","OverTime"]"#);

        let parsed: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }
}
