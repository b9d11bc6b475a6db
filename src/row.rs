//! Row assembly for prediction input
//!
//! User-submitted values arrive as a name-to-value mapping. The pipeline's
//! column transforms were fit against a specific ordered feature list, so the
//! mapping is reordered into a single row matching that list exactly. Extra
//! keys are dropped; a missing key is a hard failure raised before any
//! scoring happens, since there is no recovery path for a misaligned row.

use std::collections::HashMap;

use thiserror::Error;

use crate::dataset::CellValue;
use crate::schema::ValidatedSchema;

/// Submission lacked a value for one or more required features
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("submission is missing values for: {}", missing.join(", "))]
pub struct IncompleteInput {
    pub missing: Vec<String>,
}

/// A single prediction row whose values sit in exact schema order
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRow {
    names: Vec<String>,
    values: Vec<CellValue>,
}

impl AssembledRow {
    /// Pair values already sitting in schema order with the schema names.
    ///
    /// Used when the source is the reference dataset itself (columns looked
    /// up schema-wise), where the reorder-and-check of [`assemble_row`]
    /// would be redundant.
    pub fn from_schema_values(schema: &ValidatedSchema, values: Vec<CellValue>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self {
            names: schema.names().to_vec(),
            values,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }

    /// Iterate (name, value) pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Reorder a user mapping into a row matching the schema.
///
/// Every missing feature is collected before failing, so the error names the
/// full list rather than the first omission.
pub fn assemble_row(
    schema: &ValidatedSchema,
    input: &HashMap<String, CellValue>,
) -> Result<AssembledRow, IncompleteInput> {
    let missing: Vec<String> = schema
        .names()
        .iter()
        .filter(|name| !input.contains_key(name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(IncompleteInput { missing });
    }

    let values = schema
        .names()
        .iter()
        .map(|name| input[name.as_str()].clone())
        .collect();

    Ok(AssembledRow {
        names: schema.names().to_vec(),
        values,
    })
}

/// Parse `KEY=VALUE` pairs from the command line into a user mapping.
///
/// Values follow the dataset cell rules: numbers become numeric, anything
/// else is text. Later duplicates overwrite earlier ones.
pub fn parse_key_value_pairs(pairs: &[String]) -> Result<HashMap<String, CellValue>, String> {
    let mut out = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("expected KEY=VALUE, got {pair:?}"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("empty feature name in {pair:?}"));
        }
        out.insert(key.to_string(), CellValue::parse(value));
    }
    Ok(out)
}
