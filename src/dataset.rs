//! Reference dataset loading and column statistics
//!
//! The dataset is an ordered table of historical employee records plus a
//! binary outcome label. It is read-only after load: widget bounds, group
//! statistics, and evaluation metrics are all derived from it, but nothing
//! mutates it.
//!
//! The label column is either a pre-encoded `target` (0/1) or the raw
//! `Attrition` column ("Yes"/"No"), normalized to 0/1 on load.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::paths::resolve_first_existing;

/// Errors raised while locating or loading the reference dataset
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("no reference dataset found; searched {}", searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    Unavailable { searched: Vec<PathBuf> },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("unrecognized outcome label {value:?} on data row {row}")]
    BadLabel { row: usize, value: String },

    #[error("dataset has no Attrition or target column")]
    MissingLabel,
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// One parsed CSV field
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Numeric(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Parse a raw field: empty and "NA" are missing, numbers are numeric,
    /// everything else is text
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "NA" {
            return CellValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => CellValue::Numeric(v),
            Err(_) => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Categorical encoding key: integers render without a decimal point so
    /// `3` and `"3"` key identically
    pub fn category_key(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Numeric(v) if v.fract() == 0.0 => Some(format!("{}", *v as i64)),
            CellValue::Numeric(v) => Some(format!("{v}")),
            CellValue::Missing => None,
        }
    }
}

/// Summary statistics over the non-missing values of a numeric column
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Yes/No outcome label normalized to 1/0
pub fn yes_no_to_binary(raw: &str) -> Option<u8> {
    match raw.trim() {
        "Yes" => Some(1),
        "No" => Some(0),
        _ => None,
    }
}

/// Column-major reference dataset with a binary outcome label
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    names: Vec<String>,
    columns: Vec<Vec<CellValue>>,
    target: Option<Vec<u8>>,
    n_rows: usize,
    source: PathBuf,
}

impl ReferenceDataset {
    /// Resolve the dataset through the candidate chain and load it.
    ///
    /// Absence of every candidate is [`DatasetError::Unavailable`]; the
    /// caller decides whether that degrades the page or aborts the command.
    pub fn resolve_and_load(candidates: &[PathBuf]) -> Result<Self> {
        let path = resolve_first_existing(candidates).ok_or_else(|| DatasetError::Unavailable {
            searched: candidates.to_vec(),
        })?;
        Self::load(&path)
    }

    /// Load a headered CSV file into column-major storage
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

        let names: Vec<String> = reader
            .headers()
            .map_err(|e| DatasetError::Parse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
            .iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];
        let mut n_rows = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| DatasetError::Parse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            for (i, field) in record.iter().enumerate() {
                columns[i].push(CellValue::parse(field));
            }
            n_rows += 1;
        }

        let mut dataset = Self {
            names,
            columns,
            target: None,
            n_rows,
            source: path.to_path_buf(),
        };
        dataset.target = dataset.derive_target()?;
        debug!(
            path = %path.display(),
            rows = n_rows,
            columns = dataset.names.len(),
            labeled = dataset.target.is_some(),
            "loaded reference dataset"
        );
        Ok(dataset)
    }

    /// Normalize the outcome label: prefer a pre-encoded 0/1 `target`
    /// column, fall back to `Attrition` Yes/No. Neither present is fine for
    /// form building; evaluation demands a label via [`Self::labels`].
    fn derive_target(&self) -> Result<Option<Vec<u8>>> {
        if let Some(col) = self.column("target") {
            let mut out = Vec::with_capacity(col.len());
            for (row, cell) in col.iter().enumerate() {
                match cell {
                    CellValue::Numeric(v) if *v == 0.0 || *v == 1.0 => out.push(*v as u8),
                    other => {
                        return Err(DatasetError::BadLabel {
                            row: row + 1,
                            value: format!("{other:?}"),
                        })
                    }
                }
            }
            return Ok(Some(out));
        }
        if let Some(col) = self.column("Attrition") {
            let mut out = Vec::with_capacity(col.len());
            for (row, cell) in col.iter().enumerate() {
                let label = match cell {
                    CellValue::Text(s) => yes_no_to_binary(s),
                    _ => None,
                };
                match label {
                    Some(v) => out.push(v),
                    None => {
                        return Err(DatasetError::BadLabel {
                            row: row + 1,
                            value: format!("{cell:?}"),
                        })
                    }
                }
            }
            return Ok(Some(out));
        }
        Ok(None)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column(&self, name: &str) -> Option<&[CellValue]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Binary outcome labels, one per row
    pub fn labels(&self) -> Result<&[u8]> {
        self.target
            .as_deref()
            .ok_or(DatasetError::MissingLabel)
    }

    pub fn has_labels(&self) -> bool {
        self.target.is_some()
    }

    /// A column is numeric when every non-missing cell parsed as a number
    pub fn is_numeric_column(&self, name: &str) -> bool {
        match self.column(name) {
            Some(cells) => {
                let mut saw_value = false;
                for cell in cells {
                    match cell {
                        CellValue::Numeric(_) => saw_value = true,
                        CellValue::Text(_) => return false,
                        CellValue::Missing => {}
                    }
                }
                saw_value
            }
            None => false,
        }
    }

    /// An integer-like column holds only whole numbers
    pub fn is_integer_column(&self, name: &str) -> bool {
        match self.column(name) {
            Some(cells) => {
                self.is_numeric_column(name)
                    && cells.iter().all(|c| match c {
                        CellValue::Numeric(v) => v.fract() == 0.0,
                        _ => true,
                    })
            }
            None => false,
        }
    }

    /// Summary statistics over the non-missing values of a column, None when
    /// the column is absent or holds no numeric values
    pub fn numeric_summary(&self, name: &str) -> Option<NumericSummary> {
        let cells = self.column(name)?;
        let values: Vec<f64> = cells
            .iter()
            .filter_map(|c| match c {
                CellValue::Numeric(v) => Some(*v),
                _ => None,
            })
            .collect();
        numeric_summary_of(&values)
    }

    /// Sorted distinct non-missing values of a column, rendered as
    /// categorical keys
    pub fn distinct_values(&self, name: &str) -> Vec<String> {
        let Some(cells) = self.column(name) else {
            return Vec::new();
        };
        let set: BTreeSet<String> = cells.iter().filter_map(CellValue::category_key).collect();
        set.into_iter().collect()
    }

    /// First `limit` rows rendered for preview display
    pub fn preview(&self, limit: usize) -> Vec<Vec<String>> {
        let n = limit.min(self.n_rows);
        (0..n)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|col| match &col[row] {
                        CellValue::Numeric(v) if v.fract() == 0.0 => format!("{}", *v as i64),
                        CellValue::Numeric(v) => format!("{v:.2}"),
                        CellValue::Text(s) => s.clone(),
                        CellValue::Missing => String::new(),
                    })
                    .collect()
            })
            .collect()
    }
}

/// Min/max/mean/median of a value slice; None when empty
pub fn numeric_summary_of(values: &[f64]) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };
    Some(NumericSummary {
        min: sorted[0],
        max: sorted[n - 1],
        mean: values.iter().sum::<f64>() / n as f64,
        median,
    })
}
