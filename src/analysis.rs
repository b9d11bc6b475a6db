//! Workforce analysis aggregates
//!
//! Descriptive statistics over the labeled reference dataset: attrition rate
//! per category level, numeric distributions split by outcome, and Pearson
//! correlation of numeric features with the binary target. Row filters
//! narrow the population before aggregation; the dataset itself is never
//! mutated.

use crate::dataset::{
    numeric_summary_of, CellValue, DatasetError, NumericSummary, ReferenceDataset,
};

pub type Result<T> = std::result::Result<T, DatasetError>;

/// A predicate narrowing the analyzed population
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// Keep rows whose categorical value equals the given key
    Equals { feature: String, value: String },
    /// Keep rows whose numeric value lies in the inclusive range
    Range { feature: String, min: f64, max: f64 },
}

impl RowFilter {
    fn keeps(&self, cell: &CellValue) -> bool {
        match self {
            RowFilter::Equals { value, .. } => {
                cell.category_key().is_some_and(|key| key == *value)
            }
            RowFilter::Range { min, max, .. } => match cell {
                CellValue::Numeric(v) => *min <= *v && *v <= *max,
                _ => false,
            },
        }
    }

    fn feature(&self) -> &str {
        match self {
            RowFilter::Equals { feature, .. } | RowFilter::Range { feature, .. } => feature,
        }
    }
}

/// Row mask after applying every filter; a filter on an absent column keeps
/// nothing of it (the mask simply drops those rows)
pub fn filter_mask(data: &ReferenceDataset, filters: &[RowFilter]) -> Vec<bool> {
    let mut mask = vec![true; data.n_rows()];
    for filter in filters {
        match data.column(filter.feature()) {
            Some(cells) => {
                for (i, cell) in cells.iter().enumerate() {
                    if !filter.keeps(cell) {
                        mask[i] = false;
                    }
                }
            }
            None => {
                for keep in mask.iter_mut() {
                    *keep = false;
                }
            }
        }
    }
    mask
}

/// Attrition rate for one category level
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CategoryRate {
    pub level: String,
    pub total: u64,
    pub leavers: u64,
    pub rate: f64,
}

/// Attrition rate per level of a categorical feature, sorted by rate
/// descending (ties by level name)
pub fn attrition_rate_by(
    data: &ReferenceDataset,
    feature: &str,
    mask: &[bool],
) -> Result<Vec<CategoryRate>> {
    let labels = data.labels()?;
    let cells = data.column(feature).ok_or_else(|| DatasetError::Parse {
        path: data.source().to_path_buf(),
        detail: format!("no such column: {feature}"),
    })?;

    let mut counts: std::collections::BTreeMap<String, (u64, u64)> =
        std::collections::BTreeMap::new();
    for ((cell, &label), &keep) in cells.iter().zip(labels.iter()).zip(mask.iter()) {
        if !keep {
            continue;
        }
        let Some(key) = cell.category_key() else {
            continue;
        };
        let entry = counts.entry(key).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += u64::from(label);
    }

    let mut rates: Vec<CategoryRate> = counts
        .into_iter()
        .map(|(level, (total, leavers))| CategoryRate {
            level,
            total,
            leavers,
            rate: leavers as f64 / total as f64,
        })
        .collect();
    rates.sort_by(|a, b| {
        b.rate
            .partial_cmp(&a.rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.level.cmp(&b.level))
    });
    Ok(rates)
}

/// Numeric distribution of a feature split by outcome
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OutcomeSplit {
    pub stayed: Option<NumericSummary>,
    pub left: Option<NumericSummary>,
}

pub fn numeric_split_by_outcome(
    data: &ReferenceDataset,
    feature: &str,
    mask: &[bool],
) -> Result<OutcomeSplit> {
    let labels = data.labels()?;
    let cells = data.column(feature).ok_or_else(|| DatasetError::Parse {
        path: data.source().to_path_buf(),
        detail: format!("no such column: {feature}"),
    })?;

    let mut stayed = Vec::new();
    let mut left = Vec::new();
    for ((cell, &label), &keep) in cells.iter().zip(labels.iter()).zip(mask.iter()) {
        if !keep {
            continue;
        }
        if let CellValue::Numeric(v) = cell {
            if label == 1 {
                left.push(*v);
            } else {
                stayed.push(*v);
            }
        }
    }

    Ok(OutcomeSplit {
        stayed: numeric_summary_of(&stayed),
        left: numeric_summary_of(&left),
    })
}

/// Pearson correlation between paired samples; None when either side is
/// constant or the pairing is shorter than two points
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Correlation of each numeric feature with the binary target, strongest
/// absolute value first
pub fn correlation_with_target(
    data: &ReferenceDataset,
    features: &[String],
    mask: &[bool],
) -> Result<Vec<(String, f64)>> {
    let labels = data.labels()?;

    let mut out = Vec::new();
    for feature in features {
        let Some(cells) = data.column(feature) else {
            continue;
        };
        if !data.is_numeric_column(feature) {
            continue;
        }
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for ((cell, &label), &keep) in cells.iter().zip(labels.iter()).zip(mask.iter()) {
            if !keep {
                continue;
            }
            if let CellValue::Numeric(v) = cell {
                xs.push(*v);
                ys.push(f64::from(label));
            }
        }
        if let Some(r) = pearson(&xs, &ys) {
            out.push((feature.clone(), r));
        }
    }
    out.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dataset(content: &str) -> ReferenceDataset {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        ReferenceDataset::load(file.path()).unwrap()
    }

    fn sample() -> ReferenceDataset {
        dataset(
            "Age,OverTime,Dept,Attrition\n\
             25,Yes,Sales,Yes\n\
             30,Yes,Sales,Yes\n\
             45,No,Sales,No\n\
             50,No,HR,No\n\
             28,Yes,HR,Yes\n\
             55,No,HR,No\n",
        )
    }

    #[test]
    fn test_attrition_rate_by_overtime() {
        let data = sample();
        let mask = vec![true; data.n_rows()];
        let rates = attrition_rate_by(&data, "OverTime", &mask).unwrap();

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].level, "Yes");
        assert_eq!(rates[0].total, 3);
        assert_eq!(rates[0].leavers, 3);
        assert_eq!(rates[0].rate, 1.0);
        assert_eq!(rates[1].level, "No");
        assert_eq!(rates[1].rate, 0.0);
    }

    #[test]
    fn test_attrition_rate_unknown_column() {
        let data = sample();
        let mask = vec![true; data.n_rows()];
        assert!(attrition_rate_by(&data, "Nope", &mask).is_err());
    }

    #[test]
    fn test_filter_mask_narrows_population() {
        let data = sample();
        let mask = filter_mask(
            &data,
            &[RowFilter::Equals {
                feature: "Dept".to_string(),
                value: "HR".to_string(),
            }],
        );
        assert_eq!(mask.iter().filter(|&&m| m).count(), 3);

        let rates = attrition_rate_by(&data, "OverTime", &mask).unwrap();
        let total: u64 = rates.iter().map(|r| r.total).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_range_filter() {
        let data = sample();
        let mask = filter_mask(
            &data,
            &[RowFilter::Range {
                feature: "Age".to_string(),
                min: 26.0,
                max: 50.0,
            }],
        );
        assert_eq!(mask.iter().filter(|&&m| m).count(), 4);
    }

    #[test]
    fn test_filter_on_absent_column_keeps_nothing() {
        let data = sample();
        let mask = filter_mask(
            &data,
            &[RowFilter::Equals {
                feature: "Nope".to_string(),
                value: "x".to_string(),
            }],
        );
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn test_numeric_split_by_outcome() {
        let data = sample();
        let mask = vec![true; data.n_rows()];
        let split = numeric_split_by_outcome(&data, "Age", &mask).unwrap();

        let left = split.left.unwrap();
        let stayed = split.stayed.unwrap();
        assert_eq!(left.max, 30.0); // leavers are 25, 30, 28
        assert_eq!(stayed.min, 45.0); // stayers are 45, 50, 55
        assert!(left.mean < stayed.mean);
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_constant_side_is_none() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(pearson(&[1.0], &[2.0]).is_none());
    }

    #[test]
    fn test_correlation_with_target_sorted_by_strength() {
        let data = sample();
        let mask = vec![true; data.n_rows()];
        let correlations = correlation_with_target(
            &data,
            &["Age".to_string(), "OverTime".to_string()],
            &mask,
        )
        .unwrap();

        // OverTime is categorical so only Age correlates; younger leaves more
        assert_eq!(correlations.len(), 1);
        assert_eq!(correlations[0].0, "Age");
        assert!(correlations[0].1 < 0.0);
    }
}
