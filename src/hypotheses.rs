//! Project hypotheses and their validation
//!
//! Three pre-stated hypotheses about attrition drivers, each validated with
//! group rates on the labeled reference dataset plus a chi-square test of
//! independence on the 2x2 group-by-outcome contingency table:
//!
//! - H1: overtime workers leave more.
//! - H2: lower job satisfaction increases attrition.
//! - H3: younger employees (<= 30) leave more often.
//!
//! "Supported" requires both a higher rate in the hypothesized group and
//! p below the significance level.

use crate::dataset::{CellValue, DatasetError, ReferenceDataset};

/// Significance level for the supported/not-supported verdict
pub const ALPHA: f64 = 0.05;

/// Age cut for H3
pub const YOUNG_AGE_CUTOFF: f64 = 30.0;

/// Attrition counts for one side of a hypothesis split
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GroupStats {
    pub label: String,
    pub total: u64,
    pub leavers: u64,
}

impl GroupStats {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.leavers as f64 / self.total as f64
        }
    }
}

/// Validation result for one hypothesis
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HypothesisResult {
    pub hypothesized: GroupStats,
    pub complement: GroupStats,
    pub chi_square: f64,
    pub p_value: f64,
    pub supported: bool,
}

/// One hypothesis with its verdict, or the reason it could not be checked
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisOutcome {
    pub id: &'static str,
    pub statement: &'static str,
    pub result: Result<HypothesisResult, String>,
}

impl HypothesisOutcome {
    pub fn format(&self) -> String {
        let mut out = format!("{}: {}\n", self.id, self.statement);
        match &self.result {
            Ok(r) => {
                out.push_str(&format!(
                    "  {}: {}/{} leave ({:.1}%)\n",
                    r.hypothesized.label,
                    r.hypothesized.leavers,
                    r.hypothesized.total,
                    r.hypothesized.rate() * 100.0
                ));
                out.push_str(&format!(
                    "  {}: {}/{} leave ({:.1}%)\n",
                    r.complement.label,
                    r.complement.leavers,
                    r.complement.total,
                    r.complement.rate() * 100.0
                ));
                out.push_str(&format!(
                    "  chi2 = {:.3}, p = {:.4} -> {}\n",
                    r.chi_square,
                    r.p_value,
                    if r.supported { "supported" } else { "not supported" }
                ));
            }
            Err(reason) => out.push_str(&format!("  not evaluable: {reason}\n")),
        }
        out
    }
}

/// Evaluate all three hypotheses against the labeled dataset
pub fn evaluate_hypotheses(
    data: &ReferenceDataset,
) -> Result<Vec<HypothesisOutcome>, DatasetError> {
    // Labels are required for every hypothesis; fail the page once here
    data.labels()?;

    Ok(vec![
        HypothesisOutcome {
            id: "H1",
            statement: "Overtime workers leave more",
            result: split_hypothesis(data, "OverTime", "OverTime=Yes", "OverTime=No", |cell| {
                matches!(cell, CellValue::Text(s) if s == "Yes")
            }),
        },
        HypothesisOutcome {
            id: "H2",
            statement: "Lower job satisfaction increases attrition",
            result: satisfaction_hypothesis(data),
        },
        HypothesisOutcome {
            id: "H3",
            statement: "Younger employees (<=30) leave more often",
            result: split_hypothesis(data, "Age", "Age<=30", "Age>30", |cell| {
                matches!(cell, CellValue::Numeric(v) if *v <= YOUNG_AGE_CUTOFF)
            }),
        },
    ])
}

/// H2 splits at the observed JobSatisfaction median rather than a fixed cut
fn satisfaction_hypothesis(data: &ReferenceDataset) -> Result<HypothesisResult, String> {
    let summary = data
        .numeric_summary("JobSatisfaction")
        .ok_or_else(|| "dataset has no numeric JobSatisfaction column".to_string())?;
    let median = summary.median;
    split_hypothesis(
        data,
        "JobSatisfaction",
        "below median",
        "at or above median",
        |cell| matches!(cell, CellValue::Numeric(v) if *v < median),
    )
}

fn split_hypothesis(
    data: &ReferenceDataset,
    feature: &str,
    hypothesized_label: &str,
    complement_label: &str,
    in_group: impl Fn(&CellValue) -> bool,
) -> Result<HypothesisResult, String> {
    let cells = data
        .column(feature)
        .ok_or_else(|| format!("dataset has no {feature} column"))?;
    let labels = data.labels().map_err(|e| e.to_string())?;

    let mut hypothesized = GroupStats {
        label: hypothesized_label.to_string(),
        total: 0,
        leavers: 0,
    };
    let mut complement = GroupStats {
        label: complement_label.to_string(),
        total: 0,
        leavers: 0,
    };
    for (cell, &label) in cells.iter().zip(labels.iter()) {
        if cell.is_missing() {
            continue;
        }
        let group = if in_group(cell) {
            &mut hypothesized
        } else {
            &mut complement
        };
        group.total += 1;
        group.leavers += u64::from(label);
    }

    if hypothesized.total == 0 || complement.total == 0 {
        return Err(format!(
            "{feature} does not split the population (one side is empty)"
        ));
    }

    let (chi_square, p_value) = chi_square_independence_2x2(
        hypothesized.leavers as f64,
        (hypothesized.total - hypothesized.leavers) as f64,
        complement.leavers as f64,
        (complement.total - complement.leavers) as f64,
    );
    let supported = hypothesized.rate() > complement.rate() && p_value < ALPHA;

    Ok(HypothesisResult {
        hypothesized,
        complement,
        chi_square,
        p_value,
        supported,
    })
}

/// Pearson chi-square test of independence on a 2x2 table.
///
/// Cells are (group1 leavers, group1 stayers, group2 leavers, group2
/// stayers); the statistic sums (O-E)^2/E with expectations from the
/// margins, one degree of freedom.
pub fn chi_square_independence_2x2(a: f64, b: f64, c: f64, d: f64) -> (f64, f64) {
    let observed = [a, b, c, d];
    let row_sums = [a + b, c + d];
    let col_sums = [a + c, b + d];
    let total: f64 = observed.iter().sum();
    if total == 0.0 {
        return (0.0, 1.0);
    }

    let mut chi2 = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            let expected = row_sums[i] * col_sums[j] / total;
            if expected > 0.0 {
                let diff = observed[i * 2 + j] - expected;
                chi2 += diff * diff / expected;
            }
        }
    }
    (chi2, chi_square_p_value(chi2, 1.0))
}

/// Upper tail of the chi-square distribution: P(X >= x) with df degrees of
/// freedom, via the regularized incomplete gamma function
pub fn chi_square_p_value(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    (1.0 - gamma_p(df / 2.0, x / 2.0)).clamp(0.0, 1.0)
}

/// Natural log of the gamma function (Lanczos approximation, g = 7)
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        // Reflection for the left half-plane
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut acc = 0.999_999_999_999_809_9;
    for (i, coeff) in COEFFS.iter().enumerate() {
        acc += coeff / (x + (i + 1) as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

/// Regularized lower incomplete gamma function P(a, x)
fn gamma_p(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        gamma_p_series(a, x)
    } else {
        1.0 - gamma_q_continued_fraction(a, x)
    }
}

/// Series expansion, converges fast for x < a + 1
fn gamma_p_series(a: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-14;

    let mut term = 1.0 / a;
    let mut sum = term;
    let mut denom = a;
    for _ in 0..MAX_ITER {
        denom += 1.0;
        term *= x / denom;
        sum += term;
        if term.abs() < sum.abs() * EPS {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Lentz continued fraction for Q(a, x), converges fast for x >= a + 1
fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
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

    // ==================== SPECIAL FUNCTION TESTS ====================

    #[test]
    fn test_ln_gamma_known_values() {
        // Gamma(1) = Gamma(2) = 1, Gamma(5) = 24
        assert!(ln_gamma(1.0).abs() < 1e-10);
        assert!(ln_gamma(2.0).abs() < 1e-10);
        assert!((ln_gamma(5.0) - 24.0f64.ln()).abs() < 1e-10);
        // Gamma(1/2) = sqrt(pi)
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn test_chi_square_p_value_reference_points() {
        // Critical value for df=1 at alpha=0.05 is 3.841
        let p = chi_square_p_value(3.841, 1.0);
        assert!((p - 0.05).abs() < 1e-3, "p(3.841, 1) = {p}");
        // df=1 at x=1: p ~ 0.3173
        let p = chi_square_p_value(1.0, 1.0);
        assert!((p - 0.3173).abs() < 1e-3, "p(1, 1) = {p}");
        assert_eq!(chi_square_p_value(0.0, 1.0), 1.0);
    }

    #[test]
    fn test_gamma_p_monotone_in_x() {
        let mut last = 0.0;
        for i in 1..50 {
            let p = gamma_p(0.5, i as f64 * 0.2);
            assert!(p >= last);
            assert!((0.0..=1.0).contains(&p));
            last = p;
        }
    }

    // ==================== CONTINGENCY TESTS ====================

    #[test]
    fn test_chi_square_independent_table() {
        // Identical rates in both groups: statistic 0, p 1
        let (chi2, p) = chi_square_independence_2x2(10.0, 90.0, 20.0, 180.0);
        assert!(chi2.abs() < 1e-9);
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_chi_square_dependent_table() {
        // 80% vs 20% attrition on 100 per group is decisively dependent
        let (chi2, p) = chi_square_independence_2x2(80.0, 20.0, 20.0, 80.0);
        assert!(chi2 > 50.0);
        assert!(p < 0.001);
    }

    #[test]
    fn test_chi_square_empty_table() {
        let (chi2, p) = chi_square_independence_2x2(0.0, 0.0, 0.0, 0.0);
        assert_eq!(chi2, 0.0);
        assert_eq!(p, 1.0);
    }

    // ==================== HYPOTHESIS TESTS ====================

    fn strong_signal_dataset() -> ReferenceDataset {
        // 20 rows: every overtime worker under 30 leaves, nobody else does
        let mut csv = String::from("Age,OverTime,JobSatisfaction,Attrition\n");
        for _ in 0..10 {
            csv.push_str("25,Yes,1,Yes\n");
            csv.push_str("45,No,4,No\n");
        }
        dataset(&csv)
    }

    #[test]
    fn test_h1_supported_on_strong_signal() {
        let data = strong_signal_dataset();
        let outcomes = evaluate_hypotheses(&data).unwrap();
        let h1 = &outcomes[0];
        assert_eq!(h1.id, "H1");

        let result = h1.result.as_ref().unwrap();
        assert_eq!(result.hypothesized.rate(), 1.0);
        assert_eq!(result.complement.rate(), 0.0);
        assert!(result.p_value < ALPHA);
        assert!(result.supported);
    }

    #[test]
    fn test_h3_age_cutoff() {
        let data = strong_signal_dataset();
        let outcomes = evaluate_hypotheses(&data).unwrap();
        let h3 = &outcomes[2];
        let result = h3.result.as_ref().unwrap();
        assert_eq!(result.hypothesized.label, "Age<=30");
        assert!(result.supported);
    }

    #[test]
    fn test_h2_not_evaluable_without_satisfaction_column() {
        let data = dataset("Age,OverTime,Attrition\n25,Yes,Yes\n45,No,No\n");
        let outcomes = evaluate_hypotheses(&data).unwrap();
        let h2 = &outcomes[1];
        assert_eq!(h2.id, "H2");
        assert!(h2.result.is_err());
        assert!(h2.format().contains("not evaluable"));
    }

    #[test]
    fn test_not_supported_when_direction_reverses() {
        // Overtime workers leave *less* here; p may be small but the
        // direction is wrong, so the verdict is not-supported
        let mut csv = String::from("Age,OverTime,Attrition\n");
        for _ in 0..10 {
            csv.push_str("40,Yes,No\n");
            csv.push_str("40,No,Yes\n");
        }
        let data = dataset(&csv);
        let outcomes = evaluate_hypotheses(&data).unwrap();
        let result = outcomes[0].result.as_ref().unwrap();
        assert!(result.p_value < ALPHA);
        assert!(!result.supported);
    }

    #[test]
    fn test_one_sided_split_not_evaluable() {
        let data = dataset("Age,OverTime,Attrition\n25,Yes,Yes\n30,Yes,No\n");
        let outcomes = evaluate_hypotheses(&data).unwrap();
        assert!(outcomes[0].result.is_err());
    }

    #[test]
    fn test_requires_labels() {
        let data = dataset("Age,OverTime\n25,Yes\n45,No\n");
        assert!(evaluate_hypotheses(&data).is_err());
    }
}
