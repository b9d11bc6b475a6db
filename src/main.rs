use anyhow::{bail, Context, Result};
use clap::Parser;

use attrisight::analysis::{self, RowFilter};
use attrisight::artifacts::ArtifactStore;
use attrisight::cli::{Cli, Command, OutputFormat};
use attrisight::dataset::{DatasetError, ReferenceDataset};
use attrisight::evaluation;
use attrisight::form::build_form;
use attrisight::hypotheses::evaluate_hypotheses;
use attrisight::paths::ProjectPaths;
use attrisight::risk::{score, RiskThresholds, AUC_GOAL};
use attrisight::row::{assemble_row, parse_key_value_pairs};
use attrisight::schema::ValidatedSchema;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = ProjectPaths::new(&cli.root);
    match cli.command {
        Command::Summary { rows } => run_summary(&paths, cli.format, rows),
        Command::Analyze {
            by,
            numeric,
            filters,
            ranges,
        } => run_analyze(&paths, cli.format, by, numeric, &filters, &ranges),
        Command::Hypotheses => run_hypotheses(&paths, cli.format),
        Command::Form => run_form(&paths, cli.format),
        Command::Predict {
            pairs,
            medium_threshold,
            high_threshold,
        } => run_predict(&paths, cli.format, &pairs, medium_threshold, high_threshold),
        Command::Evaluate {
            threshold,
            sweep,
            step,
            export,
        } => run_evaluate(&paths, cli.format, threshold, sweep, step, export),
    }
}

/// Load the dataset for pages that degrade to a reduced state without it.
///
/// Returns None after printing the informational message when no candidate
/// file exists; any other load failure propagates.
fn load_dataset_reduced(paths: &ProjectPaths) -> Result<Option<ReferenceDataset>> {
    match ReferenceDataset::resolve_and_load(&paths.dataset_candidates()) {
        Ok(data) => Ok(Some(data)),
        Err(DatasetError::Unavailable { searched }) => {
            println!("No dataset found. Place a CSV at one of:");
            for path in searched {
                println!("  {}", path.display());
            }
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load the dataset for pages that cannot run without it
fn load_dataset_required(paths: &ProjectPaths) -> Result<ReferenceDataset> {
    ReferenceDataset::resolve_and_load(&paths.dataset_candidates())
        .context("reference dataset is required for this page")
}

/// Load both artifacts, naming the expected paths on failure
fn load_artifacts(paths: &ProjectPaths) -> Result<ArtifactStore> {
    ArtifactStore::load(&paths.model_file(), &paths.features_file()).with_context(|| {
        format!(
            "model artifacts not loadable (expected {} and {})",
            paths.model_file().display(),
            paths.features_file().display()
        )
    })
}

/// Validate the artifact schema against the dataset, refusing to proceed
/// when any required feature is missing
fn validate_schema(store: &ArtifactStore, data: &ReferenceDataset) -> Result<ValidatedSchema> {
    store
        .schema()
        .validate_against(data.column_names())
        .map_err(|e| anyhow::anyhow!(e).context("cannot serve predictions over this dataset"))
}

fn run_summary(paths: &ProjectPaths, format: OutputFormat, rows: usize) -> Result<()> {
    let Some(data) = load_dataset_reduced(paths)? else {
        return Ok(());
    };

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "source": data.source().display().to_string(),
                "rows": data.n_rows(),
                "columns": data.column_names(),
                "preview": data.preview(rows),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!(
                "Dataset: {} ({} rows, {} columns)",
                data.source().display(),
                data.n_rows(),
                data.column_names().len()
            );
            println!();
            print_table(data.column_names(), &data.preview(rows));
        }
    }
    Ok(())
}

fn run_analyze(
    paths: &ProjectPaths,
    format: OutputFormat,
    by: Option<String>,
    numeric: Option<String>,
    filters: &[String],
    ranges: &[String],
) -> Result<()> {
    let Some(data) = load_dataset_reduced(paths)? else {
        return Ok(());
    };

    let row_filters = parse_filters(filters, ranges)?;
    let mask = analysis::filter_mask(&data, &row_filters);
    let kept = mask.iter().filter(|&&m| m).count();

    let numeric_features: Vec<String> = data
        .column_names()
        .iter()
        .filter(|name| {
            data.is_numeric_column(name) && *name != "target" && *name != "Attrition"
        })
        .cloned()
        .collect();

    let rates = match &by {
        Some(feature) => Some(analysis::attrition_rate_by(&data, feature, &mask)?),
        None => None,
    };
    let split = match &numeric {
        Some(feature) => Some(analysis::numeric_split_by_outcome(&data, feature, &mask)?),
        None => None,
    };
    let correlations = analysis::correlation_with_target(&data, &numeric_features, &mask)?;

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "source": data.source().display().to_string(),
            "rows_after_filters": kept,
            "attrition_rate_by": rates,
            "numeric_split": split,
            "correlation_with_target": correlations
                .iter()
                .map(|(name, r)| serde_json::json!({"feature": name, "r": r}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "Dataset: {} ({} of {} rows after filters)",
        data.source().display(),
        kept,
        data.n_rows()
    );
    if let (Some(feature), Some(rates)) = (&by, &rates) {
        println!("\nAttrition rate by {feature}:");
        for rate in rates {
            println!(
                "  {:<24} {:>4}/{:<4} ({:.1}%)",
                rate.level,
                rate.leavers,
                rate.total,
                rate.rate * 100.0
            );
        }
    }
    if let (Some(feature), Some(split)) = (&numeric, &split) {
        println!("\n{feature} by outcome:");
        for (label, summary) in [("stayed", &split.stayed), ("left", &split.left)] {
            match summary {
                Some(s) => println!(
                    "  {:<7} min {:>8.1}  median {:>8.1}  mean {:>8.1}  max {:>8.1}",
                    label, s.min, s.median, s.mean, s.max
                ),
                None => println!("  {label:<7} no numeric values"),
            }
        }
    }
    if !correlations.is_empty() {
        println!("\nCorrelation with attrition (Pearson):");
        for (feature, r) in &correlations {
            println!("  {feature:<24} {r:>+.3}");
        }
    }
    Ok(())
}

fn run_hypotheses(paths: &ProjectPaths, format: OutputFormat) -> Result<()> {
    let Some(data) = load_dataset_reduced(paths)? else {
        return Ok(());
    };
    let outcomes = evaluate_hypotheses(&data)?;

    if format == OutputFormat::Json {
        let values: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(result) => serde_json::json!({
                    "id": outcome.id,
                    "statement": outcome.statement,
                    "result": result,
                }),
                Err(reason) => serde_json::json!({
                    "id": outcome.id,
                    "statement": outcome.statement,
                    "not_evaluable": reason,
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    for outcome in &outcomes {
        print!("{}", outcome.format());
    }
    Ok(())
}

fn run_form(paths: &ProjectPaths, format: OutputFormat) -> Result<()> {
    let store = load_artifacts(paths)?;
    let data = load_dataset_required(paths)?;
    let schema = validate_schema(&store, &data)?;

    let widgets = build_form(&schema, &data);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&widgets)?),
        OutputFormat::Text => {
            println!("Input form ({} features, from {}):", widgets.len(), data.source().display());
            for widget in &widgets {
                match widget {
                    attrisight::form::WidgetSpec::Numeric {
                        name,
                        min,
                        max,
                        default,
                        step,
                    } => println!(
                        "  {name}: number [{min}, {max}] default {default} step {step}"
                    ),
                    attrisight::form::WidgetSpec::Categorical {
                        name,
                        options,
                        default,
                    } => println!(
                        "  {name}: choice {{{}}} default {}",
                        options.join(", "),
                        default.as_deref().unwrap_or("-")
                    ),
                }
            }
        }
    }
    Ok(())
}

fn run_predict(
    paths: &ProjectPaths,
    format: OutputFormat,
    pairs: &[String],
    medium_threshold: f64,
    high_threshold: f64,
) -> Result<()> {
    let store = load_artifacts(paths)?;
    let data = load_dataset_required(paths)?;
    let schema = validate_schema(&store, &data)?;
    let thresholds = RiskThresholds::new(medium_threshold, high_threshold)?;

    let input = parse_key_value_pairs(pairs).map_err(|e| anyhow::anyhow!(e))?;
    let row = assemble_row(&schema, &input)?;
    let prediction = score(store.pipeline(), &row, thresholds)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&prediction)?),
        OutputFormat::Text => {
            println!(
                "Attrition probability: {:.2}%",
                prediction.probability * 100.0
            );
            println!("Risk category: {}", prediction.band);
        }
    }
    Ok(())
}

fn run_evaluate(
    paths: &ProjectPaths,
    format: OutputFormat,
    threshold: f64,
    with_sweep: bool,
    step: f64,
    export: Option<std::path::PathBuf>,
) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        bail!("threshold must lie in [0, 1], got {threshold}");
    }
    let store = load_artifacts(paths)?;
    let data = load_dataset_required(paths)?;
    let schema = validate_schema(&store, &data)?;
    let labels = data.labels()?.to_vec();

    let probabilities = evaluation::dataset_probabilities(store.pipeline(), &schema, &data)?;
    let metrics = evaluation::evaluate_at(&probabilities, &labels, threshold)?;
    let sweep_table = if with_sweep || export.is_some() {
        Some(evaluation::sweep(&probabilities, &labels, step)?)
    } else {
        None
    };

    if let (Some(path), Some(table)) = (&export, &sweep_table) {
        std::fs::write(path, table.to_csv())
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "source": data.source().display().to_string(),
            "pipeline": store.pipeline().step_summary(),
            "at_threshold": metrics,
            "sweep": sweep_table.as_ref().map(|t| &t.rows),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Pipeline:");
    for line in store.pipeline().step_summary() {
        println!("  {line}");
    }
    println!("Performance goal: ROC AUC >= {AUC_GOAL}");
    println!();
    print!("{}", metrics.confusion.format(threshold));
    println!(
        "accuracy {:.3}  precision {:.3}  recall {:.3}  f1 {:.3}",
        metrics.accuracy, metrics.precision, metrics.recall, metrics.f1
    );

    if let Some(table) = &sweep_table {
        println!();
        print!("{}", table.format());
        if let Some(path) = &export {
            println!("\nSweep table written to {}", path.display());
        }
    }

    print_asset_status(paths);
    Ok(())
}

/// Report the optional pre-rendered evaluation assets; absence is
/// informational, never an error
fn print_asset_status(paths: &ProjectPaths) {
    println!();
    for (label, path) in [
        ("ROC curve", paths.roc_curve_asset()),
        ("Confusion matrix @ 0.50", paths.confusion_matrix_asset()),
        ("Threshold metrics CSV", paths.threshold_metrics_asset()),
    ] {
        if path.exists() {
            println!("{label}: {}", path.display());
        } else {
            println!("{label}: not generated yet (expected {})", path.display());
        }
    }
}

/// Render a small left-aligned text table
fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }
    let line = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
    };
    println!("{}", line(headers));
    for row in rows {
        println!("{}", line(row));
    }
}

/// Turn --filter and --range arguments into row filters
fn parse_filters(filters: &[String], ranges: &[String]) -> Result<Vec<RowFilter>> {
    let mut out = Vec::new();
    for raw in filters {
        let Some((feature, value)) = raw.split_once('=') else {
            bail!("expected --filter FEATURE=VALUE, got {raw:?}");
        };
        out.push(RowFilter::Equals {
            feature: feature.trim().to_string(),
            value: value.trim().to_string(),
        });
    }
    for raw in ranges {
        let Some((feature, bounds)) = raw.split_once('=') else {
            bail!("expected --range FEATURE=LO:HI, got {raw:?}");
        };
        let Some((lo, hi)) = bounds.split_once(':') else {
            bail!("expected --range FEATURE=LO:HI, got {raw:?}");
        };
        let min: f64 = lo
            .trim()
            .parse()
            .with_context(|| format!("bad range lower bound in {raw:?}"))?;
        let max: f64 = hi
            .trim()
            .parse()
            .with_context(|| format!("bad range upper bound in {raw:?}"))?;
        if min > max {
            bail!("range lower bound exceeds upper bound in {raw:?}");
        }
        out.push(RowFilter::Range {
            feature: feature.trim().to_string(),
            min,
            max,
        });
    }
    Ok(out)
}
