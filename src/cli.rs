//! CLI argument parsing for AttriSight

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::evaluation::DEFAULT_SWEEP_STEP;
use crate::risk::{DEFAULT_HIGH_THRESHOLD, DEFAULT_MEDIUM_THRESHOLD};

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "attrisight")]
#[command(version)]
#[command(about = "HR attrition analytics and risk prediction", long_about = None)]
pub struct Cli {
    /// Project root holding artifacts/, data/ and assets/
    #[arg(long = "root", value_name = "DIR", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable debug logging to stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dataset provenance and a first-rows preview
    Summary {
        /// Number of preview rows
        #[arg(long = "rows", value_name = "N", default_value = "5")]
        rows: usize,
    },

    /// Attrition rates, numeric distributions and correlation with the outcome
    Analyze {
        /// Categorical feature to group attrition rates by
        #[arg(long = "by", value_name = "FEATURE")]
        by: Option<String>,

        /// Numeric feature to summarize split by outcome
        #[arg(long = "numeric", value_name = "FEATURE")]
        numeric: Option<String>,

        /// Keep only rows where FEATURE equals VALUE (repeatable)
        #[arg(long = "filter", value_name = "FEATURE=VALUE")]
        filters: Vec<String>,

        /// Keep only rows where FEATURE lies in LO:HI inclusive (repeatable)
        #[arg(long = "range", value_name = "FEATURE=LO:HI")]
        ranges: Vec<String>,
    },

    /// Validate the three project hypotheses against the dataset
    Hypotheses,

    /// Emit input-widget specifications for the validated feature schema
    Form,

    /// Score one employee profile given as KEY=VALUE pairs
    Predict {
        /// Feature values, e.g. Age=30 OverTime=Yes
        #[arg(value_name = "KEY=VALUE", required = true)]
        pairs: Vec<String>,

        /// Probability at or above which risk is at least Medium
        #[arg(
            long = "medium-threshold",
            value_name = "P",
            default_value_t = DEFAULT_MEDIUM_THRESHOLD
        )]
        medium_threshold: f64,

        /// Probability at or above which risk is High
        #[arg(
            long = "high-threshold",
            value_name = "P",
            default_value_t = DEFAULT_HIGH_THRESHOLD
        )]
        high_threshold: f64,
    },

    /// Confusion matrix and threshold metrics over the reference dataset
    Evaluate {
        /// Decision threshold for the confusion matrix
        #[arg(long = "threshold", value_name = "T", default_value = "0.50")]
        threshold: f64,

        /// Also compute the full threshold sweep table
        #[arg(long = "sweep")]
        sweep: bool,

        /// Sweep grid spacing
        #[arg(long = "step", value_name = "S", default_value_t = DEFAULT_SWEEP_STEP)]
        step: f64,

        /// Write the sweep table as CSV to this path
        #[arg(long = "export", value_name = "PATH")]
        export: Option<PathBuf>,
    },
}
