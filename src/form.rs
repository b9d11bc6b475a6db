//! Input form builder
//!
//! For every feature in the validated schema, inspect the reference data and
//! emit a widget specification for the external UI layer. Numeric columns get
//! bounded number inputs defaulting to the column median; categorical columns
//! get pickers over the sorted distinct values. No inference happens here.

use serde::Serialize;

use crate::dataset::ReferenceDataset;
use crate::schema::ValidatedSchema;

/// Bounds used when a numeric column holds no values at all, so the UI
/// always gets a renderable widget
pub const DEGENERATE_MIN: f64 = 0.0;
pub const DEGENERATE_MAX: f64 = 100.0;
pub const DEGENERATE_DEFAULT: f64 = 0.0;

/// One input widget for the external UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetSpec {
    Numeric {
        name: String,
        min: f64,
        max: f64,
        default: f64,
        step: f64,
    },
    Categorical {
        name: String,
        options: Vec<String>,
        /// First option; None when the option set is empty (the UI decides
        /// how to render an empty picker)
        default: Option<String>,
    },
}

impl WidgetSpec {
    pub fn name(&self) -> &str {
        match self {
            WidgetSpec::Numeric { name, .. } | WidgetSpec::Categorical { name, .. } => name,
        }
    }
}

/// Build one widget spec per schema feature, preserving schema order.
///
/// The [`ValidatedSchema`] argument is the proof that every feature has a
/// backing column; a feature whose column nevertheless yields no usable
/// statistics still produces a widget rather than aborting the form.
pub fn build_form(schema: &ValidatedSchema, data: &ReferenceDataset) -> Vec<WidgetSpec> {
    schema
        .names()
        .iter()
        .map(|name| widget_for(name, data))
        .collect()
}

fn widget_for(name: &str, data: &ReferenceDataset) -> WidgetSpec {
    if data.is_numeric_column(name) {
        let step = if data.is_integer_column(name) { 1.0 } else { 0.1 };
        match data.numeric_summary(name) {
            Some(summary) => WidgetSpec::Numeric {
                name: name.to_string(),
                min: summary.min,
                max: summary.max,
                default: summary.median,
                step,
            },
            None => degenerate_numeric(name),
        }
    } else {
        let options = data.distinct_values(name);
        if options.is_empty() {
            // Column exists but every cell is missing: placeholder bounds
            return degenerate_numeric(name);
        }
        let default = options.first().cloned();
        WidgetSpec::Categorical {
            name: name.to_string(),
            options,
            default,
        }
    }
}

fn degenerate_numeric(name: &str) -> WidgetSpec {
    WidgetSpec::Numeric {
        name: name.to_string(),
        min: DEGENERATE_MIN,
        max: DEGENERATE_MAX,
        default: DEGENERATE_DEFAULT,
        step: 1.0,
    }
}
