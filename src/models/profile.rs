use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptive statistics for a single column, rendered as strings so
/// numeric and categorical columns share one grid shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: String,
    pub null_count: usize,
    pub unique_count: usize,
    pub min: Option<String>,
    pub max: Option<String>,
    pub mean: Option<String>,
    pub median: Option<String>,
    pub std_dev: Option<String>,
    pub percentile_25: Option<String>,
    pub percentile_75: Option<String>,
    pub frequent_values: Option<HashMap<String, u32>>,
}

/// Snapshot of a loaded table: shape, schema, missing-data percentages
/// and the per-column statistics grid. Derived once per upload and
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub row_count: usize,
    pub column_count: usize,
    /// Column names in declaration order.
    pub columns: Vec<String>,
    /// Declared type per column, keyed by column name.
    pub dtypes: HashMap<String, String>,
    /// Missing percentage per column, in [0, 100]. A zero-row table
    /// reports 0.0 for every column.
    pub missing: HashMap<String, f64>,
    pub column_summaries: Vec<ColumnSummary>,
    pub summary_text: String,
}
