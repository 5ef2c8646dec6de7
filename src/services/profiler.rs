use std::collections::HashMap;

use polars::prelude::*;

use crate::models::profile::{ColumnSummary, Profile};

/// Human-readable name for a column's declared type, used in profiles
/// and in the schema section of synthesis prompts.
pub fn dtype_name(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Boolean => "boolean",
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            "unsigned integer"
        }
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => "integer",
        DataType::Float32 | DataType::Float64 => "float",
        DataType::Utf8 => "string",
        DataType::Date => "date",
        DataType::Datetime(_, _) => "datetime",
        DataType::Time => "time",
        _ => "unknown",
    }
}

/// Build a `Profile` for a table. Pure and total: nulls, mixed columns
/// and zero-row tables all produce a profile rather than an error. A
/// zero-row table reports 0.0% missing for every column.
pub fn profile(df: &DataFrame) -> Profile {
    let row_count = df.height();
    let column_count = df.width();

    let mut columns = Vec::with_capacity(column_count);
    let mut dtypes = HashMap::new();
    let mut missing = HashMap::new();
    let mut column_summaries = Vec::with_capacity(column_count);

    let mut numeric_count = 0usize;
    let mut categorical_count = 0usize;
    let mut date_count = 0usize;

    for s in df.get_columns() {
        let name = s.name().to_string();
        let dtype = s.dtype();

        if dtype.is_numeric() {
            numeric_count += 1;
        } else if matches!(dtype, DataType::Date | DataType::Datetime(_, _)) {
            date_count += 1;
        } else {
            categorical_count += 1;
        }

        let missing_pct = if row_count == 0 {
            0.0
        } else {
            (s.null_count() as f64 / row_count as f64 * 100.0 * 100.0).round() / 100.0
        };

        columns.push(name.clone());
        dtypes.insert(name.clone(), dtype_name(dtype).to_string());
        missing.insert(name, missing_pct);
        column_summaries.push(summarize_column(s));
    }

    let summary_text = format!(
        "Dataset has {} rows and {} columns ({} numeric, {} categorical, {} date).",
        row_count, column_count, numeric_count, categorical_count, date_count
    );

    Profile {
        row_count,
        column_count,
        columns,
        dtypes,
        missing,
        column_summaries,
        summary_text,
    }
}

/// Descriptive statistics for one column. Numeric columns get the usual
/// grid (min/max/mean/median/std and quartiles); string columns get
/// their top-10 frequent values instead.
fn summarize_column(s: &Series) -> ColumnSummary {
    let mut summary = ColumnSummary {
        name: s.name().to_string(),
        data_type: dtype_name(s.dtype()).to_string(),
        null_count: s.null_count(),
        unique_count: s.n_unique().unwrap_or(0),
        ..ColumnSummary::default()
    };

    if s.dtype().is_numeric() {
        if let Ok(s_f64) = s.cast(&DataType::Float64) {
            if let Ok(ca) = s_f64.f64() {
                summary.min = ca.min().map(|v| v.to_string());
                summary.max = ca.max().map(|v| v.to_string());
                summary.mean = ca.mean().map(|v| format!("{:.2}", v));
                summary.median = ca.median().map(|v| format!("{:.2}", v));
                summary.std_dev = ca.std(1).map(|v| format!("{:.2}", v));
            }
            summary.percentile_25 = quantile_string(&s_f64, 0.25);
            summary.percentile_75 = quantile_string(&s_f64, 0.75);
        }
    } else if s.dtype() == &DataType::Utf8 {
        if let Ok(vc_df) = s.value_counts(true, false) {
            if let (Ok(vals), Ok(cnts)) = (
                vc_df.column(s.name()).and_then(|c| c.utf8()),
                vc_df.column("counts").and_then(|c| c.u32()),
            ) {
                let mut map = HashMap::new();
                for i in 0..vals.len().min(10) {
                    if let (Some(val), Some(cnt)) = (vals.get(i), cnts.get(i)) {
                        map.insert(val.to_string(), cnt);
                    }
                }
                summary.frequent_values = Some(map);
            }
        }
    }

    summary
}

fn quantile_string(s: &Series, q: f64) -> Option<String> {
    s.quantile_as_series(q, QuantileInterpolOptions::Linear)
        .ok()
        .and_then(|qs| qs.f64().ok().and_then(|ca| ca.get(0)))
        .map(|v| format!("{:.2}", v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        let region = Series::new("region", &["north", "south", "north", "east"]);
        let revenue = Series::new("revenue", &[Some(100.0), Some(250.0), None, Some(80.0)]);
        DataFrame::new(vec![region, revenue]).unwrap()
    }

    #[test]
    fn columns_match_table_in_length_and_order() {
        let df = sample_df();
        let p = profile(&df);
        assert_eq!(p.columns, vec!["region".to_string(), "revenue".to_string()]);
        assert_eq!(p.column_count, 2);
        assert_eq!(p.row_count, 4);
        assert!(p.dtypes.contains_key("region"));
        assert!(p.dtypes.contains_key("revenue"));
        assert_eq!(p.dtypes.len(), 2);
        assert_eq!(p.missing.len(), 2);
    }

    #[test]
    fn missing_percentages_are_bounded() {
        let p = profile(&sample_df());
        for pct in p.missing.values() {
            assert!((0.0..=100.0).contains(pct));
        }
        assert_eq!(p.missing["revenue"], 25.0);
        assert_eq!(p.missing["region"], 0.0);
    }

    #[test]
    fn zero_row_table_reports_zero_missing() {
        let empty = DataFrame::new(vec![
            Series::new("a", Vec::<f64>::new()),
            Series::new("b", Vec::<String>::new()),
        ])
        .unwrap();
        let p = profile(&empty);
        assert_eq!(p.row_count, 0);
        assert_eq!(p.missing["a"], 0.0);
        assert_eq!(p.missing["b"], 0.0);
    }

    #[test]
    fn numeric_columns_get_a_stats_grid() {
        let p = profile(&sample_df());
        let revenue = p
            .column_summaries
            .iter()
            .find(|c| c.name == "revenue")
            .unwrap();
        assert_eq!(revenue.min.as_deref(), Some("80"));
        assert_eq!(revenue.max.as_deref(), Some("250"));
        assert!(revenue.mean.is_some());
        assert!(revenue.percentile_25.is_some());
    }

    #[test]
    fn string_columns_get_frequent_values() {
        let p = profile(&sample_df());
        let region = p
            .column_summaries
            .iter()
            .find(|c| c.name == "region")
            .unwrap();
        let freq = region.frequent_values.as_ref().unwrap();
        assert_eq!(freq["north"], 2);
    }
}
