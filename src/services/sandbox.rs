//! Execution sandbox for model-generated query snippets.
//!
//! Two gates stand between untrusted snippet text and the table. The
//! denylist below screens for host-language escape hatches and is kept
//! for compatibility with the filter this service has always applied; it
//! is a best-effort heuristic, not the isolation mechanism. The actual
//! boundary is the closed query grammar: a snippet only runs after it
//! parses into the typed AST, so constructs the grammar cannot express
//! never execute at all.
//!
//! Contract: the snippet must bind its result to `answer`. Whatever is
//! bound there (table, column, or scalar) is the execution result.

use log::{info, warn};
use polars::prelude::*;

use crate::errors::AnalystError;
use crate::services::query_engine::{Interpreter, ScalarValue, Value};
use crate::services::query_parser;

/// Name the table is bound under inside a snippet.
pub const TABLE_NAME: &str = "df";

/// Name the snippet must assign its result to.
pub const RESULT_NAME: &str = "answer";

/// Substrings that reject a snippet outright, matched case-insensitively
/// against the raw text before any parsing.
const DENYLIST: &[&str] = &[
    "import",
    "open(",
    "__",
    "os.",
    "sys.",
    "subprocess",
    "eval(",
    "exec(",
    "pickle",
    "pathlib",
    "write",
    "read(",
    "save",
    "to_csv",
    "to_excel",
    "to_parquet",
    "requests",
    "urllib",
    "pip",
    "!",
    "%",
];

/// Result of a successful snippet run.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Table(DataFrame),
    Scalar(ScalarValue),
}

/// Strip markdown code fences and a leading language tag from generated
/// snippet text.
pub fn strip_code_fences(text: &str) -> String {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
        if let Some(end) = cleaned.rfind("```") {
            cleaned = &cleaned[..end];
        }
    }
    let cleaned = cleaned.trim();
    cleaned
        .strip_prefix("python")
        .map(str::trim)
        .unwrap_or(cleaned)
        .to_string()
}

/// Reject the snippet if it contains any denylisted token. Hard fail:
/// no sanitization, no partial execution.
pub fn validate(snippet: &str) -> Result<(), AnalystError> {
    let lowered = snippet.to_lowercase();
    for token in DENYLIST {
        if lowered.contains(token) {
            warn!("Blocked snippet (matched `{}`)", token);
            return Err(AnalystError::BlockedCode((*token).to_string()));
        }
    }
    Ok(())
}

/// Validate, parse and run a snippet against the table, then enforce the
/// result contract. The table is read-only throughout.
pub fn run_snippet(table: &DataFrame, snippet: &str) -> Result<ExecutionResult, AnalystError> {
    validate(snippet)?;

    let stmts = query_parser::parse(snippet).map_err(AnalystError::Execution)?;

    let mut interpreter = Interpreter::new(table, TABLE_NAME);
    interpreter.run(&stmts)?;

    let value = interpreter
        .lookup(RESULT_NAME)
        .ok_or(AnalystError::MissingResult)?;

    let result = match value {
        Value::Frame { df, .. } => ExecutionResult::Table(df.clone()),
        Value::Column(series) => {
            let df = DataFrame::new(vec![series.clone()])
                .map_err(|e| AnalystError::Execution(e.to_string()))?;
            ExecutionResult::Table(df)
        }
        Value::Scalar(scalar) => ExecutionResult::Scalar(scalar.clone()),
        Value::Grouped { .. } | Value::GroupedColumn { .. } => {
            return Err(AnalystError::execution(
                "groupby must be followed by an aggregation such as sum() or mean()",
            ))
        }
    };

    match &result {
        ExecutionResult::Table(df) => {
            info!("Snippet produced a {}x{} table", df.height(), df.width())
        }
        ExecutionResult::Scalar(v) => info!("Snippet produced scalar {}", v),
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_df() -> DataFrame {
        DataFrame::new(vec![
            Series::new("region", &["north", "south", "north", "east"]),
            Series::new("revenue", &[100i64, 250, 40, 80]),
        ])
        .unwrap()
    }

    #[test]
    fn blocks_import_statements_before_execution() {
        let err = run_snippet(&sales_df(), "import os; os.system(\"rm -rf /\")").unwrap_err();
        assert!(matches!(err, AnalystError::BlockedCode(_)));
    }

    #[test]
    fn blocking_is_case_insensitive() {
        let err = validate("IMPORT os").unwrap_err();
        match err {
            AnalystError::BlockedCode(token) => assert_eq!(token, "import"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn blocks_denylisted_token_in_otherwise_valid_snippet() {
        // would execute fine without the trailing export call
        let err = run_snippet(&sales_df(), "answer = df.head(5).to_csv()").unwrap_err();
        assert!(matches!(err, AnalystError::BlockedCode(_)));
    }

    #[test]
    fn blocks_shell_escape_markers() {
        assert!(matches!(
            validate("answer = df.head(5) !ls"),
            Err(AnalystError::BlockedCode(_))
        ));
        assert!(matches!(
            validate("answer = df.head(5) %run x"),
            Err(AnalystError::BlockedCode(_))
        ));
    }

    #[test]
    fn groupby_chain_binds_answer_as_table() {
        let snippet = "answer = df.groupby(\"region\")[\"revenue\"].sum().sort_values(ascending=False).head(5)";
        match run_snippet(&sales_df(), snippet).unwrap() {
            ExecutionResult::Table(df) => {
                assert_eq!(df.height(), 3);
                let revenue = df.column("revenue").unwrap().i64().unwrap();
                assert_eq!(revenue.get(0), Some(250));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn wrong_result_name_is_missing_result() {
        let err = run_snippet(&sales_df(), "result = 42").unwrap_err();
        assert!(matches!(err, AnalystError::MissingResult));
    }

    #[test]
    fn table_is_unchanged_after_missing_result() {
        let df = sales_df();
        let before = df.clone();
        let _ = run_snippet(&df, "result = df.head(2)");
        assert!(df.frame_equal(&before));
    }

    #[test]
    fn column_results_become_single_column_tables() {
        match run_snippet(&sales_df(), "answer = df[\"region\"].unique()").unwrap() {
            ExecutionResult::Table(df) => assert_eq!(df.width(), 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn scalar_results_pass_through() {
        match run_snippet(&sales_df(), "answer = df[\"revenue\"].sum()").unwrap() {
            ExecutionResult::Scalar(ScalarValue::Float(v)) => assert!((v - 470.0).abs() < 1e-9),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unaggregated_groupby_is_rejected() {
        let err = run_snippet(&sales_df(), "answer = df.groupby(\"region\")").unwrap_err();
        assert!(matches!(err, AnalystError::Execution(_)));
    }

    #[test]
    fn large_table_groupby_yields_bounded_preview() {
        use crate::services::narrator::render_preview;

        let regions: Vec<&str> = (0..100)
            .map(|i| match i % 4 {
                0 => "north",
                1 => "south",
                2 => "east",
                _ => "west",
            })
            .collect();
        let revenue: Vec<i64> = (0..100).collect();
        let df = DataFrame::new(vec![
            Series::new("region", regions),
            Series::new("revenue", revenue),
        ])
        .unwrap();

        let snippet = "answer = df.groupby(\"region\")[\"revenue\"].sum().sort_values(ascending=False).head(5)";
        let result = run_snippet(&df, snippet).unwrap();
        match &result {
            ExecutionResult::Table(out) => assert_eq!(out.height(), 4),
            other => panic!("unexpected result: {:?}", other),
        }
        let preview = render_preview(&result, 20);
        assert!(preview.lines().count() <= 21);
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```python\nanswer = df.head(5)\n```";
        assert_eq!(strip_code_fences(raw), "answer = df.head(5)");
    }

    #[test]
    fn plain_snippets_are_untouched() {
        assert_eq!(strip_code_fences("answer = df.head(5)"), "answer = df.head(5)");
    }
}
