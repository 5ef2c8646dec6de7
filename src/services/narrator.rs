//! Preview rendering and prompt construction for the generative calls.
//!
//! The preview is the only view of an execution result the narration
//! prompt ever sees: at most `max_rows` rows of delimited text, or the
//! literal scalar value.

use polars::prelude::*;

use crate::models::profile::Profile;
use crate::services::sandbox::{ExecutionResult, RESULT_NAME, TABLE_NAME};

/// Render an execution result as bounded delimited text.
pub fn render_preview(result: &ExecutionResult, max_rows: usize) -> String {
    match result {
        ExecutionResult::Scalar(value) => value.to_string(),
        ExecutionResult::Table(df) => {
            let head = df.head(Some(max_rows));
            let mut lines = Vec::with_capacity(head.height() + 1);
            lines.push(
                head.get_column_names()
                    .iter()
                    .map(|name| quote_field(name))
                    .collect::<Vec<_>>()
                    .join(","),
            );

            let rendered: Vec<Series> = head
                .get_columns()
                .iter()
                .map(|s| {
                    s.cast(&DataType::Utf8)
                        .unwrap_or_else(|_| Series::full_null(s.name(), head.height(), &DataType::Utf8))
                })
                .collect();

            for i in 0..head.height() {
                let row: Vec<String> = rendered
                    .iter()
                    .map(|s| {
                        s.utf8()
                            .ok()
                            .and_then(|ca| ca.get(i))
                            .map(quote_field)
                            .unwrap_or_default()
                    })
                    .collect();
                lines.push(row.join(","));
            }
            lines.join("\n")
        }
    }
}

fn quote_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Prompt asking the model to translate a business question into a
/// query snippet conforming to the sandbox grammar.
pub fn build_snippet_prompt(question: &str, profile: &Profile) -> String {
    let schema = profile
        .columns
        .iter()
        .map(|name| {
            let dtype = profile
                .dtypes
                .get(name)
                .map(String::as_str)
                .unwrap_or("unknown");
            format!("- {} ({})", name, dtype)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Convert the user's business question into a short query snippet that runs
against a table named `{table}`. Return only the snippet, no backticks, no prose.

Rules:
- `{table}` is already defined (the uploaded dataset)
- Allowed operations, and nothing else:
  column selection {table}["col"] or {table}[["a", "b"]]
  row filters {table}[{table}["col"] > value] with ==, >, <, >=, <=
  .groupby("col") followed by a column selection and one of
  .sum() .mean() .median() .min() .max() .count() .nunique()
  .sort_values("col", ascending=True/False) .head(n) .tail(n)
  .nlargest(n, "col") .nsmallest(n, "col") .value_counts() .unique()
- No imports, file access, plotting, or network calls
- End by assigning the final result to a variable named: {result}
- If the question is ambiguous, make a reasonable assumption and proceed
- If the user asks for top/bottom items without a metric, prefer the first numeric column

User question: {question}

Table columns:
{schema}

The table has {rows} rows."#,
        table = TABLE_NAME,
        result = RESULT_NAME,
        question = question,
        schema = schema,
        rows = profile.row_count,
    )
}

/// Prompt asking the model to phrase a result preview as a
/// business-facing answer.
pub fn build_summary_prompt(question: &str, preview: &str) -> String {
    format!(
        r#"You are a BI analyst speaking to business stakeholders.
Question: {question}

RESULT (CSV or text preview):
{preview}

Write:
- A plain-English, decision-ready answer in 3-6 sentences
- Include exact numbers and time frames where possible
- End with 2 short recommended actions"#,
        question = question,
        preview = preview,
    )
}

/// Prompt asking the model for an executive briefing over the profile.
pub fn build_insights_prompt(profile: &Profile) -> String {
    let profile_json =
        serde_json::to_string(profile).unwrap_or_else(|_| profile.summary_text.clone());

    format!(
        r#"You are a senior business analyst writing for executives (no technical jargon).
Use the dataset summary to produce crisp, decision-focused output.

DATASET SUMMARY (JSON):
{profile_json}

Write:

### Executive Summary
- 3-4 sentences on size, coverage, and what the data enables

### Key Findings (5 bullets)
- Plain language, each bullet starts with a bold headline and a concrete metric or trend

### Risks & Data Quality
- Brief list of gaps, missing data, or caveats, with business impact

Keep it concise and professional."#,
        profile_json = profile_json,
    )
}
