use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use log::info;
use polars::prelude::*;

use crate::errors::AnalystError;

/// Rows scanned by the CSV reader when inferring column types.
const INFER_SCHEMA_ROWS: usize = 100;

/// Load an uploaded file into a table. The encoding is picked from the
/// file extension: `.csv` for delimited text, `.xlsx` for a spreadsheet
/// workbook. Anything malformed surfaces as `AnalystError::Load`.
pub fn load_table(file_name: &str, bytes: &[u8]) -> Result<DataFrame, AnalystError> {
    if bytes.is_empty() {
        return Err(AnalystError::Load("uploaded file is empty".into()));
    }

    let lower = file_name.to_lowercase();
    let df = if lower.ends_with(".csv") {
        parse_csv(bytes)?
    } else if lower.ends_with(".xlsx") {
        parse_xlsx(bytes)?
    } else {
        return Err(AnalystError::Load(format!(
            "unsupported file type: {} (expected .csv or .xlsx)",
            file_name
        )));
    };

    info!(
        "📊 Loaded {}: {} rows, {} columns",
        file_name,
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Parse raw CSV bytes into a `DataFrame` with schema inference.
fn parse_csv(bytes: &[u8]) -> Result<DataFrame, AnalystError> {
    let cursor = Cursor::new(bytes);
    CsvReader::new(cursor)
        .infer_schema(Some(INFER_SCHEMA_ROWS))
        .has_header(true)
        .finish()
        .map_err(|e| AnalystError::Load(format!("failed to parse CSV data: {}", e)))
}

/// Parse an XLSX workbook by rendering the first worksheet to CSV text
/// and running it through the same reader, so both encodings share one
/// type-inference policy.
fn parse_xlsx(bytes: &[u8]) -> Result<DataFrame, AnalystError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| AnalystError::Load(format!("failed to open XLSX workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalystError::Load("workbook contains no worksheets".into()))?
        .map_err(|e| AnalystError::Load(format!("failed to read worksheet: {}", e)))?;

    if range.rows().next().is_none() {
        return Err(AnalystError::Load("worksheet is empty".into()));
    }

    let mut csv_text = String::new();
    for row in range.rows() {
        let rendered: Vec<String> = row.iter().map(render_cell).collect();
        csv_text.push_str(&rendered.join(","));
        csv_text.push('\n');
    }

    parse_csv(csv_text.as_bytes())
}

/// Render one spreadsheet cell as a CSV field, quoting where needed.
fn render_cell(cell: &Data) -> String {
    let raw = match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    };

    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_csv_with_inferred_types() {
        let csv = b"region,revenue\nnorth,100\nsouth,250\n";
        let df = load_table("sales.csv", csv).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names(), &["region", "revenue"]);
        assert!(df.column("revenue").unwrap().dtype().is_numeric());
    }

    #[test]
    fn rejects_empty_upload() {
        let err = load_table("sales.csv", b"").unwrap_err();
        assert!(matches!(err, AnalystError::Load(_)));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = load_table("sales.pdf", b"not a table").unwrap_err();
        assert!(matches!(err, AnalystError::Load(_)));
    }

    #[test]
    fn rejects_malformed_xlsx_bytes() {
        let err = load_table("sales.xlsx", b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, AnalystError::Load(_)));
    }

    #[test]
    fn quotes_cells_containing_delimiters() {
        let cell = Data::String("acme, inc".into());
        assert_eq!(render_cell(&cell), "\"acme, inc\"");
        let cell = Data::String("say \"hi\"".into());
        assert_eq!(render_cell(&cell), "\"say \"\"hi\"\"\"");
    }
}
