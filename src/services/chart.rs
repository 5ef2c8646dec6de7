use polars::prelude::*;

use crate::models::response::ChartSpec;

/// Pick at most one default chart for a table. Deterministic and total:
/// the same table always yields the same choice, ties are broken by
/// column declaration order.
///
/// Priority: two numeric columns → scatter; one numeric column →
/// histogram; any non-numeric column → bar of its value counts;
/// otherwise no chart.
pub fn choose_chart(df: &DataFrame) -> Option<ChartSpec> {
    let mut numeric = Vec::new();
    let mut other = Vec::new();

    for s in df.get_columns() {
        if s.dtype().is_numeric() {
            numeric.push(s.name().to_string());
        } else {
            other.push(s.name().to_string());
        }
    }

    if numeric.len() >= 2 {
        let (x, y) = (numeric[0].clone(), numeric[1].clone());
        return Some(ChartSpec::Scatter {
            title: format!("{} vs {}", x, y),
            x,
            y,
        });
    }

    if numeric.len() == 1 {
        let column = numeric[0].clone();
        return Some(ChartSpec::Histogram {
            title: format!("Distribution of {}", column),
            column,
        });
    }

    if let Some(category) = other.into_iter().next() {
        return Some(ChartSpec::Bar {
            title: format!("Category counts: {}", category),
            category,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_numeric_columns_yield_scatter_in_declaration_order() {
        let df = DataFrame::new(vec![
            Series::new("label", &["a", "b"]),
            Series::new("price", &[1.0, 2.0]),
            Series::new("qty", &[3i64, 4]),
        ])
        .unwrap();
        assert_eq!(
            choose_chart(&df),
            Some(ChartSpec::Scatter {
                x: "price".into(),
                y: "qty".into(),
                title: "price vs qty".into(),
            })
        );
    }

    #[test]
    fn single_numeric_column_yields_histogram() {
        let df = DataFrame::new(vec![
            Series::new("label", &["a", "b"]),
            Series::new("price", &[1.0, 2.0]),
        ])
        .unwrap();
        assert_eq!(
            choose_chart(&df),
            Some(ChartSpec::Histogram {
                column: "price".into(),
                title: "Distribution of price".into(),
            })
        );
    }

    #[test]
    fn categorical_only_table_yields_bar_of_first_column() {
        let df = DataFrame::new(vec![
            Series::new("region", &["n", "s"]),
            Series::new("channel", &["web", "store"]),
        ])
        .unwrap();
        assert_eq!(
            choose_chart(&df),
            Some(ChartSpec::Bar {
                category: "region".into(),
                title: "Category counts: region".into(),
            })
        );
    }

    #[test]
    fn empty_table_yields_no_chart() {
        let df = DataFrame::default();
        assert_eq!(choose_chart(&df), None);
    }

    #[test]
    fn choice_is_deterministic() {
        let df = DataFrame::new(vec![
            Series::new("a", &[1.0, 2.0]),
            Series::new("b", &[3.0, 4.0]),
        ])
        .unwrap();
        assert_eq!(choose_chart(&df), choose_chart(&df));
    }
}
