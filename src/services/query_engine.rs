//! Evaluation of parsed query snippets against the loaded table.
//!
//! Statements run against a scope that starts with the table bound under
//! a fixed name; every operation builds a new value, so the table itself
//! is never mutated. Polars lazy expressions carry the filter, group-by
//! and sort work, the same way the rest of the service computes stats.

use std::collections::HashMap;
use std::fmt;

use polars::prelude::*;

use crate::errors::AnalystError;
use crate::services::query_parser::{Arg, CmpOp, Expr as Ast, Index, Literal, Stmt};

/// A scalar produced by reducing a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Str(v) => write!(f, "{}", v),
            ScalarValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl ScalarValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::Int(v) => serde_json::json!(v),
            ScalarValue::Float(v) => serde_json::json!(v),
            ScalarValue::Str(v) => serde_json::json!(v),
            ScalarValue::Bool(v) => serde_json::json!(v),
        }
    }
}

/// Intermediate value of a snippet expression.
#[derive(Debug, Clone)]
pub enum Value {
    /// A table. `sort_hint` remembers which column an aggregation
    /// produced, so a bare `sort_values()` knows what to sort by.
    Frame {
        df: DataFrame,
        sort_hint: Option<String>,
    },
    /// A table with pending group keys, waiting for an aggregation.
    Grouped { df: DataFrame, keys: Vec<String> },
    /// A single column selected out of a grouping.
    GroupedColumn {
        df: DataFrame,
        keys: Vec<String>,
        column: String,
    },
    Column(Series),
    Scalar(ScalarValue),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Frame { .. } => "table",
            Value::Grouped { .. } | Value::GroupedColumn { .. } => "grouping",
            Value::Column(_) => "column",
            Value::Scalar(_) => "scalar",
        }
    }
}

fn exec_err(msg: impl Into<String>) -> AnalystError {
    AnalystError::Execution(msg.into())
}

fn polars_err(e: PolarsError) -> AnalystError {
    AnalystError::Execution(e.to_string())
}

/// Runs parsed statements against a read-only table.
pub struct Interpreter {
    scope: HashMap<String, Value>,
}

impl Interpreter {
    /// The table is cloned into the scope under `table_name`; polars
    /// frames share column storage, so this does not copy the data.
    pub fn new(table: &DataFrame, table_name: &str) -> Self {
        let mut scope = HashMap::new();
        scope.insert(
            table_name.to_string(),
            Value::Frame {
                df: table.clone(),
                sort_hint: None,
            },
        );
        Self { scope }
    }

    /// Execute statements in order, binding assignment targets into the
    /// scope. Bare expressions are evaluated and discarded.
    pub fn run(&mut self, stmts: &[Stmt]) -> Result<(), AnalystError> {
        for stmt in stmts {
            let value = self.eval(&stmt.expr)?;
            if let Some(target) = &stmt.target {
                self.scope.insert(target.clone(), value);
            }
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scope.get(name)
    }

    fn eval(&self, expr: &Ast) -> Result<Value, AnalystError> {
        match expr {
            Ast::Ref(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| exec_err(format!("unknown name `{}`", name))),
            Ast::Lit(lit) => Ok(Value::Scalar(literal_scalar(lit))),
            Ast::Index { on, index } => {
                let on = self.eval(on)?;
                self.eval_index(on, index)
            }
            Ast::Call { on, method, args } => {
                let on = self.eval(on)?;
                self.eval_call(on, method, args)
            }
        }
    }

    fn eval_index(&self, on: Value, index: &Index) -> Result<Value, AnalystError> {
        match (on, index) {
            (Value::Frame { df, .. }, Index::Column(name)) => {
                let series = df.column(name).map_err(polars_err)?.clone();
                Ok(Value::Column(series))
            }
            (Value::Frame { df, .. }, Index::Columns(names)) => {
                let selected = df
                    .select(names.iter().map(|s| s.as_str()).collect::<Vec<_>>())
                    .map_err(polars_err)?;
                Ok(Value::Frame {
                    df: selected,
                    sort_hint: None,
                })
            }
            (Value::Frame { df, .. }, Index::Mask { column, op, value }) => {
                let filtered = df
                    .lazy()
                    .filter(comparison(column, *op, value))
                    .collect()
                    .map_err(polars_err)?;
                Ok(Value::Frame {
                    df: filtered,
                    sort_hint: None,
                })
            }
            (Value::Grouped { df, keys }, Index::Column(name)) => {
                if !df.get_column_names().contains(&name.as_str()) {
                    return Err(exec_err(format!("column `{}` not found", name)));
                }
                Ok(Value::GroupedColumn {
                    df,
                    keys,
                    column: name.clone(),
                })
            }
            (other, _) => Err(exec_err(format!(
                "cannot index into a {} value",
                other.kind()
            ))),
        }
    }

    fn eval_call(&self, on: Value, method: &str, args: &[Arg]) -> Result<Value, AnalystError> {
        match on {
            Value::Frame { df, sort_hint } => self.call_frame(df, sort_hint, method, args),
            Value::Grouped { df, keys } => self.call_grouped(df, keys, method, args),
            Value::GroupedColumn { df, keys, column } => {
                self.call_grouped_column(df, keys, &column, method, args)
            }
            Value::Column(series) => self.call_column(series, method, args),
            Value::Scalar(_) => Err(exec_err(format!(
                "cannot call `{}()` on a scalar value",
                method
            ))),
        }
    }

    fn call_frame(
        &self,
        df: DataFrame,
        sort_hint: Option<String>,
        method: &str,
        args: &[Arg],
    ) -> Result<Value, AnalystError> {
        match method {
            "groupby" | "group_by" => {
                let keys = key_columns(args)?;
                for key in &keys {
                    if !df.get_column_names().contains(&key.as_str()) {
                        return Err(exec_err(format!("column `{}` not found", key)));
                    }
                }
                Ok(Value::Grouped { df, keys })
            }
            "sort_values" => {
                let by = match (positional_str(args), kw_str(args, "by")) {
                    (Some(by), _) | (None, Some(by)) => by,
                    (None, None) => sort_hint.clone().ok_or_else(|| {
                        exec_err("sort_values() needs a column name, e.g. sort_values(\"price\")")
                    })?,
                };
                let ascending = kw_bool(args, "ascending").unwrap_or(true);
                let sorted = df
                    .sort([by.as_str()], vec![!ascending], false)
                    .map_err(polars_err)?;
                Ok(Value::Frame {
                    df: sorted,
                    sort_hint,
                })
            }
            "head" => {
                let n = positional_int(args).unwrap_or(5).max(0) as usize;
                Ok(Value::Frame {
                    df: df.head(Some(n)),
                    sort_hint,
                })
            }
            "tail" => {
                let n = positional_int(args).unwrap_or(5).max(0) as usize;
                Ok(Value::Frame {
                    df: df.tail(Some(n)),
                    sort_hint,
                })
            }
            "nlargest" | "nsmallest" => {
                let n = positional_int(args)
                    .ok_or_else(|| exec_err(format!("{}() needs a row count", method)))?
                    .max(0) as usize;
                let by = positional_str(args)
                    .ok_or_else(|| exec_err(format!("{}() needs a column name", method)))?;
                let descending = method == "nlargest";
                let sorted = df
                    .sort([by.as_str()], vec![descending], false)
                    .map_err(polars_err)?;
                Ok(Value::Frame {
                    df: sorted.head(Some(n)),
                    sort_hint: Some(by),
                })
            }
            "sum" | "mean" | "median" | "min" | "max" | "count" | "nunique" => Err(exec_err(
                format!(
                    "call `{}()` on a single column, e.g. df[\"col\"].{}()",
                    method, method
                ),
            )),
            other => Err(exec_err(format!("unsupported table method `{}()`", other))),
        }
    }

    fn call_grouped(
        &self,
        df: DataFrame,
        keys: Vec<String>,
        method: &str,
        _args: &[Arg],
    ) -> Result<Value, AnalystError> {
        match method {
            // group sizes; pandas spells this either way
            "count" | "size" => {
                let key_exprs: Vec<polars::prelude::Expr> =
                    keys.iter().map(|k| col(k)).collect();
                let counted = df
                    .lazy()
                    .group_by(key_exprs)
                    .agg([col(&keys[0]).count().alias("count")])
                    .collect()
                    .map_err(polars_err)?;
                Ok(Value::Frame {
                    df: counted,
                    sort_hint: Some("count".to_string()),
                })
            }
            other => Err(exec_err(format!(
                "select a column before aggregating, e.g. df.groupby(...)[\"col\"].{}()",
                other
            ))),
        }
    }

    fn call_grouped_column(
        &self,
        df: DataFrame,
        keys: Vec<String>,
        column: &str,
        method: &str,
        _args: &[Arg],
    ) -> Result<Value, AnalystError> {
        let agg = match method {
            "sum" => col(column).sum(),
            "mean" => col(column).mean(),
            "median" => col(column).median(),
            "min" => col(column).min(),
            "max" => col(column).max(),
            "count" => col(column).count(),
            "nunique" => col(column).n_unique(),
            other => {
                return Err(exec_err(format!(
                    "unsupported aggregation `{}()` after groupby",
                    other
                )))
            }
        };
        let key_exprs: Vec<polars::prelude::Expr> = keys.iter().map(|k| col(k)).collect();
        let aggregated = df
            .lazy()
            .group_by(key_exprs)
            .agg([agg.alias(column)])
            .collect()
            .map_err(polars_err)?;
        Ok(Value::Frame {
            df: aggregated,
            sort_hint: Some(column.to_string()),
        })
    }

    fn call_column(
        &self,
        series: Series,
        method: &str,
        args: &[Arg],
    ) -> Result<Value, AnalystError> {
        match method {
            "sum" => numeric_reduce(&series, method, |ca| ca.sum()),
            "mean" => numeric_reduce(&series, method, |ca| ca.mean()),
            "median" => numeric_reduce(&series, method, |ca| ca.median()),
            "min" => numeric_reduce(&series, method, |ca| ca.min()),
            "max" => numeric_reduce(&series, method, |ca| ca.max()),
            "count" => Ok(Value::Scalar(ScalarValue::Int(
                (series.len() - series.null_count()) as i64,
            ))),
            "nunique" => {
                let n = series.n_unique().map_err(polars_err)?;
                Ok(Value::Scalar(ScalarValue::Int(n as i64)))
            }
            "unique" => {
                let unique = series.unique().map_err(polars_err)?;
                Ok(Value::Column(unique))
            }
            "value_counts" => {
                let counts = series.value_counts(true, false).map_err(polars_err)?;
                Ok(Value::Frame {
                    df: counts,
                    sort_hint: Some("counts".to_string()),
                })
            }
            "sort_values" => {
                let ascending = kw_bool(args, "ascending").unwrap_or(true);
                Ok(Value::Column(series.sort(!ascending)))
            }
            "head" => {
                let n = positional_int(args).unwrap_or(5).max(0) as usize;
                Ok(Value::Column(series.head(Some(n))))
            }
            "tail" => {
                let n = positional_int(args).unwrap_or(5).max(0) as usize;
                Ok(Value::Column(series.tail(Some(n))))
            }
            other => Err(exec_err(format!("unsupported column method `{}()`", other))),
        }
    }
}

fn literal_scalar(lit: &Literal) -> ScalarValue {
    match lit {
        Literal::Str(s) => ScalarValue::Str(s.clone()),
        Literal::Int(i) => ScalarValue::Int(*i),
        Literal::Float(v) => ScalarValue::Float(*v),
        Literal::Bool(b) => ScalarValue::Bool(*b),
    }
}

fn literal_expr(value: &Literal) -> polars::prelude::Expr {
    match value {
        Literal::Str(s) => lit(s.clone()),
        Literal::Int(i) => lit(*i),
        Literal::Float(v) => lit(*v),
        Literal::Bool(b) => lit(*b),
    }
}

fn comparison(column: &str, op: CmpOp, value: &Literal) -> polars::prelude::Expr {
    let rhs = literal_expr(value);
    match op {
        CmpOp::Eq => col(column).eq(rhs),
        CmpOp::Neq => col(column).neq(rhs),
        CmpOp::Gt => col(column).gt(rhs),
        CmpOp::Lt => col(column).lt(rhs),
        CmpOp::Ge => col(column).gt_eq(rhs),
        CmpOp::Le => col(column).lt_eq(rhs),
    }
}

/// Reduce a numeric column to one float via the Float64 chunked array.
fn numeric_reduce(
    series: &Series,
    method: &str,
    f: impl Fn(&Float64Chunked) -> Option<f64>,
) -> Result<Value, AnalystError> {
    if !series.dtype().is_numeric() {
        return Err(exec_err(format!(
            "`{}()` is only supported on numeric columns (`{}` is {})",
            method,
            series.name(),
            series.dtype()
        )));
    }
    let cast = series.cast(&DataType::Float64).map_err(polars_err)?;
    let ca = cast.f64().map_err(polars_err)?;
    match f(ca) {
        Some(v) => Ok(Value::Scalar(ScalarValue::Float(v))),
        None => Err(exec_err(format!(
            "`{}()` produced no value (column `{}` has no data)",
            method,
            series.name()
        ))),
    }
}

/// Group-by keys from either `groupby("a")` or `groupby(["a", "b"])`.
fn key_columns(args: &[Arg]) -> Result<Vec<String>, AnalystError> {
    let mut keys = Vec::new();
    for arg in args {
        match arg {
            Arg::Pos(Literal::Str(s)) => keys.push(s.clone()),
            Arg::PosList(list) => keys.extend(list.iter().cloned()),
            other => {
                return Err(exec_err(format!(
                    "groupby() takes column names, found {:?}",
                    other
                )))
            }
        }
    }
    if keys.is_empty() {
        return Err(exec_err("groupby() needs at least one column name"));
    }
    Ok(keys)
}

fn positional_str(args: &[Arg]) -> Option<String> {
    args.iter().find_map(|a| match a {
        Arg::Pos(Literal::Str(s)) => Some(s.clone()),
        _ => None,
    })
}

fn positional_int(args: &[Arg]) -> Option<i64> {
    args.iter().find_map(|a| match a {
        Arg::Pos(Literal::Int(i)) => Some(*i),
        Arg::Kw(name, Literal::Int(i)) if name == "n" => Some(*i),
        _ => None,
    })
}

fn kw_str(args: &[Arg], name: &str) -> Option<String> {
    args.iter().find_map(|a| match a {
        Arg::Kw(key, Literal::Str(s)) if key == name => Some(s.clone()),
        _ => None,
    })
}

fn kw_bool(args: &[Arg], name: &str) -> Option<bool> {
    args.iter().find_map(|a| match a {
        Arg::Kw(key, Literal::Bool(b)) if key == name => Some(*b),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::query_parser::parse;

    fn sales_df() -> DataFrame {
        DataFrame::new(vec![
            Series::new("region", &["north", "south", "north", "east", "south"]),
            Series::new("revenue", &[100i64, 250, 40, 80, 10]),
        ])
        .unwrap()
    }

    fn run(df: &DataFrame, snippet: &str) -> Interpreter {
        let stmts = parse(snippet).unwrap();
        let mut interp = Interpreter::new(df, "df");
        interp.run(&stmts).unwrap();
        interp
    }

    #[test]
    fn groupby_sum_sorts_by_aggregate_without_explicit_column() {
        let df = sales_df();
        let interp = run(
            &df,
            "answer = df.groupby(\"region\")[\"revenue\"].sum().sort_values(ascending=False).head(2)",
        );
        match interp.lookup("answer").unwrap() {
            Value::Frame { df: out, .. } => {
                assert_eq!(out.height(), 2);
                assert_eq!(out.get_column_names(), &["region", "revenue"]);
                let revenue = out.column("revenue").unwrap().i64().unwrap();
                assert_eq!(revenue.get(0), Some(260)); // south
                assert_eq!(revenue.get(1), Some(140)); // north
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn filter_then_select_columns() {
        let df = sales_df();
        let interp = run(&df, "answer = df[df[\"revenue\"] > 50][[\"region\"]]");
        match interp.lookup("answer").unwrap() {
            Value::Frame { df: out, .. } => {
                assert_eq!(out.shape(), (3, 1));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn string_equality_filter() {
        let df = sales_df();
        let interp = run(&df, "answer = df[df[\"region\"] == \"north\"]");
        match interp.lookup("answer").unwrap() {
            Value::Frame { df: out, .. } => assert_eq!(out.height(), 2),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn column_mean_is_a_scalar() {
        let df = sales_df();
        let interp = run(&df, "answer = df[\"revenue\"].mean()");
        match interp.lookup("answer").unwrap() {
            Value::Scalar(ScalarValue::Float(v)) => assert!((v - 96.0).abs() < 1e-9),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn value_counts_produces_a_table() {
        let df = sales_df();
        let interp = run(&df, "answer = df[\"region\"].value_counts()");
        match interp.lookup("answer").unwrap() {
            Value::Frame { df: out, .. } => {
                assert_eq!(out.height(), 3);
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn variables_carry_between_statements() {
        let df = sales_df();
        let interp = run(&df, "big = df[df[\"revenue\"] >= 100]\nanswer = big[\"revenue\"].sum()");
        match interp.lookup("answer").unwrap() {
            Value::Scalar(ScalarValue::Float(v)) => assert!((v - 350.0).abs() < 1e-9),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn nlargest_sorts_and_limits() {
        let df = sales_df();
        let interp = run(&df, "answer = df.nlargest(2, \"revenue\")");
        match interp.lookup("answer").unwrap() {
            Value::Frame { df: out, .. } => {
                let revenue = out.column("revenue").unwrap().i64().unwrap();
                assert_eq!(revenue.get(0), Some(250));
                assert_eq!(revenue.get(1), Some(100));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn unknown_column_is_reported() {
        let df = sales_df();
        let stmts = parse("answer = df[\"profit\"].sum()").unwrap();
        let mut interp = Interpreter::new(&df, "df");
        let err = interp.run(&stmts).unwrap_err();
        assert!(matches!(err, AnalystError::Execution(_)));
    }

    #[test]
    fn unknown_method_is_reported() {
        let df = sales_df();
        let stmts = parse("answer = df.pivot(\"region\")").unwrap();
        let mut interp = Interpreter::new(&df, "df");
        let err = interp.run(&stmts).unwrap_err();
        assert!(err.to_string().contains("unsupported table method"));
    }

    #[test]
    fn mean_on_string_column_is_reported() {
        let df = sales_df();
        let stmts = parse("answer = df[\"region\"].mean()").unwrap();
        let mut interp = Interpreter::new(&df, "df");
        let err = interp.run(&stmts).unwrap_err();
        assert!(err.to_string().contains("numeric"));
    }

    #[test]
    fn source_table_is_not_mutated() {
        let df = sales_df();
        let before = df.clone();
        let _ = run(
            &df,
            "answer = df.groupby(\"region\")[\"revenue\"].sum().sort_values(ascending=False)",
        );
        assert!(df.frame_equal(&before));
    }
}
