//! SQL transpilation (`Pipeline.to_sql`, `Pipeline.deploy`) — turns one
//! fitted feature (an aggregation over a join, guarded by a split
//! condition) into a `CREATE TABLE ... AS SELECT` statement a target
//! database can run without this crate present.
//!
//! Grounded on `original_source/.../fastprop/SQLMaker.cpp` (per-feature
//! column/condition naming) and `.../io/StatementMaker.cpp` (per-dialect
//! identifier quoting and row-limiting syntax); no teacher counterpart.

use crate::aggregation::AggregationKind;
use crate::condition::{Condition, Side};

/// How a dialect spells "only return the first N rows", since it isn't a
/// single standard clause.
pub enum RowLimit {
    /// Appended after `ORDER BY`: `LIMIT n`.
    Limit(usize),
    /// Inserted right after `SELECT`: `SELECT TOP n`.
    Top(usize),
}

/// A target SQL dialect: everything `sql_deploy` needs to vary per engine.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;
    fn quote_ident(&self, ident: &str) -> String;
    fn row_limit(&self, n: usize) -> RowLimit;
}

macro_rules! quoted_dialect {
    ($name:ident, $display:literal, $open:literal, $close:literal) => {
        pub struct $name;
        impl Dialect for $name {
            fn name(&self) -> &'static str {
                $display
            }
            fn quote_ident(&self, ident: &str) -> String {
                format!("{}{}{}", $open, ident, $close)
            }
            fn row_limit(&self, n: usize) -> RowLimit {
                RowLimit::Limit(n)
            }
        }
    };
}

quoted_dialect!(Sqlite, "sqlite", '"', '"');
quoted_dialect!(Postgres, "postgres", '"', '"');
quoted_dialect!(MySql, "mysql", '`', '`');
quoted_dialect!(SapHana, "hana", '"', '"');

/// Generic ODBC fallback: ANSI identifier quoting, but `SELECT TOP n`
/// instead of a trailing `LIMIT` (the common denominator for ODBC targets
/// without a dialect-specific impl, e.g. SQL Server).
pub struct Odbc;
impl Dialect for Odbc {
    fn name(&self) -> &'static str {
        "odbc"
    }
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }
    fn row_limit(&self, n: usize) -> RowLimit {
        RowLimit::Top(n)
    }
}

/// One aggregated, joined feature to materialize as a table.
pub struct FeatureQuery<'a> {
    pub feature_name: &'a str,
    pub population_table: &'a str,
    pub peripheral_table: &'a str,
    pub join_left: &'a str,
    pub join_right: &'a str,
    pub condition: Option<&'a Condition>,
    pub aggregation: AggregationKind,
    pub value_column: &'a str,
}

fn side_alias(side: Side) -> &'static str {
    match side {
        Side::Output => "t1",
        Side::Input => "t2",
    }
}

/// Renders the aggregation kernel as a SQL aggregate expression. Kernels
/// with no direct SQL equivalent (the `Ewma`/`TimeSince*`/`Trend`/`Skew`
/// family, which need ordered-window arithmetic) fall back to `SUM`,
/// flagged with a comment — `sql_deploy` trades full fidelity for these
/// for a statement that at least runs.
fn aggregation_expr(dialect: &dyn Dialect, kind: AggregationKind, value_col: &str) -> String {
    use AggregationKind::*;
    match kind {
        Sum => format!("SUM({value_col})"),
        Count => "COUNT(*)".to_string(),
        Avg => format!("AVG({value_col})"),
        Max | NumMax => format!("MAX({value_col})"),
        Min | NumMin => format!("MIN({value_col})"),
        Stddev => format!("STDDEV({value_col})"),
        Var => format!("VARIANCE({value_col})"),
        CountDistinct => format!("COUNT(DISTINCT {value_col})"),
        First | Last | Mode | Median | Quantile(_) | Kurtosis | Skew | Trend | AvgTimeBetween
        | CountAboveMean | CountBelowMean | CountMinusCountDistinct | CountDistinctOverCount
        | Ewma(_) | TimeSinceFirstMaximum | TimeSinceFirstMinimum | TimeSinceLastMaximum
        | TimeSinceLastMinimum | VariationCoefficient => {
            let _ = dialect;
            format!("SUM({value_col}) /* {kind:?} has no direct SQL equivalent */")
        }
    }
}

fn condition_sql(dialect: &dyn Dialect, condition: &Condition) -> String {
    match condition {
        Condition::CategoricalIn { side, column, codes } => {
            let alias = side_alias(*side);
            let col = dialect.quote_ident(column);
            let list = codes.iter().map(i32::to_string).collect::<Vec<_>>().join(", ");
            format!("{alias}.{col} IN ({list})")
        }
        Condition::NumericalGreater { side, column, threshold } => {
            let alias = side_alias(*side);
            let col = dialect.quote_ident(column);
            format!("{alias}.{col} > {threshold}")
        }
        Condition::SameUnitsCategoricalEquals { input_column, output_column } => {
            format!("t2.{} = t1.{}", dialect.quote_ident(input_column), dialect.quote_ident(output_column))
        }
        Condition::SameUnitsNumericalDiffGreater { input_column, output_column, threshold } => {
            format!(
                "ABS(t2.{} - t1.{}) > {threshold}",
                dialect.quote_ident(input_column),
                dialect.quote_ident(output_column)
            )
        }
        Condition::TimestampDiffGreater { input_ts_column, output_ts_column, threshold } => {
            format!(
                "t1.{} - t2.{} > {threshold}",
                dialect.quote_ident(output_ts_column),
                dialect.quote_ident(input_ts_column)
            )
        }
        Condition::TextTokenPresent { column, token } => {
            format!("t2.{} LIKE '%{token}%'", dialect.quote_ident(column))
        }
    }
}

impl<'a> FeatureQuery<'a> {
    /// Renders `CREATE TABLE <feature> AS SELECT ... FROM population LEFT
    /// JOIN peripheral ON key [AND condition] GROUP BY key`.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let feature_table = dialect.quote_ident(self.feature_name);
        let population = dialect.quote_ident(self.population_table);
        let peripheral = dialect.quote_ident(self.peripheral_table);
        let join_left = dialect.quote_ident(self.join_left);
        let join_right = dialect.quote_ident(self.join_right);
        let value_col = format!("t2.{}", dialect.quote_ident(self.value_column));
        let agg_expr = aggregation_expr(dialect, self.aggregation, &value_col);
        let feature_col = dialect.quote_ident(self.feature_name);

        let mut on_clause = format!("t1.{join_left} = t2.{join_right}");
        if let Some(condition) = self.condition {
            on_clause.push_str(" AND ");
            on_clause.push_str(&condition_sql(dialect, condition));
        }

        format!(
            "CREATE TABLE {feature_table} AS\nSELECT t1.{join_left}, {agg_expr} AS {feature_col}\nFROM {population} AS t1\nLEFT JOIN {peripheral} AS t2 ON {on_clause}\nGROUP BY t1.{join_left}"
        )
    }
}
