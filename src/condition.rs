//! Split conditions (C7) — the closed taxonomy a tree node's split can
//! belong to (spec §4.5), grounded on the `try_categorical*`/
//! `try_discrete*`/`try_same_units*`/`try_time_stamps_diff` family in
//! `original_source/.../relboost/decisiontrees/DecisionTreeNode.hpp`: one
//! tagged-union variant per `try_*` method rather than a subclass per
//! condition kind.

use serde::{Deserialize, Serialize};

/// Which side of the join a condition's column lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The peripheral (input) table being matched in.
    Input,
    /// The population (output) table the match's row belongs to.
    Output,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// `column == any of codes` (categorical equality/set membership).
    CategoricalIn { side: Side, column: String, codes: Vec<i32> },
    /// `column > threshold` (numerical threshold via the quantile grid).
    NumericalGreater { side: Side, column: String, threshold: f64 },
    /// `input.column == output.column`, same categorical dictionary.
    SameUnitsCategoricalEquals { input_column: String, output_column: String },
    /// `|input.column - output.column| > threshold`.
    SameUnitsNumericalDiffGreater { input_column: String, output_column: String, threshold: f64 },
    /// `output.ts - input.ts > threshold`.
    TimestampDiffGreater { input_ts_column: String, output_ts_column: String, threshold: f64 },
    /// Text-token presence via the inverted index built by the text
    /// splitter (C10).
    TextTokenPresent { column: String, token: String },
}

impl Condition {
    /// A deterministic total order over conditions, used to break ties
    /// between candidate splits with identical gain (spec §4.5: "ties
    /// broken by a deterministic, reproducible order" — lexicographic over
    /// the condition's textual description).
    pub fn tie_break_key(&self) -> String {
        match self {
            Condition::CategoricalIn { side, column, codes } => {
                format!("0:{side:?}:{column}:{codes:?}")
            }
            Condition::NumericalGreater { side, column, threshold } => {
                format!("1:{side:?}:{column}:{threshold}")
            }
            Condition::SameUnitsCategoricalEquals { input_column, output_column } => {
                format!("2:{input_column}:{output_column}")
            }
            Condition::SameUnitsNumericalDiffGreater { input_column, output_column, threshold } => {
                format!("3:{input_column}:{output_column}:{threshold}")
            }
            Condition::TimestampDiffGreater { input_ts_column, output_ts_column, threshold } => {
                format!("4:{input_ts_column}:{output_ts_column}:{threshold}")
            }
            Condition::TextTokenPresent { column, token } => {
                format!("5:{column}:{token}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_break_key_is_stable_and_distinct_across_variants() {
        let a = Condition::NumericalGreater { side: Side::Input, column: "x".into(), threshold: 1.0 };
        let b = Condition::NumericalGreater { side: Side::Input, column: "x".into(), threshold: 2.0 };
        assert_ne!(a.tie_break_key(), b.tie_break_key());
        assert_eq!(a.tie_break_key(), a.tie_break_key());
    }
}
