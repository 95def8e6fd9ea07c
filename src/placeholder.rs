//! Placeholder (`Ph`) — the declarative schema of a relational data model.
//!
//! A tree of tables joined by key and (optionally) time window; self-joins
//! are permitted via aliasing the same underlying table name under a
//! different `Placeholder` node (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipTag {
    ManyToMany,
    OneToOne,
    /// Marks this edge's child table as a subfeature source: C11/C9 fit a
    /// sub-ensemble over it rather than matching its rows directly into
    /// the parent's aggregation kernel.
    Propositionalization,
}

/// One outgoing join from a `Placeholder` to a child table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub left_key_col: String,
    pub right_key_col: String,
    pub left_ts_col: Option<String>,
    pub right_ts_col: Option<String>,
    pub right_upper_ts_col: Option<String>,
    /// Shifts the right-hand timestamp forward before matching (`ts +
    /// horizon`), modeling a minimum lead time before a peripheral event
    /// becomes visible to the population row.
    pub horizon: f64,
    /// How far back in time a peripheral row remains visible; used to
    /// synthesize `upper_ts` when `right_upper_ts_col` is absent.
    pub memory: Option<f64>,
    pub relationship: RelationshipTag,
    /// Whether targets from the population table may flow into this join's
    /// matches (disabled by default to prevent label leakage through a
    /// self-join back to the population table).
    pub allow_lagged_targets: bool,
    pub child: Box<Placeholder>,
}

/// One node of the relational schema tree: a table name, its optional
/// target columns, and its outgoing joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placeholder {
    pub table_name: String,
    /// Alias distinguishing this occurrence of `table_name` from others in
    /// the tree (needed for self-joins).
    pub alias: Option<String>,
    pub targets: Vec<String>,
    pub edges: Vec<Edge>,
}

impl Placeholder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Placeholder { table_name: table_name.into(), alias: None, targets: Vec::new(), edges: Vec::new() }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn join(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Name used to identify this node uniquely within the tree: the alias
    /// if set, otherwise the table name.
    pub fn node_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }

    /// Depth-first count of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.edges.iter().map(|e| e.child.node_count()).sum::<usize>()
    }

    /// All edges tagged `Propositionalization`, used by C9/C11 to know
    /// which joined tables need a sub-ensemble fit for subfeatures.
    pub fn propositionalization_edges(&self) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.relationship == RelationshipTag::Propositionalization).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_two_level_snowflake_schema() {
        // Mirrors the §8 seed test: population -> peripheral1 -> peripheral2.
        let peripheral2 = Placeholder::new("peripheral2");
        let peripheral1 = Placeholder::new("peripheral1").join(Edge {
            left_key_col: "join_key2".into(),
            right_key_col: "join_key2".into(),
            left_ts_col: Some("time_stamp2".into()),
            right_ts_col: Some("time_stamp2".into()),
            right_upper_ts_col: None,
            horizon: 0.0,
            memory: None,
            relationship: RelationshipTag::ManyToMany,
            allow_lagged_targets: false,
            child: Box::new(peripheral2),
        });
        let population = Placeholder::new("population").with_target("target").join(Edge {
            left_key_col: "join_key1".into(),
            right_key_col: "join_key1".into(),
            left_ts_col: Some("time_stamp1".into()),
            right_ts_col: Some("time_stamp1".into()),
            right_upper_ts_col: None,
            horizon: 0.0,
            memory: None,
            relationship: RelationshipTag::ManyToMany,
            allow_lagged_targets: false,
            child: Box::new(peripheral1),
        });
        assert_eq!(population.node_count(), 3);
        assert_eq!(population.targets, vec!["target".to_string()]);
    }
}
