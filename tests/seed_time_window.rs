//! End-to-end time-window matching through the public `Matchmaker`/`Edge`
//! API, complementing `time_window`'s own lower-level unit tests.

use relfeat::frame::column::{CatCol, NumCol};
use relfeat::frame::Df;
use relfeat::matchmaker::Matchmaker;
use relfeat::placeholder::{Edge, Placeholder, RelationshipTag};

#[test]
fn matchmaker_respects_the_configured_time_window() {
    let mut population = Df::new("population", 1);
    population.add_join_key(CatCol::from_vec("jk", vec![0])).unwrap();
    population.add_time_stamp(NumCol::from_vec("ts", vec![100.0])).unwrap();

    let mut peripheral = Df::new("peripheral", 4);
    peripheral.add_join_key(CatCol::from_vec("jk", vec![0, 0, 0, 0])).unwrap();
    peripheral.add_time_stamp(NumCol::from_vec("lower_ts", vec![50.0, 99.0, 100.0, 101.0])).unwrap();
    peripheral
        .add_numerical(NumCol::from_vec("upper_ts", vec![60.0, 109.0, 110.0, 111.0]))
        .unwrap();

    let edge = Edge {
        left_key_col: "jk".to_string(),
        right_key_col: "jk".to_string(),
        left_ts_col: Some("ts".to_string()),
        right_ts_col: Some("lower_ts".to_string()),
        right_upper_ts_col: Some("upper_ts".to_string()),
        horizon: 0.0,
        memory: None,
        relationship: RelationshipTag::ManyToMany,
        allow_lagged_targets: false,
        child: Box::new(Placeholder::new("peripheral")),
    };

    let matchmaker = Matchmaker::new(&population, &peripheral, &edge).unwrap();
    let mut matches = Vec::new();
    matchmaker.make_matches(0, &mut matches);

    let mut rows: Vec<u32> = matches.iter().map(|m| m.ix_input).collect();
    rows.sort_unstable();
    assert_eq!(rows, vec![1, 2]);
}

#[test]
fn matchmaker_finds_no_matches_outside_any_window() {
    let mut population = Df::new("population", 1);
    population.add_join_key(CatCol::from_vec("jk", vec![0])).unwrap();
    population.add_time_stamp(NumCol::from_vec("ts", vec![1_000.0])).unwrap();

    let mut peripheral = Df::new("peripheral", 2);
    peripheral.add_join_key(CatCol::from_vec("jk", vec![0, 0])).unwrap();
    peripheral.add_time_stamp(NumCol::from_vec("lower_ts", vec![1.0, 2.0])).unwrap();
    peripheral.add_numerical(NumCol::from_vec("upper_ts", vec![2.0, 3.0])).unwrap();

    let edge = Edge {
        left_key_col: "jk".to_string(),
        right_key_col: "jk".to_string(),
        left_ts_col: Some("ts".to_string()),
        right_ts_col: Some("lower_ts".to_string()),
        right_upper_ts_col: Some("upper_ts".to_string()),
        horizon: 0.0,
        memory: None,
        relationship: RelationshipTag::ManyToMany,
        allow_lagged_targets: false,
        child: Box::new(Placeholder::new("peripheral")),
    };

    let matchmaker = Matchmaker::new(&population, &peripheral, &edge).unwrap();
    let mut matches = Vec::new();
    matchmaker.make_matches(0, &mut matches);
    assert!(matches.is_empty());
}
