//! A saved-and-reloaded pipeline must transform the same input into the
//! exact same feature matrix as the pipeline that was just fit.

use relfeat::frame::column::{CatCol, NumCol};
use relfeat::frame::Df;
use relfeat::pipeline::{Learner, Pipeline, PipelineHyperparameters};
use relfeat::placeholder::{Edge, Placeholder, RelationshipTag};
use relfeat::storage::model_io;
use tempfile::tempdir;

fn direct_edge(child_name: &str) -> Edge {
    Edge {
        left_key_col: "jk".to_string(),
        right_key_col: "jk".to_string(),
        left_ts_col: None,
        right_ts_col: None,
        right_upper_ts_col: None,
        horizon: 0.0,
        memory: None,
        relationship: RelationshipTag::ManyToMany,
        allow_lagged_targets: false,
        child: Box::new(Placeholder::new(child_name)),
    }
}

#[test]
fn reloaded_pipeline_matches_the_freshly_fit_transform() {
    let nrows = 20;
    let jk: Vec<i32> = (0..nrows).collect();

    let mut population = Df::new("population", nrows as usize);
    population.add_join_key(CatCol::from_vec("jk", jk.clone())).unwrap();

    let peripheral_rows = nrows as usize * 2;
    let peripheral_jk: Vec<i32> = jk.iter().flat_map(|&g| [g, g]).collect();
    let amount: Vec<f64> = (0..peripheral_rows).map(|i| i as f64 * 0.5).collect();

    let mut peripheral = Df::new("peripheral", peripheral_rows);
    peripheral.add_join_key(CatCol::from_vec("jk", peripheral_jk)).unwrap();
    peripheral.add_numerical(NumCol::from_vec("amount", amount)).unwrap();

    let target: Vec<f64> = jk.iter().map(|&g| g as f64 * 2.0).collect();
    population.add_target(NumCol::from_vec("target", target)).unwrap();

    let placeholder = Placeholder::new("population").with_target("target").join(direct_edge("peripheral"));

    let hyper = PipelineHyperparameters { learner: Learner::FastPropOnly, ..Default::default() };

    let (pipeline, _fit_features, _warner) =
        Pipeline::fit(population.clone(), vec![peripheral.clone()], placeholder, hyper).unwrap();

    let fresh = pipeline.transform(population.clone(), vec![peripheral.clone()]).unwrap();

    let dir = tempdir().unwrap();
    model_io::save_pipeline(dir.path(), "test_pipeline", &pipeline).unwrap();
    let reloaded = model_io::load_pipeline(dir.path(), "test_pipeline").unwrap();

    let replayed = reloaded.transform(population, vec![peripheral]).unwrap();

    assert_eq!(fresh.numerical_names(), replayed.numerical_names());
    for name in fresh.numerical_names() {
        let a = fresh.numerical(name).unwrap().as_slice();
        let b = replayed.numerical(name).unwrap().as_slice();
        assert_eq!(a, b, "column {name} diverged after reload");
    }
}
