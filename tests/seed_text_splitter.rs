//! Text column -> per-token derived frame, end-to-end through the public
//! `TextSplitter` API with token identity checked via the shared encoding.

use relfeat::frame::Df;
use relfeat::frame::TextCol;
use relfeat::preprocessor::text_splitter::TextSplitter;

#[test]
fn splits_population_text_into_one_row_per_token_with_correct_identity() {
    let mut population = Df::new("population", 2);
    population
        .add_text(TextCol::from_vec(
            "body",
            vec![Some("Hello, World!".to_string()), Some("Foo Bar".to_string())],
        ))
        .unwrap();

    let mut splitter = TextSplitter::default();
    let (parent, peripheral, derived) = splitter.fit_transform(population, Vec::new()).unwrap();

    assert!(parent.text("body").is_none());
    let rowid = parent.join_key("rowid").expect("synthesized join key");
    assert_eq!(rowid.as_slice(), &[0, 1]);
    assert!(peripheral.is_empty());
    assert_eq!(derived.len(), 1);

    let child = &derived[0];
    assert_eq!(child.name(), "population#body");
    let rowid_col = child.join_key("rowid").unwrap();
    let token_col = child.categorical("body").unwrap();

    let pairs: Vec<(i32, String)> = rowid_col
        .as_slice()
        .iter()
        .zip(token_col.as_slice().iter())
        .map(|(&r, &code)| (r, child.cat_encoding.decode(code).unwrap()))
        .collect();

    let mut pairs = pairs;
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            (0, "hello".to_string()),
            (0, "world".to_string()),
            (1, "bar".to_string()),
            (1, "foo".to_string()),
        ]
    );
}

#[test]
fn fit_transform_twice_yields_identical_auxiliary_frames() {
    let mut population = Df::new("population", 1);
    population.add_text(TextCol::from_vec("body", vec![Some("repeat repeat".to_string())])).unwrap();

    let mut splitter_a = TextSplitter::default();
    let (_, _, derived_a) = splitter_a.fit_transform(population.clone(), Vec::new()).unwrap();

    let mut splitter_b = TextSplitter::default();
    let (_, _, derived_b) = splitter_b.fit_transform(population, Vec::new()).unwrap();

    assert_eq!(derived_a[0].nrows(), derived_b[0].nrows());
    let tokens_a = derived_a[0].categorical("body").unwrap();
    let tokens_b = derived_b[0].categorical("body").unwrap();
    assert_eq!(tokens_a.as_slice(), tokens_b.as_slice());
}
