//! Filtering behaviour through the public API only.

use candidate_filter::config::InferenceConfig;
use candidate_filter::data::descriptor::SemanticType;
use candidate_filter::data::inference::infer;
use candidate_filter::data::model::{CellValue, Column, Dataset, SelectionMask};
use candidate_filter::filter::{
    persistence, Connective, Criterion, Diagnostic, FilterEngine, FilterGroup, FilterNode,
    NumericCondition, PersistenceError, TextCondition,
};

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

fn mask(engine: &FilterEngine, ds: &Dataset, node: impl Into<FilterNode>) -> Vec<bool> {
    engine
        .evaluate(ds, &FilterGroup::and([node.into()]))
        .mask
        .into_vec()
}

#[test]
fn age_greater_than_thirty() {
    let ds = Dataset::new(vec![Column::new(
        "age",
        vec![
            CellValue::Integer(22),
            CellValue::Integer(35),
            CellValue::Null,
            CellValue::Integer(41),
        ],
    )])
    .unwrap();
    let c = Criterion::numeric("age", NumericCondition::GreaterThan(30.0)).unwrap();
    assert_eq!(
        mask(&FilterEngine::default(), &ds, c),
        vec![false, true, false, true]
    );
}

#[test]
fn name_contains_ignores_case() {
    let ds = Dataset::new(vec![Column::new(
        "name",
        vec![text("Ayşe Yılmaz"), text("ali veli")],
    )])
    .unwrap();
    let c = Criterion::text("name", TextCondition::Contains("ali".into()), false).unwrap();
    assert_eq!(mask(&FilterEngine::default(), &ds, c), vec![false, true]);
}

#[test]
fn age_range_and_initial() {
    let ds = Dataset::from_rows(
        vec!["age".into(), "name".into()],
        vec![
            vec![CellValue::Integer(22), text("Ayşe")],
            vec![CellValue::Integer(30), text("Ahmet")],
            vec![CellValue::Integer(50), text("Ali")],
        ],
    )
    .unwrap();
    let group = FilterGroup::and([
        Criterion::numeric("age", NumericCondition::Between(25.0, 40.0))
            .unwrap()
            .into(),
        Criterion::text("name", TextCondition::StartsWith("A".into()), false)
            .unwrap()
            .into(),
    ]);
    let out = FilterEngine::default().apply(&ds, &group).dataset;
    assert_eq!(out.row(0).unwrap(), vec![&CellValue::Integer(30), &text("Ahmet")]);
    assert_eq!(out.len(), 1);
}

#[test]
fn mostly_dates_below_threshold_is_text() {
    let ds = Dataset::new(vec![Column::new(
        "hired",
        vec![text("2023-01-01"), text("2023-02-15"), text("not-a-date")],
    )])
    .unwrap();
    let descriptors = infer(&ds, &InferenceConfig::default());
    assert_eq!(descriptors[0].semantic_type(), SemanticType::Text);
}

#[test]
fn unknown_persisted_operator_fails_load() {
    let doc = r#"{"version": 1, "root": {"kind": "group", "connective": "OR", "children": [
        {"kind": "criterion", "column": "age", "type": "numeric",
         "operator": "Frobnicate", "operands": [3]}]}}"#;
    let err = persistence::load(doc).unwrap_err();
    assert!(matches!(err, PersistenceError::UnknownOperator { .. }));
    assert!(err.to_string().contains("Frobnicate"));
}

#[test]
fn connectives_are_bitwise_over_child_masks() {
    let ds = Dataset::new(vec![Column::new(
        "n",
        (0..8).map(CellValue::Integer).chain([CellValue::Null]).collect(),
    )])
    .unwrap();
    let engine = FilterEngine::default();
    let low = Criterion::numeric("n", NumericCondition::LessThan(5.0)).unwrap();
    let even = Criterion::numeric("n", NumericCondition::Between(2.0, 6.0)).unwrap();

    let m1 = SelectionMask::from(mask(&engine, &ds, low.clone()));
    let m2 = SelectionMask::from(mask(&engine, &ds, even.clone()));
    let both = [FilterNode::from(low), FilterNode::from(even)];

    let and = engine.evaluate(&ds, &FilterGroup::and(both.clone())).mask;
    let or = engine.evaluate(&ds, &FilterGroup::or(both)).mask;
    assert_eq!(and, m1.and(&m2));
    assert_eq!(or, m1.or(&m2));
}

#[test]
fn empty_group_is_all_true_for_either_connective() {
    let ds = Dataset::new(vec![Column::new("n", vec![CellValue::Null; 4])]).unwrap();
    for connective in [Connective::And, Connective::Or] {
        let evaluation = FilterEngine::default().evaluate(&ds, &FilterGroup::new(connective));
        assert_eq!(evaluation.mask, SelectionMask::all(4));
    }
}

#[test]
fn missing_cells_fail_equals_and_not_equals() {
    let ds = Dataset::new(vec![Column::new(
        "code",
        vec![text("x"), CellValue::Null, text("y")],
    )])
    .unwrap();
    let engine = FilterEngine::default();
    for operand in ["x", "y", "z", ""] {
        let eq = Criterion::text("code", TextCondition::Equals(operand.into()), false).unwrap();
        let ne = Criterion::text("code", TextCondition::NotEquals(operand.into()), false).unwrap();
        assert!(!mask(&engine, &ds, eq)[1]);
        assert!(!mask(&engine, &ds, ne)[1]);
    }
}

#[test]
fn absent_column_does_not_affect_siblings() {
    let ds = Dataset::new(vec![Column::new(
        "age",
        vec![CellValue::Integer(20), CellValue::Integer(40)],
    )])
    .unwrap();
    let engine = FilterEngine::default();
    let real = Criterion::numeric("age", NumericCondition::GreaterThan(30.0)).unwrap();
    let ghost = Criterion::text("email", TextCondition::Contains("@".into()), false).unwrap();

    let evaluation = engine.evaluate(&ds, &FilterGroup::or([ghost.into(), real.clone().into()]));
    assert_eq!(evaluation.mask.into_vec(), mask(&engine, &ds, real));
    assert!(matches!(
        evaluation.diagnostics.as_slice(),
        [Diagnostic::UnknownColumn { column, .. }] if column == "email"
    ));
}

#[test]
fn saved_groups_load_back_identical() {
    let group = FilterGroup::or([
        Criterion::numeric("age", NumericCondition::NotBetween(18.0, 65.0))
            .unwrap()
            .into(),
        FilterGroup::and([
            Criterion::text("name", TextCondition::Matches(r"^A\w+".into()), true)
                .unwrap()
                .into(),
            Criterion::is_present("email", SemanticType::Text).into(),
        ])
        .into(),
    ]);
    let text = persistence::save(&group).unwrap();
    assert_eq!(persistence::load(&text).unwrap(), group);
}
