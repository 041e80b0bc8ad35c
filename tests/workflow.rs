//! End-to-end tests: load a fixture file, infer types, filter, export, reload.

use std::path::PathBuf;

use candidate_filter::config::{PersistenceConfig, Settings};
use candidate_filter::data::descriptor::SemanticType;
use candidate_filter::data::model::Dataset;
use candidate_filter::data::{export, loader};
use candidate_filter::filter::{
    BooleanCondition, Criterion, DateCondition, FilterEngine, FilterGroup, NumericCondition,
    TextCondition,
};
use candidate_filter::state::Session;
use chrono::NaiveDate;

fn fixture() -> PathBuf {
    testdata("candidates.csv")
}

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn session_for(path: &std::path::Path) -> Session {
    let mut session = Session::default();
    session.set_dataset(loader::load_file(path).expect("fixture should load"));
    session
}

fn names(ds: &Dataset) -> Vec<String> {
    ds.column("name")
        .expect("name column")
        .values
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn fixture_columns_get_expected_types() {
    let session = session_for(&fixture());
    let types: Vec<(&str, SemanticType)> = session
        .descriptors
        .iter()
        .map(|d| (d.name(), d.semantic_type()))
        .collect();
    assert_eq!(
        types,
        vec![
            ("name", SemanticType::Text),
            ("age", SemanticType::Numeric),
            ("city", SemanticType::Text),
            ("applied_on", SemanticType::Date),
            ("remote", SemanticType::Boolean),
            ("score", SemanticType::Numeric),
        ]
    );
    assert_eq!(session.descriptor("age").unwrap().null_count(), 1);
    assert!(session.descriptor("city").unwrap().is_categorical());
}

#[test]
fn nested_groups_combine_types() {
    let mut session = session_for(&fixture());
    let young_or_remote = FilterGroup::or([
        Criterion::numeric("age", NumericCondition::LessThan(29.0))
            .unwrap()
            .into(),
        Criterion::boolean("remote", BooleanCondition::IsTrue).into(),
    ]);
    session.set_filter(FilterGroup::and([
        Criterion::text("city", TextCondition::InList(vec!["ankara".into()]), false)
            .unwrap()
            .into(),
        young_or_remote.into(),
    ]));

    assert!(session.diagnostics.is_empty());
    assert_eq!(
        names(&session.selected_dataset().unwrap()),
        vec!["Ali Veli", "Elif Arslan"]
    );
}

#[test]
fn workbook_matches_csv_fixture() {
    let csv = session_for(&fixture());
    let mut workbook = session_for(&testdata("candidates.xlsx"));

    let types = |s: &Session| -> Vec<SemanticType> {
        s.descriptors.iter().map(|d| d.semantic_type()).collect()
    };
    assert_eq!(types(&workbook), types(&csv));

    workbook.set_filter(FilterGroup::and([
        Criterion::numeric("score", NumericCondition::GreaterThan(80.0))
            .unwrap()
            .into(),
        Criterion::is_present("age", SemanticType::Numeric).into(),
    ]));
    assert!(workbook.diagnostics.is_empty());
    assert_eq!(
        names(&workbook.selected_dataset().unwrap()),
        vec!["Ahmet Kaya", "Elif Arslan"]
    );
}

#[test]
fn unreadable_cells_make_a_criterion_select_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    let mut rows = String::from("name,score\n");
    for i in 0..40 {
        rows.push_str(&format!("c{i},{}\n", 60 + i));
    }
    rows.push_str("late,pending\n");
    std::fs::write(&path, rows).unwrap();

    let mut session = session_for(&path);
    assert_eq!(session.column_type("score"), SemanticType::Numeric);
    session.set_filter(FilterGroup::or([
        Criterion::numeric("score", NumericCondition::GreaterThan(90.0))
            .unwrap()
            .into(),
        Criterion::text("name", TextCondition::Equals("late".into()), false)
            .unwrap()
            .into(),
    ]));
    assert_eq!(names(&session.selected_dataset().unwrap()), vec!["late"]);
    assert_eq!(session.diagnostics.len(), 1);
    assert_eq!(session.diagnostics[0].column(), "score");
}

#[test]
fn date_range_and_presence_operators() {
    let mut session = session_for(&fixture());
    session.set_filter(FilterGroup::and([
        Criterion::date(
            "applied_on",
            DateCondition::Between(day(2023, 2, 1), day(2023, 3, 31)),
        )
        .unwrap()
        .into(),
        Criterion::is_missing("age", SemanticType::Numeric).into(),
    ]));
    assert_eq!(names(&session.selected_dataset().unwrap()), vec!["Zeynep Demir"]);
}

#[test]
fn missing_age_is_excluded_by_not_equals() {
    let mut session = session_for(&fixture());
    session.set_filter(FilterGroup::and([Criterion::numeric(
        "age",
        NumericCondition::NotEquals(30.0),
    )
    .unwrap()
    .into()]));
    assert_eq!(
        names(&session.selected_dataset().unwrap()),
        vec!["Ayşe Yılmaz", "Ali Veli", "Mehmet Şahin", "Elif Arslan"]
    );
}

#[test]
fn filtered_rows_are_an_ordered_subsequence() {
    let session = session_for(&fixture());
    let ds = session.dataset.as_ref().unwrap();
    let engine = FilterEngine::default();
    let groups = [
        FilterGroup::default(),
        FilterGroup::and([Criterion::numeric("score", NumericCondition::GreaterOrEqual(75.0))
            .unwrap()
            .into()]),
        FilterGroup::or([
            Criterion::text("name", TextCondition::Contains("e".into()), false)
                .unwrap()
                .into(),
            Criterion::boolean("remote", BooleanCondition::IsFalse).into(),
        ]),
        FilterGroup::and([Criterion::numeric("salary", NumericCondition::GreaterThan(0.0))
            .unwrap()
            .into()]),
    ];

    for group in &groups {
        let filtered = engine.apply(ds, group).dataset;
        let mut source = 0;
        for row in 0..filtered.len() {
            let wanted = filtered.row(row).unwrap();
            while ds.row(source).is_some_and(|r| r != wanted) {
                source += 1;
            }
            assert!(source < ds.len(), "row {row} of {group} is not in source order");
            source += 1;
        }
    }
}

#[test]
fn export_and_reload_keep_rows_and_types() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_for(&fixture());
    session.set_filter(FilterGroup::and([Criterion::text(
        "city",
        TextCondition::Equals("Ankara".into()),
        true,
    )
    .unwrap()
    .into()]));
    let selected = session.selected_dataset().unwrap();
    let original_types: Vec<SemanticType> =
        session.descriptors.iter().map(|d| d.semantic_type()).collect();

    for ext in export::supported_output_extensions() {
        let path = dir.path().join(format!("shortlist.{ext}"));
        export::write_file(&selected, &path).unwrap();

        let reloaded = session_for(&path);
        let ds = reloaded.dataset.as_ref().unwrap();
        assert_eq!(names(ds), vec!["Ahmet Kaya", "Ali Veli", "Elif Arslan"], "{ext}");
        assert_eq!(
            ds.column_names().collect::<Vec<_>>(),
            selected.column_names().collect::<Vec<_>>(),
            "{ext}"
        );
        let types: Vec<SemanticType> =
            reloaded.descriptors.iter().map(|d| d.semantic_type()).collect();
        assert_eq!(types, original_types, "{ext}");
    }
}

#[test]
fn last_used_filter_is_restored_for_another_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.persistence = PersistenceConfig {
        path: Some(dir.path().join("last_filters.json")),
    };

    let mut first = Session::new(settings.clone());
    first.set_dataset(loader::load_file(&fixture()).unwrap());
    first.set_filter(FilterGroup::and([
        Criterion::numeric("score", NumericCondition::GreaterThan(80.0))
            .unwrap()
            .into(),
        Criterion::text("department", TextCondition::Equals("R&D".into()), false)
            .unwrap()
            .into(),
    ]));
    first.save_last_filter().unwrap();

    let mut second = Session::new(settings);
    second.set_dataset(loader::load_file(&fixture()).unwrap());
    assert!(second.restore_last_filter().unwrap());
    assert_eq!(second.filter, first.filter);
    // Unknown column fails closed under AND, with a diagnostic.
    assert_eq!(second.selection.selected_count(), 0);
    assert_eq!(second.diagnostics.len(), 1);
    assert_eq!(second.diagnostics[0].column(), "department");
}
