//! Filter sets as versioned JSON documents.
//!
//! ```json
//! {
//!   "version": 1,
//!   "root": {
//!     "kind": "group",
//!     "connective": "AND",
//!     "children": [
//!       { "kind": "criterion", "column": "age", "type": "numeric",
//!         "operator": "Between", "operands": [25.0, 40.0] },
//!       { "kind": "criterion", "column": "name", "type": "text",
//!         "operator": "StartsWith", "operands": ["A"], "case_sensitive": false }
//!     ]
//!   }
//! }
//! ```
//!
//! Column names are not checked here; a document built against one dataset
//! can be evaluated against another and unknown columns surface as engine
//! diagnostics.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::criterion::{is_known_operator, Criterion, Operand};
use super::error::PersistenceError;
use super::group::{Connective, FilterGroup, FilterNode};
use crate::config::PersistenceConfig;
use crate::data::descriptor::SemanticType;

pub const DOCUMENT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Document records
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Document {
    version: u32,
    root: NodeRecord,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum NodeRecord {
    Criterion(CriterionRecord),
    Group(GroupRecord),
}

#[derive(Debug, Serialize, Deserialize)]
struct CriterionRecord {
    column: String,
    #[serde(rename = "type")]
    value_type: String,
    operator: String,
    #[serde(default)]
    operands: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    case_sensitive: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    connective: String,
    #[serde(default)]
    children: Vec<NodeRecord>,
}

// -- model → record --

fn group_record(group: &FilterGroup) -> GroupRecord {
    GroupRecord {
        connective: group.connective.as_str().to_string(),
        children: group
            .children
            .iter()
            .map(|child| match child {
                FilterNode::Criterion(c) => NodeRecord::Criterion(criterion_record(c)),
                FilterNode::Group(g) => NodeRecord::Group(group_record(g)),
            })
            .collect(),
    }
}

fn criterion_record(criterion: &Criterion) -> CriterionRecord {
    CriterionRecord {
        column: criterion.column().to_string(),
        value_type: criterion.semantic_type().as_str().to_string(),
        operator: criterion.operator().to_string(),
        operands: criterion.operands().iter().map(operand_to_json).collect(),
        case_sensitive: (criterion.semantic_type() == SemanticType::Text)
            .then(|| criterion.case_sensitive()),
    }
}

fn operand_to_json(operand: &Operand) -> JsonValue {
    match operand {
        Operand::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        other => JsonValue::String(other.to_string()),
    }
}

// -- record → model --

fn group_from_record(record: GroupRecord) -> Result<FilterGroup, PersistenceError> {
    let connective = Connective::parse(&record.connective)
        .ok_or_else(|| PersistenceError::UnknownConnective(record.connective.clone()))?;
    let children = record
        .children
        .into_iter()
        .map(node_from_record)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FilterGroup {
        connective,
        children,
    })
}

fn node_from_record(record: NodeRecord) -> Result<FilterNode, PersistenceError> {
    Ok(match record {
        NodeRecord::Criterion(c) => FilterNode::Criterion(criterion_from_record(c)?),
        NodeRecord::Group(g) => FilterNode::Group(group_from_record(g)?),
    })
}

fn criterion_from_record(record: CriterionRecord) -> Result<Criterion, PersistenceError> {
    let semantic_type =
        SemanticType::parse(&record.value_type).ok_or_else(|| PersistenceError::UnknownType {
            column: record.column.clone(),
            value_type: record.value_type.clone(),
        })?;
    if !is_known_operator(&record.operator) {
        return Err(PersistenceError::UnknownOperator {
            column: record.column,
            operator: record.operator,
        });
    }
    let operands = record
        .operands
        .iter()
        .map(|value| match value {
            JsonValue::Number(n) => n.as_f64().map(Operand::Number),
            JsonValue::String(s) => Some(Operand::Text(s.clone())),
            _ => None,
        }
        .ok_or_else(|| {
            PersistenceError::Corrupt(format!(
                "operand {value} on column '{}' is neither a number nor a string",
                record.column
            ))
        }))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Criterion::parse(
        record.column,
        semantic_type,
        &record.operator,
        &operands,
        record.case_sensitive.unwrap_or(false),
    )?)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Serialize a filter tree to a version-stamped JSON document.
pub fn save(group: &FilterGroup) -> Result<String, PersistenceError> {
    let document = Document {
        version: DOCUMENT_VERSION,
        root: NodeRecord::Group(group_record(group)),
    };
    serde_json::to_string_pretty(&document).map_err(|e| PersistenceError::Corrupt(e.to_string()))
}

/// Parse a document written by [`save`]. Never returns a partial tree.
///
/// A bare criterion at the root is wrapped in an `AND` group.
pub fn load(text: &str) -> Result<FilterGroup, PersistenceError> {
    let document: JsonValue =
        serde_json::from_str(text).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
    let object = document
        .as_object()
        .ok_or_else(|| PersistenceError::Corrupt("top level is not an object".into()))?;

    let version = object.get("version").ok_or(PersistenceError::MissingVersion)?;
    let version = version
        .as_u64()
        .ok_or_else(|| PersistenceError::Corrupt(format!("version {version} is not an integer")))?;
    if version != u64::from(DOCUMENT_VERSION) {
        return Err(PersistenceError::UnsupportedVersion {
            found: version,
            supported: DOCUMENT_VERSION,
        });
    }

    let root = object
        .get("root")
        .cloned()
        .ok_or_else(|| PersistenceError::Corrupt("missing 'root' node".into()))?;
    let root: NodeRecord =
        serde_json::from_value(root).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

    match node_from_record(root)? {
        FilterNode::Group(group) => Ok(group),
        FilterNode::Criterion(criterion) => Ok(FilterGroup::and([criterion.into()])),
    }
}

// ---------------------------------------------------------------------------
// FilterStore – the "last used filters" file
// ---------------------------------------------------------------------------

/// Reads and writes one filter document at a configured location.
#[derive(Debug, Clone)]
pub struct FilterStore {
    path: PathBuf,
}

impl FilterStore {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            path: config.resolved_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, group: &FilterGroup) -> Result<(), PersistenceError> {
        let text = save(group)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        std::fs::write(&self.path, text).map_err(|source| self.io_error(source))?;
        info!(
            "saved {} criteria to {}",
            group.criterion_count(),
            self.path.display()
        );
        Ok(())
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<FilterGroup>, PersistenceError> {
        if !self.path.exists() {
            debug!("no saved filters at {}", self.path.display());
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        load(&text).map(Some)
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::criterion::{
        BooleanCondition, DateCondition, NumericCondition, TextCondition,
    };
    use crate::filter::error::CriterionError;
    use chrono::NaiveDate;

    fn sample_tree() -> FilterGroup {
        let hired = DateCondition::Between(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
        );
        FilterGroup::and([
            Criterion::numeric("age", NumericCondition::Between(25.0, 40.5))
                .unwrap()
                .into(),
            FilterGroup::or([
                Criterion::text("name", TextCondition::StartsWith("A".into()), true)
                    .unwrap()
                    .into(),
                Criterion::text(
                    "city",
                    TextCondition::InList(vec!["Ankara".into(), "İzmir".into()]),
                    false,
                )
                .unwrap()
                .into(),
                Criterion::date("hired", hired).unwrap().into(),
            ])
            .into(),
            Criterion::boolean("active", BooleanCondition::IsTrue).into(),
            Criterion::is_missing("notes", SemanticType::Unknown).into(),
        ])
    }

    #[test]
    fn round_trip_preserves_tree() {
        let tree = sample_tree();
        let text = save(&tree).unwrap();
        assert_eq!(load(&text).unwrap(), tree);

        let empty = FilterGroup::new(Connective::Or);
        assert_eq!(load(&save(&empty).unwrap()).unwrap(), empty);
    }

    #[test]
    fn fractional_operands_survive_exactly() {
        let mut values = vec![90.28571428571429, 0.1 + 0.2, 1.0 / 3.0, -2.5e-300, f64::MAX];
        values.extend((0..2_000).map(|i| i as f64 / 7.0));

        for x in values {
            let tree = FilterGroup::or([
                Criterion::numeric("score", NumericCondition::GreaterThan(x))
                    .unwrap()
                    .into(),
                Criterion::numeric("score", NumericCondition::NotBetween(x, x + 1.0))
                    .unwrap()
                    .into(),
            ]);
            let loaded = load(&save(&tree).unwrap()).unwrap();
            assert_eq!(loaded, tree, "operand {x:?}");
            let operand = loaded.criteria()[0].operands()[0].clone();
            assert!(matches!(operand, Operand::Number(n) if n.to_bits() == x.to_bits()));
        }
    }

    #[test]
    fn unknown_operator_is_a_distinct_error() {
        let doc = r#"{
            "version": 1,
            "root": { "kind": "group", "connective": "AND", "children": [
                { "kind": "criterion", "column": "age", "type": "numeric",
                  "operator": "Frobnicate", "operands": [1] }
            ] }
        }"#;
        match load(doc) {
            Err(PersistenceError::UnknownOperator { column, operator }) => {
                assert_eq!(column, "age");
                assert_eq!(operator, "Frobnicate");
            }
            other => panic!("expected unknown operator, got {other:?}"),
        }
    }

    #[test]
    fn version_and_structure_errors_are_distinct() {
        assert!(matches!(load("not json"), Err(PersistenceError::Corrupt(_))));
        assert!(matches!(
            load(r#"{"root": {"kind": "group", "connective": "AND"}}"#),
            Err(PersistenceError::MissingVersion)
        ));
        assert!(matches!(
            load(r#"{"version": 2, "root": {"kind": "group", "connective": "AND"}}"#),
            Err(PersistenceError::UnsupportedVersion { found: 2, supported: 1 })
        ));
        assert!(matches!(
            load(r#"{"version": 1, "root": {"kind": "group", "connective": "XOR"}}"#),
            Err(PersistenceError::UnknownConnective(c)) if c == "XOR"
        ));
        assert!(matches!(
            load(r#"{"version": 1, "root": {"kind": "criterion", "column": "a",
                "type": "currency", "operator": "Equals", "operands": [1]}}"#),
            Err(PersistenceError::UnknownType { .. })
        ));
    }

    #[test]
    fn operator_from_another_type_is_rejected() {
        let doc = r#"{"version": 1, "root": {"kind": "criterion", "column": "age",
            "type": "numeric", "operator": "StartsWith", "operands": ["A"]}}"#;
        assert!(matches!(
            load(doc),
            Err(PersistenceError::InvalidCriterion(CriterionError::OperatorNotAllowed { .. }))
        ));
    }

    #[test]
    fn bare_criterion_root_becomes_and_group() {
        let doc = r#"{"version": 1, "root": {"kind": "criterion", "column": "age",
            "type": "numeric", "operator": "GreaterThan", "operands": [30]}}"#;
        let group = load(doc).unwrap();
        assert_eq!(group.connective, Connective::And);
        assert_eq!(group.criteria()[0].to_string(), "age > 30");
    }

    #[test]
    fn store_creates_directories_and_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilterStore::new(&PersistenceConfig {
            path: Some(dir.path().join("nested").join("last_filters.json")),
        });
        assert!(store.load().unwrap().is_none());

        let tree = sample_tree();
        store.save(&tree).unwrap();
        assert_eq!(store.load().unwrap(), Some(tree));
    }
}
