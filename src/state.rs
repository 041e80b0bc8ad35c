use log::info;

use crate::config::Settings;
use crate::data::descriptor::{ColumnDescriptor, SemanticType};
use crate::data::inference::{apply_types, infer};
use crate::data::model::{Dataset, SelectionMask};
use crate::filter::{Diagnostic, FilterEngine, FilterGroup, FilterStore, PersistenceError};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything a front end needs between edits, independent of rendering.
///
/// Recomputation is pull-based: every filter change goes through
/// [`Session::set_filter`], which re-evaluates the whole tree.
pub struct Session {
    pub settings: Settings,

    /// Loaded dataset with typed cells (None until a file is loaded).
    pub dataset: Option<Dataset>,

    /// One descriptor per dataset column, in column order.
    pub descriptors: Vec<ColumnDescriptor>,

    /// Active filter tree.
    pub filter: FilterGroup,

    /// Rows passing `filter` (cached).
    pub selection: SelectionMask,

    /// Warnings from the last evaluation.
    pub diagnostics: Vec<Diagnostic>,

    /// Status / error message for the front end.
    pub status_message: Option<String>,

    engine: FilterEngine,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let engine = FilterEngine::new(settings.matching.clone(), settings.engine.clone())
            .with_parsing(settings.inference.clone());
        Self {
            settings,
            dataset: None,
            descriptors: Vec::new(),
            filter: FilterGroup::default(),
            selection: SelectionMask::default(),
            diagnostics: Vec::new(),
            status_message: None,
            engine,
        }
    }

    /// Ingest a freshly loaded dataset: infer column types, coerce cells,
    /// and re-apply the current filter.
    pub fn set_dataset(&mut self, raw: Dataset) {
        let descriptors = infer(&raw, &self.settings.inference);
        let typed = apply_types(&raw, &descriptors, &self.settings.inference);
        for d in &descriptors {
            info!("column {d}");
        }

        self.descriptors = descriptors;
        self.dataset = Some(typed);
        self.status_message = None;
        self.refilter();
    }

    pub fn descriptor(&self, column: &str) -> Option<&ColumnDescriptor> {
        self.descriptors.iter().find(|d| d.name() == column)
    }

    /// Semantic type of a column, `Unknown` when it is not in the dataset.
    pub fn column_type(&self, column: &str) -> SemanticType {
        self.descriptor(column)
            .map(ColumnDescriptor::semantic_type)
            .unwrap_or(SemanticType::Unknown)
    }

    /// Replace the filter tree and recompute the selection.
    pub fn set_filter(&mut self, filter: FilterGroup) {
        self.filter = filter;
        self.refilter();
    }

    pub fn clear_filter(&mut self) {
        self.set_filter(FilterGroup::default());
    }

    /// Recompute `selection` and `diagnostics` from the current filter.
    pub fn refilter(&mut self) {
        let Some(ds) = &self.dataset else {
            return;
        };
        let evaluation = self.engine.evaluate(ds, &self.filter);
        self.status_message = Some(format!(
            "{} of {} rows selected",
            evaluation.mask.selected_count(),
            ds.len()
        ));
        self.selection = evaluation.mask;
        self.diagnostics = evaluation.diagnostics;
    }

    /// The selected rows as a new dataset, ready for export.
    pub fn selected_dataset(&self) -> Option<Dataset> {
        self.dataset.as_ref().map(|ds| ds.take(&self.selection))
    }

    fn store(&self) -> FilterStore {
        FilterStore::new(&self.settings.persistence)
    }

    /// Save the current filter as the "last used" set.
    pub fn save_last_filter(&self) -> Result<(), PersistenceError> {
        self.store().save(&self.filter)
    }

    /// Restore the "last used" set, if one was saved. Returns whether it was.
    pub fn restore_last_filter(&mut self) -> Result<bool, PersistenceError> {
        match self.store().load()? {
            Some(group) => {
                self.set_filter(group);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::data::model::CellValue;
    use crate::filter::{Criterion, NumericCondition};

    fn raw() -> Dataset {
        let text = |s: &str| CellValue::Text(s.to_string());
        Dataset::from_rows(
            vec!["name".into(), "age".into()],
            vec![
                vec![text("Ayşe"), text("22")],
                vec![text("Ahmet"), text("35")],
                vec![text("Ali"), CellValue::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn loading_infers_types_and_selects_everything() {
        let mut session = Session::default();
        session.set_dataset(raw());

        assert_eq!(session.column_type("age"), SemanticType::Numeric);
        assert_eq!(session.column_type("name"), SemanticType::Text);
        assert_eq!(session.column_type("salary"), SemanticType::Unknown);
        assert_eq!(session.selection, SelectionMask::all(3));
        let ds = session.dataset.as_ref().unwrap();
        assert_eq!(ds.column("age").unwrap().values[1], CellValue::Integer(35));
    }

    #[test]
    fn set_filter_recomputes_selection() {
        let mut session = Session::default();
        session.set_dataset(raw());
        session.set_filter(FilterGroup::and([Criterion::numeric(
            "age",
            NumericCondition::GreaterThan(30.0),
        )
        .unwrap()
        .into()]));

        assert_eq!(session.selection.as_slice(), &[false, true, false]);
        assert_eq!(session.selected_dataset().unwrap().len(), 1);
        assert_eq!(session.status_message.as_deref(), Some("1 of 3 rows selected"));

        session.clear_filter();
        assert_eq!(session.selection.selected_count(), 3);
    }

    #[test]
    fn last_filter_survives_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.persistence = PersistenceConfig {
            path: Some(dir.path().join("last.json")),
        };

        let mut first = Session::new(settings.clone());
        assert!(!first.restore_last_filter().unwrap());
        first.set_filter(FilterGroup::and([Criterion::numeric(
            "age",
            NumericCondition::LessThan(30.0),
        )
        .unwrap()
        .into()]));
        first.save_last_filter().unwrap();

        let mut second = Session::new(settings);
        second.set_dataset(raw());
        assert!(second.restore_last_filter().unwrap());
        assert_eq!(second.filter, first.filter);
        assert_eq!(second.selection.as_slice(), &[true, false, false]);
    }
}
