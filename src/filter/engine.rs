//! Filter evaluation over a dataset.
//!
//! ```text
//!   FilterGroup ──compile──▶ Plan (criteria bound to columns)
//!                               │
//!                 row chunk ──▶ eval ──▶ chunk mask ──▶ SelectionMask
//!                               │
//!                               └──▶ Diagnostics (unknown column, type mismatch)
//! ```
//!
//! The dataset is only ever read. Binding a criterion to its column also scans
//! the column once for cells the criterion cannot read; such a criterion
//! selects no rows. Cancellation is checked between row chunks and discards
//! everything computed so far.

use std::convert::Infallible;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::criterion::{Criterion, Matcher, Outcome};
use super::group::{Connective, FilterGroup, FilterNode};
use crate::config::{EngineConfig, InferenceConfig, MatchConfig};
use crate::data::descriptor::SemanticType;
use crate::data::model::{Column, Dataset, SelectionMask};

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Recoverable problem found while evaluating. The criterion concerned
/// selected no rows; the rest of the tree was evaluated normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    UnknownColumn {
        criterion: String,
        column: String,
    },
    TypeMismatch {
        criterion: String,
        column: String,
        expected: SemanticType,
        mismatched: usize,
    },
}

impl Diagnostic {
    pub fn column(&self) -> &str {
        match self {
            Diagnostic::UnknownColumn { column, .. } | Diagnostic::TypeMismatch { column, .. } => {
                column
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownColumn { criterion, column } => {
                write!(f, "[{criterion}] column '{column}' is not in the dataset; no rows selected")
            }
            Diagnostic::TypeMismatch {
                criterion,
                column,
                expected,
                mismatched,
            } => write!(
                f,
                "[{criterion}] {mismatched} value(s) in column '{column}' are not {expected}; no rows selected"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation & progress
// ---------------------------------------------------------------------------

/// Shared flag a caller flips to stop a running evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub rows_done: usize,
    pub rows_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("evaluation cancelled after {rows_done} of {rows_total} rows")]
pub struct Cancelled {
    pub rows_done: usize,
    pub rows_total: usize,
}

/// Caller hooks for a long evaluation.
pub struct EvaluationControl<'a> {
    pub cancel: CancellationToken,
    on_progress: Option<Box<dyn FnMut(Progress) + 'a>>,
}

impl<'a> EvaluationControl<'a> {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            on_progress: None,
        }
    }

    /// Called after every completed chunk.
    pub fn with_progress(mut self, f: impl FnMut(Progress) + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    fn report(&mut self, progress: Progress) {
        if let Some(f) = self.on_progress.as_mut() {
            f(progress);
        }
    }
}

impl Default for EvaluationControl<'_> {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub mask: SelectionMask,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub dataset: Dataset,
    pub diagnostics: Vec<Diagnostic>,
}

// ---------------------------------------------------------------------------
// Plan – a filter tree with each criterion bound to its column
// ---------------------------------------------------------------------------

struct Leaf<'a> {
    matcher: Matcher<'a>,
    column: Option<&'a Column>,
    /// Present cells the matcher cannot read, over the whole column.
    mismatched: usize,
}

enum Plan<'a> {
    Leaf(Leaf<'a>),
    Group {
        connective: Connective,
        children: Vec<Plan<'a>>,
    },
}

impl<'a> Plan<'a> {
    fn compile(
        group: &'a FilterGroup,
        dataset: &'a Dataset,
        matching: &MatchConfig,
        parsing: &'a InferenceConfig,
    ) -> Self {
        Plan::Group {
            connective: group.connective,
            children: group
                .children
                .iter()
                .map(|child| match child {
                    FilterNode::Criterion(c) => Plan::Leaf(Leaf::bind(
                        c.matcher(matching, parsing),
                        dataset.column(c.column()),
                    )),
                    FilterNode::Group(g) => Plan::compile(g, dataset, matching, parsing),
                })
                .collect(),
        }
    }

    fn eval(&self, rows: Range<usize>, parallel: bool) -> Vec<bool> {
        match self {
            Plan::Leaf(leaf) => leaf.eval(rows),
            Plan::Group {
                connective,
                children,
            } => {
                if children.is_empty() {
                    return vec![true; rows.len()];
                }
                let masks: Vec<Vec<bool>> = if parallel && children.len() > 1 {
                    children
                        .par_iter()
                        .map(|child| child.eval(rows.clone(), parallel))
                        .collect()
                } else {
                    children
                        .iter()
                        .map(|child| child.eval(rows.clone(), parallel))
                        .collect()
                };
                combine(*connective, masks, rows.len())
            }
        }
    }

    fn diagnostics(&self, out: &mut Vec<Diagnostic>) {
        match self {
            Plan::Leaf(leaf) => out.extend(leaf.diagnostic()),
            Plan::Group { children, .. } => {
                for child in children {
                    child.diagnostics(out);
                }
            }
        }
    }
}

impl<'a> Leaf<'a> {
    fn bind(matcher: Matcher<'a>, column: Option<&'a Column>) -> Self {
        let mismatched = column.map_or(0, |column| {
            column
                .values
                .iter()
                .filter(|value| !matcher.reads(value))
                .count()
        });
        Self {
            matcher,
            column,
            mismatched,
        }
    }

    fn eval(&self, rows: Range<usize>) -> Vec<bool> {
        match self.column {
            Some(column) if self.mismatched == 0 => column.values[rows]
                .iter()
                .map(|value| self.matcher.test(value) == Outcome::Selected)
                .collect(),
            _ => vec![false; rows.len()],
        }
    }

    fn diagnostic(&self) -> Option<Diagnostic> {
        let criterion: &Criterion = self.matcher.criterion();
        if self.column.is_none() {
            return Some(Diagnostic::UnknownColumn {
                criterion: criterion.to_string(),
                column: criterion.column().to_string(),
            });
        }
        (self.mismatched > 0).then(|| Diagnostic::TypeMismatch {
            criterion: criterion.to_string(),
            column: criterion.column().to_string(),
            expected: criterion.semantic_type(),
            mismatched: self.mismatched,
        })
    }
}

fn combine(connective: Connective, masks: Vec<Vec<bool>>, len: usize) -> Vec<bool> {
    let (init, op): (bool, fn(bool, bool) -> bool) = match connective {
        Connective::And => (true, |a, b| a && b),
        Connective::Or => (false, |a, b| a || b),
    };
    masks.into_iter().fold(vec![init; len], |mut acc, mask| {
        for (slot, flag) in acc.iter_mut().zip(mask) {
            *slot = op(*slot, flag);
        }
        acc
    })
}

// ---------------------------------------------------------------------------
// FilterEngine
// ---------------------------------------------------------------------------

/// Evaluates filter trees against datasets. Holds configuration only.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    matching: MatchConfig,
    parsing: InferenceConfig,
    config: EngineConfig,
}

impl FilterEngine {
    pub fn new(matching: MatchConfig, config: EngineConfig) -> Self {
        Self {
            matching,
            parsing: InferenceConfig::default(),
            config,
        }
    }

    /// Read text cells with these number, date and boolean rules.
    pub fn with_parsing(mut self, parsing: InferenceConfig) -> Self {
        self.parsing = parsing;
        self
    }

    /// Selection mask for `group` over `dataset`, plus any diagnostics.
    pub fn evaluate(&self, dataset: &Dataset, group: &FilterGroup) -> Evaluation {
        match self.run(dataset, group, |_| Ok::<(), Infallible>(()), |_| {}) {
            Ok(evaluation) => evaluation,
            Err(never) => match never {},
        }
    }

    /// Like [`FilterEngine::evaluate`], checking `control` between row chunks.
    pub fn evaluate_with(
        &self,
        dataset: &Dataset,
        group: &FilterGroup,
        control: &mut EvaluationControl<'_>,
    ) -> Result<Evaluation, Cancelled> {
        let cancel = control.cancel.clone();
        let rows_total = dataset.len();
        self.run(
            dataset,
            group,
            |rows_done| {
                if cancel.is_cancelled() {
                    info!("evaluation cancelled at row {rows_done} of {rows_total}");
                    Err(Cancelled {
                        rows_done,
                        rows_total,
                    })
                } else {
                    Ok(())
                }
            },
            |progress| control.report(progress),
        )
    }

    fn run<E>(
        &self,
        dataset: &Dataset,
        group: &FilterGroup,
        mut before_chunk: impl FnMut(usize) -> Result<(), E>,
        mut after_chunk: impl FnMut(Progress),
    ) -> Result<Evaluation, E> {
        let rows_total = dataset.len();
        let chunk_size = self.config.chunk_size.max(1);
        let plan = Plan::compile(group, dataset, &self.matching, &self.parsing);
        debug!(
            "evaluating {} criteria over {rows_total} rows in chunks of {chunk_size}",
            group.criterion_count()
        );

        let mut mask = Vec::with_capacity(rows_total);
        let mut start = 0;
        while start < rows_total {
            before_chunk(start)?;
            let end = (start + chunk_size).min(rows_total);
            mask.extend(plan.eval(start..end, self.config.parallel));
            start = end;
            after_chunk(Progress {
                rows_done: end,
                rows_total,
            });
        }

        let mut diagnostics = Vec::new();
        plan.diagnostics(&mut diagnostics);
        for diagnostic in &diagnostics {
            warn!("{diagnostic}");
        }

        Ok(Evaluation {
            mask: SelectionMask::from(mask),
            diagnostics,
        })
    }

    /// Rows of `dataset` selected by `group`, in their original order.
    pub fn apply(&self, dataset: &Dataset, group: &FilterGroup) -> Filtered {
        let Evaluation { mask, diagnostics } = self.evaluate(dataset, group);
        self.finish(dataset, &mask, diagnostics)
    }

    pub fn apply_with(
        &self,
        dataset: &Dataset,
        group: &FilterGroup,
        control: &mut EvaluationControl<'_>,
    ) -> Result<Filtered, Cancelled> {
        let Evaluation { mask, diagnostics } = self.evaluate_with(dataset, group, control)?;
        Ok(self.finish(dataset, &mask, diagnostics))
    }

    fn finish(&self, dataset: &Dataset, mask: &SelectionMask, diagnostics: Vec<Diagnostic>) -> Filtered {
        let filtered = dataset.take(mask);
        info!("filter kept {} of {} rows", filtered.len(), dataset.len());
        Filtered {
            dataset: filtered,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;
    use crate::filter::criterion::{BooleanCondition, NumericCondition, TextCondition};

    fn people() -> Dataset {
        Dataset::from_rows(
            vec!["name".into(), "age".into()],
            vec![
                vec![CellValue::Text("Ayşe".into()), CellValue::Integer(22)],
                vec![CellValue::Text("Ahmet".into()), CellValue::Integer(30)],
                vec![CellValue::Text("Ali".into()), CellValue::Integer(50)],
            ],
        )
        .unwrap()
    }

    fn age_between(lo: f64, hi: f64) -> FilterNode {
        Criterion::numeric("age", NumericCondition::Between(lo, hi))
            .unwrap()
            .into()
    }

    fn name_starts(prefix: &str) -> FilterNode {
        Criterion::text("name", TextCondition::StartsWith(prefix.into()), false)
            .unwrap()
            .into()
    }

    fn serial() -> FilterEngine {
        FilterEngine::new(
            MatchConfig::default(),
            EngineConfig {
                chunk_size: 2,
                parallel: false,
            },
        )
    }

    #[test]
    fn and_group_intersects_children() {
        let group = FilterGroup::and([age_between(25.0, 40.0), name_starts("A")]);
        let out = FilterEngine::default().apply(&people(), &group);
        assert_eq!(out.dataset.len(), 1);
        assert_eq!(
            out.dataset.column("name").unwrap().values,
            vec![CellValue::Text("Ahmet".into())]
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn or_group_unions_children() {
        let ds = people();
        let engine = serial();
        let m1 = engine.evaluate(&ds, &FilterGroup::and([age_between(0.0, 25.0)])).mask;
        let m2 = engine.evaluate(&ds, &FilterGroup::and([age_between(45.0, 60.0)])).mask;
        let both = engine.evaluate(
            &ds,
            &FilterGroup::or([age_between(0.0, 25.0), age_between(45.0, 60.0)]),
        );
        assert_eq!(both.mask, m1.or(&m2));
        assert_eq!(both.mask.into_vec(), vec![true, false, true]);
    }

    #[test]
    fn empty_group_selects_everything() {
        let ds = people();
        for group in [FilterGroup::new(Connective::And), FilterGroup::new(Connective::Or)] {
            assert_eq!(serial().evaluate(&ds, &group).mask, SelectionMask::all(3));
        }
    }

    #[test]
    fn unknown_column_fails_closed_without_touching_siblings() {
        let ghost = Criterion::numeric("salary", NumericCondition::GreaterThan(0.0)).unwrap();
        let group = FilterGroup::or([ghost.clone().into(), name_starts("Ay")]);
        let evaluation = serial().evaluate(&people(), &group);

        assert_eq!(evaluation.mask.into_vec(), vec![true, false, false]);
        assert_eq!(
            evaluation.diagnostics,
            vec![Diagnostic::UnknownColumn {
                criterion: ghost.to_string(),
                column: "salary".into(),
            }]
        );
    }

    #[test]
    fn type_mismatch_selects_none_and_is_counted_once() {
        let ds = Dataset::from_rows(
            vec!["age".into()],
            vec![
                vec![CellValue::Integer(40)],
                vec![CellValue::Text("n/a".into())],
                vec![CellValue::Text("unknown".into())],
            ],
        )
        .unwrap();
        let group = FilterGroup::and([age_between(0.0, 100.0)]);
        let evaluation = serial().evaluate(&ds, &group);
        assert_eq!(evaluation.mask.into_vec(), vec![false, false, false]);
        assert!(matches!(
            evaluation.diagnostics.as_slice(),
            [Diagnostic::TypeMismatch { mismatched: 2, .. }]
        ));
    }

    #[test]
    fn unreadable_score_column_leaves_siblings_alone() {
        let ds = Dataset::from_rows(
            vec!["name".into(), "score".into()],
            vec![
                vec![CellValue::Text("Ayşe".into()), CellValue::Text("85".into())],
                vec![CellValue::Text("Ali".into()), CellValue::Text("high".into())],
            ],
        )
        .unwrap();
        let high = Criterion::numeric("score", NumericCondition::GreaterThan(80.0)).unwrap();

        let alone = serial().evaluate(&ds, &FilterGroup::and([high.clone().into()]));
        assert_eq!(alone.mask.into_vec(), vec![false, false]);
        assert_eq!(
            alone.diagnostics,
            vec![Diagnostic::TypeMismatch {
                criterion: high.to_string(),
                column: "score".into(),
                expected: SemanticType::Numeric,
                mismatched: 1,
            }]
        );

        let either = serial().evaluate(&ds, &FilterGroup::or([high.into(), name_starts("Al")]));
        assert_eq!(either.mask.into_vec(), vec![false, true]);
    }

    #[test]
    fn text_criterion_on_numbers_is_a_mismatch() {
        let starts = Criterion::text("age", TextCondition::StartsWith("3".into()), false).unwrap();
        let evaluation = serial().evaluate(&people(), &FilterGroup::and([starts.into()]));
        assert_eq!(evaluation.mask.selected_count(), 0);
        assert!(matches!(
            evaluation.diagnostics.as_slice(),
            [Diagnostic::TypeMismatch {
                expected: SemanticType::Text,
                mismatched: 3,
                ..
            }]
        ));
    }

    #[test]
    fn configured_tokens_reach_uncoerced_cells() {
        let ds = Dataset::new(vec![Column::new(
            "remote",
            vec![CellValue::Text("ja".into()), CellValue::Text("nein".into())],
        )])
        .unwrap();
        let group = FilterGroup::and([Criterion::boolean("remote", BooleanCondition::IsTrue).into()]);

        let defaults = serial().evaluate(&ds, &group);
        assert_eq!(defaults.mask.selected_count(), 0);
        assert_eq!(defaults.diagnostics.len(), 1);

        let german = serial().with_parsing(InferenceConfig {
            true_tokens: vec!["ja".into()],
            false_tokens: vec!["nein".into()],
            ..InferenceConfig::default()
        });
        let evaluation = german.evaluate(&ds, &group);
        assert_eq!(evaluation.mask.into_vec(), vec![true, false]);
        assert!(evaluation.diagnostics.is_empty());
    }

    #[test]
    fn empty_dataset_gives_empty_mask() {
        let group = FilterGroup::and([age_between(0.0, 1.0)]);
        let evaluation = FilterEngine::default().evaluate(&Dataset::default(), &group);
        assert!(evaluation.mask.is_empty());
    }

    #[test]
    fn cancellation_discards_partial_work() {
        let token = CancellationToken::new();
        let handle = token.clone();
        let mut reports = Vec::new();
        let mut control = EvaluationControl::new(token).with_progress(|p| {
            reports.push(p.rows_done);
            handle.cancel();
        });
        let result = serial().evaluate_with(&people(), &FilterGroup::and([name_starts("A")]), &mut control);
        drop(control);

        assert_eq!(
            result,
            Err(Cancelled {
                rows_done: 2,
                rows_total: 3
            })
        );
        assert_eq!(reports, vec![2]);
    }

    #[test]
    fn progress_reaches_row_total() {
        let mut last = None;
        let mut control = EvaluationControl::default().with_progress(|p| last = Some(p));
        let evaluation = serial()
            .evaluate_with(&people(), &FilterGroup::default(), &mut control)
            .unwrap();
        drop(control);
        assert_eq!(evaluation.mask.selected_count(), 3);
        assert_eq!(
            last,
            Some(Progress {
                rows_done: 3,
                rows_total: 3
            })
        );
    }
}
