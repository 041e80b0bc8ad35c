//! Filter layer: criteria, groups, evaluation, and persistence.
//!
//! A [`FilterGroup`] tree is plain data. It is built and edited by the caller,
//! evaluated by a [`FilterEngine`], and saved with [`persistence`]. Nothing in
//! here holds the dataset or observes edits; callers re-evaluate after a change.

pub mod criterion;
pub mod engine;
pub mod error;
pub mod group;
pub mod persistence;

pub use criterion::{
    operators_for, BooleanCondition, Condition, Criterion, DateCondition, NumericCondition,
    Operand, Outcome, TextCondition,
};
pub use engine::{
    CancellationToken, Cancelled, Diagnostic, Evaluation, EvaluationControl, FilterEngine,
    Filtered, Progress,
};
pub use error::{CriterionError, PersistenceError};
pub use group::{Connective, FilterGroup, FilterNode};
pub use persistence::FilterStore;
