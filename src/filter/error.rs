use std::path::PathBuf;

use thiserror::Error;

use crate::data::descriptor::SemanticType;

/// Raised while building a criterion; never deferred to evaluation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CriterionError {
    #[error("operator '{operator}' is not valid for {semantic_type} column '{column}'")]
    OperatorNotAllowed {
        column: String,
        operator: String,
        semantic_type: SemanticType,
    },
    #[error("unknown operator '{operator}' on column '{column}'")]
    UnknownOperator { column: String, operator: String },
    #[error("operator '{operator}' on column '{column}' takes {expected} operand(s), got {found}")]
    WrongOperandCount {
        column: String,
        operator: String,
        expected: &'static str,
        found: usize,
    },
    #[error("operand '{operand}' for column '{column}' is not a valid {expected}")]
    MalformedOperand {
        column: String,
        operand: String,
        expected: &'static str,
    },
    #[error("range on column '{column}' starts at {low}, after its end {high}")]
    InvertedRange {
        column: String,
        low: String,
        high: String,
    },
    #[error("invalid pattern '{pattern}' on column '{column}': {reason}")]
    InvalidPattern {
        column: String,
        pattern: String,
        reason: String,
    },
}

/// Hard failures reading or writing a persisted filter set.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("filter document is corrupt: {0}")]
    Corrupt(String),
    #[error("filter document has no version field")]
    MissingVersion,
    #[error("filter document version {found} is not supported (expected {supported})")]
    UnsupportedVersion { found: u64, supported: u32 },
    #[error("unknown operator '{operator}' on column '{column}'")]
    UnknownOperator { column: String, operator: String },
    #[error("unknown connective '{0}' (expected AND or OR)")]
    UnknownConnective(String),
    #[error("unknown column type '{value_type}' on column '{column}'")]
    UnknownType { column: String, value_type: String },
    #[error("invalid criterion: {0}")]
    InvalidCriterion(#[from] CriterionError),
    #[error("filter file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
