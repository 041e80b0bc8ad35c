//! Single filter rules: column + type-scoped operator + operand(s).
//!
//! Each semantic type has its own closed condition enum, so a criterion can
//! only hold an operator that is valid for its column type. Free-form input
//! (persisted documents, UIs) goes through [`Criterion::parse`], which rejects
//! invalid operators and malformed operands up front.

use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};

use super::error::CriterionError;
use crate::config::{InferenceConfig, MatchConfig};
use crate::data::descriptor::SemanticType;
use crate::data::inference::{parse_bool, parse_date, parse_number};
use crate::data::model::CellValue;

// ---------------------------------------------------------------------------
// Operator tokens per semantic type
// ---------------------------------------------------------------------------

const NUMERIC_OPERATORS: &[&str] = &[
    "Equals",
    "NotEquals",
    "GreaterThan",
    "LessThan",
    "GreaterOrEqual",
    "LessOrEqual",
    "Between",
    "NotBetween",
    "IsMissing",
    "IsPresent",
];
const TEXT_OPERATORS: &[&str] = &[
    "Equals",
    "NotEquals",
    "Contains",
    "NotContains",
    "StartsWith",
    "EndsWith",
    "Matches",
    "InList",
    "NotInList",
    "IsMissing",
    "IsPresent",
];
const DATE_OPERATORS: &[&str] = &[
    "Before",
    "After",
    "OnExactDate",
    "Between",
    "NotBetween",
    "IsMissing",
    "IsPresent",
];
const BOOLEAN_OPERATORS: &[&str] = &["IsTrue", "IsFalse", "IsMissing", "IsPresent"];
const PRESENCE_OPERATORS: &[&str] = &["IsMissing", "IsPresent"];

/// Operator tokens accepted for a column of the given type.
pub fn operators_for(semantic_type: SemanticType) -> &'static [&'static str] {
    match semantic_type {
        SemanticType::Numeric => NUMERIC_OPERATORS,
        SemanticType::Text => TEXT_OPERATORS,
        SemanticType::Date => DATE_OPERATORS,
        SemanticType::Boolean => BOOLEAN_OPERATORS,
        SemanticType::Unknown => PRESENCE_OPERATORS,
    }
}

/// Whether `token` names an operator of any semantic type.
pub fn is_known_operator(token: &str) -> bool {
    SemanticType::ALL
        .into_iter()
        .any(|t| operators_for(t).contains(&token))
}

// ---------------------------------------------------------------------------
// Operand – a loosely typed literal as supplied by a caller or document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Operand {
    fn to_number(&self, parsing: &InferenceConfig) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Operand::Text(s) => parse_number(s, parsing),
            Operand::Date(_) => None,
        }
    }

    fn to_date(&self, parsing: &InferenceConfig) -> Option<NaiveDate> {
        match self {
            Operand::Date(d) => Some(*d),
            Operand::Text(s) => parse_date(s, &parsing.date_formats).map(|dt| dt.date()),
            Operand::Number(_) => None,
        }
    }

    fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(n) => write!(f, "{n}"),
            Operand::Text(s) => f.write_str(s),
            Operand::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self {
        Operand::Number(n)
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Number(n as f64)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Text(s.to_string())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Text(s)
    }
}

impl From<NaiveDate> for Operand {
    fn from(d: NaiveDate) -> Self {
        Operand::Date(d)
    }
}

// ---------------------------------------------------------------------------
// Conditions – operator and typed operands together
// ---------------------------------------------------------------------------

/// Ranges are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericCondition {
    Equals(f64),
    NotEquals(f64),
    GreaterThan(f64),
    LessThan(f64),
    GreaterOrEqual(f64),
    LessOrEqual(f64),
    Between(f64, f64),
    NotBetween(f64, f64),
}

impl NumericCondition {
    fn test(self, v: f64) -> bool {
        match self {
            NumericCondition::Equals(x) => v == x,
            NumericCondition::NotEquals(x) => v != x,
            NumericCondition::GreaterThan(x) => v > x,
            NumericCondition::LessThan(x) => v < x,
            NumericCondition::GreaterOrEqual(x) => v >= x,
            NumericCondition::LessOrEqual(x) => v <= x,
            NumericCondition::Between(lo, hi) => lo <= v && v <= hi,
            NumericCondition::NotBetween(lo, hi) => v < lo || v > hi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCondition {
    Equals(String),
    NotEquals(String),
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    /// Regular expression, found anywhere in the value.
    Matches(String),
    InList(Vec<String>),
    NotInList(Vec<String>),
}

impl TextCondition {
    fn needles(&self) -> Vec<&str> {
        match self {
            TextCondition::Equals(s)
            | TextCondition::NotEquals(s)
            | TextCondition::Contains(s)
            | TextCondition::NotContains(s)
            | TextCondition::StartsWith(s)
            | TextCondition::EndsWith(s)
            | TextCondition::Matches(s) => vec![s.as_str()],
            TextCondition::InList(items) | TextCondition::NotInList(items) => {
                items.iter().map(String::as_str).collect()
            }
        }
    }
}

/// Compared by calendar day; ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCondition {
    Before(NaiveDate),
    After(NaiveDate),
    OnExactDate(NaiveDate),
    Between(NaiveDate, NaiveDate),
    NotBetween(NaiveDate, NaiveDate),
}

impl DateCondition {
    fn test(self, d: NaiveDate) -> bool {
        match self {
            DateCondition::Before(x) => d < x,
            DateCondition::After(x) => d > x,
            DateCondition::OnExactDate(x) => d == x,
            DateCondition::Between(lo, hi) => lo <= d && d <= hi,
            DateCondition::NotBetween(lo, hi) => d < lo || d > hi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanCondition {
    IsTrue,
    IsFalse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Numeric(NumericCondition),
    Text {
        condition: TextCondition,
        case_sensitive: bool,
    },
    Date(DateCondition),
    Boolean(BooleanCondition),
    /// The only condition satisfied by a missing cell.
    IsMissing,
    IsPresent,
}

impl Condition {
    /// Operator token, as listed by [`operators_for`].
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Numeric(c) => match c {
                NumericCondition::Equals(_) => "Equals",
                NumericCondition::NotEquals(_) => "NotEquals",
                NumericCondition::GreaterThan(_) => "GreaterThan",
                NumericCondition::LessThan(_) => "LessThan",
                NumericCondition::GreaterOrEqual(_) => "GreaterOrEqual",
                NumericCondition::LessOrEqual(_) => "LessOrEqual",
                NumericCondition::Between(..) => "Between",
                NumericCondition::NotBetween(..) => "NotBetween",
            },
            Condition::Text { condition, .. } => match condition {
                TextCondition::Equals(_) => "Equals",
                TextCondition::NotEquals(_) => "NotEquals",
                TextCondition::Contains(_) => "Contains",
                TextCondition::NotContains(_) => "NotContains",
                TextCondition::StartsWith(_) => "StartsWith",
                TextCondition::EndsWith(_) => "EndsWith",
                TextCondition::Matches(_) => "Matches",
                TextCondition::InList(_) => "InList",
                TextCondition::NotInList(_) => "NotInList",
            },
            Condition::Date(c) => match c {
                DateCondition::Before(_) => "Before",
                DateCondition::After(_) => "After",
                DateCondition::OnExactDate(_) => "OnExactDate",
                DateCondition::Between(..) => "Between",
                DateCondition::NotBetween(..) => "NotBetween",
            },
            Condition::Boolean(BooleanCondition::IsTrue) => "IsTrue",
            Condition::Boolean(BooleanCondition::IsFalse) => "IsFalse",
            Condition::IsMissing => "IsMissing",
            Condition::IsPresent => "IsPresent",
        }
    }

    /// Operands in positional order.
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Condition::Numeric(c) => match *c {
                NumericCondition::Equals(x)
                | NumericCondition::NotEquals(x)
                | NumericCondition::GreaterThan(x)
                | NumericCondition::LessThan(x)
                | NumericCondition::GreaterOrEqual(x)
                | NumericCondition::LessOrEqual(x) => vec![Operand::Number(x)],
                NumericCondition::Between(lo, hi) | NumericCondition::NotBetween(lo, hi) => {
                    vec![Operand::Number(lo), Operand::Number(hi)]
                }
            },
            Condition::Text { condition, .. } => condition
                .needles()
                .into_iter()
                .map(Operand::from)
                .collect(),
            Condition::Date(c) => match *c {
                DateCondition::Before(d) | DateCondition::After(d) | DateCondition::OnExactDate(d) => {
                    vec![Operand::Date(d)]
                }
                DateCondition::Between(lo, hi) | DateCondition::NotBetween(lo, hi) => {
                    vec![Operand::Date(lo), Operand::Date(hi)]
                }
            },
            Condition::Boolean(_) | Condition::IsMissing | Condition::IsPresent => Vec::new(),
        }
    }

    fn allowed_for(&self, semantic_type: SemanticType) -> bool {
        match self {
            Condition::IsMissing | Condition::IsPresent => true,
            Condition::Numeric(_) => semantic_type == SemanticType::Numeric,
            Condition::Text { .. } => semantic_type == SemanticType::Text,
            Condition::Date(_) => semantic_type == SemanticType::Date,
            Condition::Boolean(_) => semantic_type == SemanticType::Boolean,
        }
    }
}

// ---------------------------------------------------------------------------
// Criterion
// ---------------------------------------------------------------------------

/// A validated filter rule. Columns are referenced by name, so a criterion
/// may outlive the dataset it was built against.
#[derive(Debug, Clone)]
pub struct Criterion {
    column: String,
    semantic_type: SemanticType,
    condition: Condition,
    pattern: Option<Regex>,
}

impl PartialEq for Criterion {
    fn eq(&self, other: &Self) -> bool {
        self.column == other.column
            && self.semantic_type == other.semantic_type
            && self.condition == other.condition
    }
}

impl Criterion {
    /// Validate `condition` against the column type and its operands.
    pub fn new(
        column: impl Into<String>,
        semantic_type: SemanticType,
        condition: Condition,
    ) -> Result<Self, CriterionError> {
        let column = column.into();
        if !condition.allowed_for(semantic_type) {
            return Err(CriterionError::OperatorNotAllowed {
                column,
                operator: condition.operator().to_string(),
                semantic_type,
            });
        }
        validate_operands(&column, &condition)?;
        let pattern = compile_pattern(&column, &condition)?;

        Ok(Self {
            column,
            semantic_type,
            condition,
            pattern,
        })
    }

    pub fn numeric(column: impl Into<String>, condition: NumericCondition) -> Result<Self, CriterionError> {
        Self::new(column, SemanticType::Numeric, Condition::Numeric(condition))
    }

    pub fn text(
        column: impl Into<String>,
        condition: TextCondition,
        case_sensitive: bool,
    ) -> Result<Self, CriterionError> {
        Self::new(
            column,
            SemanticType::Text,
            Condition::Text {
                condition,
                case_sensitive,
            },
        )
    }

    pub fn date(column: impl Into<String>, condition: DateCondition) -> Result<Self, CriterionError> {
        Self::new(column, SemanticType::Date, Condition::Date(condition))
    }

    pub fn boolean(column: impl Into<String>, condition: BooleanCondition) -> Self {
        Self {
            column: column.into(),
            semantic_type: SemanticType::Boolean,
            condition: Condition::Boolean(condition),
            pattern: None,
        }
    }

    pub fn is_missing(column: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            column: column.into(),
            semantic_type,
            condition: Condition::IsMissing,
            pattern: None,
        }
    }

    pub fn is_present(column: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            column: column.into(),
            semantic_type,
            condition: Condition::IsPresent,
            pattern: None,
        }
    }

    /// Build from an operator token and loosely typed operands.
    ///
    /// `case_sensitive` only affects text operators. Text operands are read
    /// with the default number and date layouts; see [`Criterion::parse_with`].
    pub fn parse(
        column: impl Into<String>,
        semantic_type: SemanticType,
        operator: &str,
        operands: &[Operand],
        case_sensitive: bool,
    ) -> Result<Self, CriterionError> {
        Self::parse_with(
            column,
            semantic_type,
            operator,
            operands,
            case_sensitive,
            &InferenceConfig::default(),
        )
    }

    /// [`Criterion::parse`] reading text operands with the given parsing rules.
    pub fn parse_with(
        column: impl Into<String>,
        semantic_type: SemanticType,
        operator: &str,
        operands: &[Operand],
        case_sensitive: bool,
        parsing: &InferenceConfig,
    ) -> Result<Self, CriterionError> {
        let column = column.into();
        if !is_known_operator(operator) {
            return Err(CriterionError::UnknownOperator {
                column,
                operator: operator.to_string(),
            });
        }
        if !operators_for(semantic_type).contains(&operator) {
            return Err(CriterionError::OperatorNotAllowed {
                column,
                operator: operator.to_string(),
                semantic_type,
            });
        }

        let args = OperandReader {
            column: &column,
            operator,
            operands,
            parsing,
        };
        let condition = match (semantic_type, operator) {
            (_, "IsMissing") => {
                args.expect_count(0)?;
                Condition::IsMissing
            }
            (_, "IsPresent") => {
                args.expect_count(0)?;
                Condition::IsPresent
            }
            (SemanticType::Numeric, _) => Condition::Numeric(args.numeric()?),
            (SemanticType::Text, _) => Condition::Text {
                condition: args.text()?,
                case_sensitive,
            },
            (SemanticType::Date, _) => Condition::Date(args.date()?),
            (SemanticType::Boolean, op) => {
                args.expect_count(0)?;
                Condition::Boolean(if op == "IsTrue" {
                    BooleanCondition::IsTrue
                } else {
                    BooleanCondition::IsFalse
                })
            }
            (SemanticType::Unknown, _) => return Err(args.not_allowed(semantic_type)),
        };

        Self::new(column, semantic_type, condition)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.semantic_type
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn operator(&self) -> &'static str {
        self.condition.operator()
    }

    pub fn operands(&self) -> Vec<Operand> {
        self.condition.operands()
    }

    /// Case sensitivity of a text criterion; `false` for other types.
    pub fn case_sensitive(&self) -> bool {
        matches!(
            self.condition,
            Condition::Text {
                case_sensitive: true,
                ..
            }
        )
    }

    /// Evaluate a single cell. For whole columns build a [`Matcher`] once.
    pub fn matches(
        &self,
        value: &CellValue,
        config: &MatchConfig,
        parsing: &InferenceConfig,
    ) -> Outcome {
        self.matcher(config, parsing).test(value)
    }

    /// Prepared form of this criterion with text operands folded once.
    /// `parsing` decides how text cells read as numbers, dates and booleans.
    pub fn matcher<'a>(
        &'a self,
        config: &MatchConfig,
        parsing: &'a InferenceConfig,
    ) -> Matcher<'a> {
        Matcher::new(self, config, parsing)
    }
}

fn validate_operands(column: &str, condition: &Condition) -> Result<(), CriterionError> {
    let malformed = |value: f64| CriterionError::MalformedOperand {
        column: column.to_string(),
        operand: value.to_string(),
        expected: "number",
    };
    match condition {
        Condition::Numeric(c) => {
            let operands = condition.operands();
            if let Some(bad) = operands
                .iter()
                .filter_map(|o| match o {
                    Operand::Number(n) => Some(*n),
                    _ => None,
                })
                .find(|n| !n.is_finite())
            {
                return Err(malformed(bad));
            }
            if let NumericCondition::Between(lo, hi) | NumericCondition::NotBetween(lo, hi) = *c {
                if lo > hi {
                    return Err(CriterionError::InvertedRange {
                        column: column.to_string(),
                        low: lo.to_string(),
                        high: hi.to_string(),
                    });
                }
            }
        }
        Condition::Date(DateCondition::Between(lo, hi) | DateCondition::NotBetween(lo, hi)) => {
            if lo > hi {
                return Err(CriterionError::InvertedRange {
                    column: column.to_string(),
                    low: lo.to_string(),
                    high: hi.to_string(),
                });
            }
        }
        Condition::Text {
            condition: TextCondition::InList(items) | TextCondition::NotInList(items),
            ..
        } if items.is_empty() => {
            return Err(CriterionError::WrongOperandCount {
                column: column.to_string(),
                operator: condition.operator().to_string(),
                expected: "at least 1",
                found: 0,
            });
        }
        _ => {}
    }
    Ok(())
}

fn compile_pattern(column: &str, condition: &Condition) -> Result<Option<Regex>, CriterionError> {
    match condition {
        Condition::Text {
            condition: TextCondition::Matches(pattern),
            case_sensitive,
        } => RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map(Some)
            .map_err(|err| CriterionError::InvalidPattern {
                column: column.to_string(),
                pattern: pattern.clone(),
                reason: err.to_string(),
            }),
        _ => Ok(None),
    }
}

/// Positional operand access with errors naming the criterion.
struct OperandReader<'a> {
    column: &'a str,
    operator: &'a str,
    operands: &'a [Operand],
    parsing: &'a InferenceConfig,
}

impl OperandReader<'_> {
    fn expect_count(&self, expected: usize) -> Result<(), CriterionError> {
        if self.operands.len() == expected {
            return Ok(());
        }
        Err(CriterionError::WrongOperandCount {
            column: self.column.to_string(),
            operator: self.operator.to_string(),
            expected: match expected {
                0 => "0",
                1 => "1",
                _ => "2",
            },
            found: self.operands.len(),
        })
    }

    fn malformed(&self, operand: &Operand, expected: &'static str) -> CriterionError {
        CriterionError::MalformedOperand {
            column: self.column.to_string(),
            operand: operand.to_string(),
            expected,
        }
    }

    fn not_allowed(&self, semantic_type: SemanticType) -> CriterionError {
        CriterionError::OperatorNotAllowed {
            column: self.column.to_string(),
            operator: self.operator.to_string(),
            semantic_type,
        }
    }

    fn number(&self, index: usize) -> Result<f64, CriterionError> {
        let operand = &self.operands[index];
        operand
            .to_number(self.parsing)
            .ok_or_else(|| self.malformed(operand, "number"))
    }

    fn day(&self, index: usize) -> Result<NaiveDate, CriterionError> {
        let operand = &self.operands[index];
        operand
            .to_date(self.parsing)
            .ok_or_else(|| self.malformed(operand, "date"))
    }

    fn numeric(&self) -> Result<NumericCondition, CriterionError> {
        if matches!(self.operator, "Between" | "NotBetween") {
            self.expect_count(2)?;
            let (lo, hi) = (self.number(0)?, self.number(1)?);
            return Ok(if self.operator == "Between" {
                NumericCondition::Between(lo, hi)
            } else {
                NumericCondition::NotBetween(lo, hi)
            });
        }
        self.expect_count(1)?;
        let x = self.number(0)?;
        Ok(match self.operator {
            "Equals" => NumericCondition::Equals(x),
            "NotEquals" => NumericCondition::NotEquals(x),
            "GreaterThan" => NumericCondition::GreaterThan(x),
            "LessThan" => NumericCondition::LessThan(x),
            "GreaterOrEqual" => NumericCondition::GreaterOrEqual(x),
            "LessOrEqual" => NumericCondition::LessOrEqual(x),
            _ => return Err(self.not_allowed(SemanticType::Numeric)),
        })
    }

    fn text(&self) -> Result<TextCondition, CriterionError> {
        if matches!(self.operator, "InList" | "NotInList") {
            let items: Vec<String> = self.operands.iter().map(Operand::to_text).collect();
            return Ok(if self.operator == "InList" {
                TextCondition::InList(items)
            } else {
                TextCondition::NotInList(items)
            });
        }
        self.expect_count(1)?;
        let s = self.operands[0].to_text();
        Ok(match self.operator {
            "Equals" => TextCondition::Equals(s),
            "NotEquals" => TextCondition::NotEquals(s),
            "Contains" => TextCondition::Contains(s),
            "NotContains" => TextCondition::NotContains(s),
            "StartsWith" => TextCondition::StartsWith(s),
            "EndsWith" => TextCondition::EndsWith(s),
            "Matches" => TextCondition::Matches(s),
            _ => return Err(self.not_allowed(SemanticType::Text)),
        })
    }

    fn date(&self) -> Result<DateCondition, CriterionError> {
        if matches!(self.operator, "Between" | "NotBetween") {
            self.expect_count(2)?;
            let (lo, hi) = (self.day(0)?, self.day(1)?);
            return Ok(if self.operator == "Between" {
                DateCondition::Between(lo, hi)
            } else {
                DateCondition::NotBetween(lo, hi)
            });
        }
        self.expect_count(1)?;
        let d = self.day(0)?;
        Ok(match self.operator {
            "Before" => DateCondition::Before(d),
            "After" => DateCondition::After(d),
            "OnExactDate" => DateCondition::OnExactDate(d),
            _ => return Err(self.not_allowed(SemanticType::Date)),
        })
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Result of testing one cell against one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Selected,
    Rejected,
    /// Cell is missing; excluded by every operator except `IsMissing`.
    Missing,
    /// Cell holds a value that cannot be read as the criterion's type.
    Mismatch,
}

impl Outcome {
    pub fn is_selected(self) -> bool {
        self == Outcome::Selected
    }

    fn from_bool(selected: bool) -> Self {
        if selected {
            Outcome::Selected
        } else {
            Outcome::Rejected
        }
    }
}

/// A criterion ready to test many cells: text operands are normalized once.
#[derive(Debug)]
pub struct Matcher<'a> {
    criterion: &'a Criterion,
    parsing: &'a InferenceConfig,
    normalize_whitespace: bool,
    case_sensitive: bool,
    needles: Vec<String>,
}

impl<'a> Matcher<'a> {
    fn new(criterion: &'a Criterion, config: &MatchConfig, parsing: &'a InferenceConfig) -> Self {
        let case_sensitive = criterion.case_sensitive();
        let mut matcher = Self {
            criterion,
            parsing,
            normalize_whitespace: config.normalize_whitespace,
            case_sensitive,
            needles: Vec::new(),
        };
        if let Condition::Text { condition, .. } = &criterion.condition {
            matcher.needles = condition
                .needles()
                .into_iter()
                .map(|n| matcher.fold(n).into_owned())
                .collect();
        }
        matcher
    }

    pub fn criterion(&self) -> &'a Criterion {
        self.criterion
    }

    pub fn test(&self, value: &CellValue) -> Outcome {
        match &self.criterion.condition {
            Condition::IsMissing => Outcome::from_bool(value.is_missing()),
            Condition::IsPresent => Outcome::from_bool(!value.is_missing()),
            _ if value.is_missing() => Outcome::Missing,
            Condition::Numeric(c) => match self.numeric_value(value) {
                Some(v) => Outcome::from_bool(c.test(v)),
                None => Outcome::Mismatch,
            },
            Condition::Date(c) => match self.date_value(value) {
                Some(d) => Outcome::from_bool(c.test(d)),
                None => Outcome::Mismatch,
            },
            Condition::Boolean(c) => match self.bool_value(value) {
                Some(b) => Outcome::from_bool(b == (*c == BooleanCondition::IsTrue)),
                None => Outcome::Mismatch,
            },
            Condition::Text { condition, .. } => match value {
                CellValue::Text(raw) => Outcome::from_bool(self.test_text(condition, raw)),
                _ => Outcome::Mismatch,
            },
        }
    }

    /// False when `value` is present but cannot be read as the criterion's type.
    pub fn reads(&self, value: &CellValue) -> bool {
        if value.is_missing() {
            return true;
        }
        match &self.criterion.condition {
            Condition::IsMissing | Condition::IsPresent => true,
            Condition::Numeric(_) => self.numeric_value(value).is_some(),
            Condition::Date(_) => self.date_value(value).is_some(),
            Condition::Boolean(_) => self.bool_value(value).is_some(),
            Condition::Text { .. } => matches!(value, CellValue::Text(_)),
        }
    }

    fn numeric_value(&self, value: &CellValue) -> Option<f64> {
        match value {
            CellValue::Text(s) => parse_number(s, self.parsing),
            other => other.as_f64(),
        }
    }

    fn date_value(&self, value: &CellValue) -> Option<NaiveDate> {
        match value {
            CellValue::Date(d) => Some(d.date()),
            CellValue::Text(s) => parse_date(s, &self.parsing.date_formats).map(|d| d.date()),
            _ => None,
        }
    }

    fn bool_value(&self, value: &CellValue) -> Option<bool> {
        match value {
            CellValue::Bool(b) => Some(*b),
            CellValue::Integer(0) => Some(false),
            CellValue::Integer(1) => Some(true),
            CellValue::Text(s) => parse_bool(s, self.parsing),
            _ => None,
        }
    }

    fn test_text(&self, condition: &TextCondition, raw: &str) -> bool {
        if let TextCondition::Matches(_) = condition {
            let haystack = self.normalize(raw);
            return self
                .criterion
                .pattern
                .as_ref()
                .is_some_and(|re| re.is_match(&haystack));
        }

        let haystack = self.fold(raw);
        let needle = self.needles.first().map(String::as_str).unwrap_or("");
        match condition {
            TextCondition::Equals(_) => haystack == needle,
            TextCondition::NotEquals(_) => haystack != needle,
            TextCondition::Contains(_) => haystack.contains(needle),
            TextCondition::NotContains(_) => !haystack.contains(needle),
            TextCondition::StartsWith(_) => haystack.starts_with(needle),
            TextCondition::EndsWith(_) => haystack.ends_with(needle),
            TextCondition::InList(_) => self.needles.iter().any(|n| *n == haystack),
            TextCondition::NotInList(_) => !self.needles.iter().any(|n| *n == haystack),
            TextCondition::Matches(_) => false,
        }
    }

    fn normalize<'s>(&self, s: &'s str) -> Cow<'s, str> {
        if self.normalize_whitespace {
            Cow::Owned(s.split_whitespace().collect::<Vec<_>>().join(" "))
        } else {
            Cow::Borrowed(s)
        }
    }

    fn fold<'s>(&self, s: &'s str) -> Cow<'s, str> {
        let normalized = self.normalize(s);
        if self.case_sensitive {
            normalized
        } else {
            Cow::Owned(normalized.to_lowercase())
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col = &self.column;
        match &self.condition {
            Condition::Numeric(c) => match *c {
                NumericCondition::Equals(x) => write!(f, "{col} = {x}"),
                NumericCondition::NotEquals(x) => write!(f, "{col} != {x}"),
                NumericCondition::GreaterThan(x) => write!(f, "{col} > {x}"),
                NumericCondition::LessThan(x) => write!(f, "{col} < {x}"),
                NumericCondition::GreaterOrEqual(x) => write!(f, "{col} >= {x}"),
                NumericCondition::LessOrEqual(x) => write!(f, "{col} <= {x}"),
                NumericCondition::Between(lo, hi) => write!(f, "{col} between {lo} and {hi}"),
                NumericCondition::NotBetween(lo, hi) => {
                    write!(f, "{col} not between {lo} and {hi}")
                }
            },
            Condition::Text {
                condition,
                case_sensitive,
            } => {
                match condition {
                    TextCondition::Equals(s) => write!(f, "{col} equals {s:?}"),
                    TextCondition::NotEquals(s) => write!(f, "{col} not equals {s:?}"),
                    TextCondition::Contains(s) => write!(f, "{col} contains {s:?}"),
                    TextCondition::NotContains(s) => write!(f, "{col} not contains {s:?}"),
                    TextCondition::StartsWith(s) => write!(f, "{col} starts with {s:?}"),
                    TextCondition::EndsWith(s) => write!(f, "{col} ends with {s:?}"),
                    TextCondition::Matches(s) => write!(f, "{col} matches /{s}/"),
                    TextCondition::InList(items) => write!(f, "{col} in {items:?}"),
                    TextCondition::NotInList(items) => write!(f, "{col} not in {items:?}"),
                }?;
                if *case_sensitive {
                    write!(f, " (case-sensitive)")?;
                }
                Ok(())
            }
            Condition::Date(c) => match *c {
                DateCondition::Before(d) => write!(f, "{col} before {d}"),
                DateCondition::After(d) => write!(f, "{col} after {d}"),
                DateCondition::OnExactDate(d) => write!(f, "{col} on {d}"),
                DateCondition::Between(lo, hi) => write!(f, "{col} between {lo} and {hi}"),
                DateCondition::NotBetween(lo, hi) => write!(f, "{col} not between {lo} and {hi}"),
            },
            Condition::Boolean(BooleanCondition::IsTrue) => write!(f, "{col} is true"),
            Condition::Boolean(BooleanCondition::IsFalse) => write!(f, "{col} is false"),
            Condition::IsMissing => write!(f, "{col} is missing"),
            Condition::IsPresent => write!(f, "{col} is present"),
        }
    }
}
