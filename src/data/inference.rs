//! Column type inference and typed coercion.
//!
//! Each column is classified from a sample of its non-missing values. Types are
//! tried in the order Boolean → Numeric → Date; the first one whose parse
//! success ratio reaches [`InferenceConfig::success_threshold`] wins, anything
//! else is Text. Boolean and numeric spellings (`"1"`, `"true"`) are valid text
//! and sometimes valid dates, so the narrower types go first.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

use super::descriptor::{ColumnDescriptor, SampleStats, SemanticType};
use super::model::{CellValue, Column, Dataset};
use crate::config::InferenceConfig;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Describe every column, in dataset column order. Never fails: columns that
/// fit no richer type are Text, all-missing columns are Unknown.
pub fn infer(dataset: &Dataset, config: &InferenceConfig) -> Vec<ColumnDescriptor> {
    dataset
        .columns()
        .iter()
        .map(|column| describe_column(column, config))
        .collect()
}

/// Convert raw text cells into the semantic type inferred for their column.
///
/// Cells that do not parse keep their original text; the filter engine reports
/// such a column as a type mismatch instead of silently dropping the data.
/// Text columns end up with text cells only.
pub fn apply_types(
    dataset: &Dataset,
    descriptors: &[ColumnDescriptor],
    config: &InferenceConfig,
) -> Dataset {
    dataset.map_columns(|column| {
        let semantic_type = descriptors
            .iter()
            .find(|d| d.name() == column.name)
            .map(ColumnDescriptor::semantic_type)
            .unwrap_or(SemanticType::Unknown);
        column
            .values
            .iter()
            .map(|value| coerce(value, semantic_type, config))
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Token parsers (shared with criterion operand parsing)
// ---------------------------------------------------------------------------

/// Boolean spelling per the configured token lists, case-insensitive.
pub fn parse_bool(token: &str, config: &InferenceConfig) -> Option<bool> {
    let token = token.trim().to_lowercase();
    if config.true_tokens.iter().any(|t| t.to_lowercase() == token) {
        Some(true)
    } else if config.false_tokens.iter().any(|t| t.to_lowercase() == token) {
        Some(false)
    } else {
        None
    }
}

/// Finite number. Strict `.` decimal unless locale separators are enabled.
pub fn parse_number(token: &str, config: &InferenceConfig) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    let parsed = if config.locale_numbers {
        let normalized: String = token
            .chars()
            .filter(|&c| c != config.thousands_separator)
            .map(|c| if c == config.decimal_separator { '.' } else { c })
            .collect();
        normalized.parse::<f64>()
    } else {
        token.parse::<f64>()
    };
    parsed.ok().filter(|v| v.is_finite())
}

/// First matching layout wins; no match means "not a date".
pub fn parse_date<S: AsRef<str>>(token: &str, formats: &[S]) -> Option<NaiveDateTime> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    formats.iter().find_map(|format| {
        let format = format.as_ref();
        NaiveDateTime::parse_from_str(token, format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(token, format)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
    })
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn describe_column(column: &Column, config: &InferenceConfig) -> ColumnDescriptor {
    let present: Vec<&CellValue> = column.values.iter().filter(|v| !v.is_missing()).collect();
    let null_count = column.len() - present.len();
    let semantic_type = classify(&sample(&present, config.sample_size), config);
    let (stats, unique_values) = summarize(&present, semantic_type, config);

    debug!(
        "column '{}': {} ({} of {} missing)",
        column.name,
        semantic_type,
        null_count,
        column.len()
    );

    ColumnDescriptor::new(
        column.name.clone(),
        semantic_type,
        null_count,
        column.len(),
        stats,
        unique_values,
    )
}

/// Evenly spaced sample so large columns stay cheap to classify.
fn sample<'a>(present: &[&'a CellValue], size: usize) -> Vec<&'a CellValue> {
    if size == 0 || present.len() <= size {
        return present.to_vec();
    }
    (0..size)
        .map(|i| present[i * present.len() / size])
        .collect()
}

fn classify(sample: &[&CellValue], config: &InferenceConfig) -> SemanticType {
    if sample.is_empty() {
        return SemanticType::Unknown;
    }
    let clears_threshold = |parses: &dyn Fn(&CellValue) -> bool| {
        let ok = sample.iter().filter(|v| parses(v)).count();
        ok as f64 / sample.len() as f64 >= config.success_threshold
    };

    if clears_threshold(&|v| read_bool(v, config).is_some()) {
        SemanticType::Boolean
    } else if clears_threshold(&|v| read_number(v, config).is_some()) {
        SemanticType::Numeric
    } else if clears_threshold(&|v| read_date(v, config).is_some()) {
        SemanticType::Date
    } else {
        SemanticType::Text
    }
}

fn read_bool(value: &CellValue, config: &InferenceConfig) -> Option<bool> {
    match value {
        CellValue::Bool(b) => Some(*b),
        CellValue::Integer(0) => Some(false),
        CellValue::Integer(1) => Some(true),
        CellValue::Text(s) => parse_bool(s, config),
        _ => None,
    }
}

fn read_number(value: &CellValue, config: &InferenceConfig) -> Option<f64> {
    match value {
        CellValue::Text(s) => parse_number(s, config),
        other => other.as_f64(),
    }
}

fn read_date(value: &CellValue, config: &InferenceConfig) -> Option<NaiveDateTime> {
    match value {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => parse_date(s, &config.date_formats),
        _ => None,
    }
}

fn summarize(
    present: &[&CellValue],
    semantic_type: SemanticType,
    config: &InferenceConfig,
) -> (SampleStats, Vec<String>) {
    match semantic_type {
        SemanticType::Numeric => {
            let stats = present
                .iter()
                .filter_map(|v| read_number(v, config))
                .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                })
                .map(|(min, max)| SampleStats::Numeric { min, max })
                .unwrap_or(SampleStats::None);
            (stats, Vec::new())
        }
        SemanticType::Date => {
            let dates: Vec<NaiveDateTime> =
                present.iter().filter_map(|v| read_date(v, config)).collect();
            let stats = match (dates.iter().min(), dates.iter().max()) {
                (Some(&min), Some(&max)) => SampleStats::Date { min, max },
                _ => SampleStats::None,
            };
            (stats, Vec::new())
        }
        SemanticType::Boolean => {
            let distinct: BTreeSet<bool> =
                present.iter().filter_map(|v| read_bool(v, config)).collect();
            distinct_summary(distinct.into_iter().map(|b| b.to_string()), config)
        }
        SemanticType::Text => distinct_summary(
            present
                .iter()
                .filter_map(|v| v.as_text().map(|t| t.into_owned())),
            config,
        ),
        SemanticType::Unknown => (SampleStats::None, Vec::new()),
    }
}

fn distinct_summary(
    values: impl Iterator<Item = String>,
    config: &InferenceConfig,
) -> (SampleStats, Vec<String>) {
    let distinct: BTreeSet<String> = values.collect();
    let count = distinct.len();
    let unique = distinct.into_iter().take(config.max_unique_values).collect();
    (SampleStats::Distinct { count }, unique)
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

fn coerce(value: &CellValue, semantic_type: SemanticType, config: &InferenceConfig) -> CellValue {
    match (semantic_type, value) {
        (SemanticType::Numeric, CellValue::Text(s)) => parse_number(s, config)
            .map(number_cell)
            .unwrap_or_else(|| value.clone()),
        (SemanticType::Boolean, CellValue::Text(_) | CellValue::Integer(_)) => read_bool(value, config)
            .map(CellValue::Bool)
            .unwrap_or_else(|| value.clone()),
        (SemanticType::Date, CellValue::Text(s)) => parse_date(s, &config.date_formats)
            .map(CellValue::Date)
            .unwrap_or_else(|| value.clone()),
        (SemanticType::Text, CellValue::Text(_)) => value.clone(),
        (SemanticType::Text, _) => value
            .as_text()
            .map(|s| CellValue::Text(s.into_owned()))
            .unwrap_or(CellValue::Null),
        _ => value.clone(),
    }
}

/// Whole numbers within the exactly representable range become integers.
pub(crate) fn number_cell(v: f64) -> CellValue {
    const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if v.fract() == 0.0 && v.abs() <= EXACT {
        CellValue::Integer(v as i64)
    } else {
        CellValue::Float(v)
    }
}
