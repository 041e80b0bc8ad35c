use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SemanticType – the logical type of a column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Numeric,
    Text,
    Date,
    Boolean,
    /// Column had no non-missing values to classify.
    Unknown,
}

impl SemanticType {
    pub const ALL: [SemanticType; 5] = [
        SemanticType::Numeric,
        SemanticType::Text,
        SemanticType::Date,
        SemanticType::Boolean,
        SemanticType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::Numeric => "numeric",
            SemanticType::Text => "text",
            SemanticType::Date => "date",
            SemanticType::Boolean => "boolean",
            SemanticType::Unknown => "unknown",
        }
    }

    /// Case-insensitive lookup of [`SemanticType::as_str`] names.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(token.trim()))
    }

    /// Operator tokens valid for columns of this type.
    pub fn operators(self) -> &'static [&'static str] {
        crate::filter::criterion::operators_for(self)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ColumnDescriptor – immutable per-column metadata
// ---------------------------------------------------------------------------

/// Type-dependent summary of a column's values.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleStats {
    Numeric { min: f64, max: f64 },
    Date { min: NaiveDateTime, max: NaiveDateTime },
    /// Distinct non-missing values (text and boolean columns).
    Distinct { count: usize },
    None,
}

/// Produced once per load by [`crate::data::inference::infer`]; read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    name: String,
    semantic_type: SemanticType,
    null_count: usize,
    total_count: usize,
    stats: SampleStats,
    unique_values: Vec<String>,
}

impl ColumnDescriptor {
    pub(crate) fn new(
        name: String,
        semantic_type: SemanticType,
        null_count: usize,
        total_count: usize,
        stats: SampleStats,
        unique_values: Vec<String>,
    ) -> Self {
        Self {
            name,
            semantic_type,
            null_count,
            total_count,
            stats,
            unique_values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.semantic_type
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Fraction of missing cells, in `[0, 1]`. Empty columns report 0.
    pub fn null_ratio(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.null_count as f64 / self.total_count as f64
        }
    }

    pub fn stats(&self) -> &SampleStats {
        &self.stats
    }

    /// Sorted distinct values for text/boolean columns, capped by configuration.
    pub fn unique_values(&self) -> &[String] {
        &self.unique_values
    }

    pub fn distinct_count(&self) -> Option<usize> {
        match self.stats {
            SampleStats::Distinct { count } => Some(count),
            _ => None,
        }
    }

    /// Text column with few enough distinct values to offer as a pick list.
    pub fn is_categorical(&self) -> bool {
        match (self.semantic_type, self.distinct_count()) {
            (SemanticType::Text, Some(count)) => {
                let limit = (self.total_count as f64 * 0.5).max(20.0);
                count as f64 <= limit
            }
            _ => false,
        }
    }

    /// `min - max` for numeric and date columns, `N/A` otherwise.
    pub fn display_range(&self) -> String {
        match &self.stats {
            SampleStats::Numeric { min, max } => format!("{min} - {max}"),
            SampleStats::Date { min, max } => {
                format!("{} - {}", min.format("%d.%m.%Y"), max.format("%d.%m.%Y"))
            }
            _ => "N/A".to_string(),
        }
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} {:<8} nulls {:>5.1}%  ",
            self.name,
            self.semantic_type,
            self.null_ratio() * 100.0
        )?;
        match &self.stats {
            SampleStats::Distinct { count } => write!(f, "distinct {count}"),
            SampleStats::None => write!(f, "-"),
            _ => write!(f, "range {}", self.display_range()),
        }
    }
}
