use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Date and date-time layouts tried, in order, when reading text as a date.
/// Day-first layouts come before month-first ones, so `03-04-2023` reads as 3 April.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%m.%d.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

pub const DEFAULT_TRUE_TOKENS: &[&str] = &["true", "yes", "evet", "1"];
pub const DEFAULT_FALSE_TOKENS: &[&str] = &["false", "no", "hayır", "0"];

// ---------------------------------------------------------------------------
// Column type inference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Share of sampled values that must parse for a type to win.
    pub success_threshold: f64,
    /// Columns with more non-missing values than this are sampled at even strides.
    pub sample_size: usize,
    pub date_formats: Vec<String>,
    /// Accept locale separators (e.g. `1.234,5`) when reading numbers.
    pub locale_numbers: bool,
    pub thousands_separator: char,
    pub decimal_separator: char,
    pub true_tokens: Vec<String>,
    pub false_tokens: Vec<String>,
    /// Cap on the distinct values kept per text/boolean descriptor.
    pub max_unique_values: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            success_threshold: 0.95,
            sample_size: 1000,
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            locale_numbers: false,
            thousands_separator: '.',
            decimal_separator: ',',
            true_tokens: DEFAULT_TRUE_TOKENS.iter().map(|t| t.to_string()).collect(),
            false_tokens: DEFAULT_FALSE_TOKENS.iter().map(|t| t.to_string()).collect(),
            max_unique_values: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Text matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Collapse whitespace runs and trim both sides before comparing text.
    pub normalize_whitespace: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows evaluated between cancellation checks and progress reports.
    pub chunk_size: usize,
    /// Evaluate sibling filter nodes on the rayon pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 65_536,
            parallel: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Where the last used filter set is stored. `None` uses the per-user default.
    pub path: Option<PathBuf>,
}

impl PersistenceConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_filter_path)
    }
}

/// `~/.candidate-filter/last_filters.json`, falling back to the working directory.
pub fn default_filter_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".candidate-filter")
        .join("last_filters.json")
}

// ---------------------------------------------------------------------------
// Settings – everything above, loadable from one JSON file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inference: InferenceConfig,
    pub matching: MatchConfig,
    pub engine: EngineConfig,
    pub persistence: PersistenceConfig,
}

impl Settings {
    /// Read settings from a JSON file. Absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }
}
