use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub series: SeriesConfig,
}

/// Where row data lives inside a raw widget and how batches are scheduled.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_primary_data_key")]
    pub primary_data_key: String,
    #[serde(default = "default_alternate_data_key")]
    pub alternate_data_key: String,
    /// Yield to the runtime before each file so progress stays observable.
    #[serde(default = "default_true")]
    pub yield_between_files: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            primary_data_key: default_primary_data_key(),
            alternate_data_key: default_alternate_data_key(),
            yield_between_files: true,
        }
    }
}

/// How a series is read: cumulative counters or per-day deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeOverride {
    #[default]
    Auto,
    Cumulative,
    Incremental,
}

/// Installation series selection and field inference.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesConfig {
    #[serde(default = "default_name_patterns")]
    pub name_patterns: Vec<String>,
    #[serde(default = "default_slug_patterns")]
    pub slug_patterns: Vec<String>,
    #[serde(default = "default_activation_category")]
    pub activation_category: String,
    #[serde(default = "default_date_fields")]
    pub date_fields: Vec<String>,
    #[serde(default = "default_value_fields")]
    pub value_fields: Vec<String>,
    #[serde(default = "default_accumulated_label_marker")]
    pub accumulated_label_marker: String,
    #[serde(default = "default_max_field_marker")]
    pub max_field_marker: String,
    #[serde(default)]
    pub shape: ShapeOverride,
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            name_patterns: default_name_patterns(),
            slug_patterns: default_slug_patterns(),
            activation_category: default_activation_category(),
            date_fields: default_date_fields(),
            value_fields: default_value_fields(),
            accumulated_label_marker: default_accumulated_label_marker(),
            max_field_marker: default_max_field_marker(),
            shape: ShapeOverride::default(),
            moving_average_window: default_moving_average_window(),
        }
    }
}

// Defaults
fn default_primary_data_key() -> String {
    "data".into()
}
fn default_alternate_data_key() -> String {
    "exampleData".into()
}
fn default_true() -> bool {
    true
}
fn default_name_patterns() -> Vec<String> {
    vec![
        "install".into(),
        "instalaç".into(),
        "instalac".into(),
        "activation".into(),
    ]
}
fn default_slug_patterns() -> Vec<String> {
    vec!["install".into(), "activation".into()]
}
fn default_activation_category() -> String {
    "activation".into()
}
fn default_date_fields() -> Vec<String> {
    ["createdAt", "date", "x", "time", "datetime", "day", "period"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_value_fields() -> Vec<String> {
    [
        "maxinstalls",
        "new_installs",
        "installs",
        "installation",
        "installations",
        "y",
        "value",
        "count",
        "total",
        "amount",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_accumulated_label_marker() -> String {
    "acumulad".into()
}
fn default_max_field_marker() -> String {
    "max".into()
}
fn default_moving_average_window() -> usize {
    7
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.primary_data_key.is_empty() || self.ingest.alternate_data_key.is_empty() {
            return Err(Error::config("ingest data keys must not be empty"));
        }
        if self.series.date_fields.is_empty() || self.series.value_fields.is_empty() {
            return Err(Error::config(
                "series.date_fields and series.value_fields must list at least one name",
            ));
        }
        if self.series.moving_average_window == 0 {
            return Err(Error::config("series.moving_average_window must be at least 1"));
        }
        Ok(())
    }
}
