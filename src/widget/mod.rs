//! Canonical widget model produced by normalization and consumed everywhere else.

pub mod dedup;
pub mod normalize;

pub use dedup::{DuplicateEntry, DuplicateReason, DuplicateReport, filter_duplicates};
pub use normalize::{normalize, normalize_with};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    BigNumber,
    Bar,
    Pie,
    Area,
    Line,
    Table,
}

impl WidgetKind {
    /// Case-insensitive lookup of an export's `kind` tag.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "big_number" => Some(Self::BigNumber),
            "bar" => Some(Self::Bar),
            "pie" => Some(Self::Pie),
            "area" => Some(Self::Area),
            "line" => Some(Self::Line),
            "table" => Some(Self::Table),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigNumber => "big_number",
            Self::Bar => "bar",
            Self::Pie => "pie",
            Self::Area => "area",
            Self::Line => "line",
            Self::Table => "table",
        }
    }
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Always lowercase once normalized.
    pub name: Option<String>,
    pub slug: Option<String>,
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

/// One data row as it appeared in the export.
///
/// Table exports use `{ "columns": [{ "field", "value" }] }`, charts use flat
/// records. Anything else is kept verbatim in `Other`. A columnar row keeps
/// its source object in `raw`, so sibling keys and extra column attributes
/// survive serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Row {
    Columnar {
        columns: Vec<Column>,
        raw: Map<String, Value>,
    },
    Flat(Map<String, Value>),
    Other(Value),
}

impl Row {
    /// Reads a field from either row shape.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Columnar { columns, .. } => columns
                .iter()
                .find(|c| c.field == field)
                .map(|c| &c.value),
            Self::Flat(map) => map.get(field),
            Self::Other(_) => None,
        }
    }

    /// Field names in document order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Columnar { columns, .. } => columns.iter().map(|c| c.field.as_str()).collect(),
            Self::Flat(map) => map.keys().map(String::as_str).collect(),
            Self::Other(_) => Vec::new(),
        }
    }

    /// Cell values in document order.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Self::Columnar { columns, .. } => columns.iter().map(|c| &c.value).collect(),
            Self::Flat(map) => map.values().collect(),
            Self::Other(v) => vec![v],
        }
    }
}

fn columns_of(map: &Map<String, Value>) -> Option<Vec<Column>> {
    let Value::Array(items) = map.get("columns")? else {
        return None;
    };
    items
        .iter()
        .map(|item| {
            let obj = item.as_object()?;
            let field = obj.get("field")?.as_str()?.to_string();
            let value = obj.get("value").cloned().unwrap_or(Value::Null);
            Some(Column { field, value })
        })
        .collect()
}

impl From<Value> for Row {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => match columns_of(&map) {
                Some(columns) => Self::Columnar { columns, raw: map },
                None => Self::Flat(map),
            },
            other => Self::Other(other),
        }
    }
}

impl From<Row> for Value {
    fn from(row: Row) -> Self {
        match row {
            Row::Columnar { raw, .. } | Row::Flat(raw) => Value::Object(raw),
            Row::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    pub document_id: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub kind: WidgetKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    /// Axis labels, formats, colour rules, titles. Passed through untouched.
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default)]
    pub x_field: Option<String>,
    #[serde(default)]
    pub y_field: Option<String>,
}

impl Widget {
    /// Human-facing label: name, then slug, then id.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.slug.as_deref())
            .unwrap_or(&self.id)
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().and_then(|c| c.name.as_deref())
    }

    pub fn category_slug(&self) -> Option<&str> {
        self.category.as_ref().and_then(|c| c.slug.as_deref())
    }

    /// `config.yAxis` entries, whether the export wrote an array or a single object.
    pub fn y_axis(&self) -> Vec<&Value> {
        match self.config.get("yAxis") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(obj @ Value::Object(_)) => vec![obj],
            _ => Vec::new(),
        }
    }

    /// Field names declared by `config.yAxis[].field`.
    pub fn y_axis_fields(&self) -> Vec<String> {
        self.y_axis()
            .into_iter()
            .filter_map(|axis| axis.get("field").and_then(Value::as_str))
            .map(String::from)
            .collect()
    }
}
