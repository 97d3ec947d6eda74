//! Row filtering for keyword-tracking tables.

use crate::category::CategoryKind;
use crate::value::parse_number;
use crate::widget::{Row, Widget, WidgetKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSort {
    #[default]
    None,
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordFilter {
    /// Case-insensitive substring of the `keyword` column.
    pub search: String,
    /// Exact `competitivity` value; `None` keeps every row.
    pub competitivity: Option<String>,
    pub sort: PositionSort,
}

fn cell_text(row: &Row, field: &str) -> String {
    match row.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn position(row: &Row) -> f64 {
    row.get("position").and_then(parse_number).unwrap_or(0.0)
}

impl KeywordFilter {
    pub fn is_active(&self) -> bool {
        !self.search.is_empty() || self.competitivity.is_some() || self.sort != PositionSort::None
    }

    fn keeps(&self, row: &Row) -> bool {
        if !self.search.is_empty()
            && !cell_text(row, "keyword")
                .to_lowercase()
                .contains(&self.search.to_lowercase())
        {
            return false;
        }
        match &self.competitivity {
            Some(wanted) => cell_text(row, "competitivity") == *wanted,
            None => true,
        }
    }

    /// Filter and sort the table widgets of a keyword category. Other
    /// categories and non-table widgets come back unchanged.
    pub fn apply(&self, category: CategoryKind, widgets: &[Widget]) -> Vec<Widget> {
        if !category.shows_filters() {
            return widgets.to_vec();
        }

        widgets
            .iter()
            .map(|widget| {
                if widget.kind != WidgetKind::Table {
                    return widget.clone();
                }
                let mut rows: Vec<Row> = widget
                    .data
                    .iter()
                    .filter(|row| self.keeps(row))
                    .cloned()
                    .collect();
                match self.sort {
                    PositionSort::None => {}
                    PositionSort::Asc => {
                        rows.sort_by(|a, b| position(a).partial_cmp(&position(b)).unwrap_or(Ordering::Equal))
                    }
                    PositionSort::Desc => {
                        rows.sort_by(|a, b| position(b).partial_cmp(&position(a)).unwrap_or(Ordering::Equal))
                    }
                }
                Widget {
                    data: rows,
                    ..widget.clone()
                }
            })
            .collect()
    }
}
