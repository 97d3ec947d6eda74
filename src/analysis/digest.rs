//! Compact per-category tables sent to the analysis service.
//!
//! Widgets are grouped by category and each recognised category is reduced
//! to a header row (`summary`) plus plain value rows. Keys and fallback
//! labels are part of the service's input format.

use crate::aggregate::percentage;
use crate::category::CategoryKind;
use crate::value::{parse_date, parse_number};
use crate::widget::{Row, Widget, WidgetKind};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

const METRIC_FALLBACK: &str = "Métrica";
const METRIC_SUMMARY: [&str; 2] = ["metrica", "valor"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDigest {
    pub category: String,
    pub summary: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

impl CategoryDigest {
    fn empty(category: &str) -> Self {
        Self {
            category: category.to_string(),
            summary: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn digest_key(kind: CategoryKind) -> Option<&'static str> {
    match kind {
        CategoryKind::Keywords => Some("keywords"),
        CategoryKind::Activation => Some("instalacoes"),
        CategoryKind::Analytics => Some("usuarios"),
        CategoryKind::Satisfaction => Some("satisfacao"),
        CategoryKind::Engagement => Some("engajamento"),
        CategoryKind::Other => None,
    }
}

/// Build the digest for every recognised category present in `widgets`.
pub fn build_digest(widgets: &[Widget]) -> BTreeMap<String, CategoryDigest> {
    let mut grouped: BTreeMap<CategoryKind, Vec<&Widget>> = BTreeMap::new();
    for widget in widgets {
        grouped.entry(CategoryKind::of(widget)).or_default().push(widget);
    }

    let mut digest = BTreeMap::new();
    for (kind, members) in grouped {
        let Some(key) = digest_key(kind) else {
            debug!(widgets = members.len(), "uncategorised widgets left out of digest");
            continue;
        };
        let entry = match kind {
            CategoryKind::Keywords => keywords(key, &members),
            CategoryKind::Activation => installations(key, &members),
            CategoryKind::Analytics => metrics(key, &members, |k| {
                matches!(k, WidgetKind::Bar | WidgetKind::Pie | WidgetKind::Area)
            }),
            CategoryKind::Engagement => metrics(key, &members, |_| true),
            CategoryKind::Satisfaction => satisfaction(key, &members),
            CategoryKind::Other => continue,
        };
        debug!(category = key, rows = entry.data.len(), "digest built");
        digest.insert(key.to_string(), entry);
    }
    digest
}

/// Round numbers per the `format` declared for their field.
fn format_cell(value: Value, format: Option<&str>) -> Value {
    let Some(n) = value.as_f64() else {
        return value;
    };
    match format {
        Some("0") => json!(n.round() as i64),
        Some("0.00") => json!((n * 100.0).round() / 100.0),
        _ => value,
    }
}

fn project(row: &Row, fields: &[String]) -> Vec<Value> {
    fields
        .iter()
        .map(|f| row.get(f).cloned().unwrap_or(Value::Null))
        .collect()
}

fn keywords(key: &str, widgets: &[&Widget]) -> CategoryDigest {
    let Some(table) = widgets.iter().find(|w| w.kind == WidgetKind::Table) else {
        return CategoryDigest::empty(key);
    };

    let axes = table.y_axis();
    let summary = table.y_axis_fields();
    let formats: Vec<Option<&str>> = summary
        .iter()
        .map(|field| {
            axes.iter()
                .find(|a| a.get("field").and_then(Value::as_str) == Some(field.as_str()))
                .and_then(|a| a.get("format"))
                .and_then(Value::as_str)
        })
        .collect();

    let data = table
        .data
        .iter()
        .map(|row| {
            project(row, &summary)
                .into_iter()
                .zip(&formats)
                .map(|(cell, format)| format_cell(cell, *format))
                .collect::<Vec<_>>()
        })
        .collect();

    CategoryDigest {
        category: key.to_string(),
        summary,
        data,
    }
}

fn installations(key: &str, widgets: &[&Widget]) -> CategoryDigest {
    let Some(area) = widgets.iter().find(|w| w.kind == WidgetKind::Area) else {
        return CategoryDigest::empty(key);
    };
    let Some(sample) = area.data.first() else {
        return CategoryDigest::empty(key);
    };

    let Some(date_field) = sample
        .fields()
        .into_iter()
        .find(|f| sample.get(f).and_then(parse_date).is_some())
        .map(String::from)
    else {
        return CategoryDigest::empty(key);
    };
    let value_fields: Vec<String> = sample
        .fields()
        .into_iter()
        .filter(|f| *f != date_field && sample.get(f).and_then(parse_number).is_some())
        .map(String::from)
        .collect();

    let mut rows: Vec<Vec<Value>> = area
        .data
        .iter()
        .map(|row| {
            let mut cells = vec![row.get(&date_field).cloned().unwrap_or(Value::Null)];
            cells.extend(
                value_fields
                    .iter()
                    .map(|f| json!(row.get(f).and_then(parse_number).unwrap_or(0.0))),
            );
            cells
        })
        .collect();
    // unparsable dates sink to the end
    rows.sort_by_key(|cells| {
        let date = parse_date(&cells[0]);
        (date.is_none(), date)
    });

    let mut summary = vec!["data".to_string()];
    summary.extend(value_fields);
    CategoryDigest {
        category: key.to_string(),
        summary,
        data: rows,
    }
}

/// Big numbers become `[name, value]`, tables project through their yAxis
/// fields, and charts accepted by `chart_kinds` contribute raw row values.
fn metrics(key: &str, widgets: &[&Widget], chart_kinds: impl Fn(WidgetKind) -> bool) -> CategoryDigest {
    let mut summary = Vec::new();
    let mut data = Vec::new();

    for widget in widgets {
        match widget.kind {
            WidgetKind::BigNumber => {
                let name = widget.name.clone().unwrap_or_else(|| METRIC_FALLBACK.to_string());
                let value = widget
                    .data
                    .first()
                    .and_then(|r| r.get("value"))
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or(json!(0));
                data.push(vec![json!(name), value]);
                summary.push(name);
            }
            WidgetKind::Table => {
                let fields = widget.y_axis_fields();
                if fields.is_empty() {
                    continue;
                }
                data.extend(widget.data.iter().map(|row| project(row, &fields)));
            }
            kind if chart_kinds(kind) => {
                data.extend(
                    widget
                        .data
                        .iter()
                        .map(|row| row.values().into_iter().cloned().collect::<Vec<_>>()),
                );
            }
            _ => {}
        }
    }

    if summary.is_empty() {
        summary = METRIC_SUMMARY.iter().map(|s| s.to_string()).collect();
    }
    CategoryDigest {
        category: key.to_string(),
        summary,
        data,
    }
}

fn first_present<'a>(row: &'a Row, fields: &[&str]) -> Option<&'a Value> {
    fields.iter().filter_map(|f| row.get(f)).find(|v| match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    })
}

fn satisfaction(key: &str, widgets: &[&Widget]) -> CategoryDigest {
    let Some(stars) = widgets
        .iter()
        .find(|w| matches!(w.kind, WidgetKind::Bar | WidgetKind::Pie))
    else {
        return CategoryDigest::empty(key);
    };
    if stars.data.is_empty() {
        return CategoryDigest::empty(key);
    }

    let readings: Vec<(Value, f64)> = stars
        .data
        .iter()
        .map(|row| {
            let rating = first_present(row, &["rating", "stars", "x", "name"])
                .cloned()
                .unwrap_or_else(|| json!(""));
            let count = first_present(row, &["count", "value", "y"])
                .and_then(parse_number)
                .unwrap_or(0.0);
            (rating, count)
        })
        .collect();
    let total: f64 = readings.iter().map(|(_, c)| c).sum();

    let data = readings
        .into_iter()
        .map(|(rating, count)| {
            let share = if total > 0.0 {
                format!("{:.2}%", percentage(count, total))
            } else {
                "0%".to_string()
            };
            vec![rating, json!(count), json!(share)]
        })
        .collect();

    CategoryDigest {
        category: key.to_string(),
        summary: ["rating", "count", "percentage"].map(String::from).to_vec(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::normalize;

    fn widgets(raw: Value) -> Vec<Widget> {
        normalize(&raw).unwrap()
    }

    #[test]
    fn keyword_table_rounded_per_format() {
        let ws = widgets(json!([{
            "kind": "table",
            "category": {"slug": "category5"},
            "config": {"yAxis": [
                {"field": "keyword"},
                {"field": "position", "format": "0"},
                {"field": "score", "format": "0.00"}
            ]},
            "data": [
                {"columns": [
                    {"field": "keyword", "value": "fitness"},
                    {"field": "position", "value": 3.6},
                    {"field": "score", "value": 0.12345}
                ]},
                {"columns": [{"field": "keyword", "value": "yoga"}]}
            ]
        }]));
        let digest = build_digest(&ws);
        let kw = &digest["keywords"];
        assert_eq!(kw.summary, vec!["keyword", "position", "score"]);
        assert_eq!(kw.data[0], vec![json!("fitness"), json!(4), json!(0.12)]);
        assert_eq!(kw.data[1], vec![json!("yoga"), Value::Null, Value::Null]);
    }

    #[test]
    fn installations_sorted_by_date() {
        let ws = widgets(json!([{
            "kind": "area",
            "category": {"slug": "activation"},
            "data": [
                {"date": "2024-01-03", "installs": "7", "label": "x"},
                {"date": "2024-01-01", "installs": 5, "label": "y"},
                {"date": "2024-01-02", "installs": null, "label": "z"}
            ]
        }]));
        let inst = &build_digest(&ws)["instalacoes"];
        assert_eq!(inst.summary, vec!["data", "installs"]);
        let dates: Vec<&Value> = inst.data.iter().map(|r| &r[0]).collect();
        assert_eq!(dates, vec![&json!("2024-01-01"), &json!("2024-01-02"), &json!("2024-01-03")]);
        assert_eq!(inst.data[1][1], json!(0.0));
        assert_eq!(inst.data[2][1], json!(7.0));
    }

    #[test]
    fn installations_without_area_widget_empty() {
        let ws = widgets(json!([{"kind": "bar", "category": {"slug": "activation"}}]));
        let inst = &build_digest(&ws)["instalacoes"];
        assert!(inst.is_empty());
        assert!(inst.summary.is_empty());
    }

    #[test]
    fn analytics_collects_big_numbers_and_charts() {
        let ws = widgets(json!([
            {"name": "Active users", "kind": "big_number", "category": {"slug": "analytics"},
             "data": [{"value": 1200}]},
            {"kind": "big_number", "category": {"slug": "analytics"}, "data": []},
            {"name": "By country", "kind": "bar", "category": {"slug": "analytics"},
             "data": [{"country": "BR", "users": 40}]},
            {"name": "Trend", "kind": "line", "category": {"slug": "analytics"},
             "data": [{"day": "2024-01-01", "users": 4}]}
        ]));
        let users = &build_digest(&ws)["usuarios"];
        assert_eq!(users.summary, vec!["Active users", METRIC_FALLBACK]);
        assert_eq!(
            users.data,
            vec![
                vec![json!("Active users"), json!(1200)],
                vec![json!(METRIC_FALLBACK), json!(0)],
                vec![json!("BR"), json!(40)],
            ]
        );
    }

    #[test]
    fn engagement_takes_every_chart_and_default_summary() {
        let ws = widgets(json!([
            {"name": "Sessions", "kind": "line", "category": {"slug": "engagement"},
             "data": [{"day": "2024-01-01", "sessions": 9}]},
            {"name": "Screens", "kind": "table", "category": {"slug": "engagement"},
             "config": {"yAxis": [{"field": "screen"}, {"field": "views"}]},
             "data": [{"columns": [{"field": "views", "value": 3}, {"field": "screen", "value": "home"}]}]}
        ]));
        let eng = &build_digest(&ws)["engajamento"];
        assert_eq!(eng.summary, vec!["metrica", "valor"]);
        assert_eq!(eng.data[0], vec![json!("2024-01-01"), json!(9)]);
        assert_eq!(eng.data[1], vec![json!("home"), json!(3)]);
    }

    #[test]
    fn satisfaction_percentages_zero_guarded() {
        let ws = widgets(json!([
            {"kind": "bar", "category": {"slug": "satisfaction"}, "data": [
                {"stars": 5, "count": 3},
                {"stars": 1, "value": 1}
            ]}
        ]));
        let sat = &build_digest(&ws)["satisfacao"];
        assert_eq!(sat.summary, vec!["rating", "count", "percentage"]);
        assert_eq!(sat.data[0], vec![json!(5), json!(3.0), json!("75.00%")]);
        assert_eq!(sat.data[1], vec![json!(1), json!(1.0), json!("25.00%")]);

        let zeros = widgets(json!([
            {"kind": "pie", "category": {"slug": "satisfaction"}, "data": [{"name": "5", "count": 0}]}
        ]));
        let sat = &build_digest(&zeros)["satisfacao"];
        assert_eq!(sat.data[0], vec![json!("5"), json!(0.0), json!("0%")]);
    }

    #[test]
    fn uncategorised_widgets_skipped() {
        let ws = widgets(json!([{"kind": "bar", "data": [{"a": 1}]}]));
        assert!(build_digest(&ws).is_empty());
    }
}
