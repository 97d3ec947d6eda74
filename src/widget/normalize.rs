use super::{Category, Row, Widget, WidgetKind};
use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::value::{identity_string, optional_string};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Normalize one uploaded document with the default data keys.
pub fn normalize(raw: &Value) -> Result<Vec<Widget>> {
    normalize_with(raw, &IngestConfig::default())
}

/// Normalize one uploaded document into canonical widgets.
///
/// An array yields one widget per element, with the element's position as
/// the id suffix. An element without a recognised `kind` is skipped and its
/// siblings are kept. A single object is widget 0 and must carry a valid
/// `kind`. Anything else is malformed.
pub fn normalize_with(raw: &Value, config: &IngestConfig) -> Result<Vec<Widget>> {
    match raw {
        Value::Array(items) => {
            let mut widgets = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let obj = widget_object(item, index)?;
                match widget_kind(obj, index) {
                    Ok(kind) => widgets.push(build_widget(obj, kind, index, config)),
                    Err(e) => warn!(index, error = %e, "skipping widget"),
                }
            }
            Ok(widgets)
        }
        Value::Object(obj) => {
            let kind = widget_kind(obj, 0)?;
            Ok(vec![build_widget(obj, kind, 0, config)])
        }
        other => Err(Error::malformed(format!(
            "expected a widget object or an array of widgets, found {}",
            json_type(other)
        ))),
    }
}

fn widget_object(raw: &Value, index: usize) -> Result<&Map<String, Value>> {
    raw.as_object().ok_or_else(|| {
        Error::malformed(format!(
            "widget at position {index} is {}, not an object",
            json_type(raw)
        ))
    })
}

fn widget_kind(obj: &Map<String, Value>, index: usize) -> Result<WidgetKind> {
    match obj.get("kind") {
        Some(Value::String(tag)) => WidgetKind::parse(tag).ok_or_else(|| {
            Error::malformed(format!("widget at position {index}: unknown kind '{tag}'"))
        }),
        _ => Err(Error::malformed(format!("widget at position {index} has no kind"))),
    }
}

fn build_widget(
    obj: &Map<String, Value>,
    kind: WidgetKind,
    index: usize,
    config: &IngestConfig,
) -> Widget {
    let document_id = identity_string(obj.get("documentId"));
    let name = identity_string(obj.get("name"));
    let slug = identity_string(obj.get("slug"));

    let base = document_id
        .as_deref()
        .or(slug.as_deref())
        .or(name.as_deref())
        .unwrap_or("widget");
    let id = format!("{base}-{index}");

    let data = select_rows(obj, config);
    debug!(id = %id, kind = %kind, rows = data.len(), "normalized widget");

    Widget {
        id,
        document_id,
        name,
        slug,
        kind,
        description: optional_string(obj.get("description")),
        category: normalize_category(obj.get("category")),
        config: obj.get("config").cloned().unwrap_or(Value::Null),
        data,
        x_field: optional_string(obj.get("xField")),
        y_field: optional_string(obj.get("yField")),
    }
}

/// Rows under the first app id of a data key. A bare array is accepted as-is.
fn first_dataset(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(rows)) => rows,
        Some(Value::Object(by_app)) => by_app
            .values()
            .next()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Pick the richer of the two embedded datasets; ties go to the primary key.
fn select_rows(obj: &Map<String, Value>, config: &IngestConfig) -> Vec<Row> {
    let primary = first_dataset(obj.get(&config.primary_data_key));
    let alternate = first_dataset(obj.get(&config.alternate_data_key));

    let chosen = if alternate.len() > primary.len() {
        debug!(
            primary = primary.len(),
            alternate = alternate.len(),
            key = %config.alternate_data_key,
            "using alternate dataset"
        );
        alternate
    } else {
        primary
    };

    chosen.iter().cloned().map(Row::from).collect()
}

fn normalize_category(raw: Option<&Value>) -> Option<Category> {
    let obj = raw?.as_object()?;
    Some(Category {
        name: optional_string(obj.get("name")).map(|n| n.to_lowercase()),
        slug: identity_string(obj.get("slug")),
        document_id: identity_string(obj.get("documentId")),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"x": i, "y": i * 10})).collect()
    }

    #[test]
    fn single_object_becomes_widget_zero() {
        let widgets = normalize(&json!({
            "documentId": "abc",
            "name": "Installs",
            "kind": "area",
            "data": {"app-1": rows(2)}
        }))
        .unwrap();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].id, "abc-0");
        assert_eq!(widgets[0].data.len(), 2);
    }

    #[test]
    fn array_elements_get_positional_ids() {
        let widgets = normalize(&json!([
            {"slug": "same", "kind": "bar"},
            {"slug": "same", "kind": "bar"},
            {"kind": "pie"}
        ]))
        .unwrap();
        let ids: Vec<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["same-0", "same-1", "widget-2"]);
    }

    #[test]
    fn id_prefers_document_id_then_slug_then_name() {
        let widgets = normalize(&json!([
            {"documentId": "d", "slug": "s", "name": "n", "kind": "line"},
            {"slug": "s", "name": "n", "kind": "line"},
            {"name": "n", "kind": "line"},
            {"documentId": "", "name": "n", "kind": "line"}
        ]))
        .unwrap();
        let ids: Vec<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["d-0", "s-1", "n-2", "n-3"]);
        assert_eq!(widgets[3].document_id, None);
    }

    #[test]
    fn richer_dataset_wins() {
        let widgets = normalize(&json!({
            "kind": "area",
            "data": {"app": rows(3)},
            "exampleData": {"app": rows(7)}
        }))
        .unwrap();
        assert_eq!(widgets[0].data.len(), 7);
    }

    #[test]
    fn tie_favours_primary_dataset() {
        let widgets = normalize(&json!({
            "kind": "area",
            "data": {"app": [{"from": "primary"}]},
            "exampleData": {"app": [{"from": "example"}]}
        }))
        .unwrap();
        assert_eq!(widgets[0].data[0].get("from"), Some(&json!("primary")));
    }

    #[test]
    fn alternate_used_when_primary_empty() {
        let widgets = normalize(&json!({
            "kind": "bar",
            "data": {},
            "exampleData": {"app": rows(4)}
        }))
        .unwrap();
        assert_eq!(widgets[0].data.len(), 4);
    }

    #[test]
    fn first_app_id_in_document_order() {
        let widgets = normalize(&json!({
            "kind": "bar",
            "data": {"zzz": rows(1), "aaa": rows(5)}
        }))
        .unwrap();
        assert_eq!(widgets[0].data.len(), 1);
    }

    #[test]
    fn no_data_is_not_an_error() {
        let widgets = normalize(&json!({"kind": "big_number"})).unwrap();
        assert!(widgets[0].data.is_empty());
        assert!(widgets[0].category.is_none());
        assert_eq!(widgets[0].config, Value::Null);
    }

    #[test]
    fn category_name_lowercased() {
        let widgets = normalize(&json!({
            "kind": "table",
            "category": {"name": "Activation", "slug": "activation", "documentId": "c1"}
        }))
        .unwrap();
        let category = widgets[0].category.as_ref().unwrap();
        assert_eq!(category.name.as_deref(), Some("activation"));
        assert_eq!(category.slug.as_deref(), Some("activation"));
    }

    #[test]
    fn hints_and_config_pass_through() {
        let widgets = normalize(&json!({
            "kind": "area",
            "xField": "date",
            "yField": "installs",
            "config": {"yAxis": {"label": "Instalações acumuladas"}}
        }))
        .unwrap();
        assert_eq!(widgets[0].x_field.as_deref(), Some("date"));
        assert_eq!(widgets[0].y_field.as_deref(), Some("installs"));
        assert!(widgets[0].config.get("yAxis").is_some());
    }

    #[test]
    fn malformed_documents_rejected() {
        assert!(normalize(&json!("just a string")).is_err());
        assert!(normalize(&json!([1, 2, 3])).is_err());
        assert!(normalize(&json!({"name": "no kind"})).is_err());
        assert!(normalize(&json!({"kind": "scatter"})).is_err());
    }

    #[test]
    fn bad_kind_in_array_skips_only_that_widget() {
        let widgets = normalize(&json!([
            {"name": "Installs", "kind": "area"},
            {"name": "Total", "kind": "big_number"},
            {"name": "Heat", "kind": "heatmap"},
            {"name": "Untyped"}
        ]))
        .unwrap();
        let ids: Vec<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["Installs-0", "Total-1"]);
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = json!([
            {"kind": "Pie", "category": {"name": "SATISFACTION"}, "data": {"a": rows(3)}},
            {"kind": "table", "exampleData": {"a": rows(2)}}
        ]);
        let first = normalize(&raw).unwrap();
        let second = normalize(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_data_keys() {
        let config = IngestConfig {
            primary_data_key: "rows".into(),
            alternate_data_key: "sample".into(),
            yield_between_files: true,
        };
        let widgets = normalize_with(
            &json!({"kind": "bar", "rows": {"a": rows(2)}, "data": {"a": rows(9)}}),
            &config,
        )
        .unwrap();
        assert_eq!(widgets[0].data.len(), 2);
    }
}
