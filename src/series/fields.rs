use crate::config::SeriesConfig;
use crate::value::{parse_date, parse_number};
use crate::widget::{Row, Widget};
use serde::Serialize;
use serde_json::Value;

/// Which heuristic settled a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    DeclaredHint,
    ConventionalName,
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInference {
    pub date_field: String,
    pub date_source: FieldSource,
    pub value_field: String,
    pub value_source: FieldSource,
}

pub struct FieldContext<'a> {
    pub widget: &'a Widget,
    pub sample: &'a Row,
    pub config: &'a SeriesConfig,
}

impl FieldContext<'_> {
    fn present(&self, field: &str) -> bool {
        self.sample.get(field).is_some_and(|v| !v.is_null())
    }

    fn numeric(&self, field: &str) -> bool {
        self.sample.get(field).and_then(parse_number).is_some()
    }
}

pub struct FieldRule {
    pub source: FieldSource,
    date: fn(&FieldContext<'_>) -> Option<String>,
    value: fn(&FieldContext<'_>, &str) -> Option<String>,
}

impl FieldRule {
    pub fn date_field(&self, ctx: &FieldContext<'_>) -> Option<String> {
        (self.date)(ctx)
    }

    pub fn value_field(&self, ctx: &FieldContext<'_>, date_field: &str) -> Option<String> {
        (self.value)(ctx, date_field)
    }
}

/// Tried in order for each axis; the first rule that names a field wins.
pub static FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        source: FieldSource::DeclaredHint,
        date: hinted_date,
        value: hinted_value,
    },
    FieldRule {
        source: FieldSource::ConventionalName,
        date: conventional_date,
        value: conventional_value,
    },
    FieldRule {
        source: FieldSource::Structural,
        date: structural_date,
        value: structural_value,
    },
];

fn hinted_date(ctx: &FieldContext<'_>) -> Option<String> {
    let hint = ctx.widget.x_field.as_deref()?.trim();
    ctx.present(hint).then(|| hint.to_string())
}

// yField may list several series ("installs,uninstalls"); the first one is the value.
fn hinted_value(ctx: &FieldContext<'_>, date_field: &str) -> Option<String> {
    let hint = ctx.widget.y_field.as_deref()?.split(',').next()?.trim();
    (hint != date_field && ctx.numeric(hint)).then(|| hint.to_string())
}

fn conventional_date(ctx: &FieldContext<'_>) -> Option<String> {
    ctx.config
        .date_fields
        .iter()
        .find(|name| ctx.present(name))
        .cloned()
}

fn conventional_value(ctx: &FieldContext<'_>, date_field: &str) -> Option<String> {
    ctx.config
        .value_fields
        .iter()
        .find(|name| name.as_str() != date_field && ctx.numeric(name))
        .cloned()
}

fn structural_date(ctx: &FieldContext<'_>) -> Option<String> {
    ctx.sample
        .fields()
        .into_iter()
        .find(|f| ctx.sample.get(f).and_then(parse_date).is_some())
        .map(String::from)
}

fn structural_value(ctx: &FieldContext<'_>, date_field: &str) -> Option<String> {
    ctx.sample
        .fields()
        .into_iter()
        .find(|f| *f != date_field && ctx.sample.get(f).and_then(parse_number).is_some())
        .map(String::from)
}

/// Resolve the date and value fields of `widget` from its first row.
///
/// Each axis walks [`FIELD_RULES`] independently, so a declared `xField`
/// can pair with a conventionally named value column.
pub fn infer_fields(widget: &Widget, config: &SeriesConfig) -> Option<FieldInference> {
    let sample = widget.data.first()?;
    let ctx = FieldContext {
        widget,
        sample,
        config,
    };

    let (date_field, date_source) = FIELD_RULES
        .iter()
        .find_map(|rule| rule.date_field(&ctx).map(|f| (f, rule.source)))?;
    let (value_field, value_source) = FIELD_RULES
        .iter()
        .find_map(|rule| rule.value_field(&ctx, &date_field).map(|f| (f, rule.source)))?;

    Some(FieldInference {
        date_field,
        date_source,
        value_field,
        value_source,
    })
}

/// Labels attached to the y axis in the widget config.
pub fn axis_labels(widget: &Widget) -> Vec<String> {
    widget
        .y_axis()
        .into_iter()
        .flat_map(|axis| {
            ["label", "title", "name"]
                .into_iter()
                .filter_map(move |key| axis.get(key).and_then(Value::as_str))
        })
        .map(String::from)
        .collect()
}
