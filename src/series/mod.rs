//! Installation time-series reconstruction.
//!
//! selection -> field inference -> same-day merge -> shape detection -> daily deltas

pub mod fields;
pub mod metrics;
pub mod shape;

pub use fields::{FieldInference, FieldSource, infer_fields};
pub use metrics::{MonthlyTotal, PeriodSpan, SeriesMetrics, WeekdayAverage};
pub use shape::{SeriesShape, ShapeSignal, detect_shape};

use crate::config::SeriesConfig;
use crate::value::{parse_date, parse_number};
use crate::widget::Widget;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use fields::axis_labels;
use shape::ShapeContext;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One calendar day of a reconstructed series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub installs: f64,
}

/// A reconstructed series: strictly ascending, one point per day, daily
/// increments regardless of how the source reported them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallSeries {
    pub widget_id: String,
    pub name: String,
    pub fields: FieldInference,
    pub shape: SeriesShape,
    pub points: Vec<TimeSeriesPoint>,
}

impl InstallSeries {
    pub fn metrics(&self) -> SeriesMetrics {
        SeriesMetrics::compute(&self.points)
    }
}

fn contains_any(haystack: &str, patterns: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && haystack.contains(&p.to_lowercase()))
}

pub fn is_installation_widget(widget: &Widget, config: &SeriesConfig) -> bool {
    widget
        .name
        .as_deref()
        .is_some_and(|n| contains_any(n, &config.name_patterns))
        || widget
            .slug
            .as_deref()
            .is_some_and(|s| contains_any(s, &config.slug_patterns))
        || widget
            .category_slug()
            .is_some_and(|s| s.eq_ignore_ascii_case(&config.activation_category))
}

pub fn select_installation_widgets<'a>(
    widgets: &'a [Widget],
    config: &SeriesConfig,
) -> Vec<&'a Widget> {
    widgets
        .iter()
        .filter(|w| is_installation_widget(w, config))
        .collect()
}

struct DayReadings {
    peak: f64,
    total: f64,
}

/// Turn running totals into per-day increments. Drops (counter resets,
/// glitches) floor at zero; the first day keeps its full value.
pub fn daily_from_cumulative(values: &[f64]) -> Vec<f64> {
    let mut previous = 0.0;
    values
        .iter()
        .map(|&current| {
            let delta = (current - previous).max(0.0);
            previous = current;
            delta
        })
        .collect()
}

/// Reconstruct the daily series of one widget, or `None` when no date or
/// value field can be established or no row carries both.
pub fn reconstruct_widget(widget: &Widget, config: &SeriesConfig) -> Option<InstallSeries> {
    let Some(fields) = infer_fields(widget, config) else {
        debug!(id = %widget.id, rows = widget.data.len(), "no date/value fields, skipping widget");
        return None;
    };

    let mut by_day: BTreeMap<NaiveDate, DayReadings> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &widget.data {
        let date = row.get(&fields.date_field).and_then(parse_date);
        let value = row.get(&fields.value_field).and_then(parse_number);
        match (date, value) {
            (Some(date), Some(value)) => {
                let day = by_day.entry(date).or_insert(DayReadings {
                    peak: f64::NEG_INFINITY,
                    total: 0.0,
                });
                day.peak = day.peak.max(value);
                day.total += value;
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(id = %widget.id, skipped, "rows without a usable date or value");
    }
    if by_day.is_empty() {
        return None;
    }

    let peaks: Vec<f64> = by_day.values().map(|d| d.peak).collect();
    let labels = axis_labels(widget);
    let shape = detect_shape(&ShapeContext {
        value_field: &fields.value_field,
        axis_labels: &labels,
        daily_peaks: &peaks,
        config,
    });

    let daily = if shape.is_cumulative() {
        daily_from_cumulative(&peaks)
    } else {
        by_day.values().map(|d| d.total).collect()
    };

    let points = by_day
        .keys()
        .zip(daily)
        .map(|(&date, installs)| TimeSeriesPoint { date, installs })
        .collect();

    Some(InstallSeries {
        widget_id: widget.id.clone(),
        name: widget.label().to_string(),
        fields,
        shape,
        points,
    })
}

/// Reconstruct every installation widget independently.
///
/// `None` means "no data": nothing matched the selection or no matched
/// widget yielded a series.
pub fn reconstruct(widgets: &[Widget], config: &SeriesConfig) -> Option<Vec<InstallSeries>> {
    let candidates = select_installation_widgets(widgets, config);
    if candidates.is_empty() {
        info!(widgets = widgets.len(), "no installation widgets found");
        return None;
    }

    let series: Vec<InstallSeries> = candidates
        .into_iter()
        .filter_map(|w| reconstruct_widget(w, config))
        .collect();

    info!(count = series.len(), "installation series reconstructed");
    if series.is_empty() { None } else { Some(series) }
}
