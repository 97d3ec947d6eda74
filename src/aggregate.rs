//! Numeric helpers shared by the reconstructor and chart consumers.
//! Every division is zero-guarded; nothing here returns NaN or infinity.

use crate::series::TimeSeriesPoint;
use crate::value::parse_number;
use crate::widget::Row;

/// Fallback y-axis when there is nothing to plot.
pub const DEFAULT_DOMAIN: (f64, f64) = (0.0, 100.0);

/// Y-axis `(min, max)` over every numeric value of `fields` in `rows`.
///
/// Equal extremes widen by 10% either way. Otherwise a 10% margin is added
/// and both ends round outward to integers. The lower end stops at zero
/// unless the data itself goes negative.
pub fn y_axis_domain(rows: &[Row], fields: &[&str]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for row in rows {
        for value in fields.iter().filter_map(|f| row.get(f)).filter_map(parse_number) {
            min = min.min(value);
            max = max.max(value);
        }
    }

    if !min.is_finite() || !max.is_finite() {
        return DEFAULT_DOMAIN;
    }

    if min == max {
        if min == 0.0 {
            return (0.0, 1.0);
        }
        let spread = min.abs() * 0.1;
        return (min - spread, max + spread);
    }

    let margin = (max - min) * 0.1;
    let mut low = (min - margin).floor();
    if min >= 0.0 {
        low = low.max(0.0);
    }
    let high = (max + margin).ceil();
    (low, high)
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        sum(values) / values.len() as f64
    }
}

/// Share of `part` in `total` as a percentage; 0 when `total` is zero.
pub fn percentage(part: f64, total: f64) -> f64 {
    if total == 0.0 { 0.0 } else { part / total * 100.0 }
}

/// Relative change from `baseline` to `current`, in percent.
///
/// A zero baseline reports 100% when `current` is positive and 0% otherwise.
pub fn growth_percentage(baseline: f64, current: f64) -> f64 {
    if baseline == 0.0 {
        if current > 0.0 { 100.0 } else { 0.0 }
    } else {
        (current - baseline) / baseline * 100.0
    }
}

/// Trailing mean over `window` points, shorter at the start. No look-ahead.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut running = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            running += v;
            if i >= window {
                running -= values[i - window];
            }
            running / (i + 1).min(window) as f64
        })
        .collect()
}

/// Running total.
pub fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

pub fn moving_average_points(points: &[TimeSeriesPoint], window: usize) -> Vec<TimeSeriesPoint> {
    let values: Vec<f64> = points.iter().map(|p| p.installs).collect();
    rebuild(points, moving_average(&values, window))
}

/// Running-total view of a daily series, for display toggling only.
pub fn cumulative_points(points: &[TimeSeriesPoint]) -> Vec<TimeSeriesPoint> {
    let values: Vec<f64> = points.iter().map(|p| p.installs).collect();
    rebuild(points, cumulative(&values))
}

fn rebuild(points: &[TimeSeriesPoint], values: Vec<f64>) -> Vec<TimeSeriesPoint> {
    points
        .iter()
        .zip(values)
        .map(|(p, installs)| TimeSeriesPoint {
            date: p.date,
            installs,
        })
        .collect()
}
