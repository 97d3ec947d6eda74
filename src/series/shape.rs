//! Cumulative-vs-incremental detection.
//!
//! Exports mix running totals ("max installs to date") with per-day counts
//! and rarely say which is which. The rules below are tried in order; the
//! first that fires marks the series cumulative.
//!
//! Known false positive: an incremental series that happens to grow every
//! day (or never drops) is indistinguishable from a running total and is
//! classified cumulative by the non-decreasing rule. Set
//! `series.shape = "incremental"` to override when that matters.

use crate::config::{SeriesConfig, ShapeOverride};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSignal {
    Configured,
    MaxFieldName,
    AccumulatedLabel,
    NonDecreasing,
}

impl std::fmt::Display for ShapeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configured => write!(f, "configured"),
            Self::MaxFieldName => write!(f, "max field name"),
            Self::AccumulatedLabel => write!(f, "accumulated axis label"),
            Self::NonDecreasing => write!(f, "non-decreasing values"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SeriesShape {
    Cumulative { detected_by: ShapeSignal },
    Incremental,
}

impl SeriesShape {
    pub fn is_cumulative(&self) -> bool {
        matches!(self, Self::Cumulative { .. })
    }
}

pub struct ShapeContext<'a> {
    pub value_field: &'a str,
    pub axis_labels: &'a [String],
    /// Highest reading of each day, in date order.
    pub daily_peaks: &'a [f64],
    pub config: &'a SeriesConfig,
}

pub struct ShapeRule {
    pub signal: ShapeSignal,
    applies: fn(&ShapeContext<'_>) -> bool,
}

impl ShapeRule {
    pub fn applies(&self, ctx: &ShapeContext<'_>) -> bool {
        (self.applies)(ctx)
    }
}

pub static SHAPE_RULES: &[ShapeRule] = &[
    ShapeRule {
        signal: ShapeSignal::MaxFieldName,
        applies: max_field_name,
    },
    ShapeRule {
        signal: ShapeSignal::AccumulatedLabel,
        applies: accumulated_label,
    },
    ShapeRule {
        signal: ShapeSignal::NonDecreasing,
        applies: non_decreasing,
    },
];

fn contains_ci(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn max_field_name(ctx: &ShapeContext<'_>) -> bool {
    contains_ci(ctx.value_field, &ctx.config.max_field_marker)
}

fn accumulated_label(ctx: &ShapeContext<'_>) -> bool {
    ctx.axis_labels
        .iter()
        .any(|label| contains_ci(label, &ctx.config.accumulated_label_marker))
}

// A single day proves nothing, so at least two days are required.
fn non_decreasing(ctx: &ShapeContext<'_>) -> bool {
    ctx.daily_peaks.len() >= 2 && ctx.daily_peaks.windows(2).all(|w| w[1] >= w[0])
}

pub fn detect_shape(ctx: &ShapeContext<'_>) -> SeriesShape {
    match ctx.config.shape {
        ShapeOverride::Cumulative => {
            return SeriesShape::Cumulative {
                detected_by: ShapeSignal::Configured,
            };
        }
        ShapeOverride::Incremental => return SeriesShape::Incremental,
        ShapeOverride::Auto => {}
    }

    SHAPE_RULES
        .iter()
        .find(|rule| rule.applies(ctx))
        .map(|rule| SeriesShape::Cumulative {
            detected_by: rule.signal,
        })
        .unwrap_or(SeriesShape::Incremental)
}
