use super::TimeSeriesPoint;
use crate::aggregate::{growth_percentage, mean, sum};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sunday-first, as dashboards lay out the week.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

const MONTH_WINDOW: usize = 30;
const YEAR_WINDOW: usize = 365;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayAverage {
    pub weekday: Weekday,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub installs: f64,
}

/// How far back the series reaches, for period captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSpan {
    LastWeek,
    LastMonth,
    LastThreeMonths,
    LastSixMonths,
    Custom,
}

impl PeriodSpan {
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d <= 7 => Self::LastWeek,
            d if d <= 31 => Self::LastMonth,
            d if d <= 90 => Self::LastThreeMonths,
            d if d <= 180 => Self::LastSixMonths,
            _ => Self::Custom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMetrics {
    pub total_installs: f64,
    pub average_per_day: f64,
    /// First vs last N days, N = 7 from 14 points on, half the series below that.
    pub growth_percentage: f64,
    /// Last 30 days vs the 30 before; needs 60 points.
    pub monthly_growth: Option<f64>,
    /// Last 30 days vs the first 30 of the trailing year; needs 365 points.
    pub yearly_growth: Option<f64>,
    pub weekday_data: Vec<WeekdayAverage>,
    pub monthly_data: Vec<MonthlyTotal>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub period: Option<PeriodSpan>,
}

impl SeriesMetrics {
    pub fn compute(points: &[TimeSeriesPoint]) -> Self {
        let values: Vec<f64> = points.iter().map(|p| p.installs).collect();
        let total_installs = sum(&values);
        let date_range = points.first().zip(points.last()).map(|(a, b)| (a.date, b.date));

        Self {
            total_installs,
            average_per_day: mean(&values),
            growth_percentage: period_growth(&values),
            monthly_growth: monthly_growth(&values),
            yearly_growth: yearly_growth(&values),
            weekday_data: weekday_averages(points),
            monthly_data: monthly_totals(points),
            date_range,
            period: date_range.map(|(start, end)| PeriodSpan::from_days((end - start).num_days())),
        }
    }
}

fn period_growth(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = if values.len() >= 14 {
        7
    } else {
        (values.len() / 2).max(1)
    };
    let first = mean(&values[..n]);
    let last = mean(&values[values.len() - n..]);
    growth_percentage(first, last)
}

fn monthly_growth(values: &[f64]) -> Option<f64> {
    let len = values.len();
    if len < MONTH_WINDOW * 2 {
        return None;
    }
    let previous = mean(&values[len - MONTH_WINDOW * 2..len - MONTH_WINDOW]);
    let current = mean(&values[len - MONTH_WINDOW..]);
    Some(growth_percentage(previous, current))
}

fn yearly_growth(values: &[f64]) -> Option<f64> {
    let len = values.len();
    if len < YEAR_WINDOW {
        return None;
    }
    let year = &values[len - YEAR_WINDOW..];
    let year_ago = mean(&year[..MONTH_WINDOW]);
    let current = mean(&year[YEAR_WINDOW - MONTH_WINDOW..]);
    Some(growth_percentage(year_ago, current))
}

fn weekday_averages(points: &[TimeSeriesPoint]) -> Vec<WeekdayAverage> {
    let mut totals = [(0.0_f64, 0_usize); 7];
    for p in points {
        let slot = &mut totals[p.date.weekday().num_days_from_sunday() as usize];
        slot.0 += p.installs;
        slot.1 += 1;
    }
    WEEKDAYS
        .iter()
        .zip(totals)
        .map(|(&weekday, (total, count))| WeekdayAverage {
            weekday,
            average: if count == 0 { 0.0 } else { total / count as f64 },
        })
        .collect()
}

fn monthly_totals(points: &[TimeSeriesPoint]) -> Vec<MonthlyTotal> {
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for p in points {
        *by_month.entry((p.date.year(), p.date.month())).or_default() += p.installs;
    }
    by_month
        .into_iter()
        .map(|((year, month), installs)| MonthlyTotal {
            year,
            month,
            installs,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(start: NaiveDate, values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &installs)| TimeSeriesPoint {
                date: start + chrono::Duration::days(i as i64),
                installs,
            })
            .collect()
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn empty_series_has_defined_metrics() {
        let m = SeriesMetrics::compute(&[]);
        assert_eq!(m.total_installs, 0.0);
        assert_eq!(m.average_per_day, 0.0);
        assert_eq!(m.growth_percentage, 0.0);
        assert_eq!(m.weekday_data.len(), 7);
        assert!(m.weekday_data.iter().all(|w| w.average == 0.0));
        assert!(m.monthly_data.is_empty());
        assert!(m.date_range.is_none());
        assert!(m.period.is_none());
    }

    #[test]
    fn totals_and_average() {
        let m = SeriesMetrics::compute(&series(jan(1), &[10.0, 15.0, 0.0, 15.0]));
        assert_eq!(m.total_installs, 40.0);
        assert_eq!(m.average_per_day, 10.0);
        // first 2 avg 12.5, last 2 avg 7.5
        assert!((m.growth_percentage - -40.0).abs() < 1e-9);
        assert_eq!(m.date_range, Some((jan(1), jan(4))));
        assert_eq!(m.period, Some(PeriodSpan::LastWeek));
    }

    #[test]
    fn growth_uses_weeks_from_fourteen_points() {
        let mut values = vec![1.0; 7];
        values.extend(vec![5.0; 7]);
        let m = SeriesMetrics::compute(&series(jan(1), &values));
        assert!((m.growth_percentage - 400.0).abs() < 1e-9);
    }

    #[test]
    fn zero_baseline_growth() {
        let flat_zero = SeriesMetrics::compute(&series(jan(1), &[0.0, 0.0, 0.0, 0.0]));
        assert_eq!(flat_zero.growth_percentage, 0.0);

        let from_zero = SeriesMetrics::compute(&series(jan(1), &[0.0, 0.0, 3.0, 5.0]));
        assert_eq!(from_zero.growth_percentage, 100.0);
    }

    #[test]
    fn single_point_compares_with_itself() {
        let m = SeriesMetrics::compute(&series(jan(1), &[8.0]));
        assert_eq!(m.growth_percentage, 0.0);
    }

    #[test]
    fn weekday_averages_cover_all_days() {
        // 2024-01-01 is a Monday
        let m = SeriesMetrics::compute(&series(jan(1), &[2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 4.0]));
        let monday = m.weekday_data.iter().find(|w| w.weekday == Weekday::Mon).unwrap();
        assert_eq!(monday.average, 3.0);
        let sunday = &m.weekday_data[0];
        assert_eq!(sunday.weekday, Weekday::Sun);
        assert_eq!(sunday.average, 14.0);
    }

    #[test]
    fn monthly_totals_in_calendar_order() {
        let points = series(NaiveDate::from_ymd_opt(2023, 12, 30).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        let m = SeriesMetrics::compute(&points);
        assert_eq!(
            m.monthly_data,
            vec![
                MonthlyTotal { year: 2023, month: 12, installs: 3.0 },
                MonthlyTotal { year: 2024, month: 1, installs: 7.0 },
            ]
        );
    }

    #[test]
    fn long_windows_only_with_enough_history() {
        let short = SeriesMetrics::compute(&series(jan(1), &vec![1.0; 59]));
        assert!(short.monthly_growth.is_none());
        assert!(short.yearly_growth.is_none());

        let mut values = vec![2.0; 30];
        values.extend(vec![3.0; 30]);
        let two_months = SeriesMetrics::compute(&series(jan(1), &values));
        assert!((two_months.monthly_growth.unwrap() - 50.0).abs() < 1e-9);
        assert!(two_months.yearly_growth.is_none());
        assert_eq!(two_months.period, Some(PeriodSpan::LastThreeMonths));

        let mut year = vec![4.0; 30];
        year.extend(vec![6.0; 305]);
        year.extend(vec![8.0; 30]);
        let m = SeriesMetrics::compute(&series(jan(1), &year));
        assert!((m.yearly_growth.unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(m.period, Some(PeriodSpan::Custom));
    }

    #[test]
    fn period_thresholds() {
        assert_eq!(PeriodSpan::from_days(0), PeriodSpan::LastWeek);
        assert_eq!(PeriodSpan::from_days(31), PeriodSpan::LastMonth);
        assert_eq!(PeriodSpan::from_days(32), PeriodSpan::LastThreeMonths);
        assert_eq!(PeriodSpan::from_days(180), PeriodSpan::LastSixMonths);
        assert_eq!(PeriodSpan::from_days(181), PeriodSpan::Custom);
    }
}
