//! Descriptive statistics over the historical event and stand tables.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::{MergedEventRecord, StandSalesRecord};
use crate::features::{nan_mean, nan_std, weekday_name};

// ==================== Summary Types ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// NaN-skipping means of the per-event ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub trans_per_attendee: Option<f64>,
    pub sales_per_attendee: Option<f64>,
    pub sales_per_transaction: Option<f64>,
}

/// Headline figures for the whole merged history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub total_events: usize,
    pub date_range: Option<DateRange>,
    /// Event types in order of first appearance.
    pub event_types: Vec<String>,
    pub avg_attendance: Option<f64>,
    pub avg_transactions: Option<f64>,
    pub avg_sales: Option<f64>,
    pub key_metrics: KeyMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTypePerformance {
    pub event_type: String,
    pub event_count: usize,
    pub avg_attendance: Option<f64>,
    /// Sample standard deviation; `None` for a single event.
    pub attendance_std: Option<f64>,
    pub avg_transactions: Option<f64>,
    pub avg_sales: Option<f64>,
    pub avg_units: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekPerformance {
    pub day_of_week: String,
    pub event_count: usize,
    pub avg_attendance: Option<f64>,
    pub avg_transactions: Option<f64>,
    pub avg_sales: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandPerformance {
    pub stand_group: String,
    pub total_transactions: f64,
    pub avg_transactions: Option<f64>,
    pub total_sales: f64,
    pub avg_sales: Option<f64>,
    pub total_units: f64,
    pub avg_units: Option<f64>,
    pub avg_pos: Option<f64>,
    pub trans_per_pos: Option<f64>,
    pub units_per_trans: Option<f64>,
}

/// One past event, flattened for charting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: NaiveDate,
    pub event_type: String,
    pub opponent: String,
    pub attendance: f64,
    pub transactions: f64,
    pub net_sales: f64,
    pub units: f64,
    pub day_of_week: String,
    pub trans_per_attendee: Option<f64>,
    pub sales_per_attendee: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSummary {
    pub overview: Overview,
    /// Sorted by event type.
    pub event_types: Vec<EventTypePerformance>,
    /// Monday first.
    pub days_of_week: Vec<DayOfWeekPerformance>,
    /// Sorted by stand group.
    pub stands: Vec<StandPerformance>,
    pub series: Vec<HistoricalPoint>,
}

// ==================== Aggregation ====================

/// Compute every historical aggregate in one pass over the tables.
pub fn summarize_history(
    merged: &[MergedEventRecord],
    stands: &[StandSalesRecord],
) -> HistoricalSummary {
    let summary = HistoricalSummary {
        overview: overview(merged),
        event_types: event_type_performance(merged),
        days_of_week: day_of_week_performance(merged),
        stands: stand_performance(stands),
        series: historical_series(merged),
    };
    tracing::debug!(
        "Summarized {} events across {} event types and {} stand groups",
        summary.overview.total_events,
        summary.event_types.len(),
        summary.stands.len()
    );
    summary
}

pub fn overview(merged: &[MergedEventRecord]) -> Overview {
    let dates = merged.iter().map(|r| r.characteristics.calendar_date);
    let date_range = dates
        .clone()
        .min()
        .zip(dates.max())
        .map(|(start, end)| DateRange { start, end });

    let mut event_types: Vec<String> = Vec::new();
    for record in merged {
        let event_type = &record.characteristics.event_type;
        if !event_types.contains(event_type) {
            event_types.push(event_type.clone());
        }
    }

    let ratios: Vec<_> = merged.iter().filter_map(|r| r.ratios).collect();

    Overview {
        total_events: merged.len(),
        date_range,
        event_types,
        avg_attendance: nan_mean(merged.iter().map(|r| r.sales.total_attendance)),
        avg_transactions: nan_mean(merged.iter().map(|r| r.sales.transactions)),
        avg_sales: nan_mean(merged.iter().map(|r| r.sales.net_sales)),
        key_metrics: KeyMetrics {
            trans_per_attendee: nan_mean(ratios.iter().map(|r| r.trans_per_attendee)),
            sales_per_attendee: nan_mean(ratios.iter().map(|r| r.sales_per_attendee)),
            sales_per_transaction: nan_mean(ratios.iter().map(|r| r.sales_per_transaction)),
        },
    }
}

pub fn event_type_performance(merged: &[MergedEventRecord]) -> Vec<EventTypePerformance> {
    let mut groups: BTreeMap<&str, Vec<&MergedEventRecord>> = BTreeMap::new();
    for record in merged {
        groups
            .entry(record.characteristics.event_type.as_str())
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|(event_type, rows)| EventTypePerformance {
            event_type: event_type.to_string(),
            event_count: rows.len(),
            avg_attendance: nan_mean(rows.iter().map(|r| r.sales.total_attendance)),
            attendance_std: nan_std(rows.iter().map(|r| r.sales.total_attendance)),
            avg_transactions: nan_mean(rows.iter().map(|r| r.sales.transactions)),
            avg_sales: nan_mean(rows.iter().map(|r| r.sales.net_sales)),
            avg_units: nan_mean(rows.iter().map(|r| r.sales.units)),
        })
        .collect()
}

pub fn day_of_week_performance(merged: &[MergedEventRecord]) -> Vec<DayOfWeekPerformance> {
    let mut groups: BTreeMap<u32, Vec<&MergedEventRecord>> = BTreeMap::new();
    for record in merged {
        let weekday = record.characteristics.calendar_date.weekday();
        groups
            .entry(weekday.num_days_from_monday())
            .or_default()
            .push(record);
    }

    groups
        .into_values()
        .map(|rows| {
            let weekday = rows[0].characteristics.calendar_date.weekday();
            DayOfWeekPerformance {
                day_of_week: weekday_name(weekday).to_string(),
                event_count: rows.len(),
                avg_attendance: nan_mean(rows.iter().map(|r| r.sales.total_attendance)),
                avg_transactions: nan_mean(rows.iter().map(|r| r.sales.transactions)),
                avg_sales: nan_mean(rows.iter().map(|r| r.sales.net_sales)),
            }
        })
        .collect()
}

pub fn stand_performance(stands: &[StandSalesRecord]) -> Vec<StandPerformance> {
    let mut groups: BTreeMap<&str, Vec<&StandSalesRecord>> = BTreeMap::new();
    for record in stands {
        groups.entry(record.stand_group.as_str()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(group, rows)| StandPerformance {
            stand_group: group.to_string(),
            total_transactions: nan_sum(rows.iter().map(|r| r.transactions)),
            avg_transactions: nan_mean(rows.iter().map(|r| r.transactions)),
            total_sales: nan_sum(rows.iter().map(|r| r.net_sales)),
            avg_sales: nan_mean(rows.iter().map(|r| r.net_sales)),
            total_units: nan_sum(rows.iter().map(|r| r.units)),
            avg_units: nan_mean(rows.iter().map(|r| r.units)),
            avg_pos: nan_mean(rows.iter().map(|r| r.total_pos)),
            trans_per_pos: nan_mean(rows.iter().filter_map(|r| r.trans_per_pos)),
            units_per_trans: nan_mean(rows.iter().filter_map(|r| r.units_per_trans)),
        })
        .collect()
}

pub fn historical_series(merged: &[MergedEventRecord]) -> Vec<HistoricalPoint> {
    merged
        .iter()
        .map(|r| {
            let chars = &r.characteristics;
            HistoricalPoint {
                date: chars.calendar_date,
                event_type: chars.event_type.clone(),
                opponent: chars.opponent.clone(),
                attendance: r.sales.total_attendance,
                transactions: r.sales.transactions,
                net_sales: r.sales.net_sales,
                units: r.sales.units,
                day_of_week: weekday_name(chars.calendar_date.weekday()).to_string(),
                trans_per_attendee: r.ratios.and_then(|m| defined(m.trans_per_attendee)),
                sales_per_attendee: r.ratios.and_then(|m| defined(m.sales_per_attendee)),
            }
        })
        .collect()
}

fn nan_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

fn defined(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}
