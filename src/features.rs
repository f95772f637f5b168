//! Calendar and ratio features derived from the merged event table.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::data::MergedEventRecord;

/// Calendar fields derived from an event's date and start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub day_of_week: String,
    pub month: u32,
    pub hour: u32,
    pub is_weekend: bool,
}

impl CalendarFeatures {
    pub fn from_schedule(date: NaiveDate, time: NaiveTime) -> Self {
        let weekday = date.weekday();
        Self {
            day_of_week: weekday_name(weekday).to_string(),
            month: date.month(),
            hour: time.hour(),
            is_weekend: is_weekend(weekday),
        }
    }
}

/// Per-attendee and per-transaction ratios. A ratio is NaN when its
/// denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioMetrics {
    pub trans_per_attendee: f64,
    pub sales_per_attendee: f64,
    pub sales_per_transaction: f64,
}

impl RatioMetrics {
    pub fn compute(attendance: f64, transactions: f64, net_sales: f64) -> Self {
        Self {
            trans_per_attendee: ratio(transactions, attendance),
            sales_per_attendee: ratio(net_sales, attendance),
            sales_per_transaction: ratio(net_sales, transactions),
        }
    }
}

/// Fill in calendar and ratio features on every row.
///
/// Values depend only on the base columns, so running this again over an
/// already derived table reproduces the same values.
pub fn derive_features(records: &mut [MergedEventRecord]) {
    for record in records.iter_mut() {
        let chars = &record.characteristics;
        let sales = &record.sales;
        record.calendar = Some(CalendarFeatures::from_schedule(
            chars.calendar_date,
            chars.event_time,
        ));
        record.ratios = Some(RatioMetrics::compute(
            sales.total_attendance,
            sales.transactions,
            sales.net_sales,
        ));
    }
    tracing::debug!("Derived features for {} events", records.len());
}

/// Divide, yielding NaN instead of an infinite or arbitrary value when the
/// denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Mean of the non-NaN values, `None` if there are none.
pub fn nan_mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Sample standard deviation (n - 1) of the non-NaN values.
pub fn nan_std<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
