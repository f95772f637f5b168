//! Applying trained models to a single hypothetical event.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::TargetMetric;
use super::training::TrainedMetricModel;
use crate::error::{AnalysisError, Result};
use crate::features::CalendarFeatures;

/// Description of the event to forecast.
///
/// Categorical labels must have appeared in the training data; anything else
/// is rejected with [`AnalysisError::UnseenCategory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    /// Free-form time for display, e.g. "2:00 PM Eastern".
    pub time_label: Option<String>,
    pub attendance: f64,
    pub event_type: String,
    pub opponent: String,
    pub day_of_week: String,
    pub month: u32,
    pub hour: u32,
    pub is_weekend: bool,
}

impl EventDescriptor {
    /// Build a descriptor from a schedule, deriving the calendar fields the
    /// same way historical rows are derived.
    pub fn scheduled(
        date: NaiveDate,
        start_time: NaiveTime,
        attendance: f64,
        event_type: impl Into<String>,
        opponent: impl Into<String>,
    ) -> Self {
        let calendar = CalendarFeatures::from_schedule(date, start_time);
        Self {
            date: Some(date),
            start_time: Some(start_time),
            time_label: None,
            attendance,
            event_type: event_type.into(),
            opponent: opponent.into(),
            day_of_week: calendar.day_of_week,
            month: calendar.month,
            hour: calendar.hour,
            is_weekend: calendar.is_weekend,
        }
    }

    pub fn with_time_label(mut self, label: impl Into<String>) -> Self {
        self.time_label = Some(label.into());
        self
    }

    /// Human-readable time: the label if set, else the start time or hour.
    pub fn display_time(&self) -> String {
        match (&self.time_label, self.start_time) {
            (Some(label), _) => label.clone(),
            (None, Some(time)) => time.format("%-I:%M %p").to_string(),
            (None, None) => format!("{:02}:00", self.hour),
        }
    }
}

/// Non-negative prediction per target metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionResult(BTreeMap<TargetMetric, f64>);

impl PredictionResult {
    pub fn get(&self, target: TargetMetric) -> Option<f64> {
        self.0.get(&target).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetMetric, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, target: TargetMetric, value: f64) {
        self.0.insert(target, value);
    }
}

impl FromIterator<(TargetMetric, f64)> for PredictionResult {
    fn from_iter<I: IntoIterator<Item = (TargetMetric, f64)>>(iter: I) -> Self {
        let mut result = Self::default();
        for (target, value) in iter {
            result.insert(target, value.max(0.0));
        }
        result
    }
}

/// Ratios of the predictions; `None` where the denominator is zero or the
/// needed prediction is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub trans_per_attendee: Option<f64>,
    pub sales_per_attendee: Option<f64>,
    pub sales_per_transaction: Option<f64>,
}

impl DerivedMetrics {
    pub fn compute(predictions: &PredictionResult, attendance: f64) -> Self {
        let transactions = predictions.get(TargetMetric::Transactions);
        let net_sales = predictions.get(TargetMetric::NetSales);
        Self {
            trans_per_attendee: transactions.and_then(|t| checked_ratio(t, attendance)),
            sales_per_attendee: net_sales.and_then(|s| checked_ratio(s, attendance)),
            sales_per_transaction: net_sales
                .zip(transactions)
                .and_then(|(s, t)| checked_ratio(s, t)),
        }
    }
}

fn checked_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPrediction {
    pub predictions: PredictionResult,
    pub derived: DerivedMetrics,
}

/// Predict every target for `event`, each with its own model and vocabularies.
pub fn predict_event(
    event: &EventDescriptor,
    models: &[TrainedMetricModel],
) -> Result<EventPrediction> {
    let mut predictions = PredictionResult::default();
    for model in models {
        let value = predict_with(model, event)?;
        tracing::debug!("Predicted {}: {:.2}", model.target, value);
        predictions.insert(model.target, value);
    }

    let derived = DerivedMetrics::compute(&predictions, event.attendance);
    Ok(EventPrediction {
        predictions,
        derived,
    })
}

fn predict_with(model: &TrainedMetricModel, event: &EventDescriptor) -> Result<f64> {
    let row = model.vocabularies.encode_event(event)?;
    let values = model
        .feature_names
        .iter()
        .map(|name| {
            row.value(name)
                .ok_or_else(|| AnalysisError::feature_mismatch(name.as_str()))
        })
        .collect::<Result<Vec<f64>>>()?;

    let raw = model.regressor.predict_row(ArrayView1::from(values.as_slice()));
    Ok(raw.max(0.0))
}
