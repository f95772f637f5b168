//! The consolidated analysis report and its human-readable insights.

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

use crate::analytics::HistoricalSummary;
use crate::ml::{
    DerivedMetrics, EventDescriptor, EventPrediction, ModelSummary, PredictionResult,
    TargetMetric, TrainedMetricModel,
};
use crate::risk::{RiskAssessment, RiskLevel};
use crate::staffing::StaffingPlan;

/// Everything one analysis run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub event: EventDescriptor,
    pub predictions: PredictionResult,
    pub derived_metrics: DerivedMetrics,
    pub staffing: StaffingPlan,
    pub model_summaries: Vec<ModelSummary>,
    pub risk: RiskAssessment,
    pub history: HistoricalSummary,
    pub insights: Vec<String>,
}

impl AnalysisReport {
    pub fn prediction(&self, target: TargetMetric) -> Option<f64> {
        self.predictions.get(target)
    }
}

pub fn assemble_report(
    event: EventDescriptor,
    prediction: EventPrediction,
    staffing: StaffingPlan,
    models: &[TrainedMetricModel],
    risk: RiskAssessment,
    history: HistoricalSummary,
) -> AnalysisReport {
    let insights = build_insights(&prediction.predictions, &staffing, &risk);
    AnalysisReport {
        event,
        predictions: prediction.predictions,
        derived_metrics: prediction.derived,
        staffing,
        model_summaries: models.iter().map(TrainedMetricModel::summary).collect(),
        risk,
        history,
        insights,
    }
}

fn build_insights(
    predictions: &PredictionResult,
    staffing: &StaffingPlan,
    risk: &RiskAssessment,
) -> Vec<String> {
    let mut insights = Vec::new();

    if let (Some(transactions), Some(sales)) = (
        predictions.get(TargetMetric::Transactions),
        predictions.get(TargetMetric::NetSales),
    ) {
        insights.push(format!(
            "Expected {} transactions generating {}",
            format_count(transactions),
            format_currency(sales)
        ));
    }

    insights.push(format!(
        "Recommend {} POS terminals",
        format_count(f64::from(staffing.total_terminals))
    ));
    insights.push(
        "Focus on efficient service during peak pre-game and halftime periods".to_string(),
    );

    if let Some(busiest) = staffing.busiest_group() {
        insights.push(format!(
            "Monitor {} stands closely as they typically see highest volume",
            busiest.stand_group
        ));
    }

    if let (RiskLevel::Medium, Some(gap)) = (
        risk.attendance_risk.risk_level,
        risk.attendance_risk.attendance_gap,
    ) {
        insights.push(format!(
            "Attendance is forecast {} below the {} average",
            format_count(gap),
            risk.event_type
        ));
    }

    insights
}

/// Whole number with thousands separators, e.g. `12,346`.
pub fn format_count(value: f64) -> String {
    (value.round() as i64).to_formatted_string(&Locale::en)
}

/// Dollar amount with thousands separators and cents, e.g. `$1,234.50`.
pub fn format_currency(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!(
        "{sign}${}.{:02}",
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}
