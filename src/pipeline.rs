//! One analysis run: load, merge, derive, train, then forecast an event.

use std::path::Path;

use serde::Deserialize;

use crate::analytics::summarize_history;
use crate::data::{MergedEventRecord, SourceTables, StandSalesRecord, load_tables, merge_events};
use crate::error::Result;
use crate::features::derive_features;
use crate::ml::{
    EventDescriptor, ModelSettings, TargetMetric, TrainedMetricModel, predict_event, train_models,
};
use crate::report::{AnalysisReport, assemble_report};
use crate::risk::{DEFAULT_ATTENDANCE_GAP_THRESHOLD, assess_risk};
use crate::staffing::allocate_staffing;

/// Tunables for a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisSettings {
    pub model: ModelSettings,
    pub attendance_gap_threshold: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            attendance_gap_threshold: DEFAULT_ATTENDANCE_GAP_THRESHOLD,
        }
    }
}

/// State owned by a single run. Built once, then used read-only to forecast.
#[derive(Debug)]
pub struct AnalysisContext {
    settings: AnalysisSettings,
    merged: Vec<MergedEventRecord>,
    stand_sales: Vec<StandSalesRecord>,
    models: Vec<TrainedMetricModel>,
}

impl AnalysisContext {
    /// Load the sheets at `source` (a workbook or CSV directory) and train on them.
    pub fn load(source: &Path, settings: AnalysisSettings) -> Result<Self> {
        let tables = load_tables(source)?;
        Self::from_tables(tables, settings)
    }

    /// Merge, derive features and train on already parsed sheets.
    pub fn from_tables(tables: SourceTables, settings: AnalysisSettings) -> Result<Self> {
        let SourceTables {
            characteristics,
            event_sales,
            stand_sales,
        } = tables;

        let mut merged = merge_events(&characteristics, &event_sales);
        if merged.is_empty() {
            tracing::warn!("No events matched between characteristics and sales");
        }
        derive_features(&mut merged);

        let models = train_models(&merged, &settings.model)?;

        Ok(Self {
            settings,
            merged,
            stand_sales,
            models,
        })
    }

    /// Forecast `event` and assemble the full report.
    pub fn analyze(&self, event: &EventDescriptor) -> Result<AnalysisReport> {
        tracing::info!(
            "Forecasting {} vs {} with {} attendance",
            event.event_type,
            event.opponent,
            event.attendance
        );

        let prediction = predict_event(event, &self.models)?;
        let transactions = prediction
            .predictions
            .get(TargetMetric::Transactions)
            .unwrap_or(0.0);
        let staffing = allocate_staffing(transactions, &self.stand_sales)?;
        let risk = assess_risk(
            event,
            &prediction,
            &self.merged,
            self.settings.attendance_gap_threshold,
        );
        let history = summarize_history(&self.merged, &self.stand_sales);

        Ok(assemble_report(
            event.clone(),
            prediction,
            staffing,
            &self.models,
            risk,
            history,
        ))
    }

    pub fn merged(&self) -> &[MergedEventRecord] {
        &self.merged
    }

    pub fn models(&self) -> &[TrainedMetricModel] {
        &self.models
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }
}

/// Run every stage for one event. Any stage failure aborts the run.
pub fn run_full_analysis(
    source: &Path,
    event: &EventDescriptor,
    settings: &AnalysisSettings,
) -> Result<AnalysisReport> {
    tracing::info!("Starting analysis of {}", source.display());
    let context = AnalysisContext::load(source, settings.clone())?;
    let report = context.analyze(event)?;
    tracing::info!("Analysis complete: {} insights", report.insights.len());
    Ok(report)
}
