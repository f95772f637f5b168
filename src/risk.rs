//! Comparing a forecast event against past events of the same type.

use serde::{Deserialize, Serialize};

use crate::data::MergedEventRecord;
use crate::features::nan_mean;
use crate::ml::{EventDescriptor, EventPrediction};

/// Default attendance shortfall above which an event is flagged.
pub const DEFAULT_ATTENDANCE_GAP_THRESHOLD: f64 = 2000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRisk {
    pub predicted_attendance: f64,
    /// Mean attendance of past events of the same type.
    pub historical_avg_attendance: Option<f64>,
    /// Historical mean minus the forecast; positive means a smaller crowd.
    pub attendance_gap: Option<f64>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueRisk {
    pub predicted_trans_per_attendee: Option<f64>,
    pub historical_trans_per_attendee: Option<f64>,
    /// Historical minus predicted transactions per attendee.
    pub performance_gap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub event_type: String,
    /// Number of past events the comparison is based on.
    pub comparable_events: usize,
    pub attendance_risk: AttendanceRisk,
    pub revenue_risk: RevenueRisk,
    pub operational_risks: Vec<String>,
    pub opportunities: Vec<String>,
    pub mitigation_strategies: Vec<String>,
}

/// Assess a forecast against the history of its event type.
///
/// Attendance risk is `Medium` when the forecast falls short of the
/// historical mean by more than `attendance_gap_threshold`.
pub fn assess_risk(
    event: &EventDescriptor,
    prediction: &EventPrediction,
    history: &[MergedEventRecord],
    attendance_gap_threshold: f64,
) -> RiskAssessment {
    let comparable: Vec<&MergedEventRecord> = history
        .iter()
        .filter(|r| r.characteristics.event_type == event.event_type)
        .collect();

    let historical_avg_attendance = nan_mean(comparable.iter().map(|r| r.sales.total_attendance));
    let historical_trans_per_attendee = nan_mean(
        comparable
            .iter()
            .filter_map(|r| r.ratios.map(|ratios| ratios.trans_per_attendee)),
    );

    let attendance_gap = historical_avg_attendance.map(|avg| avg - event.attendance);
    let risk_level = match attendance_gap {
        Some(gap) if gap > attendance_gap_threshold => RiskLevel::Medium,
        _ => RiskLevel::Low,
    };

    let predicted_trans_per_attendee = prediction.derived.trans_per_attendee;
    let performance_gap = historical_trans_per_attendee
        .zip(predicted_trans_per_attendee)
        .map(|(historical, predicted)| historical - predicted);

    tracing::info!(
        "Risk: {} attendance risk against {} past {} events",
        risk_level,
        comparable.len(),
        event.event_type
    );

    RiskAssessment {
        event_type: event.event_type.clone(),
        comparable_events: comparable.len(),
        attendance_risk: AttendanceRisk {
            predicted_attendance: event.attendance,
            historical_avg_attendance,
            attendance_gap,
            risk_level,
        },
        revenue_risk: RevenueRisk {
            predicted_trans_per_attendee,
            historical_trans_per_attendee,
            performance_gap,
        },
        operational_risks: operational_risks(event, attendance_gap),
        opportunities: opportunities(event),
        mitigation_strategies: vec![
            "Have flexible staffing model to adjust POS terminals as needed".to_string(),
            "Monitor real-time queue lengths and adjust staffing".to_string(),
            "Prepare promotional materials for slower-moving inventory".to_string(),
            "Ensure backup payment systems are available".to_string(),
        ],
    }
}

fn part_of_day(hour: u32) -> &'static str {
    match hour {
        0..12 => "morning",
        12..17 => "afternoon",
        _ => "evening",
    }
}

fn operational_risks(event: &EventDescriptor, attendance_gap: Option<f64>) -> Vec<String> {
    let crowd = match attendance_gap {
        Some(gap) if gap < 0.0 => {
            "Higher than usual attendance may lengthen queues at peak periods"
        }
        _ => "Lower attendance may reduce economies of scale",
    };
    vec![
        crowd.to_string(),
        format!(
            "{} {} timing may affect concession preferences",
            event.day_of_week,
            part_of_day(event.hour)
        ),
        "Potential for longer lines if understaffed".to_string(),
        "Weather could impact attendance and concession sales".to_string(),
    ]
}

fn opportunities(event: &EventDescriptor) -> Vec<String> {
    let promotion = if event.is_weekend {
        format!(
            "Family-friendly promotions for {} {} event",
            event.day_of_week,
            part_of_day(event.hour)
        )
    } else {
        format!("Post-work specials for {} {} event", event.day_of_week, part_of_day(event.hour))
    };
    vec![
        promotion,
        "Focus on higher-margin items to boost per-transaction revenue".to_string(),
        "Implement mobile ordering to reduce wait times".to_string(),
        "Cross-sell complementary items at high-traffic stands".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::ml::{DerivedMetrics, PredictionResult};
    use crate::ml::training::tests::synthetic_history;

    fn event(attendance: f64, event_type: &str) -> EventDescriptor {
        EventDescriptor::scheduled(
            NaiveDate::from_ymd_opt(2023, 3, 5).unwrap(),
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            attendance,
            event_type,
            "Oklahoma City Thunder",
        )
    }

    fn prediction(trans_per_attendee: Option<f64>) -> EventPrediction {
        EventPrediction {
            predictions: PredictionResult::default(),
            derived: DerivedMetrics {
                trans_per_attendee,
                ..DerivedMetrics::default()
            },
        }
    }

    fn nba_mean_attendance(history: &[MergedEventRecord]) -> f64 {
        let nba: Vec<f64> = history
            .iter()
            .filter(|r| r.characteristics.event_type == "NBA Regular Season")
            .map(|r| r.sales.total_attendance)
            .collect();
        nba.iter().sum::<f64>() / nba.len() as f64
    }

    #[test]
    fn test_gap_above_threshold_is_medium() {
        let history = synthetic_history(30);
        let avg = nba_mean_attendance(&history);
        let forecast = event(avg - 2500.0, "NBA Regular Season");

        let risk = assess_risk(&forecast, &prediction(Some(0.5)), &history, 2000.0);
        assert_eq!(risk.comparable_events, 24);
        assert_eq!(risk.attendance_risk.risk_level, RiskLevel::Medium);
        let gap = risk.attendance_risk.attendance_gap.unwrap();
        assert!((gap - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn test_gap_at_threshold_is_low() {
        let history = synthetic_history(30);
        let avg = nba_mean_attendance(&history);

        let game = event(avg, "NBA Regular Season");
        let risk = assess_risk(&game, &prediction(None), &history, 2000.0);
        assert_eq!(risk.attendance_risk.risk_level, RiskLevel::Low);

        let smaller = event(avg - 1000.0, "NBA Regular Season");
        let risk = assess_risk(&smaller, &prediction(None), &history, 500.0);
        assert_eq!(risk.attendance_risk.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_performance_gap_compares_ratios() {
        let history = synthetic_history(30);
        let concert = event(10000.0, "Concert");
        let risk = assess_risk(&concert, &prediction(Some(0.3)), &history, 2000.0);

        let historical = risk.revenue_risk.historical_trans_per_attendee.unwrap();
        let gap = risk.revenue_risk.performance_gap.unwrap();
        assert!((gap - (historical - 0.3)).abs() < 1e-12);
        assert_eq!(risk.comparable_events, 6);
    }

    #[test]
    fn test_missing_predicted_ratio_leaves_gap_undefined() {
        let history = synthetic_history(10);
        let risk = assess_risk(&event(0.0, "Concert"), &prediction(None), &history, 2000.0);

        assert!(risk.revenue_risk.historical_trans_per_attendee.is_some());
        assert_eq!(risk.revenue_risk.performance_gap, None);
    }

    #[test]
    fn test_no_comparable_events() {
        let history = synthetic_history(10);
        let risk = assess_risk(&event(10000.0, "Hockey"), &prediction(Some(0.5)), &history, 2000.0);

        assert_eq!(risk.comparable_events, 0);
        assert_eq!(risk.attendance_risk.historical_avg_attendance, None);
        assert_eq!(risk.attendance_risk.risk_level, RiskLevel::Low);
        assert_eq!(risk.revenue_risk.performance_gap, None);
    }

    #[test]
    fn test_templates_describe_the_event() {
        let history = synthetic_history(10);
        let game = event(10000.0, "NBA Regular Season");
        let risk = assess_risk(&game, &prediction(None), &history, 2000.0);

        assert_eq!(risk.operational_risks.len(), 4);
        assert_eq!(
            risk.operational_risks[1],
            "Sunday afternoon timing may affect concession preferences"
        );
        assert_eq!(
            risk.opportunities[0],
            "Family-friendly promotions for Sunday afternoon event"
        );
        assert_eq!(risk.mitigation_strategies.len(), 4);
    }

    #[test]
    fn test_part_of_day() {
        assert_eq!(part_of_day(9), "morning");
        assert_eq!(part_of_day(14), "afternoon");
        assert_eq!(part_of_day(19), "evening");
    }
}
