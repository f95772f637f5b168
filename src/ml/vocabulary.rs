//! Categorical label vocabularies.

use serde::{Deserialize, Serialize};

use super::FeatureRow;
use super::predictor::EventDescriptor;
use crate::data::MergedEventRecord;
use crate::error::{AnalysisError, Result};

/// Sorted set of the labels one categorical feature took during training.
///
/// A label's code is its position in sorted order. Encoding a label that was
/// never seen is an error rather than a silent default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    feature: String,
    labels: Vec<String>,
}

impl CategoryVocabulary {
    pub fn fit<'a, I>(feature: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(str::to_string).collect();
        labels.sort();
        labels.dedup();
        Self {
            feature: feature.to_string(),
            labels,
        }
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.labels
            .binary_search_by(|entry| entry.as_str().cmp(label))
            .map_err(|_| AnalysisError::UnseenCategory {
                feature: self.feature.clone(),
                label: label.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.encode(label).is_ok()
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The three vocabularies a model needs to encode its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVocabularies {
    pub event_type: CategoryVocabulary,
    pub opponent: CategoryVocabulary,
    pub day_of_week: CategoryVocabulary,
}

impl FeatureVocabularies {
    /// Build vocabularies from a derived merged table.
    pub fn fit(records: &[MergedEventRecord]) -> Result<Self> {
        let mut days = Vec::with_capacity(records.len());
        for record in records {
            let calendar = record
                .calendar
                .as_ref()
                .ok_or_else(|| AnalysisError::feature_mismatch("DayOfWeek"))?;
            days.push(calendar.day_of_week.as_str());
        }

        Ok(Self {
            event_type: CategoryVocabulary::fit(
                "event type",
                records.iter().map(|r| r.characteristics.event_type.as_str()),
            ),
            opponent: CategoryVocabulary::fit(
                "opponent",
                records.iter().map(|r| r.characteristics.opponent.as_str()),
            ),
            day_of_week: CategoryVocabulary::fit("day of week", days),
        })
    }

    /// Encode a historical row. The row must have been through feature derivation.
    pub fn encode_record(&self, record: &MergedEventRecord) -> Result<FeatureRow> {
        let calendar = record
            .calendar
            .as_ref()
            .ok_or_else(|| AnalysisError::feature_mismatch("DayOfWeek"))?;

        Ok(FeatureRow {
            attendance: record.sales.total_attendance,
            event_type_code: self.event_type.encode(&record.characteristics.event_type)? as f64,
            opponent_code: self.opponent.encode(&record.characteristics.opponent)? as f64,
            day_of_week_code: self.day_of_week.encode(&calendar.day_of_week)? as f64,
            month: f64::from(calendar.month),
            hour: f64::from(calendar.hour),
            is_weekend: if calendar.is_weekend { 1.0 } else { 0.0 },
        })
    }

    /// Encode a hypothetical event.
    pub fn encode_event(&self, event: &EventDescriptor) -> Result<FeatureRow> {
        Ok(FeatureRow {
            attendance: event.attendance,
            event_type_code: self.event_type.encode(&event.event_type)? as f64,
            opponent_code: self.opponent.encode(&event.opponent)? as f64,
            day_of_week_code: self.day_of_week.encode(&event.day_of_week)? as f64,
            month: f64::from(event.month),
            hour: f64::from(event.hour),
            is_weekend: if event.is_weekend { 1.0 } else { 0.0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_order() {
        let vocab = CategoryVocabulary::fit(
            "opponent",
            ["Utah Jazz", "Boston Celtics", "Utah Jazz", "Miami Heat"],
        );

        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.encode("Boston Celtics").unwrap(), 0);
        assert_eq!(vocab.encode("Miami Heat").unwrap(), 1);
        assert_eq!(vocab.encode("Utah Jazz").unwrap(), 2);
        assert_eq!(vocab.decode(1), Some("Miami Heat"));
        assert_eq!(vocab.decode(3), None);
    }

    #[test]
    fn test_unseen_label_fails() {
        let vocab = CategoryVocabulary::fit("opponent", ["Boston Celtics"]);

        let err = vocab.encode("Seattle SuperSonics").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::UnseenCategory { ref feature, ref label }
                if feature == "opponent" && label == "Seattle SuperSonics"
        ));
        assert!(!vocab.contains("Seattle SuperSonics"));
    }

    #[test]
    fn test_empty_vocabulary() {
        let vocab = CategoryVocabulary::fit("event type", std::iter::empty());
        assert!(vocab.is_empty());
        assert!(vocab.encode("Concert").is_err());
    }
}
