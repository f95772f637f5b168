//! Turning a predicted transaction total into per-stand terminal counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::StandSalesRecord;
use crate::error::{AnalysisError, Result};
use crate::features::nan_mean;

/// Relative slack absorbed before rounding terminal counts up, so that
/// `2400.0000000000005 / 150` still needs 16 terminals.
const CEIL_TOLERANCE: f64 = 1e-9;

const RECOMMENDATIONS: [&str; 4] = [
    "Focus staffing during peak pre-game and halftime periods",
    "Monitor the highest-volume stand groups for transaction surges",
    "Have backup staff ready for unexpected demand spikes",
    "Consider promoting higher-margin items to boost revenue per transaction",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingAllocation {
    pub stand_group: String,
    /// Fraction of all historical stand transactions made at this group.
    pub historical_share: f64,
    pub predicted_transactions: f64,
    pub terminals_needed: u32,
    /// Mean historical transactions per terminal.
    pub avg_trans_per_pos: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingPlan {
    /// One entry per stand group, ordered by group name.
    pub allocations: Vec<StaffingAllocation>,
    pub total_terminals: u32,
    /// One cashier per terminal.
    pub total_cashiers: u32,
    pub recommendations: Vec<String>,
}

impl StaffingPlan {
    /// The group expected to take the most transactions. Ties go to the
    /// first group by name.
    pub fn busiest_group(&self) -> Option<&StaffingAllocation> {
        self.allocations.iter().fold(None, |best, a| match best {
            Some(b) if b.historical_share >= a.historical_share => Some(b),
            _ => Some(a),
        })
    }
}

#[derive(Default)]
struct GroupTotals {
    transactions: f64,
    efficiencies: Vec<f64>,
}

/// Split `predicted_transactions` across stand groups in proportion to their
/// historical transaction share and size each group by its mean historical
/// transactions per terminal.
///
/// Assumes the forecast event's stand mix mirrors the aggregate historical
/// mix. Every group gets at least one terminal. A zero grand total, or a group
/// with no usable efficiency figure, fails the allocation.
pub fn allocate_staffing(
    predicted_transactions: f64,
    stand_records: &[StandSalesRecord],
) -> Result<StaffingPlan> {
    let mut groups: BTreeMap<&str, GroupTotals> = BTreeMap::new();
    for record in stand_records {
        let totals = groups.entry(record.stand_group.as_str()).or_default();
        totals.transactions += record.transactions;
        if let Some(efficiency) = record.trans_per_pos {
            totals.efficiencies.push(efficiency);
        }
    }

    let grand_total: f64 = groups.values().map(|g| g.transactions).sum();
    if grand_total == 0.0 || !grand_total.is_finite() {
        return Err(AnalysisError::insufficient(
            "stand sales contain no transactions to derive shares from",
        ));
    }

    let mut allocations = Vec::with_capacity(groups.len());
    for (name, totals) in &groups {
        let avg_trans_per_pos = nan_mean(totals.efficiencies.iter().copied())
            .filter(|e| *e > 0.0)
            .ok_or_else(|| {
                AnalysisError::insufficient(format!(
                    "stand group '{name}' has no positive Trans Per POS history"
                ))
            })?;

        let historical_share = totals.transactions / grand_total;
        let predicted = historical_share * predicted_transactions;
        let terminals_needed = terminals_for(predicted, avg_trans_per_pos);

        tracing::debug!(
            "{}: share {:.3}, {:.0} transactions, {} terminals",
            name,
            historical_share,
            predicted,
            terminals_needed
        );

        allocations.push(StaffingAllocation {
            stand_group: name.to_string(),
            historical_share,
            predicted_transactions: predicted,
            terminals_needed,
            avg_trans_per_pos,
        });
    }

    let total_terminals = allocations.iter().map(|a| a.terminals_needed).sum();
    tracing::info!(
        "Staffing plan: {} terminals across {} stand groups",
        total_terminals,
        allocations.len()
    );

    Ok(StaffingPlan {
        allocations,
        total_terminals,
        total_cashiers: total_terminals,
        recommendations: RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
    })
}

fn terminals_for(predicted: f64, trans_per_pos: f64) -> u32 {
    let raw = predicted / trans_per_pos;
    let rounded = (raw - CEIL_TOLERANCE * raw.abs().max(1.0)).ceil();
    if rounded.is_finite() && rounded > 1.0 {
        rounded as u32
    } else {
        1
    }
}
