//! IQR upper-fence anomaly detection over Financial rows.
//!
//! Only the upper fence is checked. Rows with a missing revenue or expense
//! value are never flagged on that metric.

use serde::Serialize;

use crate::models::FinancialRecord;
use crate::store::Table;

/// Upper fences computed from the full Financial set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OutlierBounds {
    pub revenue_upper: Option<f64>,
    pub expense_upper: Option<f64>,
}

impl OutlierBounds {
    pub fn compute(rows: &[FinancialRecord], multiplier: f64) -> Self {
        Self {
            revenue_upper: upper_fence(rows.iter().filter_map(|r| r.total_revenue), multiplier),
            expense_upper: upper_fence(rows.iter().filter_map(|r| r.total_expenses), multiplier),
        }
    }

    pub fn is_anomalous(&self, record: &FinancialRecord) -> bool {
        exceeds(record.total_revenue, self.revenue_upper)
            || exceeds(record.total_expenses, self.expense_upper)
    }
}

fn exceeds(value: Option<f64>, upper: Option<f64>) -> bool {
    matches!((value, upper), (Some(v), Some(u)) if v > u)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    pub clean: Table<FinancialRecord>,
    /// Excluded rows, kept for audit display.
    pub anomalies: Vec<FinancialRecord>,
    pub bounds: OutlierBounds,
}

impl OutlierReport {
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }
}

/// Split the Financial table into clean rows and upper-fence anomalies.
pub fn detect_outliers(financial: &Table<FinancialRecord>, multiplier: f64) -> OutlierReport {
    let bounds = OutlierBounds::compute(&financial.rows, multiplier);

    let (anomalies, clean): (Vec<_>, Vec<_>) = financial
        .rows
        .iter()
        .cloned()
        .partition(|r| bounds.is_anomalous(r));

    if !anomalies.is_empty() {
        tracing::warn!(
            count = anomalies.len(),
            revenue_upper = ?bounds.revenue_upper,
            expense_upper = ?bounds.expense_upper,
            "Excluding anomalous financial rows"
        );
    }

    OutlierReport {
        clean: financial.with_rows(clean),
        anomalies,
        bounds,
    }
}

fn upper_fence(values: impl Iterator<Item = f64>, multiplier: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25)?;
    let q3 = quantile(&sorted, 0.75)?;
    Some(q3 + multiplier * (q3 - q1))
}

/// Linear-interpolation quantile over an ascending slice. `None` when empty.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}
