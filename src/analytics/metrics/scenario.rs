//! What-if modelling over the latest month of financial data.
//!
//! The baseline is the mean location-row of the most recent month. A
//! scenario scales revenue, the labor and supply portions of expenses, and
//! the collection rate by percentage adjustments, then restates EBITDA and
//! margin against that baseline.

use serde::{Deserialize, Serialize};

use super::{group_by, mean_of, ratio_pct, safe_divide};
use crate::analytics::period::PeriodKey;
use crate::error::AnalyticsError;
use crate::models::{FinancialRecord, Granularity, ServiceLine};
use crate::store::Table;

/// Allowed range for the revenue adjustment, in percent.
pub const REVENUE_CHANGE_RANGE: (f64, f64) = (-20.0, 20.0);
/// Allowed range for the cost and collection adjustments, in percent.
pub const COST_CHANGE_RANGE: (f64, f64) = (-10.0, 10.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceShare {
    pub service_line: String,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioBaseline {
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
    /// Zero when the extract has no labor percentage.
    pub labor_pct: f64,
    pub supply_pct: f64,
    /// Zero when the extract has no collection rate; collections then
    /// equal revenue.
    pub collection_rate: f64,
    pub service_mix: Vec<ServiceShare>,
}

impl ScenarioBaseline {
    /// Means over the rows of the latest month. `None` when no dated row
    /// carries revenue.
    pub fn from_latest_month(financial: &Table<FinancialRecord>) -> Option<Self> {
        let (month, rows) = group_by(&financial.rows, |r| {
            r.date.map(|d| PeriodKey::for_date(d, Granularity::Month))
        })
        .pop_last()?;

        let line_totals: Vec<(ServiceLine, f64)> = ServiceLine::ALL
            .iter()
            .filter_map(|line| {
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|r| r.service_revenue.get(line).copied())
                    .collect();
                (!values.is_empty()).then(|| (*line, values.iter().sum()))
            })
            .collect();
        let mix_total: f64 = line_totals.iter().map(|(_, v)| v).sum();

        Some(Self {
            month: month.label(),
            revenue: mean_of(&rows, |r| r.total_revenue)?,
            expenses: mean_of(&rows, |r| r.total_expenses).unwrap_or(0.0),
            labor_pct: mean_of(&rows, |r| r.labor_cost_percentage).unwrap_or(0.0),
            supply_pct: mean_of(&rows, |r| r.supply_cost_percentage).unwrap_or(0.0),
            collection_rate: mean_of(&rows, |r| r.collection_rate).unwrap_or(0.0),
            service_mix: line_totals
                .into_iter()
                .map(|(line, total)| ServiceShare {
                    service_line: line.display_name(),
                    share: ratio_pct(total, mix_total),
                })
                .collect(),
        })
    }

    pub fn ebitda(&self) -> f64 {
        self.revenue - self.expenses
    }

    pub fn ebitda_margin(&self) -> f64 {
        if self.revenue > 0.0 {
            self.ebitda() / self.revenue * 100.0
        } else {
            0.0
        }
    }
}

/// Percentage adjustments applied to a baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioAdjustments {
    pub revenue_change: f64,
    pub labor_change: f64,
    pub supply_change: f64,
    /// Added to the collection rate in percentage points.
    pub collection_change: f64,
}

impl ScenarioAdjustments {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let check = |name: &str, value: f64, (lo, hi): (f64, f64)| {
            if (lo..=hi).contains(&value) {
                Ok(())
            } else {
                Err(AnalyticsError::InvalidFilter(format!(
                    "{name} must be between {lo}% and {hi}%, got {value}%"
                )))
            }
        };
        check("revenue_change", self.revenue_change, REVENUE_CHANGE_RANGE)?;
        check("labor_change", self.labor_change, COST_CHANGE_RANGE)?;
        check("supply_change", self.supply_change, COST_CHANGE_RANGE)?;
        check("collection_change", self.collection_change, COST_CHANGE_RANGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioMetric {
    pub metric: String,
    pub baseline: f64,
    pub scenario: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub revenue: f64,
    pub expenses: f64,
    pub collections: f64,
    pub ebitda: f64,
    pub ebitda_margin: f64,
    /// Change in EBITDA as a share of baseline revenue, in points.
    pub ebitda_delta: Option<f64>,
    pub margin_delta: Option<f64>,
    pub comparison: Vec<ScenarioMetric>,
}

/// Restate the baseline under `adjustments`.
pub fn run_scenario(baseline: &ScenarioBaseline, adjustments: &ScenarioAdjustments) -> ScenarioOutcome {
    let revenue = baseline.revenue * (1.0 + adjustments.revenue_change / 100.0);

    let portion = |pct: f64| {
        if pct > 0.0 {
            baseline.expenses * pct / 100.0
        } else {
            0.0
        }
    };
    let labor = portion(baseline.labor_pct);
    let supplies = portion(baseline.supply_pct);
    let other = baseline.expenses - labor - supplies;
    let expenses = labor * (1.0 + adjustments.labor_change / 100.0)
        + supplies * (1.0 + adjustments.supply_change / 100.0)
        + other;

    let collections = if baseline.collection_rate > 0.0 {
        revenue * (baseline.collection_rate + adjustments.collection_change) / 100.0
    } else {
        revenue
    };
    let ebitda = collections - expenses;
    let ebitda_margin = if revenue > 0.0 {
        ebitda / revenue * 100.0
    } else {
        0.0
    };

    let has_revenue = baseline.revenue > 0.0;
    ScenarioOutcome {
        revenue,
        expenses,
        collections,
        ebitda,
        ebitda_margin,
        ebitda_delta: has_revenue.then(|| {
            (safe_divide(ebitda, baseline.revenue) - safe_divide(baseline.ebitda(), baseline.revenue)) * 100.0
        }),
        margin_delta: has_revenue.then(|| ebitda_margin - baseline.ebitda_margin()),
        comparison: vec![
            ScenarioMetric {
                metric: "Revenue".into(),
                baseline: baseline.revenue,
                scenario: revenue,
            },
            ScenarioMetric {
                metric: "EBITDA".into(),
                baseline: baseline.ebitda(),
                scenario: ebitda,
            },
            ScenarioMetric {
                metric: "EBITDA Margin (%)".into(),
                baseline: baseline.ebitda_margin(),
                scenario: ebitda_margin,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Domain, TableSchema};

    fn baseline() -> ScenarioBaseline {
        ScenarioBaseline {
            month: "2024-06".into(),
            revenue: 100_000.0,
            expenses: 80_000.0,
            labor_pct: 50.0,
            supply_pct: 25.0,
            collection_rate: 0.0,
            service_mix: Vec::new(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn no_adjustment_reproduces_baseline() {
        let out = run_scenario(&baseline(), &ScenarioAdjustments::default());
        assert!(close(out.revenue, 100_000.0));
        assert!(close(out.expenses, 80_000.0));
        assert!(close(out.ebitda, 20_000.0));
        assert!(close(out.ebitda_margin, 20.0));
        assert!(close(out.margin_delta.unwrap(), 0.0));
    }

    #[test]
    fn labor_increase_only_touches_labor_portion() {
        let adj = ScenarioAdjustments {
            labor_change: 10.0,
            ..Default::default()
        };
        let out = run_scenario(&baseline(), &adj);
        // Labor is 40k of the 80k, so +10% adds 4k.
        assert!(close(out.expenses, 84_000.0));
        assert!(close(out.ebitda, 16_000.0));
        assert!(close(out.ebitda_delta.unwrap(), -4.0));
    }

    #[test]
    fn collection_rate_scales_collections() {
        let mut base = baseline();
        base.collection_rate = 90.0;
        let adj = ScenarioAdjustments {
            revenue_change: 10.0,
            collection_change: 5.0,
            ..Default::default()
        };
        let out = run_scenario(&base, &adj);
        assert!(close(out.revenue, 110_000.0));
        assert!(close(out.collections, 104_500.0));
        assert!(close(out.ebitda, 24_500.0));
        assert_eq!(out.comparison.len(), 3);
        assert!(close(out.comparison[1].baseline, 20_000.0));
    }

    #[test]
    fn zero_revenue_has_no_deltas() {
        let mut base = baseline();
        base.revenue = 0.0;
        let out = run_scenario(&base, &ScenarioAdjustments::default());
        assert_eq!(out.ebitda_margin, 0.0);
        assert_eq!(out.ebitda_delta, None);
        assert_eq!(out.margin_delta, None);
    }

    #[test]
    fn adjustments_are_range_checked() {
        assert!(ScenarioAdjustments::default().validate().is_ok());
        let adj = ScenarioAdjustments {
            labor_change: 12.0,
            ..Default::default()
        };
        assert!(matches!(adj.validate(), Err(AnalyticsError::InvalidFilter(_))));
    }

    #[test]
    fn baseline_uses_latest_month_means() {
        let row = |month: u32, revenue: f64, labor: Option<f64>| FinancialRecord {
            date: NaiveDate::from_ymd_opt(2024, month, 28),
            total_revenue: Some(revenue),
            total_expenses: Some(revenue / 2.0),
            labor_cost_percentage: labor,
            service_revenue: BTreeMap::from([
                (ServiceLine::Preventive, revenue / 4.0),
                (ServiceLine::Restorative, revenue * 3.0 / 4.0),
            ]),
            ..Default::default()
        };
        let t = Table {
            rows: vec![row(5, 999.0, None), row(6, 1000.0, Some(40.0)), row(6, 3000.0, None)],
            schema: TableSchema::empty(Domain::Financial),
        };
        let base = ScenarioBaseline::from_latest_month(&t).unwrap();

        assert_eq!(base.month, "2024-06");
        assert_eq!(base.revenue, 2000.0);
        assert_eq!(base.expenses, 1000.0);
        assert_eq!(base.labor_pct, 40.0);
        assert_eq!(base.supply_pct, 0.0);
        assert_eq!(base.service_mix[0].service_line, "Preventive");
        assert_eq!(base.service_mix[0].share, 25.0);
    }
}
