//! Naive moving-average forecasts over monthly financial history.
//!
//! Each series is projected flat: the trailing mean of the last
//! `forecast_window` months is repeated for every month of the horizon.

use chrono::{Datelike, Months};
use serde::Serialize;

use super::metrics::{group_by, mean_of, sum_of};
use super::period::PeriodKey;
use crate::config::AnalyticsConfig;
use crate::models::{FinancialRecord, Granularity};
use crate::store::Table;

/// Half-width of the band drawn around forecast points, as a fraction.
const BAND_FRACTION: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForecastKind {
    Historical,
    Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period_label: String,
    pub value: f64,
    pub kind: ForecastKind,
    /// Only set on forecast points.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl ForecastPoint {
    fn historical(month: PeriodKey, value: f64) -> Self {
        Self {
            period_label: month.label(),
            value,
            kind: ForecastKind::Historical,
            lower: None,
            upper: None,
        }
    }

    fn projected(period_label: String, value: f64) -> Self {
        Self {
            period_label,
            value,
            kind: ForecastKind::Forecast,
            lower: Some(value * (1.0 - BAND_FRACTION)),
            upper: Some(value * (1.0 + BAND_FRACTION)),
        }
    }
}

/// Outcome of a forecast request. Too little history is a normal state,
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Forecast<T = Vec<ForecastPoint>> {
    Ready(T),
    InsufficientHistory { months: usize, required: usize },
}

impl<T> Forecast<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::InsufficientHistory { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

// ═══════════════════════════════════════════════════════════
// History
// ═══════════════════════════════════════════════════════════

/// One month of the history the forecasts are built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub month: PeriodKey,
    pub revenue: f64,
    pub collection_rate: Option<f64>,
    pub expenses: f64,
}

/// Summed revenue and expenses with mean collection rate, per month,
/// oldest first.
pub fn monthly_history(financial: &Table<FinancialRecord>) -> Vec<MonthlyPoint> {
    group_by(&financial.rows, |r| {
        r.date.map(|d| PeriodKey::for_date(d, Granularity::Month))
    })
    .into_iter()
    .map(|(month, rows)| MonthlyPoint {
        month,
        revenue: sum_of(&rows, |r| r.total_revenue),
        collection_rate: mean_of(&rows, |r| r.collection_rate),
        expenses: sum_of(&rows, |r| r.total_expenses),
    })
    .collect()
}

/// Labels of the `count` months following `last`.
fn following_months(last: PeriodKey, count: usize) -> Vec<String> {
    let Some(start) = last.month_start() else {
        return Vec::new();
    };
    (1..=count as u32)
        .filter_map(|n| start.checked_add_months(Months::new(n)))
        .map(|d| format!("{:04}-{:02}", d.year(), d.month()))
        .collect()
}

/// Flat projection of `values` past `last_month`. Missing values are
/// skipped, both when counting history and inside the window.
pub fn forecast_series(values: &[Option<f64>], last_month: PeriodKey, config: &AnalyticsConfig) -> Forecast {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.len() < config.forecast_min_history || present.is_empty() {
        return Forecast::InsufficientHistory {
            months: present.len(),
            required: config.forecast_min_history,
        };
    }

    let window = config.forecast_window.clamp(1, present.len());
    let tail = &present[present.len() - window..];
    let projected = tail.iter().sum::<f64>() / window as f64;

    Forecast::Ready(
        following_months(last_month, config.forecast_horizon)
            .into_iter()
            .map(|label| ForecastPoint::projected(label, projected))
            .collect(),
    )
}

fn relative_change(current: f64, reference: f64) -> Option<f64> {
    (reference != 0.0).then(|| (current / reference - 1.0) * 100.0)
}

/// Headline figures shown next to a forecast chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub next_month: f64,
    /// Against the last actual month.
    pub next_month_delta_pct: Option<f64>,
    pub horizon_total: f64,
    pub last_three_total: f64,
    pub horizon_delta_pct: Option<f64>,
}

impl ForecastSummary {
    fn new(history: &[f64], forecast: &[f64]) -> Option<Self> {
        let next_month = *forecast.first()?;
        let last_actual = *history.last()?;
        let horizon_total: f64 = forecast.iter().sum();
        let last_three_total: f64 = history.iter().rev().take(3).sum();
        Some(Self {
            next_month,
            next_month_delta_pct: relative_change(next_month, last_actual),
            horizon_total,
            last_three_total,
            horizon_delta_pct: relative_change(horizon_total, last_three_total),
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Revenue
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueForecast {
    /// Historical points followed by forecast points.
    pub points: Vec<ForecastPoint>,
    pub summary: Option<ForecastSummary>,
}

pub fn revenue_forecast(history: &[MonthlyPoint], config: &AnalyticsConfig) -> Forecast<RevenueForecast> {
    let Some(last) = history.last() else {
        return Forecast::InsufficientHistory {
            months: 0,
            required: config.forecast_min_history,
        };
    };
    let values: Vec<Option<f64>> = history.iter().map(|p| Some(p.revenue)).collect();

    match forecast_series(&values, last.month, config) {
        Forecast::Ready(forecast) => {
            let actual: Vec<f64> = history.iter().map(|p| p.revenue).collect();
            let projected: Vec<f64> = forecast.iter().map(|p| p.value).collect();
            let mut points: Vec<ForecastPoint> = history
                .iter()
                .map(|p| ForecastPoint::historical(p.month, p.revenue))
                .collect();
            points.extend(forecast);
            Forecast::Ready(RevenueForecast {
                points,
                summary: ForecastSummary::new(&actual, &projected),
            })
        }
        Forecast::InsufficientHistory { months, required } => {
            tracing::debug!(months, required, "Revenue forecast skipped");
            Forecast::InsufficientHistory { months, required }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Cash flow
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowRow {
    pub period_label: String,
    pub collections: f64,
    pub expenses: f64,
    pub cash_flow: f64,
    pub kind: ForecastKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowProjection {
    pub rows: Vec<CashFlowRow>,
    pub summary: Option<ForecastSummary>,
}

/// Collections (revenue × collection rate) less expenses, historical and
/// projected. Revenue, collection rate and expenses are each forecast on
/// their own before being combined.
pub fn cash_flow_projection(history: &[MonthlyPoint], config: &AnalyticsConfig) -> Forecast<CashFlowProjection> {
    let Some(last) = history.last() else {
        return Forecast::InsufficientHistory {
            months: 0,
            required: config.forecast_min_history,
        };
    };
    let series = |value: fn(&MonthlyPoint) -> Option<f64>| -> Vec<Option<f64>> {
        history.iter().map(value).collect()
    };

    let revenue = forecast_series(&series(|p| Some(p.revenue)), last.month, config);
    let rate = forecast_series(&series(|p| p.collection_rate), last.month, config);
    let expenses = forecast_series(&series(|p| Some(p.expenses)), last.month, config);

    let (Some(revenue), Some(rate), Some(expenses)) = (revenue.ready(), rate.ready(), expenses.ready()) else {
        // Revenue and expenses cover every month, so the rate series is the short one.
        return Forecast::InsufficientHistory {
            months: history.iter().filter(|p| p.collection_rate.is_some()).count(),
            required: config.forecast_min_history,
        };
    };

    let row = |period_label: String, revenue: f64, rate: f64, expenses: f64, kind| {
        let collections = revenue * rate / 100.0;
        CashFlowRow {
            period_label,
            collections,
            expenses,
            cash_flow: collections - expenses,
            kind,
        }
    };

    let historical: Vec<CashFlowRow> = history
        .iter()
        .map(|p| {
            row(
                p.month.label(),
                p.revenue,
                p.collection_rate.unwrap_or(0.0),
                p.expenses,
                ForecastKind::Historical,
            )
        })
        .collect();
    let projected: Vec<CashFlowRow> = revenue
        .iter()
        .zip(rate)
        .zip(expenses)
        .map(|((rev, rate), exp)| {
            row(rev.period_label.clone(), rev.value, rate.value, exp.value, ForecastKind::Forecast)
        })
        .collect();

    let actual: Vec<f64> = historical.iter().map(|r| r.cash_flow).collect();
    let forecast: Vec<f64> = projected.iter().map(|r| r.cash_flow).collect();
    let summary = ForecastSummary::new(&actual, &forecast);

    let mut rows = historical;
    rows.extend(projected);
    Forecast::Ready(CashFlowProjection { rows, summary })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Domain, TableSchema};

    fn month(m: u32) -> PeriodKey {
        PeriodKey::Month { year: 2024, month: m }
    }

    fn history(revenues: &[f64]) -> Vec<MonthlyPoint> {
        revenues
            .iter()
            .enumerate()
            .map(|(i, &revenue)| MonthlyPoint {
                month: month(i as u32 + 1),
                revenue,
                collection_rate: Some(90.0),
                expenses: revenue / 2.0,
            })
            .collect()
    }

    #[test]
    fn six_months_project_trailing_mean() {
        let values: Vec<Option<f64>> = [100.0, 110.0, 120.0, 130.0, 140.0, 150.0]
            .into_iter()
            .map(Some)
            .collect();
        let Forecast::Ready(points) = forecast_series(&values, month(6), &AnalyticsConfig::default()) else {
            panic!("expected a forecast");
        };

        assert_eq!(points.len(), 3);
        let labels: Vec<&str> = points.iter().map(|p| p.period_label.as_str()).collect();
        assert_eq!(labels, ["2024-07", "2024-08", "2024-09"]);
        assert!(points.iter().all(|p| p.value == 140.0));
        assert!(points.iter().all(|p| p.kind == ForecastKind::Forecast));
    }

    #[test]
    fn zero_window_uses_last_value() {
        let values: Vec<Option<f64>> = (1..=6).map(|v| Some(v as f64 * 10.0)).collect();
        let config = AnalyticsConfig {
            forecast_window: 0,
            ..AnalyticsConfig::default()
        };
        let out = forecast_series(&values, month(6), &config);
        assert!(out.ready().unwrap().iter().all(|p| p.value == 60.0));
    }

    #[test]
    fn five_months_is_insufficient() {
        let values = vec![Some(1.0); 5];
        assert_eq!(
            forecast_series(&values, month(5), &AnalyticsConfig::default()),
            Forecast::InsufficientHistory {
                months: 5,
                required: 6
            }
        );
    }

    #[test]
    fn labels_roll_over_year_end() {
        let values = vec![Some(1.0); 6];
        let last = PeriodKey::Month {
            year: 2023,
            month: 11,
        };
        let out = forecast_series(&values, last, &AnalyticsConfig::default());
        let labels: Vec<String> = out.ready().unwrap().iter().map(|p| p.period_label.clone()).collect();
        assert_eq!(labels, ["2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn missing_values_do_not_count_as_history() {
        let values = vec![Some(1.0), None, Some(1.0), Some(1.0), Some(1.0), Some(1.0)];
        assert!(!forecast_series(&values, month(6), &AnalyticsConfig::default()).is_ready());
    }

    #[test]
    fn revenue_forecast_summary() {
        let out = revenue_forecast(&history(&[100.0, 110.0, 120.0, 130.0, 140.0, 150.0]), &AnalyticsConfig::default());
        let forecast = out.ready().unwrap();
        assert_eq!(forecast.points.len(), 9);
        assert_eq!(forecast.points[5].kind, ForecastKind::Historical);
        assert!((forecast.points[6].lower.unwrap() - 126.0).abs() < 1e-9);

        let summary = forecast.summary.as_ref().unwrap();
        assert_eq!(summary.next_month, 140.0);
        assert_eq!(summary.horizon_total, 420.0);
        assert_eq!(summary.last_three_total, 420.0);
        assert_eq!(summary.horizon_delta_pct, Some(0.0));
        assert!((summary.next_month_delta_pct.unwrap() - (140.0 / 150.0 - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn cash_flow_combines_independent_forecasts() {
        let out = cash_flow_projection(&history(&[100.0; 6]), &AnalyticsConfig::default());
        let projection = out.ready().unwrap();
        assert_eq!(projection.rows.len(), 9);

        let next = &projection.rows[6];
        assert_eq!(next.kind, ForecastKind::Forecast);
        assert!((next.collections - 90.0).abs() < 1e-9);
        assert!((next.cash_flow - 40.0).abs() < 1e-9);
    }

    #[test]
    fn cash_flow_needs_collection_rate_history() {
        let mut points = history(&[100.0; 6]);
        points[0].collection_rate = None;
        assert!(!cash_flow_projection(&points, &AnalyticsConfig::default()).is_ready());
        assert!(revenue_forecast(&points, &AnalyticsConfig::default()).is_ready());
    }

    #[test]
    fn monthly_history_sums_locations() {
        let row = |d: u32, revenue: f64, rate: f64| FinancialRecord {
            date: NaiveDate::from_ymd_opt(2024, 2, d),
            total_revenue: Some(revenue),
            total_expenses: Some(10.0),
            collection_rate: Some(rate),
            ..Default::default()
        };
        let t = Table {
            rows: vec![row(1, 100.0, 80.0), row(15, 50.0, 90.0)],
            schema: TableSchema::empty(Domain::Financial),
        };
        let out = monthly_history(&t);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].revenue, 150.0);
        assert_eq!(out[0].expenses, 20.0);
        assert_eq!(out[0].collection_rate, Some(85.0));
    }
}
