//! Period bucketing, aggregation, and current/prior period comparison.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

use super::metrics::{pct_change, safe_divide};
use crate::export::{self, ExportError};
use crate::models::{Dated, FinancialRecord, Granularity};
use crate::store::Table;

// ═══════════════════════════════════════════════════════════
// PeriodKey
// ═══════════════════════════════════════════════════════════

/// Bucket a record falls into. Derived `Ord` is chronological for keys of
/// the same granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year(i32),
    AllTime,
}

impl PeriodKey {
    pub fn for_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Month => Self::Month {
                year: date.year(),
                month: date.month(),
            },
            Granularity::Quarter => Self::Quarter {
                year: date.year(),
                quarter: (date.month() - 1) / 3 + 1,
            },
            Granularity::Year => Self::Year(date.year()),
            Granularity::AllTime => Self::AllTime,
        }
    }

    /// `2024-03`, `2024Q1`, `2024`, `All Time`.
    pub fn label(&self) -> String {
        match self {
            Self::Month { year, month } => format!("{year:04}-{month:02}"),
            Self::Quarter { year, quarter } => format!("{year}Q{quarter}"),
            Self::Year(year) => year.to_string(),
            Self::AllTime => "All Time".to_string(),
        }
    }

    /// Heading for the KPI card row, e.g. "2024Q1 (Quarterly Data)".
    pub fn title(&self) -> String {
        match self {
            Self::Month { .. } => format!("{} (Monthly Data)", self.label()),
            Self::Quarter { .. } => format!("{} (Quarterly Data)", self.label()),
            Self::Year(_) => format!("{} (Yearly Data)", self.label()),
            Self::AllTime => "All Time Data".to_string(),
        }
    }

    /// First calendar day of a month bucket.
    pub fn month_start(&self) -> Option<NaiveDate> {
        match self {
            Self::Month { year, month } => NaiveDate::from_ymd_opt(*year, *month, 1),
            _ => None,
        }
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

// ═══════════════════════════════════════════════════════════
// Aggregation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduce {
    /// Sum of present values; 0 when none are present.
    Sum,
    /// Mean of present values; `None` when none are present.
    Mean,
}

impl Reduce {
    pub fn apply(self, values: impl Iterator<Item = f64>) -> Option<f64> {
        let (count, total) = values.fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
        match self {
            Self::Sum => Some(total),
            Self::Mean if count == 0 => None,
            Self::Mean => Some(total / count as f64),
        }
    }
}

/// One named per-bucket measure over rows of type `R`.
pub struct MetricSpec<R> {
    pub name: &'static str,
    pub reduce: Reduce,
    pub value: fn(&R) -> Option<f64>,
}

impl<R> MetricSpec<R> {
    pub const fn sum(name: &'static str, value: fn(&R) -> Option<f64>) -> Self {
        Self {
            name,
            reduce: Reduce::Sum,
            value,
        }
    }

    pub const fn mean(name: &'static str, value: fn(&R) -> Option<f64>) -> Self {
        Self {
            name,
            reduce: Reduce::Mean,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(skip)]
    pub period: PeriodKey,
    pub label: String,
    pub dimension: Option<String>,
    pub record_count: usize,
    pub values: BTreeMap<String, Option<f64>>,
}

impl AggregateRow {
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied().flatten()
    }
}

/// Aggregated rows sorted chronologically, then by dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTable {
    pub granularity: Granularity,
    pub metrics: Vec<String>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct periods present, in chronological order.
    pub fn periods(&self) -> Vec<PeriodKey> {
        let set: BTreeSet<PeriodKey> = self.rows.iter().map(|r| r.period).collect();
        set.into_iter().collect()
    }

    /// Sum of `metric` across every row in `period` (all dimensions).
    pub fn period_value(&self, period: PeriodKey, metric: &str) -> Option<f64> {
        let mut values = self
            .rows
            .iter()
            .filter(|r| r.period == period)
            .filter_map(|r| r.value(metric))
            .peekable();
        values.peek()?;
        Some(values.sum())
    }

    /// Current vs prior period for `metric`. `None` on an empty table.
    pub fn compare_metric(&self, metric: &str) -> Option<ComparisonResult> {
        let selection = select_periods(self.periods(), self.granularity)?;
        let current = self.period_value(selection.current, metric);
        let prior = selection
            .prior
            .and_then(|p| self.period_value(p, metric));
        Some(compare(current, prior, self.granularity))
    }

    /// Columns: period, dimension, record_count, then each metric.
    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut header = vec![
            "period".to_string(),
            "dimension".to_string(),
            "record_count".to_string(),
        ];
        header.extend(self.metrics.iter().cloned());

        let rows = self.rows.iter().map(|row| {
            let mut cells = vec![
                row.label.clone(),
                row.dimension.clone().unwrap_or_default(),
                row.record_count.to_string(),
            ];
            cells.extend(
                self.metrics
                    .iter()
                    .map(|m| row.value(m).map(|v| v.to_string()).unwrap_or_default()),
            );
            cells
        });
        export::write_records(&header, rows)
    }
}

/// Bucket `rows` by period and reduce each metric per bucket.
/// Rows without a date are skipped.
pub fn aggregate<R: Dated>(
    rows: &[R],
    granularity: Granularity,
    metrics: &[MetricSpec<R>],
) -> AggregateTable {
    group(rows, granularity, None, metrics)
}

/// Like [`aggregate`], split further by `dimension`. Rows whose dimension is
/// missing are skipped.
pub fn aggregate_by<R: Dated>(
    rows: &[R],
    granularity: Granularity,
    dimension: fn(&R) -> Option<String>,
    metrics: &[MetricSpec<R>],
) -> AggregateTable {
    group(rows, granularity, Some(dimension), metrics)
}

fn group<R: Dated>(
    rows: &[R],
    granularity: Granularity,
    dimension: Option<fn(&R) -> Option<String>>,
    metrics: &[MetricSpec<R>],
) -> AggregateTable {
    let mut buckets: BTreeMap<(PeriodKey, Option<String>), Vec<&R>> = BTreeMap::new();
    for row in rows {
        let Some(date) = row.date() else { continue };
        let dim = match dimension {
            None => None,
            Some(f) => match f(row) {
                Some(d) => Some(d),
                None => continue,
            },
        };
        buckets
            .entry((PeriodKey::for_date(date, granularity), dim))
            .or_default()
            .push(row);
    }

    let rows = buckets
        .into_iter()
        .map(|((period, dimension), members)| AggregateRow {
            period,
            label: period.label(),
            dimension,
            record_count: members.len(),
            values: metrics
                .iter()
                .map(|m| {
                    let value = m.reduce.apply(members.iter().filter_map(|r| (m.value)(r)));
                    (m.name.to_string(), value)
                })
                .collect(),
        })
        .collect();

    AggregateTable {
        granularity,
        metrics: metrics.iter().map(|m| m.name.to_string()).collect(),
        rows,
    }
}

// ═══════════════════════════════════════════════════════════
// Current / prior selection
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodSelection {
    pub current: PeriodKey,
    pub prior: Option<PeriodKey>,
}

/// Pick the latest bucket present and its comparison bucket.
///
/// Year looks up `current - 1` directly; Month and Quarter take the bucket
/// immediately before the current one among those present. All Time never
/// has a prior.
pub fn select_periods(
    keys: impl IntoIterator<Item = PeriodKey>,
    granularity: Granularity,
) -> Option<PeriodSelection> {
    let present: BTreeSet<PeriodKey> = keys.into_iter().collect();
    let current = *present.iter().next_back()?;

    let prior = match (granularity, current) {
        (Granularity::AllTime, _) => None,
        (Granularity::Year, PeriodKey::Year(year)) => {
            Some(PeriodKey::Year(year - 1)).filter(|k| present.contains(k))
        }
        (Granularity::Year, _) => None,
        (Granularity::Month | Granularity::Quarter, _) => {
            present.range(..current).next_back().copied()
        }
    };

    Some(PeriodSelection { current, prior })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub current_value: Option<f64>,
    pub prior_value: Option<f64>,
    /// `None` when there is no prior value or it is not positive.
    pub delta_pct: Option<f64>,
    pub delta_label: String,
}

pub fn compare(
    current: Option<f64>,
    prior: Option<f64>,
    granularity: Granularity,
) -> ComparisonResult {
    let delta_pct = match (granularity, current, prior) {
        (Granularity::AllTime, _, _) => None,
        (_, Some(c), Some(p)) => pct_change(c, p),
        _ => None,
    };
    ComparisonResult {
        current_value: current,
        prior_value: prior,
        delta_pct,
        delta_label: if delta_pct.is_some() {
            granularity.delta_label().to_string()
        } else {
            String::new()
        },
    }
}

// ═══════════════════════════════════════════════════════════
// Headline KPI cards
// ═══════════════════════════════════════════════════════════

/// Financial totals for one period bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PeriodFigures {
    pub revenue: f64,
    pub expenses: f64,
    pub ebitda: f64,
    pub ebitda_margin: f64,
    pub collection_rate: Option<f64>,
    pub dso: Option<f64>,
    pub chair_utilization: Option<f64>,
    pub revenue_per_patient: f64,
}

impl PeriodFigures {
    /// `has_ebitda` selects the EBITDA column over revenue minus expenses.
    pub fn from_rows(rows: &[&FinancialRecord], has_ebitda: bool) -> Self {
        let sum = |f: fn(&FinancialRecord) -> Option<f64>| {
            Reduce::Sum.apply(rows.iter().filter_map(|r| f(r))).unwrap_or(0.0)
        };
        let mean = |f: fn(&FinancialRecord) -> Option<f64>| {
            Reduce::Mean.apply(rows.iter().filter_map(|r| f(r)))
        };

        let revenue = sum(|r| r.total_revenue);
        let expenses = sum(|r| r.total_expenses);
        let ebitda = if has_ebitda {
            sum(|r| r.ebitda)
        } else {
            revenue - expenses
        };
        let visits = sum(|r| r.total_patient_visits);

        Self {
            revenue,
            expenses,
            ebitda,
            ebitda_margin: if revenue > 0.0 {
                ebitda / revenue * 100.0
            } else {
                0.0
            },
            collection_rate: mean(|r| r.collection_rate),
            dso: mean(|r| r.dso),
            chair_utilization: mean(|r| r.chair_utilization),
            revenue_per_patient: safe_divide(revenue, visits),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineMetrics {
    pub period: PeriodKey,
    pub period_title: String,
    pub figures: PeriodFigures,
    pub revenue: ComparisonResult,
    pub ebitda: ComparisonResult,
    pub chair_utilization: ComparisonResult,
    pub revenue_per_patient: ComparisonResult,
}

/// KPI cards for the latest period of the filtered Financial table.
/// `None` when no row carries a date.
pub fn headline_metrics(
    financial: &Table<FinancialRecord>,
    granularity: Granularity,
) -> Option<HeadlineMetrics> {
    let has_ebitda = financial.schema.has("EBITDA");

    let mut by_period: BTreeMap<PeriodKey, Vec<&FinancialRecord>> = BTreeMap::new();
    for row in &financial.rows {
        if let Some(date) = row.date {
            by_period
                .entry(PeriodKey::for_date(date, granularity))
                .or_default()
                .push(row);
        }
    }

    let selection = select_periods(by_period.keys().copied(), granularity)?;
    let figures_for =
        |key: PeriodKey| by_period.get(&key).map(|rows| PeriodFigures::from_rows(rows, has_ebitda));
    let current = figures_for(selection.current).unwrap_or_default();
    let prior = selection.prior.and_then(figures_for);

    let card = |c: Option<f64>, p: fn(&PeriodFigures) -> Option<f64>| {
        compare(c, prior.as_ref().and_then(p), granularity)
    };

    Some(HeadlineMetrics {
        period: selection.current,
        period_title: selection.current.title(),
        figures: current,
        revenue: card(Some(current.revenue), |f| Some(f.revenue)),
        ebitda: card(Some(current.ebitda), |f| Some(f.ebitda)),
        chair_utilization: card(current.chair_utilization, |f| f.chair_utilization),
        revenue_per_patient: card(Some(current.revenue_per_patient), |f| {
            Some(f.revenue_per_patient)
        }),
    })
}

/// Summed revenue per bucket with the matching growth column averaged in
/// when the extract carries it. All Time trends are monthly.
pub fn revenue_trend(financial: &Table<FinancialRecord>, granularity: Granularity) -> AggregateTable {
    let mut metrics = vec![MetricSpec::sum("Total_Revenue", |r: &FinancialRecord| {
        r.total_revenue
    })];

    let bucket = match granularity {
        Granularity::AllTime => Granularity::Month,
        other => other,
    };
    match granularity {
        Granularity::Month if financial.schema.has("Revenue_MoM_Change") => {
            metrics.push(MetricSpec::mean("Revenue_MoM_Change", |r: &FinancialRecord| {
                r.revenue_mom_change
            }));
        }
        Granularity::Quarter | Granularity::Year if financial.schema.has("Revenue_YoY_Change") => {
            metrics.push(MetricSpec::mean("Revenue_YoY_Change", |r: &FinancialRecord| {
                r.revenue_yoy_change
            }));
        }
        _ => {}
    }

    aggregate(&financial.rows, bucket, &metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Domain, TableSchema};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn fin(date: NaiveDate, revenue: f64, expenses: f64) -> FinancialRecord {
        FinancialRecord {
            date: Some(date),
            total_revenue: Some(revenue),
            total_expenses: Some(expenses),
            ..Default::default()
        }
    }

    fn table(rows: Vec<FinancialRecord>, columns: &[&str]) -> Table<FinancialRecord> {
        Table {
            rows,
            schema: TableSchema::new(Domain::Financial, columns.iter().copied()),
        }
    }

    fn month(year: i32, month: u32) -> PeriodKey {
        PeriodKey::Month { year, month }
    }

    fn quarter(year: i32, quarter: u32) -> PeriodKey {
        PeriodKey::Quarter { year, quarter }
    }

    const REVENUE: MetricSpec<FinancialRecord> =
        MetricSpec::sum("revenue", |r: &FinancialRecord| r.total_revenue);

    // ── Keys ─────────────────────────────────────────────────

    #[test]
    fn keys_and_labels() {
        let date = d(2024, 3, 15);
        assert_eq!(PeriodKey::for_date(date, Granularity::Month).label(), "2024-03");
        assert_eq!(PeriodKey::for_date(date, Granularity::Quarter).label(), "2024Q1");
        assert_eq!(PeriodKey::for_date(date, Granularity::Year).label(), "2024");
        assert_eq!(PeriodKey::for_date(date, Granularity::AllTime).label(), "All Time");
        assert_eq!(PeriodKey::for_date(d(2024, 10, 1), Granularity::Quarter), quarter(2024, 4));
    }

    #[test]
    fn quarters_order_chronologically() {
        let mut keys = vec![quarter(2024, 1), quarter(2023, 4), quarter(2024, 2)];
        keys.sort();
        assert_eq!(keys, vec![quarter(2023, 4), quarter(2024, 1), quarter(2024, 2)]);
    }

    // ── Aggregation ──────────────────────────────────────────

    #[test]
    fn aggregate_sums_and_means_per_bucket() {
        let rows = vec![
            fin(d(2024, 1, 10), 100.0, 10.0),
            fin(d(2024, 1, 20), 50.0, 30.0),
            fin(d(2024, 2, 5), 70.0, 20.0),
        ];
        let metrics = [
            REVENUE,
            MetricSpec::mean("avg_expenses", |r: &FinancialRecord| r.total_expenses),
        ];
        let agg = aggregate(&rows, Granularity::Month, &metrics);

        assert_eq!(agg.rows.len(), 2);
        assert_eq!(agg.rows[0].label, "2024-01");
        assert_eq!(agg.rows[0].record_count, 2);
        assert_eq!(agg.rows[0].value("revenue"), Some(150.0));
        assert_eq!(agg.rows[0].value("avg_expenses"), Some(20.0));
        assert_eq!(agg.rows[1].value("revenue"), Some(70.0));
    }

    #[test]
    fn sum_of_nothing_is_zero_mean_is_none() {
        let rows = vec![FinancialRecord {
            date: Some(d(2024, 1, 1)),
            ..Default::default()
        }];
        let metrics = [REVENUE, MetricSpec::mean("dso", |r: &FinancialRecord| r.dso)];
        let agg = aggregate(&rows, Granularity::Month, &metrics);
        assert_eq!(agg.rows[0].value("revenue"), Some(0.0));
        assert_eq!(agg.rows[0].value("dso"), None);
    }

    #[test]
    fn undated_rows_are_skipped() {
        let rows = vec![FinancialRecord::default(), fin(d(2024, 1, 1), 5.0, 1.0)];
        let agg = aggregate(&rows, Granularity::AllTime, &[REVENUE]);
        assert_eq!(agg.rows.len(), 1);
        assert_eq!(agg.rows[0].record_count, 1);
    }

    #[test]
    fn aggregate_by_orders_period_then_dimension() {
        let mut a = fin(d(2024, 1, 1), 10.0, 0.0);
        a.location_name = Some("Uptown".into());
        let mut b = fin(d(2024, 1, 2), 20.0, 0.0);
        b.location_name = Some("Downtown".into());
        let mut c = fin(d(2023, 12, 2), 30.0, 0.0);
        c.location_name = Some("Uptown".into());

        let agg = aggregate_by(
            &[a, b, c],
            Granularity::Month,
            |r: &FinancialRecord| r.location_name.clone(),
            &[REVENUE],
        );
        let order: Vec<_> = agg
            .rows
            .iter()
            .map(|r| (r.label.as_str(), r.dimension.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(
            order,
            vec![("2023-12", "Uptown"), ("2024-01", "Downtown"), ("2024-01", "Uptown")]
        );
    }

    // ── Period selection ─────────────────────────────────────

    #[test]
    fn quarter_prior_is_list_adjacent() {
        let sel = select_periods(
            [quarter(2023, 4), quarter(2024, 1), quarter(2024, 2)],
            Granularity::Quarter,
        )
        .unwrap();
        assert_eq!(sel.current, quarter(2024, 2));
        assert_eq!(sel.prior, Some(quarter(2024, 1)));
    }

    #[test]
    fn month_prior_skips_calendar_gaps() {
        let sel = select_periods([month(2023, 11), month(2024, 3)], Granularity::Month).unwrap();
        assert_eq!(sel.prior, Some(month(2023, 11)));
    }

    #[test]
    fn single_bucket_has_no_prior() {
        let sel = select_periods([month(2024, 3)], Granularity::Month).unwrap();
        assert_eq!(sel.prior, None);
    }

    #[test]
    fn gap_year_breaks_comparison() {
        let sel = select_periods(
            [PeriodKey::Year(2021), PeriodKey::Year(2022), PeriodKey::Year(2024)],
            Granularity::Year,
        )
        .unwrap();
        assert_eq!(sel.current, PeriodKey::Year(2024));
        assert_eq!(sel.prior, None);

        let sel = select_periods([PeriodKey::Year(2023), PeriodKey::Year(2024)], Granularity::Year)
            .unwrap();
        assert_eq!(sel.prior, Some(PeriodKey::Year(2023)));
    }

    #[test]
    fn all_time_never_compares() {
        let sel = select_periods([PeriodKey::AllTime], Granularity::AllTime).unwrap();
        assert_eq!(sel.prior, None);
        let cmp = compare(Some(10.0), Some(5.0), Granularity::AllTime);
        assert_eq!(cmp.delta_pct, None);
    }

    #[test]
    fn no_keys_no_selection() {
        assert!(select_periods(Vec::<PeriodKey>::new(), Granularity::Month).is_none());
    }

    #[test]
    fn delta_requires_positive_prior() {
        let cmp = compare(Some(110.0), Some(100.0), Granularity::Month);
        assert!((cmp.delta_pct.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(cmp.delta_label, "(MoM)");

        assert_eq!(compare(Some(5.0), Some(0.0), Granularity::Month).delta_pct, None);
        assert_eq!(compare(Some(5.0), None, Granularity::Year).delta_pct, None);
        assert_eq!(compare(Some(5.0), None, Granularity::Year).delta_label, "");
    }

    #[test]
    fn compare_metric_on_table() {
        let rows = vec![
            fin(d(2023, 10, 1), 100.0, 0.0),
            fin(d(2024, 1, 1), 200.0, 0.0),
            fin(d(2024, 4, 1), 300.0, 0.0),
        ];
        let agg = aggregate(&rows, Granularity::Quarter, &[REVENUE]);
        let cmp = agg.compare_metric("revenue").unwrap();
        assert_eq!(cmp.current_value, Some(300.0));
        assert_eq!(cmp.prior_value, Some(200.0));
        assert!((cmp.delta_pct.unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(cmp.delta_label, "(QoQ)");
    }

    // ── Headline metrics ─────────────────────────────────────

    #[test]
    fn headline_uses_latest_month_and_previous_bucket() {
        let mut jan = fin(d(2024, 1, 31), 1000.0, 600.0);
        jan.total_patient_visits = Some(10.0);
        jan.chair_utilization = Some(80.0);
        let mut feb = fin(d(2024, 2, 29), 1200.0, 700.0);
        feb.total_patient_visits = Some(10.0);
        feb.chair_utilization = Some(88.0);

        let t = table(vec![jan, feb], &["Date", "Total_Revenue", "Total_Expenses"]);
        let h = headline_metrics(&t, Granularity::Month).unwrap();

        assert_eq!(h.period_title, "2024-02 (Monthly Data)");
        assert_eq!(h.figures.revenue, 1200.0);
        // No EBITDA column: derived from revenue minus expenses.
        assert_eq!(h.figures.ebitda, 500.0);
        assert_eq!(h.figures.revenue_per_patient, 120.0);
        assert!((h.revenue.delta_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!((h.chair_utilization.delta_pct.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn headline_zero_visits_gives_zero_per_patient() {
        let t = table(vec![fin(d(2024, 1, 31), 1000.0, 600.0)], &["Date"]);
        let h = headline_metrics(&t, Granularity::AllTime).unwrap();
        assert_eq!(h.figures.revenue_per_patient, 0.0);
        assert_eq!(h.period_title, "All Time Data");
        assert_eq!(h.revenue.delta_pct, None);
    }

    #[test]
    fn headline_on_empty_table_is_none() {
        assert!(headline_metrics(&table(vec![], &[]), Granularity::Month).is_none());
    }

    #[test]
    fn revenue_trend_includes_growth_column_when_present() {
        let mut a = fin(d(2024, 1, 31), 100.0, 0.0);
        a.revenue_mom_change = Some(2.0);
        let t = table(vec![a], &["Revenue_MoM_Change"]);
        let trend = revenue_trend(&t, Granularity::Month);
        assert_eq!(trend.metrics, vec!["Total_Revenue", "Revenue_MoM_Change"]);

        let all_time = revenue_trend(&t, Granularity::AllTime);
        assert_eq!(all_time.metrics, vec!["Total_Revenue"]);
        assert_eq!(all_time.rows[0].label, "2024-01");
    }

    #[test]
    fn table_to_csv_has_header_and_blank_missing_values() {
        let rows = vec![FinancialRecord {
            date: Some(d(2024, 1, 1)),
            ..Default::default()
        }];
        let metrics = [MetricSpec::mean("dso", |r: &FinancialRecord| r.dso)];
        let csv = aggregate(&rows, Granularity::Month, &metrics).to_csv().unwrap();
        assert_eq!(csv, "period,dimension,record_count,dso\n2024-01,,1,\n");
    }
}
