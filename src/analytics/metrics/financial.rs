//! Financial-table groupings: location profitability, monthly KPI trends,
//! service-line revenue, AR aging and payor mix.

use serde::Serialize;

use super::{group_by, mean_of, ratio_pct, sum_of};
use crate::analytics::period::PeriodKey;
use crate::models::{FinancialRecord, Granularity, ServiceLine};
use crate::store::Table;

const AR_COLUMNS: &[&str] = &["AR_Current", "AR_31_60", "AR_61_90", "AR_91_Plus", "Total_AR"];
const CLAIM_COLUMNS: &[&str] = &["Total_Claims_Submitted", "Claims_Denied"];

fn month_of(r: &FinancialRecord) -> Option<PeriodKey> {
    r.date.map(|d| PeriodKey::for_date(d, Granularity::Month))
}

/// Rows of the latest month present, with that month's key.
fn latest_month(financial: &Table<FinancialRecord>) -> Option<(PeriodKey, Vec<&FinancialRecord>)> {
    group_by(&financial.rows, month_of).pop_last()
}

/// EBITDA for one row: the column when the extract has it, otherwise
/// revenue minus expenses.
fn row_ebitda(r: &FinancialRecord, has_column: bool) -> Option<f64> {
    if has_column {
        r.ebitda
    } else {
        Some(r.total_revenue? - r.total_expenses?)
    }
}

// ═══════════════════════════════════════════════════════════
// Location profitability
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationProfit {
    pub location: String,
    pub revenue: f64,
    pub expenses: f64,
    pub ebitda: f64,
    pub ebitda_margin: f64,
}

/// Per-location totals, highest EBITDA first.
pub fn location_profitability(financial: &Table<FinancialRecord>) -> Vec<LocationProfit> {
    let has_ebitda = financial.schema.has("EBITDA");
    let has_margin = financial.schema.has("EBITDA_Margin");

    let mut out: Vec<LocationProfit> = group_by(&financial.rows, |r| r.location_name.clone())
        .into_iter()
        .map(|(location, rows)| {
            let revenue = sum_of(&rows, |r| r.total_revenue);
            let ebitda = sum_of(&rows, |r| row_ebitda(r, has_ebitda));
            let derived = ratio_pct(ebitda, revenue);
            LocationProfit {
                location,
                revenue,
                expenses: sum_of(&rows, |r| r.total_expenses),
                ebitda,
                ebitda_margin: if has_margin {
                    mean_of(&rows, |r| r.ebitda_margin).unwrap_or(derived)
                } else {
                    derived
                },
            }
        })
        .collect();

    out.sort_by(|a, b| b.ebitda.total_cmp(&a.ebitda));
    out
}

// ═══════════════════════════════════════════════════════════
// Monthly KPI trends
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyKpi {
    pub month: String,
    pub ebitda_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub collection_rate: Option<f64>,
    pub dso: Option<f64>,
    /// Claim figures are `None` when the extract has no claim columns.
    pub claims_submitted: Option<f64>,
    pub claims_denied: Option<f64>,
    pub denial_rate: Option<f64>,
}

/// Month-by-month margin, collection, DSO and claim denial trends.
pub fn kpi_trends(financial: &Table<FinancialRecord>) -> Vec<MonthlyKpi> {
    let has_claims = financial.schema.has_all(CLAIM_COLUMNS);
    let has_margin = financial.schema.has("EBITDA_Margin");
    let has_ebitda = financial.schema.has("EBITDA");

    let row_margin = |r: &FinancialRecord| {
        if has_margin {
            r.ebitda_margin
        } else {
            let revenue = r.total_revenue.filter(|v| *v != 0.0)?;
            Some(row_ebitda(r, has_ebitda)? / revenue * 100.0)
        }
    };
    let operating_margin = |r: &FinancialRecord| {
        let revenue = r.total_revenue.filter(|v| *v != 0.0)?;
        Some((revenue - r.total_expenses?) / revenue * 100.0)
    };

    group_by(&financial.rows, month_of)
        .into_iter()
        .map(|(month, rows)| {
            let claims = has_claims.then(|| {
                (
                    sum_of(&rows, |r| r.total_claims_submitted),
                    sum_of(&rows, |r| r.claims_denied),
                )
            });
            MonthlyKpi {
                month: month.label(),
                ebitda_margin: mean_of(&rows, row_margin),
                operating_margin: mean_of(&rows, operating_margin),
                collection_rate: mean_of(&rows, |r| r.collection_rate),
                dso: mean_of(&rows, |r| r.dso),
                claims_submitted: claims.map(|(submitted, _)| submitted),
                claims_denied: claims.map(|(_, denied)| denied),
                denial_rate: claims.map(|(submitted, denied)| ratio_pct(denied, submitted)),
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Service lines
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceLineRevenue {
    pub service_line: String,
    pub revenue: f64,
}

/// Total revenue per service line over the period, largest first. Lines
/// absent from every row are omitted.
pub fn service_line_revenue(financial: &Table<FinancialRecord>) -> Vec<ServiceLineRevenue> {
    let mut out: Vec<ServiceLineRevenue> = ServiceLine::ALL
        .iter()
        .filter_map(|line| {
            let values: Vec<f64> = financial
                .rows
                .iter()
                .filter_map(|r| r.service_revenue.get(line).copied())
                .collect();
            (!values.is_empty()).then(|| ServiceLineRevenue {
                service_line: line.display_name(),
                revenue: values.iter().sum(),
            })
        })
        .collect();
    out.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureProfit {
    pub procedure: String,
    pub billed: f64,
    pub collected: f64,
    pub uncollected: f64,
}

/// Billed revenue per service line and the share expected to be collected
/// at the period's mean collection rate. Highest collected first.
pub fn procedure_profitability(financial: &Table<FinancialRecord>) -> Vec<ProcedureProfit> {
    let rows: Vec<&FinancialRecord> = financial.rows.iter().collect();
    let rate = mean_of(&rows, |r| r.collection_rate).unwrap_or(0.0) / 100.0;

    let mut out: Vec<ProcedureProfit> = service_line_revenue(financial)
        .into_iter()
        .map(|line| {
            let collected = line.revenue * rate;
            ProcedureProfit {
                procedure: line.service_line,
                billed: line.revenue,
                collected,
                uncollected: line.revenue - collected,
            }
        })
        .collect();
    out.sort_by(|a, b| b.collected.total_cmp(&a.collected));
    out
}

// ═══════════════════════════════════════════════════════════
// Expenses
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseCategory {
    pub category: String,
    pub amount: f64,
    pub share: f64,
}

/// Expense totals per category, largest first.
pub fn expense_breakdown(financial: &Table<FinancialRecord>) -> Vec<ExpenseCategory> {
    let mut totals: std::collections::BTreeMap<&str, f64> = std::collections::BTreeMap::new();
    for row in &financial.rows {
        for (category, amount) in &row.expenses {
            *totals.entry(category.as_str()).or_default() += amount;
        }
    }
    let grand_total: f64 = totals.values().sum();

    let mut out: Vec<ExpenseCategory> = totals
        .into_iter()
        .map(|(category, amount)| ExpenseCategory {
            category: category.replace('_', " "),
            amount,
            share: ratio_pct(amount, grand_total),
        })
        .collect();
    out.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    out
}

// ═══════════════════════════════════════════════════════════
// AR aging and payor mix (latest month)
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingBucket {
    pub bucket: String,
    pub amount: f64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArAgingSummary {
    pub month: String,
    pub buckets: Vec<AgingBucket>,
    pub total_ar: f64,
    pub over_90_share: f64,
}

/// Receivables by age for the latest month. `None` when the extract lacks
/// the AR columns or has no dated rows.
pub fn ar_aging(financial: &Table<FinancialRecord>) -> Option<ArAgingSummary> {
    if !financial.schema.has_all(AR_COLUMNS) {
        return None;
    }
    let (month, rows) = latest_month(financial)?;
    let total_ar = sum_of(&rows, |r| r.ar.total);

    let buckets = [
        ("Current", sum_of(&rows, |r| r.ar.current)),
        ("31-60 Days", sum_of(&rows, |r| r.ar.days_31_60)),
        ("61-90 Days", sum_of(&rows, |r| r.ar.days_61_90)),
        ("90+ Days", sum_of(&rows, |r| r.ar.days_91_plus)),
    ];
    let over_90 = buckets[3].1;

    Some(ArAgingSummary {
        month: month.label(),
        buckets: buckets
            .into_iter()
            .map(|(bucket, amount)| AgingBucket {
                bucket: bucket.to_string(),
                amount,
                share: ratio_pct(amount, total_ar),
            })
            .collect(),
        total_ar,
        over_90_share: ratio_pct(over_90, total_ar),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayorShare {
    pub payor: String,
    pub amount: f64,
    pub share: f64,
}

/// Revenue by payor for the latest month, largest first.
pub fn payor_mix(financial: &Table<FinancialRecord>) -> Vec<PayorShare> {
    let Some((_, rows)) = latest_month(financial) else {
        return Vec::new();
    };

    let mut totals: std::collections::BTreeMap<&str, f64> = std::collections::BTreeMap::new();
    for row in &rows {
        for (payor, amount) in &row.payor_mix {
            *totals.entry(payor.as_str()).or_default() += amount;
        }
    }
    let grand_total: f64 = totals.values().sum();

    let mut out: Vec<PayorShare> = totals
        .into_iter()
        .map(|(payor, amount)| PayorShare {
            payor: payor.to_string(),
            amount,
            share: ratio_pct(amount, grand_total),
        })
        .collect();
    out.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{ArAging, Domain, TableSchema};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn fin(date: NaiveDate, location: &str, revenue: f64, expenses: f64) -> FinancialRecord {
        FinancialRecord {
            date: Some(date),
            location_name: Some(location.into()),
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

    // ── Locations ────────────────────────────────────────────

    #[test]
    fn locations_sorted_by_ebitda_with_derived_margin() {
        let t = table(
            vec![
                fin(d(2024, 1, 31), "Uptown", 1000.0, 900.0),
                fin(d(2024, 1, 31), "Downtown", 2000.0, 1000.0),
                fin(d(2024, 2, 29), "Downtown", 1000.0, 500.0),
            ],
            &["Total_Revenue", "Total_Expenses"],
        );
        let out = location_profitability(&t);

        assert_eq!(out[0].location, "Downtown");
        assert_eq!(out[0].ebitda, 1500.0);
        assert_eq!(out[0].ebitda_margin, 50.0);
        assert_eq!(out[1].location, "Uptown");
        assert!((out[1].ebitda_margin - 10.0).abs() < 1e-9);
    }

    #[test]
    fn location_margin_prefers_column_mean() {
        let mut a = fin(d(2024, 1, 31), "Uptown", 1000.0, 900.0);
        a.ebitda = Some(100.0);
        a.ebitda_margin = Some(12.0);
        let mut b = fin(d(2024, 2, 29), "Uptown", 1000.0, 900.0);
        b.ebitda = Some(100.0);
        b.ebitda_margin = Some(8.0);
        let t = table(vec![a, b], &["EBITDA", "EBITDA_Margin"]);
        assert_eq!(location_profitability(&t)[0].ebitda_margin, 10.0);
    }

    // ── KPI trends ───────────────────────────────────────────

    #[test]
    fn kpi_trends_derive_margins_and_denials() {
        let mut jan = fin(d(2024, 1, 31), "A", 1000.0, 750.0);
        jan.total_claims_submitted = Some(40.0);
        jan.claims_denied = Some(4.0);
        jan.collection_rate = Some(95.0);
        let feb = fin(d(2024, 2, 29), "A", 0.0, 100.0);

        let out = kpi_trends(&table(vec![jan, feb], CLAIM_COLUMNS));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].month, "2024-01");
        assert_eq!(out[0].operating_margin, Some(25.0));
        assert_eq!(out[0].ebitda_margin, Some(25.0));
        assert_eq!(out[0].denial_rate, Some(10.0));
        assert_eq!(out[0].collection_rate, Some(95.0));

        // Zero revenue leaves margins undefined and denials at 0.
        assert_eq!(out[1].operating_margin, None);
        assert_eq!(out[1].denial_rate, Some(0.0));
    }

    #[test]
    fn kpi_trends_without_claim_columns_leave_denials_unset() {
        let out = kpi_trends(&table(
            vec![fin(d(2024, 1, 31), "A", 1000.0, 750.0)],
            &["Total_Revenue", "Total_Expenses"],
        ));
        assert_eq!(out[0].operating_margin, Some(25.0));
        assert_eq!(out[0].claims_submitted, None);
        assert_eq!(out[0].denial_rate, None);
    }

    // ── Service lines ────────────────────────────────────────

    #[test]
    fn procedure_profitability_scales_by_mean_collection_rate() {
        let mut a = fin(d(2024, 1, 31), "A", 0.0, 0.0);
        a.collection_rate = Some(90.0);
        a.service_revenue = BTreeMap::from([(ServiceLine::Implant, 1000.0)]);
        let mut b = fin(d(2024, 2, 29), "A", 0.0, 0.0);
        b.collection_rate = Some(70.0);
        b.service_revenue =
            BTreeMap::from([(ServiceLine::Implant, 1000.0), (ServiceLine::OralSurgery, 500.0)]);

        let out = procedure_profitability(&table(vec![a, b], &[]));
        assert_eq!(out[0].procedure, "Implant");
        assert_eq!(out[0].billed, 2000.0);
        assert!((out[0].collected - 1600.0).abs() < 1e-9);
        assert_eq!(out[1].procedure, "Oral Surgery");
        assert!((out[1].uncollected - 100.0).abs() < 1e-9);
    }

    #[test]
    fn expense_shares_sum_to_hundred() {
        let mut a = fin(d(2024, 1, 31), "A", 0.0, 0.0);
        a.expenses = BTreeMap::from([("Rent_Lease".to_string(), 300.0), ("Labor_Dentists".to_string(), 700.0)]);
        let out = expense_breakdown(&table(vec![a], &[]));
        assert_eq!(out[0].category, "Labor Dentists");
        assert!((out[0].share - 70.0).abs() < 1e-9);
        assert!((out.iter().map(|e| e.share).sum::<f64>() - 100.0).abs() < 1e-9);
    }

    // ── Latest month ─────────────────────────────────────────

    #[test]
    fn ar_aging_uses_latest_month_only() {
        let mut old = fin(d(2024, 1, 31), "A", 0.0, 0.0);
        old.ar = ArAging {
            current: Some(999.0),
            total: Some(999.0),
            ..Default::default()
        };
        let mut new = fin(d(2024, 2, 29), "A", 0.0, 0.0);
        new.ar = ArAging {
            current: Some(500.0),
            days_31_60: Some(200.0),
            days_61_90: Some(100.0),
            days_91_plus: Some(200.0),
            total: Some(1000.0),
        };
        let t = table(vec![old, new], AR_COLUMNS);
        let ar = ar_aging(&t).unwrap();

        assert_eq!(ar.month, "2024-02");
        assert_eq!(ar.total_ar, 1000.0);
        assert_eq!(ar.buckets[0].share, 50.0);
        assert_eq!(ar.over_90_share, 20.0);
    }

    #[test]
    fn ar_aging_needs_columns_and_handles_zero_total() {
        let t = table(vec![fin(d(2024, 1, 31), "A", 0.0, 0.0)], &[]);
        assert!(ar_aging(&t).is_none());

        let t = table(vec![fin(d(2024, 1, 31), "A", 0.0, 0.0)], AR_COLUMNS);
        assert_eq!(ar_aging(&t).unwrap().over_90_share, 0.0);
    }

    #[test]
    fn payor_mix_latest_month_sorted() {
        let mut a = fin(d(2024, 3, 31), "A", 0.0, 0.0);
        a.payor_mix = BTreeMap::from([("Delta Dental".to_string(), 300.0), ("Self Pay".to_string(), 100.0)]);
        let mut b = fin(d(2024, 3, 31), "B", 0.0, 0.0);
        b.payor_mix = BTreeMap::from([("Self Pay".to_string(), 400.0)]);

        let out = payor_mix(&table(vec![a, b], &[]));
        assert_eq!(out[0].payor, "Self Pay");
        assert_eq!(out[0].amount, 500.0);
        assert!((out[1].share - 37.5).abs() < 1e-9);
    }
}
