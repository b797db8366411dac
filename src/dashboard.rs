//! One recompute pass over a loaded store for a given filter selection.
//!
//! Flow: outlier removal, filter resolution, then every page's datasets.
//! Pieces whose optional columns are absent come back as `None` or empty.

use serde::Serialize;

use crate::analytics::forecast::{self, CashFlowProjection, MonthlyPoint, RevenueForecast};
use crate::analytics::funnel::{self, AppointmentRates, FunnelReport, PatientMixRow, TreatmentPlanStatus, VisitSlot, WeekdayNoShows};
use crate::analytics::metrics::{self, *};
use crate::analytics::outliers::{detect_outliers, OutlierBounds};
use crate::analytics::period::{self, AggregateTable, HeadlineMetrics, MetricSpec};
use crate::analytics::resolver::resolve_filters;
use crate::analytics::Forecast;
use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;
use crate::models::{FilterContext, FinancialRecord};
use crate::store::RecordStore;

/// Financial columns without which no page can be computed.
pub const REQUIRED_FINANCIAL_COLUMNS: &[&str] = &["Date", "Total_Revenue", "Total_Expenses"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalySummary {
    pub count: usize,
    pub bounds: OutlierBounds,
    pub rows: Vec<FinancialRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialView {
    pub headline: Option<HeadlineMetrics>,
    pub revenue_trend: AggregateTable,
    pub location_trend: AggregateTable,
    pub location_profitability: Vec<LocationProfit>,
    pub kpi_trends: Vec<MonthlyKpi>,
    pub service_lines: Vec<ServiceLineRevenue>,
    pub procedure_profitability: Vec<ProcedureProfit>,
    pub expenses: Vec<ExpenseCategory>,
    pub ar_aging: Option<ArAgingSummary>,
    pub payor_mix: Vec<PayorShare>,
    pub payor_collection: Vec<InsuranceSummary>,
    pub history: Vec<MonthlyPoint>,
    pub revenue_forecast: Forecast<RevenueForecast>,
    pub cash_flow: Forecast<CashFlowProjection>,
    pub scenario: Option<ScenarioView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioView {
    pub baseline: ScenarioBaseline,
    pub adjustments: ScenarioAdjustments,
    pub outcome: ScenarioOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientView {
    pub funnel: Option<FunnelReport>,
    pub patient_mix: Option<Vec<PatientMixRow>>,
    pub appointment_rates: Option<Vec<AppointmentRates>>,
    pub no_show_by_weekday: Option<Vec<WeekdayNoShows>>,
    pub visit_distribution: Vec<VisitSlot>,
    pub procedures: Vec<ProcedureSummary>,
    pub claim_processing: Vec<ClaimTiming>,
    pub denials_by_insurance: Vec<DenialSummary>,
    pub denials_by_procedure: Vec<DenialSummary>,
    pub reimbursement: Vec<ReimbursementCell>,
    pub locations: Vec<LocationVisitSummary>,
    pub treatment_plans: Vec<TreatmentPlanRoi>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationsView {
    pub kpis: OperationsKpis,
    pub capacity: Option<CapacitySummary>,
    pub claims: Option<ClaimsSummary>,
    pub cancellations_by_weekday: Vec<WeekdayCancellations>,
    pub treatment_plan_status: Option<TreatmentPlanStatus>,
    pub staff_by_role: Vec<StaffRoleSummary>,
    pub equipment_by_type: Vec<EquipmentSummary>,
}

/// Everything the pages render for one filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub filter: FilterContext,
    pub location_title: String,
    pub date_range: String,
    pub sampled_stride: Option<usize>,
    pub anomalies: AnomalySummary,
    pub financial: FinancialView,
    pub patient: PatientView,
    pub operations: OperationsView,
}

/// Compute every page's datasets with no scenario adjustment.
pub fn build_snapshot(
    store: &RecordStore,
    ctx: &FilterContext,
    config: &AnalyticsConfig,
) -> Result<DashboardSnapshot, AnalyticsError> {
    build_snapshot_with(store, ctx, config, &ScenarioAdjustments::default())
}

pub fn build_snapshot_with(
    store: &RecordStore,
    ctx: &FilterContext,
    config: &AnalyticsConfig,
    adjustments: &ScenarioAdjustments,
) -> Result<DashboardSnapshot, AnalyticsError> {
    let span = tracing::info_span!(
        "build_snapshot",
        range = %ctx.date_range_label(),
        location = ctx.location.title(),
        granularity = ctx.granularity.as_str(),
    );
    let _guard = span.enter();

    config.validate()?;
    store.financial.schema.require(REQUIRED_FINANCIAL_COLUMNS)?;
    adjustments.validate()?;

    let outliers = detect_outliers(&store.financial, config.outlier_iqr_multiplier);
    let filtered = resolve_filters(ctx, &outliers.clean, store, config);
    if filtered.is_empty() {
        tracing::info!("Filter selection matched no rows");
    }

    let fin = &filtered.financial;
    let history = forecast::monthly_history(fin);
    let scenario = ScenarioBaseline::from_latest_month(fin).map(|baseline| ScenarioView {
        outcome: run_scenario(&baseline, adjustments),
        baseline,
        adjustments: *adjustments,
    });

    let financial = FinancialView {
        headline: period::headline_metrics(fin, ctx.granularity),
        revenue_trend: period::revenue_trend(fin, ctx.granularity),
        location_trend: period::aggregate_by(
            &fin.rows,
            ctx.granularity,
            |r: &FinancialRecord| r.location_name.clone(),
            &[
                MetricSpec::sum("Total_Revenue", |r: &FinancialRecord| r.total_revenue),
                MetricSpec::sum("Total_Expenses", |r: &FinancialRecord| r.total_expenses),
            ],
        ),
        location_profitability: metrics::location_profitability(fin),
        kpi_trends: metrics::kpi_trends(fin),
        service_lines: metrics::service_line_revenue(fin),
        procedure_profitability: metrics::procedure_profitability(fin),
        expenses: metrics::expense_breakdown(fin),
        ar_aging: metrics::ar_aging(fin),
        payor_mix: metrics::payor_mix(fin),
        payor_collection: metrics::insurance_summary(&filtered.patient),
        revenue_forecast: forecast::revenue_forecast(&history, config),
        cash_flow: forecast::cash_flow_projection(&history, config),
        history,
        scenario,
    };

    let pat = &filtered.patient;
    let patient = PatientView {
        funnel: funnel::appointment_funnel(pat),
        patient_mix: funnel::patient_mix(pat, ctx.granularity),
        appointment_rates: funnel::appointment_rates_by_month(pat),
        no_show_by_weekday: funnel::no_show_by_weekday(pat),
        visit_distribution: funnel::visit_distribution(pat),
        procedures: metrics::procedure_summary(pat),
        claim_processing: metrics::claim_processing_times(pat),
        denials_by_insurance: metrics::denials_by_insurance(pat),
        denials_by_procedure: metrics::denials_by_procedure(pat),
        reimbursement: metrics::reimbursement_matrix(pat),
        locations: metrics::location_visit_summary(pat),
        treatment_plans: metrics::treatment_plan_roi(pat),
    };

    let ops = &filtered.operations;
    let operations = OperationsView {
        kpis: metrics::operations_kpis(ops),
        capacity: metrics::capacity_summary(ops),
        claims: metrics::claims_summary(ops),
        cancellations_by_weekday: metrics::cancellations_by_weekday(ops),
        treatment_plan_status: funnel::treatment_plan_status(ops),
        staff_by_role: metrics::staff_by_role(&filtered.staff),
        equipment_by_type: metrics::equipment_by_type(&filtered.equipment),
    };

    tracing::info!(
        financial_rows = fin.len(),
        patient_rows = pat.len(),
        operations_rows = ops.len(),
        anomalies = outliers.anomalies.len(),
        "Snapshot computed"
    );

    Ok(DashboardSnapshot {
        filter: ctx.clone(),
        location_title: ctx.location.title().to_string(),
        date_range: ctx.date_range_label(),
        sampled_stride: filtered.sampled_stride,
        anomalies: AnomalySummary {
            count: outliers.anomalies.len(),
            bounds: outliers.bounds,
            rows: outliers.anomalies,
        },
        financial,
        patient,
        operations,
    })
}
