//! Visit-level groupings over the patient appointment extract.

use serde::Serialize;

use super::{distinct_count, group_by, mean_of, median, ratio_pct, safe_divide, share_pct, sum_of};
use crate::models::{PatientVisit, CLAIM_DENIED, CLAIM_PAID, STATUS_COMPLETED, STATUS_NO_SHOW};
use crate::store::Table;

fn distinct_visits(rows: &[&PatientVisit]) -> usize {
    distinct_count(rows.iter().map(|r| r.visit_id.as_deref()))
}

// ═══════════════════════════════════════════════════════════
// Procedures
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureSummary {
    pub procedure: String,
    pub visits: usize,
    pub charged: f64,
    pub collected: f64,
    pub collection_rate: f64,
    pub completion_rate: f64,
}

/// Charged vs collected per procedure, highest collected first.
pub fn procedure_summary(patient: &Table<PatientVisit>) -> Vec<ProcedureSummary> {
    let mut out: Vec<ProcedureSummary> = group_by(&patient.rows, |r| r.procedure.clone())
        .into_iter()
        .map(|(procedure, rows)| {
            let charged = sum_of(&rows, |r| r.charged_amount);
            let collected = sum_of(&rows, PatientVisit::collected_amount);
            ProcedureSummary {
                procedure,
                visits: distinct_visits(&rows),
                charged,
                collected,
                collection_rate: ratio_pct(collected, charged),
                completion_rate: share_pct(&rows, |r| r.status_is(STATUS_COMPLETED)),
            }
        })
        .collect();
    out.sort_by(|a, b| b.collected.total_cmp(&a.collected));
    out
}

// ═══════════════════════════════════════════════════════════
// Insurance
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsuranceSummary {
    pub insurance: String,
    pub visits: usize,
    pub charged: f64,
    pub paid: f64,
    /// Amount paid over amount charged.
    pub collection_rate: f64,
}

/// Payment yield per insurance provider, best collector first.
pub fn insurance_summary(patient: &Table<PatientVisit>) -> Vec<InsuranceSummary> {
    let mut out: Vec<InsuranceSummary> = group_by(&patient.rows, |r| r.insurance_provider.clone())
        .into_iter()
        .map(|(insurance, rows)| {
            let charged = sum_of(&rows, |r| r.charged_amount);
            let paid = sum_of(&rows, |r| r.amount_paid);
            InsuranceSummary {
                insurance,
                visits: distinct_visits(&rows),
                charged,
                paid,
                collection_rate: ratio_pct(paid, charged),
            }
        })
        .collect();
    out.sort_by(|a, b| b.collection_rate.total_cmp(&a.collection_rate));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimTiming {
    pub insurance: String,
    pub mean_days: f64,
    pub median_days: f64,
    pub claims: usize,
    pub paid_rate: f64,
}

/// Days from claim submission to its latest status, per insurer. Claims
/// without both dates, or with a status dated before submission, are
/// skipped. Fastest insurer first.
pub fn claim_processing_times(patient: &Table<PatientVisit>) -> Vec<ClaimTiming> {
    let processing_days = |r: &PatientVisit| -> Option<i64> {
        let days = (r.claim_status_on? - r.claim_submitted_on?).num_days();
        (days >= 0).then_some(days)
    };
    let mut out: Vec<ClaimTiming> = group_by(&patient.rows, |r| {
        processing_days(r)?;
        r.insurance_provider.clone()
    })
    .into_iter()
    .filter_map(|(insurance, rows)| {
        let days: Vec<f64> = rows
            .iter()
            .filter_map(|r| processing_days(*r))
            .map(|d| d as f64)
            .collect();
        let claims = days.len();
        Some(ClaimTiming {
            insurance,
            mean_days: days.iter().sum::<f64>() / claims as f64,
            median_days: median(days)?,
            claims,
            paid_rate: share_pct(&rows, |r| r.claim_status_is(CLAIM_PAID)),
        })
    })
    .collect();
    out.sort_by(|a, b| a.mean_days.total_cmp(&b.mean_days));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenialSummary {
    pub key: String,
    pub claims: usize,
    pub denied: usize,
    pub denial_rate: f64,
    pub charged: f64,
}

fn denials_by(patient: &Table<PatientVisit>, key: impl Fn(&PatientVisit) -> Option<String>) -> Vec<DenialSummary> {
    let mut out: Vec<DenialSummary> = group_by(&patient.rows, |r| {
        r.claim_status.as_ref()?;
        key(r)
    })
    .into_iter()
    .map(|(key, rows)| {
        let denied = rows.iter().filter(|r| r.claim_status_is(CLAIM_DENIED)).count();
        DenialSummary {
            key,
            claims: rows.len(),
            denied,
            denial_rate: ratio_pct(denied as f64, rows.len() as f64),
            charged: sum_of(&rows, |r| r.charged_amount),
        }
    })
    .collect();
    out.sort_by(|a, b| b.denial_rate.total_cmp(&a.denial_rate));
    out
}

/// Share of claims denied per insurer, among visits with a claim status.
pub fn denials_by_insurance(patient: &Table<PatientVisit>) -> Vec<DenialSummary> {
    denials_by(patient, |r| r.insurance_provider.clone())
}

pub fn denials_by_procedure(patient: &Table<PatientVisit>) -> Vec<DenialSummary> {
    denials_by(patient, |r| r.procedure.clone())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReimbursementCell {
    pub insurance: String,
    pub procedure: String,
    pub visits: usize,
    pub charged: f64,
    pub insurance_covered: f64,
    pub collected: f64,
    pub reimbursement_rate: f64,
    pub collection_rate: f64,
}

/// Insurer × procedure grid of how much of each charge the insurer covered.
pub fn reimbursement_matrix(patient: &Table<PatientVisit>) -> Vec<ReimbursementCell> {
    group_by(&patient.rows, |r| {
        Some((r.insurance_provider.clone()?, r.procedure.clone()?))
    })
    .into_iter()
    .map(|((insurance, procedure), rows)| {
        let charged = sum_of(&rows, |r| r.charged_amount);
        let insurance_covered = sum_of(&rows, |r| r.insurance_covered_amount);
        let collected = sum_of(&rows, PatientVisit::collected_amount);
        ReimbursementCell {
            insurance,
            procedure,
            visits: distinct_visits(&rows),
            charged,
            insurance_covered,
            collected,
            reimbursement_rate: ratio_pct(insurance_covered, charged),
            collection_rate: ratio_pct(collected, charged),
        }
    })
    .collect()
}

// ═══════════════════════════════════════════════════════════
// Locations
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationVisitSummary {
    pub location: String,
    pub visits: usize,
    pub completion_rate: f64,
    pub no_show_rate: f64,
    pub charged: f64,
    pub collected: f64,
    pub collection_rate: f64,
    pub revenue_per_visit: f64,
    pub avg_duration_minutes: Option<f64>,
    pub google_rating: Option<f64>,
}

/// Visit volume, yield and patient experience per location.
pub fn location_visit_summary(patient: &Table<PatientVisit>) -> Vec<LocationVisitSummary> {
    group_by(&patient.rows, |r| r.location_name.clone())
        .into_iter()
        .map(|(location, rows)| {
            let visits = distinct_visits(&rows);
            let charged = sum_of(&rows, |r| r.charged_amount);
            let collected = sum_of(&rows, PatientVisit::collected_amount);
            LocationVisitSummary {
                location,
                visits,
                completion_rate: share_pct(&rows, |r| r.status_is(STATUS_COMPLETED)),
                no_show_rate: share_pct(&rows, |r| r.status_is(STATUS_NO_SHOW)),
                charged,
                collected,
                collection_rate: ratio_pct(collected, charged),
                revenue_per_visit: safe_divide(collected, visits as f64),
                avg_duration_minutes: mean_of(&rows, |r| r.appointment_duration),
                // Rating is a per-location attribute repeated on every row.
                google_rating: rows.iter().find_map(|r| r.google_rating),
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Treatment plans
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentPlanRoi {
    pub plan_id: String,
    pub visits: usize,
    pub estimated_cost: Option<f64>,
    pub collected: f64,
    pub completion_rate: Option<f64>,
    pub roi: f64,
    pub duration_days: Option<i64>,
}

/// Collected revenue against the estimated plan cost, per treatment plan.
pub fn treatment_plan_roi(patient: &Table<PatientVisit>) -> Vec<TreatmentPlanRoi> {
    group_by(&patient.rows, |r| {
        r.treatment_plan_id.clone().filter(|id| !id.is_empty())
    })
    .into_iter()
    .map(|(plan_id, rows)| {
        let estimated_cost = rows.iter().find_map(|r| r.estimated_total_cost);
        let collected = sum_of(&rows, PatientVisit::collected_amount);
        let duration_days = rows.iter().find_map(|r| {
            Some((r.plan_completed_on? - r.plan_created_on?).num_days())
        });
        TreatmentPlanRoi {
            plan_id,
            visits: distinct_visits(&rows),
            estimated_cost,
            collected,
            completion_rate: rows.iter().find_map(|r| r.plan_completion_rate),
            roi: ratio_pct(collected, estimated_cost.unwrap_or(0.0)),
            duration_days,
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Domain, TableSchema};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn visit(id: &str, procedure: &str, insurance: &str, charged: f64, covered: f64) -> PatientVisit {
        PatientVisit {
            visit_id: Some(id.into()),
            procedure: Some(procedure.into()),
            insurance_provider: Some(insurance.into()),
            location_name: Some("Downtown".into()),
            appointment_status: Some(STATUS_COMPLETED.into()),
            charged_amount: Some(charged),
            insurance_covered_amount: Some(covered),
            out_of_pocket: Some(0.0),
            ..Default::default()
        }
    }

    fn table(rows: Vec<PatientVisit>) -> Table<PatientVisit> {
        Table {
            rows,
            schema: TableSchema::empty(Domain::Patient),
        }
    }

    // ── Procedures ───────────────────────────────────────────

    #[test]
    fn procedures_sorted_by_collected() {
        let mut cleaning = visit("V3", "Cleaning", "Aetna", 100.0, 80.0);
        cleaning.appointment_status = Some(STATUS_NO_SHOW.into());
        let out = procedure_summary(&table(vec![
            visit("V1", "Crown", "Aetna", 1000.0, 600.0),
            visit("V2", "Crown", "Cigna", 1000.0, 400.0),
            cleaning,
        ]));

        assert_eq!(out[0].procedure, "Crown");
        assert_eq!(out[0].visits, 2);
        assert_eq!(out[0].collection_rate, 50.0);
        assert_eq!(out[0].completion_rate, 100.0);
        assert_eq!(out[1].completion_rate, 0.0);
    }

    #[test]
    fn zero_charge_yields_zero_rate() {
        let out = procedure_summary(&table(vec![visit("V1", "Exam", "Aetna", 0.0, 50.0)]));
        assert_eq!(out[0].collection_rate, 0.0);
    }

    // ── Insurance ────────────────────────────────────────────

    #[test]
    fn insurance_collection_uses_amount_paid() {
        let mut a = visit("V1", "Crown", "Aetna", 1000.0, 0.0);
        a.amount_paid = Some(900.0);
        let mut b = visit("V2", "Crown", "Cigna", 1000.0, 0.0);
        b.amount_paid = Some(500.0);

        let out = insurance_summary(&table(vec![b, a]));
        assert_eq!(out[0].insurance, "Aetna");
        assert_eq!(out[0].collection_rate, 90.0);
        assert_eq!(out[1].collection_rate, 50.0);
    }

    #[test]
    fn processing_times_skip_negative_and_sort_ascending() {
        let claim = |id: &str, ins: &str, sub: NaiveDate, status_on: NaiveDate, status: &str| {
            let mut v = visit(id, "Crown", ins, 100.0, 0.0);
            v.claim_submitted_on = Some(sub);
            v.claim_status_on = Some(status_on);
            v.claim_status = Some(status.into());
            v
        };
        let out = claim_processing_times(&table(vec![
            claim("V1", "Aetna", d(1, 1), d(1, 21), CLAIM_PAID),
            claim("V2", "Aetna", d(1, 1), d(1, 31), CLAIM_DENIED),
            claim("V3", "Aetna", d(2, 1), d(1, 1), CLAIM_PAID),
            claim("V4", "Cigna", d(1, 1), d(1, 11), CLAIM_PAID),
        ]));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].insurance, "Cigna");
        assert_eq!(out[1].claims, 2);
        assert_eq!(out[1].mean_days, 25.0);
        assert_eq!(out[1].median_days, 25.0);
        assert_eq!(out[1].paid_rate, 50.0);
    }

    #[test]
    fn denials_ignore_visits_without_claims() {
        let mut denied = visit("V1", "Crown", "Aetna", 100.0, 0.0);
        denied.claim_status = Some(CLAIM_DENIED.into());
        let mut paid = visit("V2", "Crown", "Aetna", 100.0, 0.0);
        paid.claim_status = Some(CLAIM_PAID.into());
        let unclaimed = visit("V3", "Crown", "Aetna", 100.0, 0.0);

        let t = table(vec![denied, paid, unclaimed]);
        let by_insurer = denials_by_insurance(&t);
        assert_eq!(by_insurer[0].claims, 2);
        assert_eq!(by_insurer[0].denial_rate, 50.0);
        assert_eq!(denials_by_procedure(&t)[0].key, "Crown");
    }

    #[test]
    fn reimbursement_grid_rates() {
        let out = reimbursement_matrix(&table(vec![
            visit("V1", "Crown", "Aetna", 1000.0, 700.0),
            visit("V2", "Crown", "Aetna", 1000.0, 500.0),
        ]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reimbursement_rate, 60.0);
        assert_eq!(out[0].visits, 2);
    }

    // ── Locations and plans ──────────────────────────────────

    #[test]
    fn location_summary_counts_distinct_visits() {
        let mut no_show = visit("V2", "Exam", "Aetna", 0.0, 0.0);
        no_show.appointment_status = Some(STATUS_NO_SHOW.into());
        let mut a = visit("V1", "Crown", "Aetna", 1000.0, 800.0);
        a.google_rating = Some(4.6);
        a.appointment_duration = Some(60.0);
        // Same visit split over two procedure lines.
        let b = visit("V1", "Exam", "Aetna", 200.0, 200.0);

        let out = location_visit_summary(&table(vec![a, b, no_show]));
        let loc = &out[0];
        assert_eq!(loc.visits, 2);
        assert_eq!(loc.collected, 1000.0);
        assert_eq!(loc.revenue_per_visit, 500.0);
        assert!((loc.no_show_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(loc.google_rating, Some(4.6));
        assert_eq!(loc.avg_duration_minutes, Some(60.0));
    }

    #[test]
    fn plan_roi_and_duration() {
        let plan = |id: &str, covered: f64| {
            let mut v = visit(id, "Crown", "Aetna", 1000.0, covered);
            v.treatment_plan_id = Some("TP1".into());
            v.estimated_total_cost = Some(2000.0);
            v.plan_completion_rate = Some(75.0);
            v.plan_created_on = Some(d(1, 1));
            v.plan_completed_on = Some(d(3, 1));
            v
        };
        let out = treatment_plan_roi(&table(vec![
            plan("V1", 600.0),
            plan("V2", 400.0),
            visit("V3", "Exam", "Aetna", 100.0, 100.0),
        ]));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].collected, 1000.0);
        assert_eq!(out[0].roi, 50.0);
        assert_eq!(out[0].duration_days, Some(60));
        assert_eq!(out[0].completion_rate, Some(75.0));
    }
}
