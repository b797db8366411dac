//! Staged visit counts, patient cohorts and treatment-plan tallies.

use std::collections::BTreeMap;

use chrono::{Datelike, Timelike};
use serde::Serialize;

use super::metrics::operations::{weekday_name, WEEK};
use super::metrics::{distinct_count, group_by, ratio_pct, sum_of};
use super::period::PeriodKey;
use crate::models::{
    Dated, Granularity, OperationsRecord, PatientVisit, CLAIM_PAID, STATUS_CANCELED, STATUS_COMPLETED,
    STATUS_NO_SHOW,
};
use crate::store::Table;

const PLAN_COLUMNS: &[&str] = &[
    "Treatment_Plans_Not_Started",
    "Treatment_Plans_In_Progress",
    "Treatment_Plans_Completed",
    "Treatment_Plans_Delayed",
];

const VISIT_COLUMNS: &[&str] = &["Visit_ID", "Appointment_Status"];

fn distinct_visits<'a>(rows: impl Iterator<Item = &'a PatientVisit>) -> usize {
    distinct_count(rows.map(|r| r.visit_id.as_deref()))
}

// ═══════════════════════════════════════════════════════════
// Appointment funnel
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage: &'static str,
    pub count: usize,
}

/// A later stage holding more visits than the stage before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelViolation {
    pub earlier: &'static str,
    pub later: &'static str,
    pub earlier_count: usize,
    pub later_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelReport {
    /// In declaration order, never re-sorted.
    pub stages: Vec<FunnelStage>,
    pub violations: Vec<FunnelViolation>,
}

type StagePredicate = fn(&PatientVisit) -> bool;

/// Stage name, the column it reads beyond `VISIT_COLUMNS`, and its test.
fn funnel_stages() -> [(&'static str, Option<&'static str>, StagePredicate); 5] {
    [
        ("Scheduled", None, |_| true),
        ("Checked-In", None, |r| !r.status_is(STATUS_NO_SHOW)),
        ("Completed", None, |r| r.status_is(STATUS_COMPLETED)),
        (
            "Claims Submitted",
            Some("Insurance_Claim_Submission_Date"),
            |r| r.claim_submitted_on.is_some(),
        ),
        ("Claims Paid", Some("Insurance_Claim_Status"), |r| r.claim_status_is(CLAIM_PAID)),
    ]
}

/// Distinct visits reaching each stage from scheduling to paid claim.
/// Stages are counted independently, so dirty data can break the
/// non-increasing shape; such pairs are reported, not corrected.
///
/// `None` without visit IDs and statuses. Claim stages whose column is
/// absent are left out rather than shown as zero.
pub fn appointment_funnel(patient: &Table<PatientVisit>) -> Option<FunnelReport> {
    if !patient.schema.has_all(VISIT_COLUMNS) {
        return None;
    }
    let stages: Vec<FunnelStage> = funnel_stages()
        .into_iter()
        .filter(|(_, column, _)| column.map_or(true, |c| patient.schema.has(c)))
        .map(|(stage, _, pred)| FunnelStage {
            stage,
            count: distinct_visits(patient.rows.iter().filter(|r| pred(*r))),
        })
        .collect();

    let violations: Vec<FunnelViolation> = stages
        .windows(2)
        .filter(|pair| pair[1].count > pair[0].count)
        .map(|pair| FunnelViolation {
            earlier: pair[0].stage,
            later: pair[1].stage,
            earlier_count: pair[0].count,
            later_count: pair[1].count,
        })
        .collect();

    for v in &violations {
        tracing::warn!(
            earlier = v.earlier,
            later = v.later,
            earlier_count = v.earlier_count,
            later_count = v.later_count,
            "Funnel stage exceeds the stage before it"
        );
    }

    Some(FunnelReport { stages, violations })
}

// ═══════════════════════════════════════════════════════════
// Cohorts
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientMixRow {
    pub period: PeriodKey,
    pub new_patients: usize,
    pub returning_patients: usize,
}

/// Distinct new and returning visits per period bucket. Every bucket with
/// any visit appears, with 0 for the cohort it lacks. `None` when the
/// extract has no visit IDs or new-patient flag.
pub fn patient_mix(patient: &Table<PatientVisit>, granularity: Granularity) -> Option<Vec<PatientMixRow>> {
    if !patient.schema.has_all(&["Visit_ID", "Is_New_Patient"]) {
        return None;
    }
    let rows = group_by(&patient.rows, |r| r.date().map(|d| PeriodKey::for_date(d, granularity)))
        .into_iter()
        .map(|(period, rows)| PatientMixRow {
            period,
            new_patients: distinct_visits(rows.iter().copied().filter(|r| r.is_new_patient == Some(true))),
            returning_patients: distinct_visits(
                rows.iter().copied().filter(|r| r.is_new_patient == Some(false)),
            ),
        })
        .collect();
    Some(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentRates {
    pub month: PeriodKey,
    pub scheduled: usize,
    pub completion_rate: f64,
    pub no_show_rate: f64,
    pub cancellation_rate: f64,
}

/// Monthly outcome rates over visits that were completed, canceled or
/// missed. Visits in any other state are not counted as scheduled.
pub fn appointment_rates_by_month(patient: &Table<PatientVisit>) -> Option<Vec<AppointmentRates>> {
    if !patient.schema.has_all(VISIT_COLUMNS) {
        return None;
    }
    let scheduled_states = [STATUS_COMPLETED, STATUS_CANCELED, STATUS_NO_SHOW];
    let rates = group_by(&patient.rows, |r| {
        if !scheduled_states.iter().any(|s| r.status_is(s)) {
            return None;
        }
        r.date().map(|d| PeriodKey::for_date(d, Granularity::Month))
    })
    .into_iter()
    .map(|(month, rows)| {
        let scheduled = distinct_visits(rows.iter().copied());
        let rate = |status: &str| {
            let hits = distinct_visits(rows.iter().copied().filter(|r| r.status_is(status)));
            ratio_pct(hits as f64, scheduled as f64)
        };
        AppointmentRates {
            month,
            scheduled,
            completion_rate: rate(STATUS_COMPLETED),
            no_show_rate: rate(STATUS_NO_SHOW),
            cancellation_rate: rate(STATUS_CANCELED),
        }
    })
    .collect();
    Some(rates)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayNoShows {
    pub day: String,
    pub appointments: usize,
    pub no_shows: usize,
    pub no_show_rate: f64,
}

/// No-show rate by day of service, Monday first.
pub fn no_show_by_weekday(patient: &Table<PatientVisit>) -> Option<Vec<WeekdayNoShows>> {
    if !patient.schema.has("Appointment_Status") {
        return None;
    }
    let groups = group_by(&patient.rows, |r| r.date().map(|d| d.weekday().num_days_from_monday()));

    let days = WEEK
        .iter()
        .filter_map(|day| {
            let rows = groups.get(&day.num_days_from_monday())?;
            let no_shows = rows.iter().filter(|r| r.status_is(STATUS_NO_SHOW)).count();
            Some(WeekdayNoShows {
                day: weekday_name(*day).to_string(),
                appointments: rows.len(),
                no_shows,
                no_show_rate: ratio_pct(no_shows as f64, rows.len() as f64),
            })
        })
        .collect();
    Some(days)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitSlot {
    pub day: String,
    pub hour: u32,
    pub visits: usize,
}

/// Visit counts per weekday and hour of service, Monday first then by
/// hour. The first slot with the highest count is the busiest.
pub fn visit_distribution(patient: &Table<PatientVisit>) -> Vec<VisitSlot> {
    let mut counts: BTreeMap<(u32, u32), usize> = BTreeMap::new();
    for at in patient.rows.iter().filter_map(|r| r.service_at) {
        *counts
            .entry((at.weekday().num_days_from_monday(), at.hour()))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((day, hour), visits)| VisitSlot {
            day: weekday_name(WEEK[day as usize]).to_string(),
            hour,
            visits,
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Treatment plans
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentPlanStatus {
    pub not_started: f64,
    pub in_progress: f64,
    pub completed: f64,
    pub delayed: f64,
    pub total: f64,
    /// Completed over all four states.
    pub conversion_rate: f64,
}

/// Plan status tally summed over the operations rows. `None` when the
/// extract lacks the plan columns.
pub fn treatment_plan_status(operations: &Table<OperationsRecord>) -> Option<TreatmentPlanStatus> {
    if !operations.schema.has_all(PLAN_COLUMNS) {
        return None;
    }
    let rows: Vec<&OperationsRecord> = operations.rows.iter().collect();
    let not_started = sum_of(&rows, |r| r.plans_not_started);
    let in_progress = sum_of(&rows, |r| r.plans_in_progress);
    let completed = sum_of(&rows, |r| r.plans_completed);
    let delayed = sum_of(&rows, |r| r.plans_delayed);
    let total = not_started + in_progress + completed + delayed;

    Some(TreatmentPlanStatus {
        not_started,
        in_progress,
        completed,
        delayed,
        total,
        conversion_rate: ratio_pct(completed, total),
    })
}
