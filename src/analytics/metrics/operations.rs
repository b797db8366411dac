//! Operations, staffing and equipment summaries.

use chrono::Weekday;
use serde::Serialize;

use super::{distinct_count, group_by, mean_of, ratio_pct, safe_divide, sum_of};
use crate::models::{EquipmentUsage, OperationsRecord, StaffShift};
use crate::store::Table;

pub(crate) const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub(crate) fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

const CLAIM_COLUMNS: &[&str] = &["Insurance_Claims_Submitted", "Insurance_Claims_Processed"];

fn all_rows<R>(table: &Table<R>) -> Vec<&R> {
    table.rows.iter().collect()
}

// ═══════════════════════════════════════════════════════════
// Claims
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimsSummary {
    pub submitted: f64,
    pub processed: f64,
    pub paid: f64,
    pub denied: f64,
    /// Processed over submitted.
    pub processing_rate: f64,
    /// Paid over processed.
    pub approval_rate: f64,
    /// Denied over processed.
    pub denial_rate: f64,
    pub aging: Vec<ClaimAgingBucket>,
    pub over_60_share: f64,
    pub avg_days_to_payment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimAgingBucket {
    pub bucket: String,
    pub count: f64,
    pub share: f64,
}

/// Claim throughput and aging over the filtered operations rows. `None`
/// when the extract has no claim columns.
pub fn claims_summary(operations: &Table<OperationsRecord>) -> Option<ClaimsSummary> {
    if !operations.schema.has_all(CLAIM_COLUMNS) {
        return None;
    }
    let rows = all_rows(operations);
    let submitted = sum_of(&rows, |r| r.claims_submitted);
    let processed = sum_of(&rows, |r| r.claims_processed);
    let paid = sum_of(&rows, |r| r.claims_paid);
    let denied = sum_of(&rows, |r| r.claims_denied);

    let counts = [
        ("0-30 Days", sum_of(&rows, |r| r.claims_aging_0_30)),
        ("31-60 Days", sum_of(&rows, |r| r.claims_aging_31_60)),
        ("61-90 Days", sum_of(&rows, |r| r.claims_aging_61_90)),
        ("90+ Days", sum_of(&rows, |r| r.claims_aging_90_plus)),
    ];
    let aged_total: f64 = counts.iter().map(|(_, c)| c).sum();

    Some(ClaimsSummary {
        submitted,
        processed,
        paid,
        denied,
        processing_rate: ratio_pct(processed, submitted),
        approval_rate: ratio_pct(paid, processed),
        denial_rate: ratio_pct(denied, processed),
        over_60_share: ratio_pct(counts[2].1 + counts[3].1, aged_total),
        aging: counts
            .into_iter()
            .map(|(bucket, count)| ClaimAgingBucket {
                bucket: bucket.to_string(),
                count,
                share: ratio_pct(count, aged_total),
            })
            .collect(),
        avg_days_to_payment: mean_of(&rows, |r| r.avg_days_to_payment),
    })
}

// ═══════════════════════════════════════════════════════════
// Capacity and KPIs
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacitySummary {
    pub capacity: f64,
    pub scheduled: f64,
    pub actual: f64,
    pub scheduled_utilization: f64,
    pub actual_utilization: f64,
    pub throughput: Option<Throughput>,
    pub patient_split: Option<PatientSplit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Throughput {
    pub patients_seen: f64,
    pub labor_hours: f64,
    pub patients_per_labor_hour: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSplit {
    pub new_patients: f64,
    pub returning_patients: f64,
    pub new_patient_share: f64,
}

const CAPACITY_COLUMNS: &[&str] = &[
    "Appointment_Capacity",
    "Scheduled_Appointments",
    "Actual_Appointments",
];

/// Appointment capacity against scheduled and kept appointments. `None`
/// without the capacity columns; throughput and the new/returning split
/// are each present only when their own columns are.
pub fn capacity_summary(operations: &Table<OperationsRecord>) -> Option<CapacitySummary> {
    let schema = &operations.schema;
    if !schema.has_all(CAPACITY_COLUMNS) {
        return None;
    }
    let rows = all_rows(operations);
    let capacity = sum_of(&rows, |r| r.appointment_capacity);
    let scheduled = sum_of(&rows, |r| r.scheduled_appointments);
    let actual = sum_of(&rows, |r| r.actual_appointments);

    let throughput = schema
        .has_all(&["Total_Patients_Seen", "Total_Labor_Hours"])
        .then(|| {
            let patients_seen = sum_of(&rows, |r| r.total_patients_seen);
            let labor_hours = sum_of(&rows, |r| r.total_labor_hours);
            Throughput {
                patients_seen,
                labor_hours,
                patients_per_labor_hour: safe_divide(patients_seen, labor_hours),
            }
        });
    let patient_split = schema
        .has_all(&["New_Patient_Count", "Returning_Patient_Count"])
        .then(|| {
            let new_patients = sum_of(&rows, |r| r.new_patient_count);
            let returning_patients = sum_of(&rows, |r| r.returning_patient_count);
            PatientSplit {
                new_patients,
                returning_patients,
                new_patient_share: ratio_pct(new_patients, new_patients + returning_patients),
            }
        });

    Some(CapacitySummary {
        capacity,
        scheduled,
        actual,
        scheduled_utilization: ratio_pct(scheduled, capacity),
        actual_utilization: ratio_pct(actual, capacity),
        throughput,
        patient_split,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationsKpis {
    pub chair_utilization: Option<f64>,
    pub target_chair_utilization: Option<f64>,
    pub cancellation_rate: Option<f64>,
    pub no_show_rate: Option<f64>,
    pub actual_collection_rate: Option<f64>,
    pub target_collection_rate: Option<f64>,
    pub avg_wait_time: Option<f64>,
    pub revenue_per_hour: Option<f64>,
}

/// Period means of the daily operating KPIs, each alongside its target
/// where the extract has one.
pub fn operations_kpis(operations: &Table<OperationsRecord>) -> OperationsKpis {
    let rows = all_rows(operations);
    OperationsKpis {
        chair_utilization: mean_of(&rows, |r| r.chair_utilization),
        target_chair_utilization: mean_of(&rows, |r| r.target_chair_utilization),
        cancellation_rate: mean_of(&rows, |r| r.cancellation_rate),
        no_show_rate: mean_of(&rows, |r| r.no_show_rate),
        actual_collection_rate: mean_of(&rows, |r| r.actual_collection_rate),
        target_collection_rate: mean_of(&rows, |r| r.target_collection_rate),
        avg_wait_time: mean_of(&rows, |r| r.avg_wait_time),
        revenue_per_hour: mean_of(&rows, |r| r.revenue_per_hour),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayCancellations {
    pub day: String,
    pub cancellation_rate: Option<f64>,
    pub no_show_rate: Option<f64>,
    pub cancellations: f64,
    pub no_shows: f64,
}

/// Cancellation and no-show behaviour by weekday, Monday first. Days with
/// no rows are left out.
pub fn cancellations_by_weekday(operations: &Table<OperationsRecord>) -> Vec<WeekdayCancellations> {
    let groups = group_by(&operations.rows, |r| {
        r.weekday().map(|d| d.num_days_from_monday())
    });

    WEEK.iter()
        .filter_map(|day| {
            let rows = groups.get(&day.num_days_from_monday())?;
            Some(WeekdayCancellations {
                day: weekday_name(*day).to_string(),
                cancellation_rate: mean_of(rows, |r| r.cancellation_rate),
                no_show_rate: mean_of(rows, |r| r.no_show_rate),
                cancellations: sum_of(rows, |r| r.cancellation_count),
                no_shows: sum_of(rows, |r| r.no_show_count),
            })
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Staff and equipment
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffRoleSummary {
    pub role: String,
    pub staff: usize,
    pub hours: f64,
    pub labor_cost: f64,
    pub cost_per_hour: f64,
}

/// Hours and labor cost per staff role, alphabetical.
pub fn staff_by_role(staff: &Table<StaffShift>) -> Vec<StaffRoleSummary> {
    group_by(&staff.rows, |r| r.staff_role.clone())
        .into_iter()
        .map(|(role, rows)| {
            let hours = sum_of(&rows, |r| r.hours_worked);
            let labor_cost = sum_of(&rows, |r| r.labor_cost);
            StaffRoleSummary {
                role,
                staff: distinct_count(rows.iter().map(|r| r.staff_id.as_deref())),
                hours,
                labor_cost,
                cost_per_hour: safe_divide(labor_cost, hours),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentSummary {
    pub equipment_type: String,
    pub utilization_rate: Option<f64>,
    pub usage_count: f64,
    pub usage_minutes: f64,
}

/// Utilization and usage per equipment type, most utilized first.
pub fn equipment_by_type(equipment: &Table<EquipmentUsage>) -> Vec<EquipmentSummary> {
    let mut out: Vec<EquipmentSummary> = group_by(&equipment.rows, |r| r.equipment_type.clone())
        .into_iter()
        .map(|(equipment_type, rows)| EquipmentSummary {
            equipment_type,
            utilization_rate: mean_of(&rows, |r| r.utilization_rate),
            usage_count: sum_of(&rows, |r| r.usage_count),
            usage_minutes: sum_of(&rows, |r| r.usage_time_minutes),
        })
        .collect();
    out.sort_by(|a, b| {
        b.utilization_rate
            .unwrap_or(0.0)
            .total_cmp(&a.utilization_rate.unwrap_or(0.0))
    });
    out
}
