//! Typed rows for the five source extracts.
//!
//! Numeric cells are `Option<f64>`: a blank or unparseable cell is missing,
//! never zero. Sums skip missing values and means average only present ones.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use super::enums::{Domain, ServiceLine};

/// Access to the timestamp a row is bucketed and filtered by.
pub trait Dated {
    fn date(&self) -> Option<NaiveDate>;
}

/// Accounts-receivable aging buckets carried on a Financial row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArAging {
    pub current: Option<f64>,
    pub days_31_60: Option<f64>,
    pub days_61_90: Option<f64>,
    pub days_91_plus: Option<f64>,
    pub total: Option<f64>,
}

/// One location-day (or location-period) row of `Financial_Data.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub date: Option<NaiveDate>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub total_revenue: Option<f64>,
    pub total_expenses: Option<f64>,
    pub ebitda: Option<f64>,
    pub ebitda_margin: Option<f64>,
    pub collection_rate: Option<f64>,
    pub dso: Option<f64>,
    pub chair_utilization: Option<f64>,
    pub total_patient_visits: Option<f64>,
    pub chair_capacity: Option<f64>,
    pub used_chair_hours: Option<f64>,
    pub revenue_mom_change: Option<f64>,
    pub revenue_yoy_change: Option<f64>,
    pub labor_cost_percentage: Option<f64>,
    pub supply_cost_percentage: Option<f64>,
    pub total_claims_submitted: Option<f64>,
    pub claims_denied: Option<f64>,
    pub ar: ArAging,
    /// `Revenue_<Line>` columns.
    pub service_revenue: BTreeMap<ServiceLine, f64>,
    /// Expense category columns, keyed by source column name.
    pub expenses: BTreeMap<String, f64>,
    /// `Payor_*` columns, keyed by payor display name.
    pub payor_mix: BTreeMap<String, f64>,
}

impl Dated for FinancialRecord {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// One location-day row of `Operations_Data.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationsRecord {
    pub date: Option<NaiveDate>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub day_of_week: Option<String>,
    pub chair_utilization: Option<f64>,
    pub target_chair_utilization: Option<f64>,
    pub cancellation_rate: Option<f64>,
    pub no_show_rate: Option<f64>,
    pub actual_collection_rate: Option<f64>,
    pub target_collection_rate: Option<f64>,
    pub appointment_capacity: Option<f64>,
    pub scheduled_appointments: Option<f64>,
    pub actual_appointments: Option<f64>,
    pub total_patients_seen: Option<f64>,
    pub total_labor_hours: Option<f64>,
    pub total_labor_cost: Option<f64>,
    pub revenue_per_hour: Option<f64>,
    pub new_patient_count: Option<f64>,
    pub returning_patient_count: Option<f64>,
    pub cancellation_count: Option<f64>,
    pub no_show_count: Option<f64>,
    pub avg_wait_time: Option<f64>,
    pub treatment_plan_completion_rate: Option<f64>,
    pub plans_not_started: Option<f64>,
    pub plans_in_progress: Option<f64>,
    pub plans_completed: Option<f64>,
    pub plans_delayed: Option<f64>,
    pub claims_submitted: Option<f64>,
    pub claims_processed: Option<f64>,
    pub claims_paid: Option<f64>,
    pub claims_denied: Option<f64>,
    pub claims_aging_0_30: Option<f64>,
    pub claims_aging_31_60: Option<f64>,
    pub claims_aging_61_90: Option<f64>,
    pub claims_aging_90_plus: Option<f64>,
    pub avg_days_to_payment: Option<f64>,
}

impl OperationsRecord {
    /// Weekday from the `Day_of_Week` column, falling back to the date.
    pub fn weekday(&self) -> Option<Weekday> {
        self.day_of_week
            .as_deref()
            .and_then(|d| d.trim().parse::<Weekday>().ok())
            .or_else(|| self.date.map(|d| d.weekday()))
    }
}

impl Dated for OperationsRecord {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// One appointment row of `Pat_App_Data.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientVisit {
    pub visit_id: Option<String>,
    pub patient_id: Option<String>,
    pub service_at: Option<NaiveDateTime>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub provider_id: Option<String>,
    pub insurance_provider: Option<String>,
    pub procedure: Option<String>,
    pub appointment_status: Option<String>,
    pub charged_amount: Option<f64>,
    pub insurance_covered_amount: Option<f64>,
    pub out_of_pocket: Option<f64>,
    pub discount_applied: Option<f64>,
    pub amount_paid: Option<f64>,
    pub is_new_patient: Option<bool>,
    pub claim_submitted_on: Option<NaiveDate>,
    pub claim_status: Option<String>,
    pub claim_status_on: Option<NaiveDate>,
    pub claim_paid_on: Option<NaiveDate>,
    pub treatment_plan_id: Option<String>,
    pub plan_created_on: Option<NaiveDate>,
    pub plan_completed_on: Option<NaiveDate>,
    pub plan_completion_rate: Option<f64>,
    pub estimated_total_cost: Option<f64>,
    pub google_rating: Option<f64>,
    pub appointment_duration: Option<f64>,
}

impl PatientVisit {
    /// Insurance-covered + out-of-pocket − discount. `None` only when every
    /// component is missing.
    pub fn collected_amount(&self) -> Option<f64> {
        if self.insurance_covered_amount.is_none()
            && self.out_of_pocket.is_none()
            && self.discount_applied.is_none()
        {
            return None;
        }
        Some(
            self.insurance_covered_amount.unwrap_or(0.0) + self.out_of_pocket.unwrap_or(0.0)
                - self.discount_applied.unwrap_or(0.0),
        )
    }

    pub fn status_is(&self, status: &str) -> bool {
        self.appointment_status.as_deref() == Some(status)
    }

    pub fn claim_status_is(&self, status: &str) -> bool {
        self.claim_status.as_deref() == Some(status)
    }
}

impl Dated for PatientVisit {
    fn date(&self) -> Option<NaiveDate> {
        self.service_at.map(|t| t.date())
    }
}

/// One staff-member-day row of `Staff_Hours_Data.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffShift {
    pub date: Option<NaiveDate>,
    pub staff_id: Option<String>,
    pub staff_role: Option<String>,
    pub location_id: Option<String>,
    pub hours_worked: Option<f64>,
    pub labor_cost: Option<f64>,
}

impl Dated for StaffShift {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// One equipment-day row of `Equipment_Usage_Data.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentUsage {
    pub date: Option<NaiveDate>,
    pub location_id: Option<String>,
    pub equipment_type: Option<String>,
    pub utilization_rate: Option<f64>,
    pub usage_count: Option<f64>,
    pub usage_time_minutes: Option<f64>,
}

impl Dated for EquipmentUsage {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// Column holding each domain's timestamp.
pub fn date_column(domain: Domain) -> &'static str {
    match domain {
        Domain::Patient => "Date_of_Service",
        _ => "Date",
    }
}
