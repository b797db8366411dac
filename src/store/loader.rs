use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};

use super::fields::{parse_date, parse_datetime, parse_flag, parse_number, parse_text};
use super::{LoadError, Table};
use crate::models::*;

/// Fixed-name expense columns (the `Labor_*` and `Supplies_*` families are
/// matched by prefix).
const EXPENSE_COLUMNS: &[&str] = &[
    "Rent_Lease",
    "Utilities",
    "Equipment_Costs",
    "Marketing",
    "Insurance",
    "Professional_Fees",
    "Lab_Fees",
    "Software_IT",
];

/// Columns whose absence disables part of a page. Logged once per load.
const FINANCIAL_OPTIONAL: &[&str] = &[
    "EBITDA",
    "Collection_Rate",
    "DSO",
    "Chair_Utilization",
    "Total_Patient_Visits",
    "Location_ID",
    "Location_Name",
];

const PATIENT_OPTIONAL: &[&str] = &[
    "Visit_ID",
    "Appointment_Status",
    "Insurance_Provider",
    "Procedure_Description",
    "Insurance_Claim_Submission_Date",
    "Insurance_Claim_Status",
    "Is_New_Patient",
];

fn is_expense_column(name: &str) -> bool {
    (name.starts_with("Labor_") && name != "Labor_Cost_Percentage")
        || name.starts_with("Supplies_")
        || EXPENSE_COLUMNS.contains(&name)
}

// ═══════════════════════════════════════════════════════════
// Row access
// ═══════════════════════════════════════════════════════════

struct HeaderIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(headers: &StringRecord) -> Self {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let positions = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, positions }
    }
}

/// Named-column view over one CSV record.
struct Row<'a> {
    index: &'a HeaderIndex,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    fn raw(&self, column: &str) -> Option<&'a str> {
        self.index
            .positions
            .get(column)
            .and_then(|&i| self.record.get(i))
    }

    fn text(&self, column: &str) -> Option<String> {
        self.raw(column).and_then(parse_text)
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.raw(column).and_then(parse_number)
    }

    fn date(&self, column: &str) -> Option<NaiveDate> {
        self.raw(column).and_then(parse_date)
    }

    fn datetime(&self, column: &str) -> Option<NaiveDateTime> {
        self.raw(column).and_then(parse_datetime)
    }

    fn flag(&self, column: &str) -> Option<bool> {
        self.raw(column).and_then(parse_flag)
    }

    /// Present numeric cells whose column satisfies `pred`.
    fn numbers_where(&self, pred: impl Fn(&str) -> bool) -> Vec<(&'a str, f64)> {
        self.index
            .names
            .iter()
            .enumerate()
            .filter(|(_, name)| pred(name.as_str()))
            .filter_map(|(i, name)| {
                self.record
                    .get(i)
                    .and_then(parse_number)
                    .map(|v| (name.as_str(), v))
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════
// Table parsing
// ═══════════════════════════════════════════════════════════

/// Parse one delimited extract into a typed table.
///
/// Short rows are tolerated; cells that fail to parse are missing.
fn parse_table<R>(
    bytes: &[u8],
    domain: Domain,
    file: &str,
    build: fn(&Row<'_>) -> R,
) -> Result<Table<R>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            file: file.to_string(),
            source,
        })?
        .clone();
    let index = HeaderIndex::new(&headers);
    let schema = TableSchema::new(domain, index.names.iter().cloned());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            file: file.to_string(),
            source,
        })?;
        rows.push(build(&Row {
            index: &index,
            record: &record,
        }));
    }

    Ok(Table { rows, schema })
}

pub fn parse_financial(bytes: &[u8], file: &str) -> Result<Table<FinancialRecord>, LoadError> {
    let table = parse_table(bytes, Domain::Financial, file, financial_row)?;
    warn_missing(&table.schema, FINANCIAL_OPTIONAL);
    Ok(table)
}

pub fn parse_operations(bytes: &[u8], file: &str) -> Result<Table<OperationsRecord>, LoadError> {
    parse_table(bytes, Domain::Operations, file, operations_row)
}

pub fn parse_patients(bytes: &[u8], file: &str) -> Result<Table<PatientVisit>, LoadError> {
    let table = parse_table(bytes, Domain::Patient, file, patient_row)?;
    warn_missing(&table.schema, PATIENT_OPTIONAL);
    Ok(table)
}

pub fn parse_staff(bytes: &[u8], file: &str) -> Result<Table<StaffShift>, LoadError> {
    parse_table(bytes, Domain::Staff, file, staff_row)
}

pub fn parse_equipment(bytes: &[u8], file: &str) -> Result<Table<EquipmentUsage>, LoadError> {
    parse_table(bytes, Domain::Equipment, file, equipment_row)
}

fn warn_missing(schema: &TableSchema, optional: &[&str]) {
    let missing = schema.missing(optional);
    if !missing.is_empty() {
        tracing::warn!(
            domain = %schema.domain,
            columns = %missing.join(", "),
            "Optional columns absent; dependent metrics will be unavailable"
        );
    }
}

// ═══════════════════════════════════════════════════════════
// Row builders
// ═══════════════════════════════════════════════════════════

fn financial_row(row: &Row<'_>) -> FinancialRecord {
    let service_revenue: BTreeMap<ServiceLine, f64> = ServiceLine::ALL
        .iter()
        .filter_map(|line| row.number(&line.revenue_column()).map(|v| (*line, v)))
        .collect();

    let expenses = row
        .numbers_where(is_expense_column)
        .into_iter()
        .map(|(name, v)| (name.to_string(), v))
        .collect();

    let payor_mix = row
        .numbers_where(|name| name.starts_with("Payor_"))
        .into_iter()
        .map(|(name, v)| (name.trim_start_matches("Payor_").replace('_', " "), v))
        .collect();

    FinancialRecord {
        date: row.date("Date"),
        location_id: row.text("Location_ID"),
        location_name: row.text("Location_Name"),
        total_revenue: row.number("Total_Revenue"),
        total_expenses: row.number("Total_Expenses"),
        ebitda: row.number("EBITDA"),
        ebitda_margin: row.number("EBITDA_Margin"),
        collection_rate: row.number("Collection_Rate"),
        dso: row.number("DSO"),
        chair_utilization: row.number("Chair_Utilization"),
        total_patient_visits: row.number("Total_Patient_Visits"),
        chair_capacity: row.number("Chair_Capacity"),
        used_chair_hours: row.number("Used_Chair_Hours"),
        revenue_mom_change: row.number("Revenue_MoM_Change"),
        revenue_yoy_change: row.number("Revenue_YoY_Change"),
        labor_cost_percentage: row.number("Labor_Cost_Percentage"),
        supply_cost_percentage: row.number("Supply_Cost_Percentage"),
        total_claims_submitted: row.number("Total_Claims_Submitted"),
        claims_denied: row.number("Claims_Denied"),
        ar: ArAging {
            current: row.number("AR_Current"),
            days_31_60: row.number("AR_31_60"),
            days_61_90: row.number("AR_61_90"),
            days_91_plus: row.number("AR_91_Plus"),
            total: row.number("Total_AR"),
        },
        service_revenue,
        expenses,
        payor_mix,
    }
}

fn operations_row(row: &Row<'_>) -> OperationsRecord {
    OperationsRecord {
        date: row.date("Date"),
        location_id: row.text("Location_ID"),
        location_name: row.text("Location_Name"),
        day_of_week: row.text("Day_of_Week"),
        chair_utilization: row.number("Chair_Utilization"),
        target_chair_utilization: row.number("Target_Chair_Utilization"),
        cancellation_rate: row.number("Cancellation_Rate"),
        no_show_rate: row.number("No_Show_Rate"),
        actual_collection_rate: row.number("Actual_Collection_Rate"),
        target_collection_rate: row.number("Target_Collection_Rate"),
        appointment_capacity: row.number("Appointment_Capacity"),
        scheduled_appointments: row.number("Scheduled_Appointments"),
        actual_appointments: row.number("Actual_Appointments"),
        total_patients_seen: row.number("Total_Patients_Seen"),
        total_labor_hours: row.number("Total_Labor_Hours"),
        total_labor_cost: row.number("Total_Labor_Cost"),
        revenue_per_hour: row.number("Revenue_Per_Hour"),
        new_patient_count: row.number("New_Patient_Count"),
        returning_patient_count: row.number("Returning_Patient_Count"),
        cancellation_count: row.number("Cancellation_Count"),
        no_show_count: row.number("No_Show_Count"),
        avg_wait_time: row.number("Avg_Wait_Time"),
        treatment_plan_completion_rate: row.number("Treatment_Plan_Completion_Rate"),
        plans_not_started: row.number("Treatment_Plans_Not_Started"),
        plans_in_progress: row.number("Treatment_Plans_In_Progress"),
        plans_completed: row.number("Treatment_Plans_Completed"),
        plans_delayed: row.number("Treatment_Plans_Delayed"),
        claims_submitted: row.number("Insurance_Claims_Submitted"),
        claims_processed: row.number("Insurance_Claims_Processed"),
        claims_paid: row.number("Insurance_Claims_Paid"),
        claims_denied: row.number("Insurance_Claims_Denied"),
        claims_aging_0_30: row.number("Claims_Aging_0_30"),
        claims_aging_31_60: row.number("Claims_Aging_31_60"),
        claims_aging_61_90: row.number("Claims_Aging_61_90"),
        claims_aging_90_plus: row.number("Claims_Aging_90_Plus"),
        avg_days_to_payment: row.number("Avg_Days_To_Payment"),
    }
}

fn patient_row(row: &Row<'_>) -> PatientVisit {
    PatientVisit {
        visit_id: row.text("Visit_ID"),
        patient_id: row.text("Patient_ID"),
        service_at: row.datetime("Date_of_Service"),
        location_id: row.text("Location_ID"),
        location_name: row.text("Location_Name"),
        provider_id: row.text("Provider_ID"),
        insurance_provider: row.text("Insurance_Provider"),
        procedure: row.text("Procedure_Description"),
        appointment_status: row.text("Appointment_Status"),
        charged_amount: row.number("Charged_Amount"),
        insurance_covered_amount: row.number("Insurance_Covered_Amount"),
        out_of_pocket: row.number("Out_of_Pocket"),
        discount_applied: row.number("Discount_Applied"),
        amount_paid: row.number("Amount_Paid"),
        is_new_patient: row.flag("Is_New_Patient"),
        claim_submitted_on: row.date("Insurance_Claim_Submission_Date"),
        claim_status: row.text("Insurance_Claim_Status"),
        claim_status_on: row.date("Insurance_Claim_Status_Date"),
        claim_paid_on: row.date("Insurance_Claim_Payment_Date"),
        treatment_plan_id: row.text("Treatment_Plan_ID"),
        plan_created_on: row.date("Treatment_Plan_Creation_Date"),
        plan_completed_on: row.date("Treatment_Plan_Completion_Date"),
        plan_completion_rate: row.number("Treatment_Plan_Completion_Rate"),
        estimated_total_cost: row.number("Estimated_Total_Cost"),
        google_rating: row.number("Google_Rating"),
        appointment_duration: row.number("Appointment_Duration"),
    }
}

fn staff_row(row: &Row<'_>) -> StaffShift {
    StaffShift {
        date: row.date("Date"),
        staff_id: row.text("Staff_ID"),
        staff_role: row.text("Staff_Role"),
        location_id: row.text("Location_ID"),
        hours_worked: row.number("Hours_Worked"),
        labor_cost: row.number("Labor_Cost"),
    }
}

fn equipment_row(row: &Row<'_>) -> EquipmentUsage {
    EquipmentUsage {
        date: row.date("Date"),
        location_id: row.text("Location_ID"),
        equipment_type: row.text("Equipment_Type"),
        utilization_rate: row.number("Utilization_Rate"),
        usage_count: row.number("Usage_Count"),
        usage_time_minutes: row.number("Usage_Time_Minutes"),
    }
}
