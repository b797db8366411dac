//! Applies a `FilterContext` uniformly to every domain table.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;

use crate::config::AnalyticsConfig;
use crate::models::*;
use crate::store::{RecordStore, Table};

/// The five domain tables after one filter pass. Inputs are never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredStores {
    pub financial: Table<FinancialRecord>,
    pub operations: Table<OperationsRecord>,
    pub patient: Table<PatientVisit>,
    pub staff: Table<StaffShift>,
    pub equipment: Table<EquipmentUsage>,
    /// Day stride used when a long range was subsampled.
    pub sampled_stride: Option<usize>,
}

impl FilteredStores {
    pub fn is_empty(&self) -> bool {
        self.financial.is_empty()
            && self.operations.is_empty()
            && self.patient.is_empty()
            && self.staff.is_empty()
            && self.equipment.is_empty()
    }
}

fn in_range<R: Dated>(ctx: &FilterContext, record: &R) -> bool {
    record.date().is_some_and(|d| ctx.contains(d))
}

fn matches_opt(value: &Option<String>, wanted: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(w) => value.as_deref() == Some(w.as_str()),
    }
}

/// Narrow every table to the selection in `ctx`.
///
/// `financial` is the outlier-cleaned Financial table; the other domains come
/// from `store`. Staff and Equipment carry no location name, so a named
/// location keeps rows whose `Location_ID` appears among the filtered
/// Financial or Operations rows.
pub fn resolve_filters(
    ctx: &FilterContext,
    financial: &Table<FinancialRecord>,
    store: &RecordStore,
    config: &AnalyticsConfig,
) -> FilteredStores {
    let span = tracing::debug_span!("resolve_filters", range = %ctx.date_range_label());
    let _guard = span.enter();

    let location = ctx.location.name();
    let at_location = |name: &Option<String>| location.map_or(true, |l| name.as_deref() == Some(l));

    let mut financial = financial.filtered(|r| in_range(ctx, r) && at_location(&r.location_name));
    if let Some(line) = ctx.service_line {
        for row in &mut financial.rows {
            row.service_revenue.retain(|k, _| *k == line);
        }
    }

    let mut operations = store.operations.filtered(|r| {
        in_range(ctx, r)
            && at_location(&r.location_name)
            && ctx.day_of_week.map_or(true, |day| r.weekday() == Some(day))
    });

    let mut patient = store.patient.filtered(|r| {
        in_range(ctx, r)
            && at_location(&r.location_name)
            && matches_opt(&r.provider_id, &ctx.provider)
            && matches_opt(&r.insurance_provider, &ctx.insurance)
    });

    let linked_ids: Option<HashSet<&str>> = location.map(|_| {
        financial
            .rows
            .iter()
            .filter_map(|r| r.location_id.as_deref())
            .chain(operations.rows.iter().filter_map(|r| r.location_id.as_deref()))
            .collect()
    });
    let linked = |id: &Option<String>| match &linked_ids {
        None => true,
        Some(ids) => id.as_deref().is_some_and(|i| ids.contains(i)),
    };

    let mut staff = store.staff.filtered(|r| {
        in_range(ctx, r) && linked(&r.location_id) && matches_opt(&r.staff_role, &ctx.staff_role)
    });
    let mut equipment = store
        .equipment
        .filtered(|r| in_range(ctx, r) && linked(&r.location_id));

    // Financial rows are monthly and stay out of day sampling.
    let sampled_stride = sample_stride(ctx, config).map(|stride| {
        let anchor = anchor_dates(&operations, &patient, &staff, &equipment);
        let sampled: HashSet<NaiveDate> = anchor.into_iter().step_by(stride).collect();

        let keep = |d: Option<NaiveDate>| d.is_some_and(|d| sampled.contains(&d));
        operations.rows.retain(|r| keep(r.date()));
        patient.rows.retain(|r| keep(r.date()));
        staff.rows.retain(|r| keep(r.date()));
        equipment.rows.retain(|r| keep(r.date()));

        tracing::debug!(stride, days = sampled.len(), "Subsampled long date range");
        stride
    });

    tracing::debug!(
        financial = financial.len(),
        operations = operations.len(),
        patient = patient.len(),
        staff = staff.len(),
        equipment = equipment.len(),
        "Filters applied"
    );

    FilteredStores {
        financial,
        operations,
        patient,
        staff,
        equipment,
        sampled_stride,
    }
}

/// Stride for day sampling, when the span is long enough to need it.
pub fn sample_stride(ctx: &FilterContext, config: &AnalyticsConfig) -> Option<usize> {
    let span = ctx.span_days();
    let target = config.sample_target_days.max(1);
    if !ctx.sample_long_ranges || span <= target {
        return None;
    }
    Some((span / target).max(1) as usize)
}

/// Sorted distinct dates to stride over: Operations dates, or every
/// sampled domain's dates when Operations is empty.
fn anchor_dates(
    operations: &Table<OperationsRecord>,
    patient: &Table<PatientVisit>,
    staff: &Table<StaffShift>,
    equipment: &Table<EquipmentUsage>,
) -> BTreeSet<NaiveDate> {
    let ops: BTreeSet<NaiveDate> = operations.rows.iter().filter_map(Dated::date).collect();
    if !ops.is_empty() {
        return ops;
    }
    patient
        .rows
        .iter()
        .filter_map(Dated::date)
        .chain(staff.rows.iter().filter_map(Dated::date))
        .chain(equipment.rows.iter().filter_map(Dated::date))
        .collect()
}
