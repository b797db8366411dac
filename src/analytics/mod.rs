//! The compute pipeline: outlier removal, filter resolution, period
//! aggregation, derived metrics, forecasts and funnels.
//!
//! Every entry point is a pure function of a loaded store snapshot and a
//! `FilterContext`.

pub mod forecast;
pub mod funnel;
pub mod metrics;
pub mod outliers;
pub mod period;
pub mod resolver;

pub use forecast::{Forecast, ForecastKind, ForecastPoint};
pub use outliers::{detect_outliers, OutlierBounds, OutlierReport};
pub use period::{
    aggregate, aggregate_by, compare, select_periods, AggregateRow, AggregateTable, ComparisonResult,
    MetricSpec, PeriodKey, PeriodSelection, Reduce,
};
pub use resolver::{resolve_filters, FilteredStores};
