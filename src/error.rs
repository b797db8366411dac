use thiserror::Error;

use crate::config::ConfigError;
use crate::models::Domain;

/// Errors raised by a compute pass.
///
/// Insufficient data (no prior period, short history, empty filter result)
/// is never an error; those states are carried in the result types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Required columns missing from {domain} data: {}", columns.join(", "))]
    MissingColumns {
        domain: Domain,
        columns: Vec<String>,
    },

    #[error("Data has not been loaded")]
    StoreNotLoaded,

    #[error("Invalid value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{0}")]
    InvalidConfig(String),
}

impl From<ConfigError> for AnalyticsError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
