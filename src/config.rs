use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Dental Insights";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the CSV data directory.
pub const DATA_DIR_ENV: &str = "DENTAL_INSIGHTS_DATA_DIR";

/// Optional tuning file looked up inside the data directory.
pub const ANALYTICS_CONFIG_FILE: &str = "analytics.json";

pub const FINANCIAL_FILE: &str = "Financial_Data.csv";
pub const OPERATIONS_FILE: &str = "Operations_Data.csv";
pub const PATIENT_FILE: &str = "Pat_App_Data.csv";
pub const STAFF_FILE: &str = "Staff_Hours_Data.csv";
pub const EQUIPMENT_FILE: &str = "Equipment_Usage_Data.csv";

/// Get the CSV data directory.
/// `$DENTAL_INSIGHTS_DATA_DIR` when set, `./data` otherwise.
pub fn default_data_dir() -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("data"),
    }
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "dental_insights=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed analytics config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid analytics config: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Analytics tuning
// ═══════════════════════════════════════════════════════════

/// Tunables for the compute pass. Defaults reproduce the dashboard's
/// fixed behaviour; `analytics.json` may override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Upper fence = Q3 + multiplier × IQR.
    pub outlier_iqr_multiplier: f64,
    /// Long ranges are subsampled down to roughly this many days.
    pub sample_target_days: i64,
    /// Minimum monthly points before a forecast is produced.
    pub forecast_min_history: usize,
    /// Trailing moving-average window (capped by history length).
    pub forecast_window: usize,
    /// Months projected past the last historical month.
    pub forecast_horizon: usize,
    /// Preferred start of the default date filter.
    pub default_start_date: NaiveDate,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            outlier_iqr_multiplier: 3.0,
            sample_target_days: 180,
            forecast_min_history: 6,
            forecast_window: 3,
            forecast_horizon: 3,
            default_start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
        }
    }
}

impl AnalyticsConfig {
    /// Load `analytics.json` from `data_dir`. A missing file yields defaults.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(ANALYTICS_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;

        tracing::info!(path = %path.display(), "Loaded analytics config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.outlier_iqr_multiplier > 0.0) {
            return Err(ConfigError::Invalid(
                "outlier_iqr_multiplier must be positive".into(),
            ));
        }
        if self.sample_target_days <= 0 {
            return Err(ConfigError::Invalid(
                "sample_target_days must be positive".into(),
            ));
        }
        if self.forecast_window == 0 || self.forecast_horizon == 0 {
            return Err(ConfigError::Invalid(
                "forecast_window and forecast_horizon must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_constants() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.outlier_iqr_multiplier, 3.0);
        assert_eq!(config.sample_target_days, 180);
        assert_eq!(config.forecast_min_history, 6);
        assert_eq!(config.forecast_window, 3);
        assert_eq!(config.forecast_horizon, 3);
        assert_eq!(
            config.default_start_date,
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyticsConfig::load(dir.path()).unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ANALYTICS_CONFIG_FILE),
            r#"{ "forecast_horizon": 6, "default_start_date": "2023-04-01" }"#,
        )
        .unwrap();

        let config = AnalyticsConfig::load(dir.path()).unwrap();
        assert_eq!(config.forecast_horizon, 6);
        assert_eq!(config.forecast_window, 3);
        assert_eq!(
            config.default_start_date,
            NaiveDate::from_ymd_opt(2023, 4, 1).unwrap()
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ANALYTICS_CONFIG_FILE), "{ not json").unwrap();
        assert!(matches!(
            AnalyticsConfig::load(dir.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn zero_window_rejected() {
        let config = AnalyticsConfig {
            forecast_window: 0,
            ..AnalyticsConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn negative_multiplier_rejected() {
        let config = AnalyticsConfig {
            outlier_iqr_multiplier: -1.0,
            ..AnalyticsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
