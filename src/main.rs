use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{NaiveDate, Weekday};
use clap::{Parser, ValueEnum};

use dental_insights::analytics::metrics::ScenarioAdjustments;
use dental_insights::config::{self, AnalyticsConfig};
use dental_insights::dashboard::{self, DashboardSnapshot};
use dental_insights::models::{optional_selection, FilterContext, Granularity, LocationFilter, ServiceLine};
use dental_insights::store::StoreCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Whole snapshot as pretty JSON
    Json,
    /// Revenue trend table as CSV
    Csv,
}

#[derive(Parser)]
#[command(name = "dental-insights", version = config::APP_VERSION)]
#[command(about = "Compute dental practice dashboard datasets from CSV extracts")]
struct Cli {
    /// Directory holding the five CSV extracts (default: $DENTAL_INSIGHTS_DATA_DIR or ./data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// First day of the range (default: Jan 1 2022 clamped into the data)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the range (default: latest Financial date)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Location name, or "All"
    #[arg(long, default_value = "All")]
    location: String,

    /// Month, Quarter, Year or "All Time"
    #[arg(long, default_value = "Month")]
    period: Granularity,

    /// Service line, e.g. Implant or Oral_Surgery
    #[arg(long)]
    service_line: Option<ServiceLine>,

    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    insurance: Option<String>,

    #[arg(long)]
    staff_role: Option<String>,

    /// Weekday filter for operations rows
    #[arg(long)]
    day: Option<Weekday>,

    /// Subsample days on ranges longer than the configured target
    #[arg(long)]
    sample: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// What-if revenue change in percent (-20 to 20)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    revenue_change: f64,

    /// What-if labor cost change in percent (-10 to 10)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    labor_change: f64,

    /// What-if supply cost change in percent (-10 to 10)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    supply_change: f64,

    /// What-if collection rate change in points (-10 to 10)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    collection_change: f64,
}

impl Cli {
    fn filter_context(&self, defaults: FilterContext) -> FilterContext {
        FilterContext {
            start_date: self.start.unwrap_or(defaults.start_date),
            end_date: self.end.unwrap_or(defaults.end_date),
            location: LocationFilter::parse(&self.location),
            granularity: self.period,
            service_line: self.service_line,
            provider: optional_selection(self.provider.as_deref()),
            insurance: optional_selection(self.insurance.as_deref()),
            staff_role: optional_selection(self.staff_role.as_deref()),
            day_of_week: self.day,
            sample_long_ranges: self.sample,
        }
    }

    fn adjustments(&self) -> ScenarioAdjustments {
        ScenarioAdjustments {
            revenue_change: self.revenue_change,
            labor_change: self.labor_change,
            supply_change: self.supply_change,
            collection_change: self.collection_change,
        }
    }
}

fn render(snapshot: &DashboardSnapshot, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(snapshot).map_err(|e| e.to_string()),
        OutputFormat::Csv => snapshot
            .financial
            .revenue_trend
            .to_csv()
            .map_err(|e| e.to_string()),
    }
}

fn run(cli: &Cli) -> Result<String, String> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(config::default_data_dir);
    tracing::info!(
        "{} v{} reading {}",
        config::APP_NAME,
        config::APP_VERSION,
        data_dir.display()
    );

    let analytics_config = AnalyticsConfig::load(&data_dir).map_err(|e| e.to_string())?;

    let mut cache = StoreCache::new();
    let store = cache.get_or_load(&data_dir).map_err(|e| e.to_string())?;

    let defaults = FilterContext::defaults_for(&store, &analytics_config)
        .ok_or_else(|| "Financial data carries no usable dates".to_string())?;
    let ctx = cli.filter_context(defaults);

    let snapshot =
        dashboard::build_snapshot_with(&store, &ctx, &analytics_config, &cli.adjustments())
            .map_err(|e| e.to_string())?;
    render(&snapshot, cli.format)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    dental_insights::init_tracing();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            tracing::error!(error = %message, "Dashboard pass failed");
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}
