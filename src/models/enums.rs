use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AnalyticsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(AnalyticsError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Domain {
    Financial => "Financial",
    Operations => "Operations",
    Patient => "Patient",
    Staff => "Staff",
    Equipment => "Equipment",
});

str_enum!(ServiceLine {
    Diagnostic => "Diagnostic",
    Preventive => "Preventive",
    Restorative => "Restorative",
    Endodontic => "Endodontic",
    Periodontic => "Periodontic",
    Prosthodontic => "Prosthodontic",
    OralSurgery => "Oral_Surgery",
    Orthodontic => "Orthodontic",
    Implant => "Implant",
    Adjunctive => "Adjunctive",
});

impl ServiceLine {
    /// Financial column carrying this line's revenue, e.g. `Revenue_Oral_Surgery`.
    pub fn revenue_column(&self) -> String {
        format!("Revenue_{}", self.as_str())
    }

    /// Human label, e.g. "Oral Surgery".
    pub fn display_name(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

/// Temporal bucket size for aggregation and period-over-period comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    Month,
    Quarter,
    Year,
    AllTime,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "Month",
            Self::Quarter => "Quarter",
            Self::Year => "Year",
            Self::AllTime => "All Time",
        }
    }

    /// Suffix shown next to a period-over-period delta.
    pub fn delta_label(&self) -> &'static str {
        match self {
            Self::Month => "(MoM)",
            Self::Quarter => "(QoQ)",
            Self::Year => "(YoY)",
            Self::AllTime => "",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' ', '-'], "").as_str() {
            "month" | "monthly" => Ok(Self::Month),
            "quarter" | "quarterly" => Ok(Self::Quarter),
            "year" | "yearly" | "annual" => Ok(Self::Year),
            "alltime" | "all" => Ok(Self::AllTime),
            _ => Err(AnalyticsError::InvalidEnum {
                field: "Granularity".into(),
                value: s.into(),
            }),
        }
    }
}

// Status values as they appear in the appointment extract.
pub const STATUS_COMPLETED: &str = "Completed";
pub const STATUS_NO_SHOW: &str = "No-Show";
pub const STATUS_CANCELED: &str = "Canceled";
pub const CLAIM_PAID: &str = "Paid";
pub const CLAIM_DENIED: &str = "Denied";
