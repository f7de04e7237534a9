use serde::Serialize;
use std::{fmt, str::FromStr};

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Business predicate a sale must satisfy to be synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRules {
    pub allowed_payment_types: Vec<i64>,
    pub approved_status: i64,
    pub required_gateway: i64,
    pub timestamp_format: String,
}

impl Default for FilterRules {
    fn default() -> Self {
        FilterRules {
            allowed_payment_types: vec![1, 2],
            approved_status: 2,
            required_gateway: 6,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    /// Most recent sales first.
    #[default]
    Descending,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("expected asc or desc, got {other}")),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}
