use crate::settings::{
    error::SettingsError,
    rules::{DEFAULT_TIMESTAMP_FORMAT, FilterRules, SortDirection},
};
use chrono::format::{Item, StrftimeItems};
use connectors::http::client::ApiConfig;
use engine_core::retry::RetryPolicy;
use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr, time::Duration};

pub const API_URL: &str = "EAD_API_URL";
pub const API_KEY: &str = "EAD_API_KEY";
pub const SINK_PATH: &str = "SYNC_SINK_PATH";
pub const RETENTION_DAYS: &str = "SYNC_RETENTION_DAYS";
pub const PAGE_SIZE: &str = "SYNC_PAGE_SIZE";
pub const MAX_ATTEMPTS: &str = "SYNC_MAX_ATTEMPTS";
pub const BASE_DELAY_SECS: &str = "SYNC_BASE_DELAY_SECS";
pub const MAX_DELAY_SECS: &str = "SYNC_MAX_DELAY_SECS";
pub const REQUEST_TIMEOUT_SECS: &str = "SYNC_REQUEST_TIMEOUT_SECS";
pub const SORT_DIRECTION: &str = "SYNC_SORT_DIRECTION";
pub const EVICT: &str = "SYNC_EVICT";
pub const RECORDS_KEY: &str = "SYNC_RECORDS_KEY";
pub const ALLOWED_PAYMENT_TYPES: &str = "SYNC_ALLOWED_PAYMENT_TYPES";
pub const APPROVED_STATUS: &str = "SYNC_APPROVED_STATUS";
pub const REQUIRED_GATEWAY: &str = "SYNC_REQUIRED_GATEWAY";
pub const TIMESTAMP_FORMAT: &str = "SYNC_TIMESTAMP_FORMAT";
pub const SINK_RETRY_DELAY_SECS: &str = "SYNC_SINK_RETRY_DELAY_SECS";
pub const STATE_DIR: &str = "SYNC_STATE_DIR";
pub const REPORT_CALLBACK_URL: &str = "SYNC_REPORT_CALLBACK_URL";
pub const REPORT_TOKEN: &str = "SYNC_REPORT_TOKEN";

/// Where a finished run summary is POSTed, if anywhere.
#[derive(Clone)]
pub struct ReportTarget {
    pub url: String,
    pub token: Option<String>,
}

impl fmt::Debug for ReportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportTarget")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Immutable, validated configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub api: ApiConfig,
    pub sink_path: PathBuf,
    pub retention_days: u32,
    pub page_size: usize,
    pub retry: RetryPolicy,
    pub sink_retry_delay: Duration,
    pub sort_direction: SortDirection,
    pub evict: bool,
    pub records_key: String,
    pub rules: FilterRules,
    /// Run history location; `None` lets the caller pick a default.
    pub state_dir: Option<PathBuf>,
    pub report: Option<ReportTarget>,
}

impl SyncSettings {
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, SettingsError> {
        let reader = VarReader { vars };

        let base_delay = Duration::from_secs(reader.parse(BASE_DELAY_SECS, 5u64)?);
        let max_delay = Duration::from_secs(reader.parse(MAX_DELAY_SECS, 60u64)?);
        if max_delay < base_delay {
            return Err(SettingsError::invalid(
                MAX_DELAY_SECS,
                &max_delay.as_secs().to_string(),
                format!("must be at least {BASE_DELAY_SECS} ({})", base_delay.as_secs()),
            ));
        }
        let max_attempts = reader.positive(MAX_ATTEMPTS, 5usize)?;

        let timestamp_format = reader
            .optional(TIMESTAMP_FORMAT)
            .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMAT.to_string());
        validate_timestamp_format(&timestamp_format)?;

        let rules = FilterRules {
            allowed_payment_types: reader.code_list(ALLOWED_PAYMENT_TYPES, vec![1, 2])?,
            approved_status: reader.parse(APPROVED_STATUS, 2i64)?,
            required_gateway: reader.parse(REQUIRED_GATEWAY, 6i64)?,
            timestamp_format,
        };

        let report = reader.optional(REPORT_CALLBACK_URL).map(|url| ReportTarget {
            url,
            token: reader.optional(REPORT_TOKEN),
        });

        Ok(SyncSettings {
            api: ApiConfig {
                base_url: reader.required(API_URL)?,
                api_key: reader.required(API_KEY)?,
                timeout: Duration::from_secs(reader.positive(REQUEST_TIMEOUT_SECS, 30u64)?),
            },
            sink_path: PathBuf::from(
                reader
                    .optional(SINK_PATH)
                    .unwrap_or_else(|| "sales.csv".to_string()),
            ),
            retention_days: reader.positive(RETENTION_DAYS, 14u32)?,
            page_size: reader.positive(PAGE_SIZE, 1000usize)?,
            retry: RetryPolicy::new(max_attempts, base_delay, max_delay),
            sink_retry_delay: Duration::from_secs(reader.parse(SINK_RETRY_DELAY_SECS, 2u64)?),
            sort_direction: reader.parse(SORT_DIRECTION, SortDirection::default())?,
            evict: reader.flag(EVICT, false)?,
            records_key: reader
                .optional(RECORDS_KEY)
                .unwrap_or_else(|| "data".to_string()),
            rules,
            state_dir: reader.optional(STATE_DIR).map(PathBuf::from),
            report,
        })
    }
}

struct VarReader<'a> {
    vars: &'a HashMap<String, String>,
}

impl VarReader<'_> {
    fn optional(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, SettingsError> {
        self.optional(key)
            .ok_or_else(|| SettingsError::Missing(key.to_string()))
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, SettingsError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| SettingsError::invalid(key, &raw, e.to_string())),
        }
    }

    fn positive<T>(&self, key: &str, default: T) -> Result<T, SettingsError>
    where
        T: FromStr + PartialOrd + Default + fmt::Display,
        T::Err: fmt::Display,
    {
        let value = self.parse(key, default)?;
        if value <= T::default() {
            return Err(SettingsError::invalid(
                key,
                &value.to_string(),
                "must be at least 1",
            ));
        }
        Ok(value)
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, SettingsError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(SettingsError::invalid(key, &raw, "expected true or false")),
            },
        }
    }

    fn code_list(&self, key: &str, default: Vec<i64>) -> Result<Vec<i64>, SettingsError> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };

        let codes = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|e| SettingsError::invalid(key, &raw, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if codes.is_empty() {
            return Err(SettingsError::invalid(key, &raw, "list is empty"));
        }
        Ok(codes)
    }
}

fn validate_timestamp_format(format: &str) -> Result<(), SettingsError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(SettingsError::invalid(
            TIMESTAMP_FORMAT,
            format,
            "not a valid strftime format",
        ));
    }
    Ok(())
}
