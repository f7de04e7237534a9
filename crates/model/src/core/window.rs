use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("Retention must be at least one day, got {0}")]
    EmptyRetention(u32),

    #[error("Window start {start} is not before end {end}")]
    Inverted {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// The rolling time range a run synchronizes.
///
/// Both ends are inclusive. `start` is always strictly before `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl SyncWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window covering the `retention_days` leading up to `end`.
    pub fn ending_at(end: NaiveDateTime, retention_days: u32) -> Result<Self, WindowError> {
        if retention_days == 0 {
            return Err(WindowError::EmptyRetention(retention_days));
        }
        Self::new(end - Duration::days(i64::from(retention_days)), end)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }
}
