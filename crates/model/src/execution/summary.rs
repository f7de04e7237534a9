use crate::core::window::SyncWindow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a sync run. `Idle` is both the start and the successful end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Retrying,
    Filtering,
    Merging,
    Sorting,
    Writing,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Retrying => "retrying",
            RunState::Filtering => "filtering",
            RunState::Merging => "merging",
            RunState::Sorting => "sorting",
            RunState::Writing => "writing",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Idle | RunState::Failed | RunState::Cancelled)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw record was not carried into the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidDate,
    FilteredOut,
    DuplicateInBatch,
    Malformed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InvalidDate => "invalid_date",
            SkipReason::FilteredOut => "filtered_out",
            SkipReason::DuplicateInBatch => "duplicate_in_batch",
            SkipReason::Malformed => "malformed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub invalid_date: u64,
    pub filtered_out: u64,
    pub duplicate_in_batch: u64,
    pub malformed: u64,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        self.add(reason, 1);
    }

    pub fn add(&mut self, reason: SkipReason, count: u64) {
        match reason {
            SkipReason::InvalidDate => self.invalid_date += count,
            SkipReason::FilteredOut => self.filtered_out += count,
            SkipReason::DuplicateInBatch => self.duplicate_in_batch += count,
            SkipReason::Malformed => self.malformed += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.invalid_date + self.filtered_out + self.duplicate_in_batch + self.malformed
    }
}

/// Structured outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub state: RunState,
    pub window: Option<SyncWindow>,
    pub pages_fetched: u64,
    pub fetched: u64,
    pub accepted: u64,
    pub skipped: SkipCounts,
    pub appended: u64,
    pub pruned: u64,
    pub retries: u64,
    /// Pagination stopped early on a non-fatal fetch error.
    pub fetch_exhausted: bool,
    pub dry_run: bool,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(run_id: String, started_at: NaiveDateTime, dry_run: bool) -> Self {
        RunSummary {
            run_id,
            started_at,
            finished_at: started_at,
            state: RunState::Idle,
            window: None,
            pages_fetched: 0,
            fetched: 0,
            accepted: 0,
            skipped: SkipCounts::default(),
            appended: 0,
            pruned: 0,
            retries: 0,
            fetch_exhausted: false,
            dry_run,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Idle
    }
}
