use crate::error::IndexError;
use chrono::NaiveDateTime;
use model::{
    core::window::SyncWindow,
    records::{
        row::{SheetContents, SheetRow},
        sale::{COMPLETED_AT_COLUMN, SaleRecord, TRANSACTION_ID_COLUMN},
    },
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Transaction ids already present in the sink, with each stored row's
/// completion time when it could be parsed.
#[derive(Debug, Clone, Default)]
pub struct SinkIndex {
    entries: HashMap<String, Option<NaiveDateTime>>,
    key_column: Option<usize>,
}

impl SinkIndex {
    pub fn from_sheet(
        contents: &SheetContents,
        timestamp_format: &str,
    ) -> Result<Self, IndexError> {
        let Some(key_column) = contents.column(TRANSACTION_ID_COLUMN) else {
            // Only a sheet without a header may be initialized from scratch.
            if contents.is_uninitialized() && contents.rows.is_empty() {
                return Ok(Self::default());
            }
            return Err(IndexError::MissingKeyColumn(TRANSACTION_ID_COLUMN.to_string()));
        };
        let ts_column = contents.column(COMPLETED_AT_COLUMN);

        let mut entries = HashMap::with_capacity(contents.rows.len());
        for row in &contents.rows {
            let Some(id) = row.get(key_column).map(|c| c.trim()).filter(|c| !c.is_empty())
            else {
                continue;
            };
            let completed_at = ts_column
                .and_then(|i| row.get(i))
                .and_then(|c| NaiveDateTime::parse_from_str(c.trim(), timestamp_format).ok());
            entries.entry(id.to_string()).or_insert(completed_at);
        }

        Ok(SinkIndex {
            entries,
            key_column: Some(key_column),
        })
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.entries.contains_key(transaction_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key_column(&self) -> Option<usize> {
        self.key_column
    }

    /// Folds a successfully written delta into the index.
    pub fn apply(&mut self, delta: &Delta) {
        for id in &delta.to_prune {
            self.entries.remove(id);
        }
        for record in &delta.to_append {
            self.entries
                .insert(record.transaction_id.clone(), Some(record.completed_at));
        }
    }

    fn aged_out(&self, cutoff: NaiveDateTime) -> impl Iterator<Item = &String> {
        self.entries
            .iter()
            .filter(move |(_, ts)| ts.is_some_and(|ts| ts < cutoff))
            .map(|(id, _)| id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub to_append: Vec<SaleRecord>,
    /// Always empty unless eviction is on.
    pub to_prune: BTreeSet<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.to_append.is_empty() && self.to_prune.is_empty()
    }

    /// Stored rows that survive pruning, in their original order.
    pub fn retain(&self, rows: &[SheetRow], key_column: usize) -> Vec<SheetRow> {
        rows.iter()
            .filter(|row| {
                row.get(key_column)
                    .is_none_or(|id| !self.to_prune.contains(id.trim()))
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator {
    evict: bool,
}

impl Deduplicator {
    pub fn new(evict: bool) -> Self {
        Deduplicator { evict }
    }

    /// Keeps the first occurrence of each transaction id in fetch order.
    /// Returns the survivors and how many repeats were dropped.
    pub fn coalesce(&self, accepted: Vec<SaleRecord>) -> (Vec<SaleRecord>, u64) {
        let mut seen = HashSet::with_capacity(accepted.len());
        let mut duplicates = 0;

        let unique = accepted
            .into_iter()
            .filter(|record| {
                let first = seen.insert(record.transaction_id.clone());
                if !first {
                    duplicates += 1;
                }
                first
            })
            .collect();

        (unique, duplicates)
    }

    pub fn compute_delta(
        &self,
        accepted: &[SaleRecord],
        index: &SinkIndex,
        window: &SyncWindow,
    ) -> Delta {
        let mut queued = HashSet::new();
        let to_append: Vec<SaleRecord> = accepted
            .iter()
            .filter(|r| !index.contains(&r.transaction_id))
            .filter(|r| queued.insert(r.transaction_id.as_str()))
            .cloned()
            .collect();

        let to_prune = if self.evict {
            let fresh: HashSet<&str> = accepted.iter().map(|r| r.transaction_id.as_str()).collect();
            index
                .aged_out(window.start())
                .filter(|id| !fresh.contains(id.as_str()))
                .cloned()
                .collect()
        } else {
            BTreeSet::new()
        };

        Delta {
            to_append,
            to_prune,
        }
    }
}
