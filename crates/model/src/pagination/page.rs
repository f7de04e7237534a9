use crate::pagination::cursor::PageCursor;
use serde_json::Value;

/// One page of raw records as returned by the source.
#[derive(Debug, Clone)]
pub struct Page {
    pub cursor: PageCursor,
    pub records: Vec<Value>,
    pub took_ms: u128,
}

impl Page {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A page shorter than the requested limit is the last one.
    pub fn is_terminal(&self) -> bool {
        self.records.len() < self.cursor.limit
    }
}
