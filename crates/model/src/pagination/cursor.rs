use serde::{Deserialize, Serialize};

/// Offset/limit position within the paginated sales listing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub offset: usize,
    pub limit: usize,
}

impl PageCursor {
    /// Cursor for the first page of a listing.
    pub fn first(limit: usize) -> Self {
        PageCursor {
            offset: 0,
            limit: limit.max(1),
        }
    }

    /// Cursor for the page following this one.
    pub fn advance(&self) -> Self {
        PageCursor {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}
