use serde::{Deserialize, Serialize};

pub type SheetRow = Vec<String>;

/// Everything a tabular sink currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetContents {
    pub header: SheetRow,
    pub rows: Vec<SheetRow>,
}

impl SheetContents {
    pub fn new(header: SheetRow, rows: Vec<SheetRow>) -> Self {
        SheetContents { header, rows }
    }

    /// A sheet without a header has never been written to.
    pub fn is_uninitialized(&self) -> bool {
        self.header.iter().all(|c| c.trim().is_empty())
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(name))
    }
}
