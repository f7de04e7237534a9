pub mod error;
pub mod rules;
pub mod sync;

pub use rules::{FilterRules, SortDirection};
pub use sync::{ReportTarget, SyncSettings};
