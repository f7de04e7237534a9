pub mod error;
pub mod sheet;
