pub mod row;
pub mod sale;
