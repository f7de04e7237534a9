pub mod callback;
pub mod summary;
