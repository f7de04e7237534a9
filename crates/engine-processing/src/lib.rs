pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod retry;
pub mod sorter;
