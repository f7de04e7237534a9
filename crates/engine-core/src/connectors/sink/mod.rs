use crate::error::SinkError;
use async_trait::async_trait;
use model::records::row::{SheetContents, SheetRow};

pub mod csv;
pub mod memory;

/// A tabular destination: one header row followed by one row per sale.
///
/// No call is atomic across rows. A failure part way through a write may
/// leave some rows applied.
#[async_trait]
pub trait TabularSink: Send + Sync {
    fn name(&self) -> String;

    async fn read_all(&self) -> Result<SheetContents, SinkError>;

    async fn append_rows(&self, rows: &[SheetRow]) -> Result<(), SinkError>;

    async fn clear_and_rewrite(
        &self,
        header: &[String],
        rows: &[SheetRow],
    ) -> Result<(), SinkError>;
}
