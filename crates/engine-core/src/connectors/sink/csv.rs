use crate::{connectors::sink::TabularSink, error::SinkError};
use async_trait::async_trait;
use connectors::file::csv::sheet::CsvSheet;
use model::records::row::{SheetContents, SheetRow};

#[async_trait]
impl TabularSink for CsvSheet {
    fn name(&self) -> String {
        format!("csv:{}", self.path().display())
    }

    async fn read_all(&self) -> Result<SheetContents, SinkError> {
        let sheet = self.clone();
        let contents = tokio::task::spawn_blocking(move || sheet.read_all()).await??;
        Ok(contents)
    }

    async fn append_rows(&self, rows: &[SheetRow]) -> Result<(), SinkError> {
        let sheet = self.clone();
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || sheet.append_rows(&rows)).await??;
        Ok(())
    }

    async fn clear_and_rewrite(
        &self,
        header: &[String],
        rows: &[SheetRow],
    ) -> Result<(), SinkError> {
        let sheet = self.clone();
        let header = header.to_vec();
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || sheet.clear_and_rewrite(&header, &rows)).await??;
        Ok(())
    }
}
