use crate::{connectors::sink::TabularSink, error::SinkError};
use async_trait::async_trait;
use model::records::row::{SheetContents, SheetRow};
use tokio::sync::Mutex;

/// In-process sheet. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySheet {
    contents: Mutex<SheetContents>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: SheetContents) -> Self {
        MemorySheet {
            contents: Mutex::new(contents),
        }
    }

    pub async fn snapshot(&self) -> SheetContents {
        self.contents.lock().await.clone()
    }
}

#[async_trait]
impl TabularSink for MemorySheet {
    fn name(&self) -> String {
        "memory".to_string()
    }

    async fn read_all(&self) -> Result<SheetContents, SinkError> {
        Ok(self.contents.lock().await.clone())
    }

    async fn append_rows(&self, rows: &[SheetRow]) -> Result<(), SinkError> {
        self.contents.lock().await.rows.extend_from_slice(rows);
        Ok(())
    }

    async fn clear_and_rewrite(
        &self,
        header: &[String],
        rows: &[SheetRow],
    ) -> Result<(), SinkError> {
        let mut contents = self.contents.lock().await;
        contents.header = header.to_vec();
        contents.rows = rows.to_vec();
        Ok(())
    }
}
