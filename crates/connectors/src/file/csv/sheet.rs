use crate::file::csv::error::SheetError;
use model::records::row::{SheetContents, SheetRow};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// A CSV file used as the destination sheet.
///
/// The first line is the header; every following line is one sale. A
/// missing file reads as an empty, uninitialized sheet.
#[derive(Debug, Clone)]
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvSheet { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<SheetContents, SheetError> {
        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
        {
            Ok(reader) => reader,
            Err(err) => {
                if let csv::ErrorKind::Io(io) = err.kind()
                    && io.kind() == ErrorKind::NotFound
                {
                    return Ok(SheetContents::default());
                }
                return Err(err.into());
            }
        };

        let mut header: Option<SheetRow> = None;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: SheetRow = record.iter().map(|c| c.to_string()).collect();
            if row.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            match header {
                None => header = Some(row),
                Some(_) => rows.push(row),
            }
        }

        debug!("Read {} rows from {}", rows.len(), self.path.display());
        Ok(SheetContents::new(header.unwrap_or_default(), rows))
    }

    pub fn append_rows(&self, rows: &[SheetRow]) -> Result<(), SheetError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        terminate_last_line(&mut file)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Replaces the whole file. The new contents are written to a sibling
    /// temp file first and renamed over the original.
    pub fn clear_and_rewrite(&self, header: &[String], rows: &[SheetRow]) -> Result<(), SheetError> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| SheetError::InvalidPath(self.path.display().to_string()))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&tmp_path)?;
            writer.write_record(header)?;
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Ends a non-empty file with a newline if it lacks one, so appended rows
/// start on their own line.
fn terminate_last_line(file: &mut File) -> io::Result<()> {
    if file.metadata()?.len() == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
    }
    Ok(())
}
