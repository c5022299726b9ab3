use crate::types::ErrorEntry;
use crate::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A CSV log of failed identifiers, at most one row per identifier.
///
/// Columns: `Timestamp`, the identifier column, `Error_Type`, `Error_Message`, `Details`.
pub struct ErrorLog {
    path: PathBuf,
    id_column: &'static str,
}

impl ErrorLog {
    pub fn new(path: impl AsRef<Path>, id_column: &'static str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            id_column,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn headers(&self) -> [&'static str; 5] {
        [
            "Timestamp",
            self.id_column,
            "Error_Type",
            "Error_Message",
            "Details",
        ]
    }

    /// Appends an entry unless the identifier is already logged; the first error wins.
    ///
    /// # Returns
    ///
    /// `true` if a row was written.
    pub fn record(&self, entry: &ErrorEntry) -> Result<bool> {
        let mut rows = self.read_rows()?;
        if rows.iter().any(|row| row[1] == entry.identifier) {
            debug!("{} already in error log", entry.identifier);
            return Ok(false);
        }

        rows.push(vec![
            entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            entry.identifier.clone(),
            entry.kind.clone(),
            entry.message.clone(),
            entry.details.clone(),
        ]);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(self.headers())?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!(
            "Logged {} for {} to {}",
            entry.kind,
            entry.identifier,
            self.path.display()
        );
        Ok(true)
    }

    /// Every identifier present in the log.
    pub fn identifiers(&self) -> Result<HashSet<String>> {
        Ok(self
            .read_rows()?
            .into_iter()
            .map(|mut row| row.swap_remove(1))
            .collect())
    }

    /// Reads the log as rows of the five columns, matched by header name.
    pub fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let positions: Vec<Option<usize>> = self
            .headers()
            .iter()
            .map(|col| headers.iter().position(|h| h == *col))
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(
                positions
                    .iter()
                    .map(|pos| pos.and_then(|i| record.get(i)).unwrap_or_default().to_string())
                    .collect(),
            );
        }
        Ok(rows)
    }

    /// Deletes the log. Returns whether there was one.
    pub fn remove(&self) -> Result<bool> {
        if self.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
