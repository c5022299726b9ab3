use crate::types::{Dataset, Record, WriteMode};
use crate::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The master list of a dataset: one CSV row per identifier, columns in schema order.
pub struct CsvStore {
    path: PathBuf,
    dataset: &'static Dataset,
}

impl CsvStore {
    pub fn new(path: impl AsRef<Path>, dataset: &'static Dataset) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            dataset,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads every row, laid out in the dataset's column order.
    ///
    /// Columns are matched by header name; columns missing from the file read as empty.
    /// A missing file reads as an empty table.
    pub fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let positions: Vec<Option<usize>> = self
            .dataset
            .columns
            .iter()
            .map(|col| headers.iter().position(|h| h == *col))
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row = positions
                .iter()
                .map(|pos| {
                    pos.and_then(|i| record.get(i))
                        .unwrap_or_default()
                        .to_string()
                })
                .collect();
            rows.push(row);
        }

        Ok(rows)
    }

    /// Writes the header and the given rows, replacing the file.
    pub fn write_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(self.dataset.columns)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Saves one record.
    ///
    /// In overwrite and scratch mode every existing row with the record's key is removed
    /// first. In append mode only placeholder rows (key set, every other column empty) for
    /// the key are replaced, and any other row is kept.
    pub fn save(&self, record: &Record, mode: WriteMode) -> Result<()> {
        let created = !self.exists();
        let key_index = self.dataset.key_index();
        let key = record.key();

        let mut rows = self.read_rows()?;
        let before = rows.len();
        rows.retain(|row| {
            if row[key_index] != key {
                return true;
            }
            match mode {
                WriteMode::Overwrite | WriteMode::Scratch => false,
                WriteMode::Append => self.is_populated(row),
            }
        });
        if rows.len() < before {
            debug!("Replacing {} row(s) for {}", before - rows.len(), key);
        }

        rows.push(record.to_row());
        self.write_rows(&rows)?;

        if created {
            info!("Created new file {}", self.path.display());
        } else {
            info!("Saved {} to {}", key, self.path.display());
        }
        Ok(())
    }

    /// Whether a row for `key` exists with at least one populated column besides the key.
    pub fn has_data(&self, key: &str) -> Result<bool> {
        let key_index = self.dataset.key_index();
        Ok(self
            .read_rows()?
            .iter()
            .any(|row| row[key_index] == key && self.is_populated(row)))
    }

    /// Unique non-empty identifiers, in file order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let key_index = self.dataset.key_index();
        let mut seen = HashSet::new();
        Ok(self
            .read_rows()?
            .into_iter()
            .map(|mut row| row.swap_remove(key_index))
            .filter(|key| !key.is_empty() && seen.insert(key.clone()))
            .collect())
    }

    /// Writes one placeholder row per identifier, replacing the file.
    pub fn initialize<I, S>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows: Vec<Vec<String>> = keys
            .into_iter()
            .map(|key| {
                let mut record = Record::new(self.dataset);
                record.set(self.dataset.key_column, key);
                record.to_row()
            })
            .collect();

        self.write_rows(&rows)?;
        Ok(rows.len())
    }

    /// Deletes the file. Returns whether there was one.
    pub fn remove(&self) -> Result<bool> {
        if self.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn is_populated(&self, row: &[String]) -> bool {
        let key_index = self.dataset.key_index();
        row.iter()
            .enumerate()
            .any(|(i, value)| i != key_index && !value.trim().is_empty())
    }
}
