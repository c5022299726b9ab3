use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The fixed schema of one CSV dataset.
#[derive(Debug)]
pub struct Dataset {
    /// Human-readable name used in logs.
    pub name: &'static str,
    /// Output columns, in file order.
    pub columns: &'static [&'static str],
    /// The column holding the identifier; primary key of the dataset.
    pub key_column: &'static str,
    /// Name of the identifier column in the error log.
    pub error_id_column: &'static str,
    /// File name prefix of archived raw pages.
    pub raw_prefix: &'static str,
}

impl Dataset {
    /// Position of the key column in `columns`.
    pub fn key_index(&self) -> usize {
        self.columns
            .iter()
            .position(|c| *c == self.key_column)
            .unwrap_or(0)
    }
}

/// One row of a dataset: a flat mapping of column names to string values.
///
/// Columns that were never set read as empty strings.
#[derive(Debug, Clone)]
pub struct Record {
    dataset: &'static Dataset,
    values: HashMap<&'static str, String>,
}

impl Record {
    /// Creates an empty record of the given dataset.
    pub fn new(dataset: &'static Dataset) -> Self {
        Self {
            dataset,
            values: HashMap::new(),
        }
    }

    pub fn dataset(&self) -> &'static Dataset {
        self.dataset
    }

    /// Sets a column value. Names outside the dataset schema are ignored.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        if let Some(col) = self.dataset.columns.iter().find(|c| **c == column) {
            self.values.insert(*col, value.into());
        }
    }

    /// Returns a column value, or `""` when unset.
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }

    /// The identifier of this record.
    pub fn key(&self) -> &str {
        self.get(self.dataset.key_column)
    }

    /// The record laid out in the dataset's column order.
    pub fn to_row(&self) -> Vec<String> {
        self.dataset
            .columns
            .iter()
            .map(|c| self.get(c).to_string())
            .collect()
    }

    /// Builds a record from a row laid out in the dataset's column order.
    pub fn from_row(dataset: &'static Dataset, row: &[String]) -> Self {
        let mut record = Self::new(dataset);
        for (col, value) in dataset.columns.iter().zip(row) {
            record.set(col, value.clone());
        }
        record
    }
}

/// A successfully scraped page: the parsed record and the body it came from.
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub record: Record,
    pub html: String,
}

/// How a batch treats identifiers that already have data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Skip identifiers that already have data.
    #[default]
    Append,
    /// Scrape again and replace the existing row.
    Overwrite,
    /// Delete the master list, error log and raw pages, then start over.
    Scratch,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteMode::Append => "APPEND",
            WriteMode::Overwrite => "OVERWRITE",
            WriteMode::Scratch => "SCRATCH",
        };
        f.write_str(name)
    }
}

/// A row of an error log.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Local>,
    pub identifier: String,
    pub kind: String,
    pub message: String,
    pub details: String,
}

impl ErrorEntry {
    /// Builds an entry stamped with the current local time.
    pub fn now(
        identifier: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            identifier: identifier.into(),
            kind: kind.into(),
            message: message.into(),
            details: details.into(),
        }
    }
}
