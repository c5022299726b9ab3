//! Identifier lists given on the command line or in files.

use crate::{Result, ScraperError};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Reads one identifier per line, skipping blank lines and `#` comments.
pub fn read_identifier_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let identifiers: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    info!("Loaded {} identifiers from {}", identifiers.len(), path.display());
    Ok(identifiers)
}

/// Splits a comma-separated list.
pub fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// A single identifier given on the command line; blank input yields none.
pub fn single_identifier(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.is_empty() {
        Vec::new()
    } else {
        vec![value.to_string()]
    }
}

/// Keeps the entries that are valid integer indices, in canonical form.
pub fn parse_indices(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| match entry.parse::<u64>() {
            Ok(index) => Some(index.to_string()),
            Err(_) => {
                warn!("Skipping invalid index '{}'", entry);
                None
            }
        })
        .collect()
}

/// The indices `start..=end`.
pub fn index_range(start: u64, end: u64) -> Result<Vec<String>> {
    if start > end {
        return Err(ScraperError::NoIdentifiers(format!(
            "start index {} is greater than end index {}",
            start, end
        )));
    }
    Ok((start..=end).map(|index| index.to_string()).collect())
}

/// Fails when there is nothing to process.
pub fn require_identifiers(identifiers: Vec<String>, source: &str) -> Result<Vec<String>> {
    if identifiers.is_empty() {
        return Err(ScraperError::NoIdentifiers(source.to_string()));
    }
    Ok(identifiers)
}
