use crate::storage::DatasetStores;
use crate::types::{Dataset, ErrorEntry, Record, ScrapedPage, WriteMode};
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// A site that can scrape one identifier of a dataset.
#[allow(async_fn_in_trait)]
pub trait BushingSource {
    /// The dataset the scraped records belong to.
    fn dataset(&self) -> &'static Dataset;

    /// Fetches and parses the page of one identifier.
    async fn scrape(&self, identifier: &str) -> Result<ScrapedPage>;

    /// Refills the master list after a scratch clean. Most sources start from an empty list.
    fn reseed(&self, _stores: &DatasetStores) -> Result<()> {
        Ok(())
    }

    /// One-line description of a record for progress output.
    fn summarize(&self, record: &Record) -> String {
        record.key().to_string()
    }
}

/// Counts of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchReport {
    /// Share of attempted (not skipped) identifiers that succeeded, in percent.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total - self.skipped;
        if attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / attempted as f64 * 100.0
        }
    }
}

/// The `BatchDriver` struct scrapes a list of identifiers one after the other.
///
/// Each identifier is checked against the error log and, in append mode, against the data
/// already collected; the rest are scraped, archived, saved and followed by a courtesy delay.
pub struct BatchDriver<S> {
    source: S,
    stores: DatasetStores,
    delay: Duration,
}

impl<S: BushingSource> BatchDriver<S> {
    /// Creates a new `BatchDriver`.
    ///
    /// # Arguments
    ///
    /// * `source` - The site scraper.
    /// * `stores` - Master list, error log and raw archive of the source's dataset.
    /// * `delay_secs` - Pause between two requests; negative values are treated as zero.
    pub fn new(source: S, stores: DatasetStores, delay_secs: f64) -> Self {
        let delay = Duration::try_from_secs_f64(delay_secs.max(0.0)).unwrap_or_default();
        Self {
            source,
            stores,
            delay,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stores(&self) -> &DatasetStores {
        &self.stores
    }

    /// Whether an identifier already has data: an archived page, or a master-list row with
    /// at least one populated column besides the key.
    pub fn already_scraped(&self, identifier: &str) -> Result<bool> {
        Ok(self.stores.raw.exists(identifier) || self.stores.master.has_data(identifier)?)
    }

    /// Scrapes one identifier.
    ///
    /// On success the page is archived and the record returned. A per-item failure is
    /// written to the error log, any archived page for the identifier is deleted, and `None`
    /// is returned.
    ///
    /// # Returns
    ///
    /// An error only for failures that are not specific to the identifier.
    pub async fn scrape_one(&self, identifier: &str) -> Result<Option<Record>> {
        match self.source.scrape(identifier).await {
            Ok(page) => {
                if let Err(e) = self.stores.raw.save(identifier, &page.html) {
                    warn!("Failed to save raw HTML for {}, but continuing: {}", identifier, e);
                }
                Ok(Some(page.record))
            }
            Err(err) if err.is_item_error() => {
                warn!("Failed to scrape {}: {}", identifier, err);
                let entry = ErrorEntry::now(identifier, err.kind(), err.to_string(), err.details());
                if let Err(e) = self.stores.errors.record(&entry) {
                    error!("Failed to log error to CSV: {}", e);
                }
                self.stores.raw.delete(identifier)?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Runs the batch.
    ///
    /// # Arguments
    ///
    /// * `identifiers` - The identifiers to process, in order.
    /// * `mode` - Append skips identifiers that already have data, overwrite replaces their
    ///   rows, scratch deletes every output file first.
    ///
    /// # Returns
    ///
    /// The counts of the run, or an error for file-system failures.
    pub async fn run(&self, identifiers: &[String], mode: WriteMode) -> Result<BatchReport> {
        if mode == WriteMode::Scratch {
            info!("SCRATCH MODE: Cleaning all existing {} data...", self.source.dataset().name);
            self.stores.clear()?;
            self.source.reseed(&self.stores)?;
        }

        let logged = self.stores.errors.identifiers()?;
        info!("Loaded {} identifiers from error log", logged.len());

        let total = identifiers.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        info!(
            "Starting batch scrape for {} identifiers - Mode: {}",
            total, mode
        );

        let progress = ProgressBar::new(total as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        for (idx, identifier) in identifiers.iter().enumerate() {
            let position = idx + 1;
            progress.set_message(identifier.clone());

            if logged.contains(identifier) {
                report.skipped += 1;
                self.stores.raw.delete(identifier)?;
                info!("Skipping {} (in error log) ({}/{})", identifier, position, total);
                progress.suspend(|| {
                    println!("⊘ [{}/{}] {}: Skipped (in error log)", position, total, identifier)
                });
                progress.inc(1);
                continue;
            }

            if mode == WriteMode::Append && self.already_scraped(identifier)? {
                report.skipped += 1;
                info!("Skipping {} (already exists) ({}/{})", identifier, position, total);
                progress.suspend(|| {
                    println!("⊘ [{}/{}] {}: Skipped (already processed)", position, total, identifier)
                });
                progress.inc(1);
                continue;
            }

            let replacing = mode == WriteMode::Overwrite && self.already_scraped(identifier)?;
            info!(
                "{} {} ({}/{})",
                if replacing { "Overwriting" } else { "Processing" },
                identifier,
                position,
                total
            );

            let line = match self.scrape_one(identifier).await? {
                Some(record) => match self.stores.master.save(&record, mode) {
                    Ok(()) => {
                        report.succeeded += 1;
                        format!(
                            "{} [{}/{}] {}: {}",
                            if replacing { "↻" } else { "✓" },
                            position,
                            total,
                            identifier,
                            self.source.summarize(&record)
                        )
                    }
                    Err(e) => {
                        report.failed += 1;
                        error!("Error saving {} to CSV: {}", identifier, e);
                        // Without a row the archived page would mark the item as done.
                        self.stores.raw.delete(identifier)?;
                        format!("✗ [{}/{}] {}: Failed to save to CSV", position, total, identifier)
                    }
                },
                None => {
                    report.failed += 1;
                    format!(
                        "✗ [{}/{}] {}: Failed to scrape (logged to error log)",
                        position, total, identifier
                    )
                }
            };
            progress.suspend(|| println!("{}", line));
            progress.inc(1);

            if position < total && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }

        progress.finish_and_clear();
        info!(
            "Batch scrape completed: {} successful, {} failed, {} skipped",
            report.succeeded, report.failed, report.skipped
        );

        Ok(report)
    }

    /// Prints the summary block of a finished run.
    pub fn print_summary(&self, report: &BatchReport, mode: WriteMode) {
        println!("\n{}", "=".repeat(70));
        println!("Batch Scraping Complete - Mode: {}", mode);
        println!("{}", "=".repeat(70));
        println!("Total Processed: {}", report.total);
        println!("Successful: {}", report.succeeded);
        println!("Failed: {}", report.failed);
        println!("Skipped (already exist or in error log): {}", report.skipped);
        println!("Success Rate: {:.1}%", report.success_rate());

        if report.failed > 0 && self.stores.errors.exists() {
            println!("\n⚠  Errors logged to: {}", self.stores.errors.path().display());
            println!("   Review this file for details on {} failed identifiers", report.failed);
        }

        if report.succeeded > 0 {
            println!("\n✓ Data saved to: {}", self.stores.master.path().display());
            println!("✓ Raw HTML saved to: {}/", self.stores.raw.dir().display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_ignores_skipped() {
        let report = BatchReport {
            total: 10,
            succeeded: 3,
            failed: 1,
            skipped: 6,
        };
        assert_eq!(report.success_rate(), 75.0);
        assert_eq!(BatchReport::default().success_rate(), 0.0);
    }
}
