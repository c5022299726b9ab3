//! On-disk persistence: the master CSV of a dataset, its error log and the raw page archive.
//!
//! Every file is read, modified and rewritten wholesale; none of them is safe for concurrent writers.

pub mod csv_store;
pub mod error_log;
pub mod raw_archive;

pub use csv_store::CsvStore;
pub use error_log::ErrorLog;
pub use raw_archive::RawArchive;

use crate::config::DatasetPaths;
use crate::types::Dataset;
use crate::Result;
use tracing::info;

/// The three stores of one dataset.
pub struct DatasetStores {
    pub master: CsvStore,
    pub errors: ErrorLog,
    pub raw: RawArchive,
}

impl DatasetStores {
    pub fn new(dataset: &'static Dataset, paths: &DatasetPaths) -> Self {
        Self {
            master: CsvStore::new(&paths.master_csv, dataset),
            errors: ErrorLog::new(&paths.error_log_csv, dataset.error_id_column),
            raw: RawArchive::new(&paths.raw_dir, dataset.raw_prefix),
        }
    }

    /// Deletes the master list, the error log and every archived page, leaving an empty
    /// raw directory behind.
    pub fn clear(&self) -> Result<()> {
        if self.master.remove()? {
            info!("Deleted {}", self.master.path().display());
        }
        if self.errors.remove()? {
            info!("Deleted {}", self.errors.path().display());
        }
        let pages = self.raw.clear()?;
        info!("Deleted {}/ directory ({} HTML files)", self.raw.dir().display(), pages);
        Ok(())
    }
}

/// Makes an identifier safe to use as a file name component.
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier.replace(['/', '\\'], "_")
}
