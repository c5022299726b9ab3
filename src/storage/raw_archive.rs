use super::sanitize_identifier;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A directory of raw page bodies, one file per identifier.
///
/// A page is only kept for identifiers whose last scrape succeeded, so a file's presence
/// means the identifier has been scraped.
pub struct RawArchive {
    dir: PathBuf,
    prefix: &'static str,
}

impl RawArchive {
    pub fn new(dir: impl AsRef<Path>, prefix: &'static str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file holding the page of `identifier`.
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.html", self.prefix, sanitize_identifier(identifier)))
    }

    pub fn exists(&self, identifier: &str) -> bool {
        self.path_for(identifier).exists()
    }

    pub fn save(&self, identifier: &str, html: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(identifier);
        std::fs::write(&path, html)?;
        info!("Saved raw HTML to {}", path.display());
        Ok(path)
    }

    /// Deletes the page of `identifier`. Returns whether there was one.
    pub fn delete(&self, identifier: &str) -> Result<bool> {
        let path = self.path_for(identifier);
        if path.exists() {
            std::fs::remove_file(&path)?;
            info!("Deleted raw HTML file: {}", path.display());
            Ok(true)
        } else {
            debug!("HTML file not found (already deleted): {}", path.display());
            Ok(false)
        }
    }

    /// Removes the directory with every page in it and recreates it empty.
    ///
    /// # Returns
    ///
    /// The number of HTML files that were deleted.
    pub fn clear(&self) -> Result<usize> {
        let mut count = 0;
        if self.dir.exists() {
            count = std::fs::read_dir(&self.dir)?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "html"))
                .count();
            std::fs::remove_dir_all(&self.dir)?;
        }
        std::fs::create_dir_all(&self.dir)?;
        Ok(count)
    }
}
