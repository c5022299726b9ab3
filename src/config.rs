use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;

/// The `ScraperConfig` struct holds the configuration settings for the scraper application.
/// It includes the HTTP settings shared by every vendor and the per-site endpoints and file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// The timeout duration for HTTP requests.
    pub timeout: Duration,
    /// The user agent string to be used in HTTP requests.
    pub user_agent: String,
    /// The configuration settings for the Hitachi Energy bushing site.
    pub hitachi: HitachiConfig,
    /// The configuration settings for the Hubbell Algolia index.
    pub hubbell: HubbellConfig,
}

/// The `HitachiConfig` struct holds the endpoints and output locations of both Hitachi datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitachiConfig {
    /// Sent as `Referer` with every page request.
    pub referer: String,
    /// Endpoint of the cross-reference lookup, queried with `?INDEX=<n>`.
    pub cross_reference_url: String,
    /// Endpoint of the catalog lookup, queried with `?StyleNumber=<s>`.
    pub catalog_url: String,
    /// Output locations of the cross-reference dataset.
    pub cross_reference: DatasetPaths,
    /// Output locations of the catalog dataset.
    pub catalog: DatasetPaths,
}

/// Where a dataset keeps its master list, error log and raw pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub master_csv: PathBuf,
    pub error_log_csv: PathBuf,
    pub raw_dir: PathBuf,
}

/// The `HubbellConfig` struct holds the Algolia search settings used to enumerate Hubbell products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubbellConfig {
    /// The multi-query endpoint of the Algolia application.
    pub algolia_url: String,
    pub app_id: String,
    pub api_key: String,
    pub index_name: String,
    /// Restricts every query to condenser bushings.
    pub category_filter: String,
    /// Brands enumerated one at a time.
    pub brands: Vec<String>,
    /// kV classes that facet sampling is known to miss.
    pub rare_kv_classes: Vec<String>,
    /// Pause between two pages of the same combination.
    pub page_delay: Duration,
    /// Pause between two sampling pages during facet discovery.
    pub sample_delay: Duration,
    /// Where the deduplicated product list is written.
    pub output_csv: PathBuf,
}

impl Default for ScraperConfig {
    /// Provides default values for the `ScraperConfig` struct.
    ///
    /// # Returns
    ///
    /// A `ScraperConfig` instance pointing at the live vendor endpoints and the working directory.
    fn default() -> Self {
        Self {
            timeout: crate::DEFAULT_TIMEOUT,
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
            hitachi: HitachiConfig::default(),
            hubbell: HubbellConfig::default(),
        }
    }
}

impl Default for HitachiConfig {
    fn default() -> Self {
        Self {
            referer: String::from("https://bushing.hitachienergy.com/"),
            cross_reference_url: String::from(
                "https://bushing.hitachienergy.com/Scripts/BushingCrossReferenceBU.asp",
            ),
            catalog_url: String::from("https://bushing.hitachienergy.com/Scripts/BushingLookupBU.asp"),
            cross_reference: DatasetPaths {
                master_csv: PathBuf::from("hitachi_website_bushing_master_list.csv"),
                error_log_csv: PathBuf::from("hitachi_website_scraping_error_log.csv"),
                raw_dir: PathBuf::from("hitachi_website_data_raw/cross_reference_data"),
            },
            catalog: DatasetPaths {
                master_csv: PathBuf::from("hitachi_website_bushing_catalog_master_list.csv"),
                error_log_csv: PathBuf::from("hitachi_website_catalog_scraping_error_log.csv"),
                raw_dir: PathBuf::from("hitachi_website_data_raw/catalog_data"),
            },
        }
    }
}

impl Default for HubbellConfig {
    fn default() -> Self {
        let app_id = "5JH7C4O2N4";
        Self {
            algolia_url: format!(
                "https://{}-dsn.algolia.net/1/indexes/*/queries",
                app_id.to_lowercase()
            ),
            app_id: app_id.to_string(),
            api_key: String::from("69e73c81a774c3c152e24bc652cfd6da"),
            index_name: String::from("Products_featured"),
            category_filter: String::from(
                "Categories.lvl3:'Power & Utilities > Bushings > Power Apparatus Bushings > Condenser Bushings'",
            ),
            brands: vec![
                String::from("PCORE Electric"),
                String::from("Electro Composites"),
            ],
            rare_kv_classes: [
                "0.693 kV", "13.8 kV", "14.4 kV", "22 kV", "23 kV", "24.5 kV", "245 kV", "30 kV",
                "300 kV", "4 kV", "44 kV", "92 kV",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            page_delay: Duration::from_millis(300),
            sample_delay: Duration::from_millis(200),
            output_csv: PathBuf::from("hubbell_website_bushing_master_list_complete.csv"),
        }
    }
}

impl ScraperConfig {
    /// Loads the configuration by layering the defaults, an optional config file and
    /// `BUSHING__`-prefixed environment variables (e.g. `BUSHING__HUBBELL__API_KEY`).
    ///
    /// # Arguments
    ///
    /// * `path` - An optional config file (TOML, YAML or JSON). A missing file is an error
    ///   only when given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&ScraperConfig::default())?);

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("bushing_scraper").required(false)),
        };

        let config = builder
            .add_source(Environment::with_prefix("BUSHING").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}
