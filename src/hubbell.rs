use crate::client::PageFetcher;
use crate::config::HubbellConfig;
use crate::hitachi::cross_reference::{ORIGINAL_CATALOG_NUMBER, ORIGINAL_MANUFACTURER};
use crate::storage::CsvStore;
use crate::types::{Dataset, Record};
use crate::{Result, ScraperConfig, ScraperError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

pub const WEBSITE_LINK: &str = "Website Link";

/// The Hubbell product list, keyed by catalog number.
pub static HUBBELL: Dataset = Dataset {
    name: "Hubbell",
    columns: &[WEBSITE_LINK, ORIGINAL_MANUFACTURER, ORIGINAL_CATALOG_NUMBER],
    key_column: ORIGINAL_CATALOG_NUMBER,
    error_id_column: "Catalog_Number",
    raw_prefix: "Hubbell_website_bushing_",
};

/// Largest page Algolia serves.
const HITS_PER_PAGE: u32 = 100;
/// Algolia stops paginating after 1,000 hits.
const MAX_PAGES: u32 = 10;
/// Pages sampled when discovering facet values.
const SAMPLE_PAGES: u32 = 5;
/// Category-only pages scanned for products of unexpected brands.
const UNBRANDED_PAGES: u64 = 5;

/// A product attribute used to split queries below the pagination ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    KvClass,
    Bil,
    CurrentRating,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::KvClass, Facet::Bil, Facet::CurrentRating];

    /// The attribute name in the index.
    pub fn attribute(self) -> &'static str {
        match self {
            Facet::KvClass => "kV Class",
            Facet::Bil => "BIL",
            Facet::CurrentRating => "Current Rating",
        }
    }
}

/// A search hit: the product attributes as returned by the index.
pub type Hit = Map<String, Value>;

#[derive(Debug, Deserialize)]
struct MultiQueryResponse {
    results: Vec<QueryResult>,
}

/// One result of a multi-query request.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub hits: Vec<Hit>,
    #[serde(default, rename = "nbHits")]
    pub nb_hits: u64,
    #[serde(default, rename = "nbPages")]
    pub nb_pages: u64,
    /// Facet name to value counts.
    #[serde(default)]
    pub facets: HashMap<String, HashMap<String, u64>>,
}

/// A Hubbell product as written to the product list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubbellProduct {
    pub website_link: String,
    pub manufacturer: String,
    pub catalog_number: String,
}

impl HubbellProduct {
    /// Maps a search hit to a product.
    pub fn from_hit(hit: &Hit) -> Self {
        let object_id = hit_str(hit, "objectID").unwrap_or_default();
        let title = hit_str(hit, "title").unwrap_or_default();

        Self {
            website_link: product_url(&title, &object_id),
            manufacturer: hit_str(hit, "Brand").unwrap_or_default(),
            catalog_number: hit_str(hit, "Catalog Number").unwrap_or_default(),
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new(&HUBBELL);
        record.set(WEBSITE_LINK, self.website_link.as_str());
        record.set(ORIGINAL_MANUFACTURER, self.manufacturer.as_str());
        record.set(ORIGINAL_CATALOG_NUMBER, self.catalog_number.as_str());
        record
    }
}

/// Counts of a full enumeration.
#[derive(Debug, Clone, Default)]
pub struct EnumerationReport {
    /// Hits collected across every query, duplicates included.
    pub raw: usize,
    /// Products written after deduplication.
    pub unique: usize,
    /// Products per brand, most frequent first.
    pub brands: Vec<(String, usize)>,
}

impl EnumerationReport {
    pub fn duplicates_removed(&self) -> usize {
        self.raw - self.unique
    }
}

/// The `HubbellScraper` struct enumerates Hubbell condenser bushings through the site's
/// Algolia search index.
pub struct HubbellScraper {
    fetcher: PageFetcher,
    config: HubbellConfig,
}

impl HubbellScraper {
    /// Creates a new `HubbellScraper` with the given configuration.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let hubbell = config.hubbell.clone();
        Ok(Self {
            fetcher: PageFetcher::new(config)?,
            config: hubbell,
        })
    }

    /// Runs one filtered query.
    ///
    /// # Arguments
    ///
    /// * `filter` - Algolia filter expression; wrapped in parentheses.
    /// * `hits_per_page` - Page size, at most 100.
    /// * `page` - Zero-based page number.
    pub async fn search(&self, filter: &str, hits_per_page: u32, page: u32) -> Result<QueryResult> {
        let body = json!({
            "requests": [{
                "indexName": self.config.index_name,
                "hitsPerPage": hits_per_page,
                "facets": ["*"],
                "sortFacetValuesBy": "alpha",
                "filters": format!("({})", filter),
                "clickAnalytics": true,
                "page": page,
                "params": ""
            }]
        });
        let headers = [
            ("X-Algolia-API-Key", self.config.api_key.as_str()),
            ("X-Algolia-Application-Id", self.config.app_id.as_str()),
        ];

        let response: MultiQueryResponse = self
            .fetcher
            .post_json(&self.config.algolia_url, &headers, &body)
            .await?;

        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ScraperError::SearchError("response has no results".to_string()))
    }

    fn brand_filter(&self, brand: &str) -> String {
        format!("{} AND Brands:'{}'", self.config.category_filter, brand)
    }

    /// Discovers the values a facet takes for one brand by sampling the first pages.
    pub async fn discover_facet_values(&self, brand_filter: &str, facet: Facet) -> Vec<String> {
        info!("  Discovering unique {} values...", facet.attribute());
        let mut values = BTreeSet::new();

        for page in 0..SAMPLE_PAGES {
            match self.search(brand_filter, HITS_PER_PAGE, page).await {
                Ok(result) => {
                    values.extend(result.hits.iter().filter_map(|hit| hit_str(hit, facet.attribute())));
                }
                Err(e) => warn!("  Sampling page {} failed: {}", page, e),
            }
            self.pause(self.config.sample_delay).await;
        }

        info!("  Found {} unique {} values", values.len(), facet.attribute());
        values.into_iter().collect()
    }

    /// Pages through one filter until the last page, an empty page or the pagination ceiling.
    ///
    /// # Returns
    ///
    /// The number of products appended.
    async fn collect_filter(&self, filter: &str, label: &str, products: &mut Vec<HubbellProduct>) -> usize {
        let mut collected = 0;

        for page in 0..MAX_PAGES {
            let result = match self.search(filter, HITS_PER_PAGE, page).await {
                Ok(result) => result,
                Err(e) => {
                    error!("    Failed to get response for {} page {}: {}", label, page, e);
                    break;
                }
            };

            if page == 0 {
                info!("    Total for {}: {} products", label, result.nb_hits);
            }

            products.extend(result.hits.iter().map(HubbellProduct::from_hit));
            collected += result.hits.len();

            if u64::from(page) + 1 >= result.nb_pages || page + 1 >= MAX_PAGES || result.hits.is_empty() {
                break;
            }
            self.pause(self.config.page_delay).await;
        }

        collected
    }

    /// Collects every product of a brand, one query per value of `facet`.
    #[instrument(skip(self, products))]
    pub async fn scrape_brand_by_facet(
        &self,
        brand: &str,
        facet: Facet,
        products: &mut Vec<HubbellProduct>,
    ) -> usize {
        info!("Scraping brand: {} (with {} sub-filtering)", brand, facet.attribute());
        let brand_filter = self.brand_filter(brand);
        let values = self.discover_facet_values(&brand_filter, facet).await;

        let mut count = 0;
        for value in values {
            let filter = format!("{} AND '{}':'{}'", brand_filter, facet.attribute(), value);
            let label = format!("{} - {} {}", brand, facet.attribute(), value);
            count += self.collect_filter(&filter, &label, products).await;
        }

        info!("Completed {} ({}): {} products total", brand, facet.attribute(), count);
        count
    }

    /// Queries the rare kV classes sampling misses, then scans category-only pages for
    /// products of brands outside the configured list.
    pub async fn scrape_missing_products(&self, products: &mut Vec<HubbellProduct>) -> usize {
        let initial = products.len();

        info!("Querying {} rare kV classes...", self.config.rare_kv_classes.len());
        for kv_class in &self.config.rare_kv_classes {
            for brand in &self.config.brands {
                let filter = format!(
                    "{} AND '{}':'{}'",
                    self.brand_filter(brand),
                    Facet::KvClass.attribute(),
                    kv_class
                );
                match self.search(&filter, HITS_PER_PAGE, 0).await {
                    Ok(result) if !result.hits.is_empty() => {
                        info!("  Found {} products for {} - {}", result.hits.len(), brand, kv_class);
                        products.extend(result.hits.iter().map(HubbellProduct::from_hit));
                    }
                    Ok(_) => {}
                    Err(e) => error!("  Error querying {} - {}: {}", brand, kv_class, e),
                }
                self.pause(self.config.sample_delay).await;
            }
        }

        info!("Querying products without brand filter...");
        let category = &self.config.category_filter;
        match self.search(category, HITS_PER_PAGE, 0).await {
            Ok(first) => {
                info!("  Total with category-only filter: {}", first.nb_hits);
                for page in 0..first.nb_pages.min(UNBRANDED_PAGES) as u32 {
                    let result = match self.search(category, HITS_PER_PAGE, page).await {
                        Ok(result) => result,
                        Err(e) => {
                            error!("  Error querying without brand filter: {}", e);
                            continue;
                        }
                    };
                    for hit in &result.hits {
                        let product = HubbellProduct::from_hit(hit);
                        if !product.manufacturer.is_empty()
                            && !self.config.brands.contains(&product.manufacturer)
                        {
                            info!("  Found product from unexpected brand: {}", product.manufacturer);
                            products.push(product);
                        }
                    }
                    self.pause(self.config.page_delay).await;
                }
            }
            Err(e) => error!("  Error querying without brand filter: {}", e),
        }

        let added = products.len() - initial;
        info!("Found {} additional products using gap-filling queries", added);
        added
    }

    /// Runs every enumeration phase and returns the raw hits, duplicates included.
    pub async fn enumerate_products(&self) -> Vec<HubbellProduct> {
        let mut products = Vec::new();
        let mut previous = 0;

        for facet in Facet::ALL {
            info!("PHASE: {} FILTERING", facet.attribute().to_uppercase());
            for brand in &self.config.brands {
                self.scrape_brand_by_facet(brand, facet, &mut products).await;
            }
            info!(
                "Phase complete: {} additional products from {} filtering (running total {})",
                products.len() - previous,
                facet.attribute(),
                products.len()
            );
            previous = products.len();
        }

        info!("PHASE: GAP-FILLING (rare kV classes)");
        self.scrape_missing_products(&mut products).await;
        info!("Final raw total: {} products (before deduplication)", products.len());

        products
    }

    /// Enumerates every product, deduplicates by catalog number and writes the product list.
    ///
    /// # Arguments
    ///
    /// * `output` - The CSV to write.
    pub async fn scrape_all_products(&self, output: &Path) -> Result<EnumerationReport> {
        let raw = self.enumerate_products().await;
        let raw_count = raw.len();
        if raw.is_empty() {
            return Err(ScraperError::SearchError("no products scraped".to_string()));
        }

        let unique = dedupe_by_catalog_number(raw);
        let rows: Vec<Vec<String>> = unique.iter().map(|p| p.to_record().to_row()).collect();
        CsvStore::new(output, &HUBBELL).write_rows(&rows)?;

        let report = EnumerationReport {
            raw: raw_count,
            unique: unique.len(),
            brands: brand_distribution(&unique),
        };
        info!(
            "Removed {} duplicate products; saved {} unique products to {}",
            report.duplicates_removed(),
            report.unique,
            output.display()
        );
        for (brand, count) in &report.brands {
            info!("  {}: {} products", brand, count);
        }

        Ok(report)
    }

    /// Checks the facet strategy on the first kV class of one brand.
    ///
    /// # Returns
    ///
    /// `true` when the filtered query returned a result.
    pub async fn probe(&self) -> Result<bool> {
        let Some(brand) = self.config.brands.first() else {
            return Ok(false);
        };
        let brand_filter = self.brand_filter(brand);
        let values = self.discover_facet_values(&brand_filter, Facet::KvClass).await;
        let Some(kv_class) = values.first() else {
            error!("kV filtering test failed: no kV classes found");
            return Ok(false);
        };

        let filter = format!("{} AND '{}':'{}'", brand_filter, Facet::KvClass.attribute(), kv_class);
        let result = self.search(&filter, 5, 0).await?;
        info!("Test results for {} - {}:", brand, kv_class);
        info!("  Total products: {}", result.nb_hits);
        info!("  Total pages: {}", result.nb_pages);
        if let Some(sample) = result.hits.first() {
            let product = HubbellProduct::from_hit(sample);
            info!("  Sample product: {} | {} | {}", product.manufacturer, kv_class, product.catalog_number);
        }
        Ok(true)
    }

    /// Returns the first category page, whose `facets` list every queryable attribute.
    pub async fn explore_facets(&self) -> Result<QueryResult> {
        self.search(&self.config.category_filter, HITS_PER_PAGE, 0).await
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

/// Keeps the first product of every catalog number.
pub fn dedupe_by_catalog_number(products: Vec<HubbellProduct>) -> Vec<HubbellProduct> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|product| seen.insert(product.catalog_number.clone()))
        .collect()
}

/// Product counts per manufacturer, most frequent first.
pub fn brand_distribution(products: &[HubbellProduct]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for product in products {
        *counts.entry(product.manufacturer.as_str()).or_default() += 1;
    }

    let mut brands: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(brand, count)| (brand.to_string(), count))
        .collect();
    brands.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    brands
}

/// The product page of a hit: a slug of the title followed by the object id.
pub fn product_url(title: &str, object_id: &str) -> String {
    let title = title.trim();
    let object_id = object_id.trim();
    if title.is_empty() || object_id.is_empty() {
        return format!("https://www.hubbell.com/hubbell/en/p/{}", object_id);
    }

    let mut slug = String::new();
    for c in title.to_lowercase().chars() {
        match c {
            '®' | '™' => {}
            ' ' | '-' => {
                if !slug.ends_with('-') {
                    slug.push('-');
                }
            }
            c => slug.push(c),
        }
    }

    format!(
        "https://www.hubbell.com/hubbell/en/products/{}/p/{}",
        slug.trim_matches('-'),
        object_id
    )
}

/// A hit attribute as text. Numbers are rendered, other types are ignored.
fn hit_str(hit: &Hit, key: &str) -> Option<String> {
    match hit.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(catalog: &str, brand: &str) -> HubbellProduct {
        HubbellProduct {
            website_link: format!("https://example.com/{}", catalog),
            manufacturer: brand.to_string(),
            catalog_number: catalog.to_string(),
        }
    }

    #[test]
    fn test_product_url_slug() {
        assert_eq!(
            product_url("PCORE® Type  POC - Condenser Bushing", "PCB123"),
            "https://www.hubbell.com/hubbell/en/products/pcore-type-poc-condenser-bushing/p/PCB123"
        );
        assert_eq!(product_url("", "PCB123"), "https://www.hubbell.com/hubbell/en/p/PCB123");
    }

    #[test]
    fn test_from_hit() {
        let hit: Hit = serde_json::from_value(json!({
            "objectID": "EC-1",
            "title": "Bushing 69 kV",
            "Brand": " Electro Composites ",
            "Catalog Number": "EC69-800",
            "BIL": 350
        }))
        .unwrap();

        let product = HubbellProduct::from_hit(&hit);
        assert_eq!(product.manufacturer, "Electro Composites");
        assert_eq!(product.catalog_number, "EC69-800");
        assert!(product.website_link.ends_with("/bushing-69-kv/p/EC-1"));
        assert_eq!(hit_str(&hit, "BIL"), Some("350".to_string()));
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let products = vec![
            product("A", "PCORE Electric"),
            product("B", "PCORE Electric"),
            product("A", "Electro Composites"),
            product("C", "Electro Composites"),
            product("B", "PCORE Electric"),
        ];

        let unique = dedupe_by_catalog_number(products);
        let catalogs: Vec<&str> = unique.iter().map(|p| p.catalog_number.as_str()).collect();
        assert_eq!(catalogs, vec!["A", "B", "C"]);
        assert_eq!(unique[0].manufacturer, "PCORE Electric");
        assert_eq!(
            brand_distribution(&unique),
            vec![
                ("PCORE Electric".to_string(), 2),
                ("Electro Composites".to_string(), 1)
            ]
        );
    }
}
