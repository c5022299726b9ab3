use crate::batch::BushingSource;
use crate::client::PageFetcher;
use crate::scraper::{
    extract_field_value, first_clean_line_after, page_text, section_between, window_from,
    LabelScraper,
};
use crate::types::{Dataset, Record, ScrapedPage};
use crate::{Result, ScraperConfig, ScraperError};
use scraper::Html;
use tracing::{info, instrument, warn};

pub const WEBSITE_INDEX: &str = "Website Index";
pub const ORIGINAL_MANUFACTURER: &str = "Original Bushing Information - Original Bushing Manufacturer";
pub const ORIGINAL_CATALOG_NUMBER: &str = "Original Bushing Information - Catalog Number";
pub const REPLACEMENT_MANUFACTURER: &str = "Replacement Information - Replacement Bushing Manufacturer";
pub const ABB_STYLE_NUMBER: &str = "Replacement Information - ABB Style Number";

/// The cross-reference master list.
pub static CROSS_REFERENCE: Dataset = Dataset {
    name: "Hitachi cross-reference",
    columns: &[
        WEBSITE_INDEX,
        ORIGINAL_MANUFACTURER,
        ORIGINAL_CATALOG_NUMBER,
        REPLACEMENT_MANUFACTURER,
        ABB_STYLE_NUMBER,
    ],
    key_column: WEBSITE_INDEX,
    error_id_column: "Index",
    raw_prefix: super::RAW_PREFIX,
};

const ORIGINAL_SECTION: &str = "Original Bushing Information";
const REPLACEMENT_SECTION: &str = "Replacement Information";

/// The `CrossReferenceScraper` struct scrapes one cross-reference page per index.
pub struct CrossReferenceScraper {
    fetcher: PageFetcher,
    labels: LabelScraper,
}

impl CrossReferenceScraper {
    /// Creates a new `CrossReferenceScraper` with the given configuration.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(config)?,
            labels: LabelScraper::new()?,
        })
    }

    /// Parses a cross-reference page.
    ///
    /// # Arguments
    ///
    /// * `html` - The page body.
    /// * `index` - The index the page was requested for.
    ///
    /// # Returns
    ///
    /// The record, or an extraction error when manufacturer, catalog number and ABB style
    /// number are all missing.
    pub fn parse(&self, html: &str, index: &str) -> Result<Record> {
        let document = Html::parse_document(html);
        let text = page_text(&document);

        let mut record = Record::new(&CROSS_REFERENCE);
        record.set(WEBSITE_INDEX, index);
        record.set(REPLACEMENT_MANUFACTURER, "ABB");
        record.set(
            ORIGINAL_MANUFACTURER,
            extract_field_value(&text, "Original Bushing Manufacturer:"),
        );
        record.set(ORIGINAL_CATALOG_NUMBER, catalog_number(&text));
        record.set(ABB_STYLE_NUMBER, self.abb_style_number(&document, &text));

        for (column, name) in [
            (ORIGINAL_MANUFACTURER, "Original Bushing Manufacturer"),
            (ORIGINAL_CATALOG_NUMBER, "Catalog Number"),
            (ABB_STYLE_NUMBER, "ABB Style Number"),
        ] {
            if record.get(column).is_empty() {
                warn!("Missing {} for index {}", name, index);
            }
        }

        let has_data = [ORIGINAL_CATALOG_NUMBER, ORIGINAL_MANUFACTURER, ABB_STYLE_NUMBER]
            .iter()
            .any(|column| !record.get(column).is_empty());
        if !has_data {
            return Err(ScraperError::ExtractionError(
                "All fields empty after parsing".to_string(),
            ));
        }

        Ok(record)
    }

    /// The ABB style number: a style-number link in the replacement block, then the first
    /// line after the label in the replacement section, then a plain text scan.
    fn abb_style_number(&self, document: &Html, text: &str) -> String {
        if let Some(style) = self
            .labels
            .identifier_link(document, &["ABB Style", "Replacement"])
        {
            return style;
        }

        window_from(text, REPLACEMENT_SECTION, 500)
            .and_then(|section| {
                first_clean_line_after(
                    section,
                    "ABB Style Number:",
                    &["ABB Style", "Replacement", "Dimensional"],
                )
            })
            .unwrap_or_else(|| extract_field_value(text, "ABB Style Number:"))
    }
}

/// The original catalog number, looked up in the original-bushing section before falling
/// back to a plain text scan.
fn catalog_number(text: &str) -> String {
    let section = section_between(text, ORIGINAL_SECTION, REPLACEMENT_SECTION);
    first_clean_line_after(
        section,
        "Catalog Number:",
        &["Catalog Number", "Original", "Dimensional"],
    )
    .unwrap_or_else(|| extract_field_value(text, "Catalog Number:"))
}

impl BushingSource for CrossReferenceScraper {
    fn dataset(&self) -> &'static Dataset {
        &CROSS_REFERENCE
    }

    #[instrument(skip(self))]
    async fn scrape(&self, index: &str) -> Result<ScrapedPage> {
        let url = format!(
            "{}?INDEX={}",
            self.fetcher.config().hitachi.cross_reference_url,
            index
        );
        info!("Scraping data for index {} from {}", index, url);

        let html = self.fetcher.fetch_page(&url).await?;
        let record = self.parse(&html, index)?;

        info!("Successfully scraped data for index {}", index);
        Ok(ScrapedPage { record, html })
    }

    fn summarize(&self, record: &Record) -> String {
        let manufacturer = record.get(ORIGINAL_MANUFACTURER);
        format!(
            "{} | {} | {}",
            if manufacturer.is_empty() { "(empty)" } else { manufacturer },
            record.get(ORIGINAL_CATALOG_NUMBER),
            record.get(ABB_STYLE_NUMBER)
        )
    }
}
