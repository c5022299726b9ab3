use super::cross_reference::{
    ABB_STYLE_NUMBER, CROSS_REFERENCE, ORIGINAL_CATALOG_NUMBER, ORIGINAL_MANUFACTURER,
    REPLACEMENT_MANUFACTURER,
};
use crate::batch::BushingSource;
use crate::client::PageFetcher;
use crate::scraper::{page_text, take_chars, LabelScraper};
use crate::storage::{CsvStore, DatasetStores};
use crate::types::{Dataset, Record, ScrapedPage};
use crate::{Result, ScraperConfig, ScraperError};
use scraper::Html;
use std::collections::BTreeSet;
use tracing::{info, instrument};

pub const STYLE_NUMBER: &str = "Style Number";

/// The catalog master list: every specification column of an ABB bushing.
pub static CATALOG: Dataset = Dataset {
    name: "Hitachi catalog",
    columns: &[
        STYLE_NUMBER,
        "Alternate Style Number (usually other color)",
        "Catalog Number",
        "Delivery Ex-Works",
        "Delivery Last Update",
        "List Price US$",
        "Insulator Type",
        "Color",
        "Outline Drawing",
        "Download Drawing",
        "Apparatus",
        "Standard",
        "Bushing Type",
        "Oil Indication",
        "Application",
        "Mounting Position",
        "Connection Type",
        "Current Version",
        "Voltage Class",
        "kV BIL",
        "Max kV L-G",
        "Cantilever Design Test Rating Upper Value",
        "Cantilever Design Test Rating Lower Value",
        "Approximate Capacitance C1",
        "Approximate Capacitance C2",
        "Current Rating Draw Lead",
        "Bottom Connected",
        "Oil Circuit Breaker",
        "Lower End Length (L)",
        "C.T. Pocket Transformer",
        "C.T. Pocket Oil Circuit Breaker",
        "Exposable Length Transformer (EL)",
        "Exposable Length Oil Circuit Breaker (EL)",
        "Max. Dia. From 1\" below Flange to Lower End of Bushing (D)",
        "Upper End Length (B)",
        "Minimum Creep",
        "Arcing Distance",
        "Lowest High Voltage (LHV)",
        "Cable Height/Pin Height for AB Bushings (CH)",
        "Maximum Altitude",
        "Approximate Weight",
        "Top End Terminal - Thread Dia and Class or number of Pads and Holes Per Pad",
        "Top End Terminal - Length and Type or Dia, and Type of Holes",
        "Top End Terminal - Thread Plating",
        "Top End Terminal - Top Terminal Comments",
        "Bottom End Terminal - Terminal Type",
        "Bottom End Terminal - Min Outside Diameter",
        "Bottom End Terminal - Bottom Terminal Comments",
        "Max Inside Diameter (P)",
        "Min Outside Diameter (Q)",
        "Number of Holes",
        "Hole/Slot Size",
        "Bolt Circle Diameter",
        "Epoxy Coated Shield and Terminal Kit",
        FLANGE_MOUNTING_COMMENTS,
        SPECIAL_FEATURES,
    ],
    key_column: STYLE_NUMBER,
    error_id_column: "Style_Number",
    raw_prefix: super::RAW_PREFIX,
};

const FLANGE_MOUNTING_COMMENTS: &str = "Flange Mounting Comments";
const SPECIAL_FEATURES: &str = "Special Features";

/// Marker the lookup page shows for unknown style numbers.
pub const NOT_FOUND_MARKER: &str = "No bushing found by that style number";

/// Table labels of every column read from the specification tables, tried in order.
const TABLE_FIELDS: &[(&str, &[&str])] = &[
    ("Alternate Style Number (usually other color)", &["Alternate Style Number"]),
    ("Catalog Number", &["Catalog Number:"]),
    ("Delivery Ex-Works", &["Delivery Ex-Works:"]),
    ("Delivery Last Update", &["Delivery Last Update:"]),
    ("List Price US$", &["List Price US$:"]),
    ("Insulator Type", &["Insulator Type:"]),
    ("Color", &["Color:"]),
    ("Outline Drawing", &["Outline Drawing:"]),
    ("Download Drawing", &["Download Drawing:"]),
    ("Apparatus", &["Apparatus:"]),
    ("Standard", &["Standard:"]),
    ("Bushing Type", &["Bushing Type:"]),
    ("Oil Indication", &["Oil Indication:"]),
    ("Application", &["Application:"]),
    ("Mounting Position", &["Mounting Position:"]),
    ("Connection Type", &["Connection Type:"]),
    ("Current Version", &["Current Version:"]),
    ("Voltage Class", &["Voltage Class"]),
    ("kV BIL", &["kV BIL"]),
    ("Max kV L-G", &["Max kV L-G"]),
    (
        "Cantilever Design Test Rating Upper Value",
        &["Cantilever Design Test Rating Upper Value"],
    ),
    (
        "Cantilever Design Test Rating Lower Value",
        &["Lower Value", "Cantilever Design Test Rating Lower Value"],
    ),
    ("Approximate Capacitance C1", &["Approximate Capacitance C1", "C1"]),
    ("Approximate Capacitance C2", &["C2", "Approximate Capacitance C2"]),
    ("Current Rating Draw Lead", &["Current Rating Draw Lead"]),
    ("Bottom Connected", &["Bottom Connected"]),
    ("Oil Circuit Breaker", &["Oil Circuit Breaker"]),
    ("Lower End Length (L)", &["Lower End Length (L)"]),
    ("C.T. Pocket Transformer", &["C.T. Pocket Transformer"]),
    ("C.T. Pocket Oil Circuit Breaker", &["C.T. Pocket Oil Circuit Breaker"]),
    ("Exposable Length Transformer (EL)", &["Exposable Length Transformer (EL)"]),
    (
        "Exposable Length Oil Circuit Breaker (EL)",
        &["Exposable Length Oil Circuit Breaker (EL)"],
    ),
    (
        "Max. Dia. From 1\" below Flange to Lower End of Bushing (D)",
        &["Max. Dia. From 1\" below Flange to Lower End of Bushing (D)"],
    ),
    ("Upper End Length (B)", &["Upper End Length (B)"]),
    ("Minimum Creep", &["Minimum Creep"]),
    ("Arcing Distance", &["Arcing Distance"]),
    ("Lowest High Voltage (LHV)", &["Lowest High Voltage (LHV)"]),
    (
        "Cable Height/Pin Height for AB Bushings (CH)",
        &["Cable Height/Pin Height for AB Bushings (CH)"],
    ),
    ("Maximum Altitude", &["Maximum Altitude"]),
    ("Approximate Weight", &["Approximate Weight"]),
    (
        "Top End Terminal - Thread Dia and Class or number of Pads and Holes Per Pad",
        &["Thread Dia and Class or number of Pads and Holes Per Pad"],
    ),
    (
        "Top End Terminal - Length and Type or Dia, and Type of Holes",
        &["Length and Type or Dia, and Type of Holes"],
    ),
    ("Top End Terminal - Thread Plating", &["Thread Plating"]),
    ("Top End Terminal - Top Terminal Comments", &["Top Terminal Comments"]),
    ("Bottom End Terminal - Terminal Type", &["Terminal Type"]),
    ("Bottom End Terminal - Min Outside Diameter", &["Min Outside Diameter"]),
    ("Bottom End Terminal - Bottom Terminal Comments", &["Bottom Terminal Comments"]),
    ("Max Inside Diameter (P)", &["Max Inside Diameter (P)"]),
    ("Min Outside Diameter (Q)", &["Min Outside Diameter (Q)"]),
    ("Number of Holes", &["Number of Holes"]),
    ("Hole/Slot Size", &["Hole/Slot Size"]),
    ("Bolt Circle Diameter", &["Bolt Circle Diameter"]),
    ("Epoxy Coated Shield and Terminal Kit", &["Epoxy Coated Shield and Terminal Kit"]),
];

/// The `CatalogScraper` struct scrapes the specification page of one ABB style number.
pub struct CatalogScraper {
    fetcher: PageFetcher,
    labels: LabelScraper,
    /// Source of the style numbers when the master list is (re)initialized.
    cross_reference: CsvStore,
}

impl CatalogScraper {
    /// Creates a new `CatalogScraper` with the given configuration.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let cross_reference = CsvStore::new(
            &config.hitachi.cross_reference.master_csv,
            &CROSS_REFERENCE,
        );
        Ok(Self {
            fetcher: PageFetcher::new(config)?,
            labels: LabelScraper::new()?,
            cross_reference,
        })
    }

    /// Parses a catalog page.
    ///
    /// # Arguments
    ///
    /// * `html` - The page body.
    /// * `style_number` - The style number the page was requested for.
    ///
    /// # Returns
    ///
    /// The record with every column found, or an extraction error when the style number is empty.
    pub fn parse(&self, html: &str, style_number: &str) -> Result<Record> {
        if style_number.trim().is_empty() {
            return Err(ScraperError::ExtractionError(
                "Style number field empty - no valid data extracted".to_string(),
            ));
        }

        let document = Html::parse_document(html);
        let mut record = Record::new(&CATALOG);
        record.set(STYLE_NUMBER, style_number);

        for (column, labels) in TABLE_FIELDS {
            record.set(column, self.labels.first_table_value(&document, labels));
        }

        let text = page_text(&document);
        if let Some(comment) = flange_mounting_comments(&text) {
            record.set(FLANGE_MOUNTING_COMMENTS, comment);
        }
        if let Some(features) = special_features(&text) {
            record.set(SPECIAL_FEATURES, features);
        }

        Ok(record)
    }

    /// Writes the catalog master list with one placeholder row per ABB style number found
    /// in the cross-reference master list.
    ///
    /// # Arguments
    ///
    /// * `master` - The catalog master list.
    /// * `force` - Recreate the list even if it exists.
    ///
    /// # Returns
    ///
    /// The number of style numbers written, or `None` when an existing list was kept.
    pub fn initialize_master_list(&self, master: &CsvStore, force: bool) -> Result<Option<usize>> {
        if master.exists() && !force {
            info!("Catalog master list already exists: {}", master.path().display());
            return Ok(None);
        }

        info!("Extracting unique ABB style numbers from cross-reference master list...");
        let styles = abb_style_numbers(&self.cross_reference)?;
        if styles.is_empty() {
            return Err(ScraperError::NoIdentifiers(
                "no ABB style numbers found in cross-reference master list".to_string(),
            ));
        }

        let count = master.initialize(styles)?;
        info!("Created catalog master list {} with {} style numbers", master.path().display(), count);
        Ok(Some(count))
    }
}

/// Collects the unique ABB style numbers of the cross-reference master list.
///
/// Takes the ABB style number of rows whose replacement manufacturer is ABB and the
/// catalog number of rows whose original manufacturer is ABB.
pub fn abb_style_numbers(cross_reference: &CsvStore) -> Result<BTreeSet<String>> {
    if !cross_reference.exists() {
        return Err(ScraperError::MissingMasterList(
            cross_reference.path().to_path_buf(),
        ));
    }

    let mut styles = BTreeSet::new();
    for row in cross_reference.read_rows()? {
        let record = Record::from_row(&CROSS_REFERENCE, &row);
        if record.get(REPLACEMENT_MANUFACTURER) == "ABB" && !record.get(ABB_STYLE_NUMBER).is_empty() {
            styles.insert(record.get(ABB_STYLE_NUMBER).to_string());
        }
        if record.get(ORIGINAL_MANUFACTURER) == "ABB" && !record.get(ORIGINAL_CATALOG_NUMBER).is_empty() {
            styles.insert(record.get(ORIGINAL_CATALOG_NUMBER).to_string());
        }
    }

    info!("Extracted {} unique ABB style numbers", styles.len());
    Ok(styles)
}

fn flange_mounting_comments(text: &str) -> Option<String> {
    let label = "Flange Mounting Comments:";
    let pos = text.find(label)?;
    let mut comment = take_chars(&text[pos + label.len()..], 200).trim();

    if let Some(end) = ["Special Features:", "Top End Terminal", "\n\n"]
        .iter()
        .find_map(|delimiter| comment.find(delimiter))
    {
        comment = comment[..end].trim();
    }

    Some(comment.to_string())
}

fn special_features(text: &str) -> Option<String> {
    let label = "Special Features:";
    let pos = text.find(label)?;
    let features = take_chars(&text[pos + label.len()..], 200).trim();

    features.lines().next().map(|line| line.trim().to_string())
}

impl BushingSource for CatalogScraper {
    fn dataset(&self) -> &'static Dataset {
        &CATALOG
    }

    #[instrument(skip(self))]
    async fn scrape(&self, style_number: &str) -> Result<ScrapedPage> {
        let url = format!(
            "{}?StyleNumber={}&Language=English&Units=English",
            self.fetcher.config().hitachi.catalog_url,
            urlencoding::encode(style_number)
        );
        info!("Scraping catalog data for style {} from {}", style_number, url);

        let html = self.fetcher.fetch_page(&url).await?;
        if html.contains(NOT_FOUND_MARKER) {
            return Err(ScraperError::NotFound(NOT_FOUND_MARKER.to_string()));
        }

        let record = self.parse(&html, style_number)?;

        info!("Successfully scraped catalog data for style {}", style_number);
        Ok(ScrapedPage { record, html })
    }

    fn reseed(&self, stores: &DatasetStores) -> Result<()> {
        self.initialize_master_list(&stores.master, true)?;
        Ok(())
    }

    fn summarize(&self, record: &Record) -> String {
        format!(
            "{} | {} | {}",
            record.get("Voltage Class"),
            record.get("Current Rating Draw Lead"),
            record.get("Apparatus")
        )
    }
}
