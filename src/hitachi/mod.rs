//! Scrapers for the Hitachi Energy bushing site.
//!
//! The cross-reference pages map an integer index to an original bushing and its ABB
//! replacement; the catalog pages hold the full specification of one ABB style number.

pub mod catalog;
pub mod cross_reference;

pub use catalog::{CatalogScraper, CATALOG};
pub use cross_reference::{CrossReferenceScraper, CROSS_REFERENCE};

/// File name prefix shared by the archived pages of both datasets.
pub const RAW_PREFIX: &str = "Hitachi_website_bushing_";
