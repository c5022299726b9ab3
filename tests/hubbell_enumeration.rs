use bushing_scraper::{
    hubbell::{HubbellScraper, HUBBELL},
    storage::CsvStore,
    ScraperConfig,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tempfile::TempDir;

const QUERIES_PATH: &str = "/1/indexes/*/queries";

fn test_config(server_url: &str) -> ScraperConfig {
    let mut config = ScraperConfig::default();
    config.timeout = Duration::from_secs(5);
    config.hubbell.algolia_url = format!("{}{}", server_url, QUERIES_PATH);
    config.hubbell.app_id = "TESTAPP".to_string();
    config.hubbell.api_key = "test-key".to_string();
    config.hubbell.rare_kv_classes = vec!["4 kV".to_string()];
    config.hubbell.page_delay = Duration::ZERO;
    config.hubbell.sample_delay = Duration::ZERO;
    config
}

/// Every query answers with the same page, so each product is seen once per facet value.
fn search_page() -> String {
    json!({
        "results": [{
            "hits": [
                {
                    "objectID": "PC-69",
                    "title": "PCORE® POC Bushing 69 kV",
                    "Brand": "PCORE Electric",
                    "Catalog Number": "POC69-800",
                    "kV Class": "69 kV",
                    "BIL": "350",
                    "Current Rating": "800 A"
                },
                {
                    "objectID": "PC-138",
                    "title": "PCORE® POC Bushing 138 kV",
                    "Brand": "PCORE Electric",
                    "Catalog Number": "POC138-1200",
                    "kV Class": "138 kV",
                    "BIL": "650",
                    "Current Rating": "1200 A"
                },
                {
                    "objectID": "EC-25",
                    "title": "Composite Bushing",
                    "Brand": "Electro Composites",
                    "Catalog Number": "EC25-600",
                    "kV Class": "25 kV",
                    "BIL": 150,
                    "Current Rating": "600 A"
                },
                {
                    "objectID": "OT-1",
                    "Brand": "Other Maker",
                    "Catalog Number": "OT-1",
                    "kV Class": "15 kV"
                }
            ],
            "nbHits": 4,
            "nbPages": 1,
            "facets": {
                "kV Class": {"69 kV": 1, "138 kV": 1, "25 kV": 1, "15 kV": 1}
            }
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_enumeration_deduplicates_by_catalog_number() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url());
    let output = dir.path().join("hubbell.csv");

    let queries = server
        .mock("POST", QUERIES_PATH)
        .match_header("X-Algolia-Application-Id", "TESTAPP")
        .match_header("X-Algolia-API-Key", "test-key")
        .match_body(Matcher::Regex(r#""indexName":"Products_featured""#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(search_page())
        .expect_at_least(10)
        .create_async()
        .await;

    let scraper = HubbellScraper::new(config).unwrap();
    let report = scraper.scrape_all_products(&output).await.unwrap();
    queries.assert_async().await;

    assert!(report.raw > report.unique);
    assert_eq!(report.unique, 4);

    let rows = CsvStore::new(&output, &HUBBELL).read_rows().unwrap();
    assert_eq!(rows.len(), 4);
    let catalogs: HashSet<&str> = rows.iter().map(|row| row[2].as_str()).collect();
    assert_eq!(catalogs.len(), rows.len());

    assert_eq!(
        rows[0][0],
        "https://www.hubbell.com/hubbell/en/products/pcore-poc-bushing-69-kv/p/PC-69"
    );
    assert_eq!(rows[0][1], "PCORE Electric");
    let other = rows.iter().find(|row| row[2] == "OT-1").unwrap();
    assert_eq!(other[0], "https://www.hubbell.com/hubbell/en/p/OT-1");
}

#[tokio::test]
async fn test_failed_requests_write_no_output() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url());

    server
        .mock("POST", QUERIES_PATH)
        .with_status(500)
        .create_async()
        .await;

    let scraper = HubbellScraper::new(config).unwrap();
    let result = scraper.scrape_all_products(&dir.path().join("hubbell.csv")).await;

    assert!(result.is_err());
    assert!(!dir.path().join("hubbell.csv").exists());
}

#[tokio::test]
async fn test_explore_facets_reads_counts() {
    let mut server = Server::new_async().await;
    let config = test_config(&server.url());

    server
        .mock("POST", QUERIES_PATH)
        .with_status(200)
        .with_body(search_page())
        .create_async()
        .await;

    let scraper = HubbellScraper::new(config).unwrap();
    let result = scraper.explore_facets().await.unwrap();

    assert_eq!(result.nb_hits, 4);
    assert_eq!(result.facets["kV Class"]["138 kV"], 1);
}
