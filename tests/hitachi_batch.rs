use bushing_scraper::{
    batch::BatchDriver,
    config::{DatasetPaths, ScraperConfig},
    hitachi::{CatalogScraper, CrossReferenceScraper, CATALOG, CROSS_REFERENCE},
    storage::DatasetStores,
    ErrorEntry, Record, WriteMode,
};
use mockito::{Matcher, Server};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const CROSS_REFERENCE_PAGE: &str = include_str!("fixtures/cross_reference.html");
const CATALOG_PAGE: &str = include_str!("fixtures/catalog.html");

const CROSS_REFERENCE_PATH: &str = "/Scripts/BushingCrossReferenceBU.asp";
const CATALOG_PATH: &str = "/Scripts/BushingLookupBU.asp";

fn test_config(server_url: &str, dir: &Path) -> ScraperConfig {
    let mut config = ScraperConfig::default();
    config.timeout = Duration::from_secs(5);
    config.hitachi.cross_reference_url = format!("{}{}", server_url, CROSS_REFERENCE_PATH);
    config.hitachi.catalog_url = format!("{}{}", server_url, CATALOG_PATH);
    config.hitachi.cross_reference = DatasetPaths {
        master_csv: dir.join("cross_reference.csv"),
        error_log_csv: dir.join("cross_reference_errors.csv"),
        raw_dir: dir.join("raw/cross_reference_data"),
    };
    config.hitachi.catalog = DatasetPaths {
        master_csv: dir.join("catalog.csv"),
        error_log_csv: dir.join("catalog_errors.csv"),
        raw_dir: dir.join("raw/catalog_data"),
    };
    config
}

fn cross_reference_driver(config: &ScraperConfig) -> BatchDriver<CrossReferenceScraper> {
    let stores = DatasetStores::new(&CROSS_REFERENCE, &config.hitachi.cross_reference);
    BatchDriver::new(CrossReferenceScraper::new(config.clone()).unwrap(), stores, 0.0)
}

fn catalog_driver(config: &ScraperConfig) -> BatchDriver<CatalogScraper> {
    let stores = DatasetStores::new(&CATALOG, &config.hitachi.catalog);
    BatchDriver::new(CatalogScraper::new(config.clone()).unwrap(), stores, 0.0)
}

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_append_twice_produces_no_duplicates() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    let page = server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "42131".into()))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(CROSS_REFERENCE_PAGE)
        .expect(1)
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    let first = driver.run(&ids(&["42131"]), WriteMode::Append).await.unwrap();
    let second = driver.run(&ids(&["42131"]), WriteMode::Append).await.unwrap();

    assert_eq!(first.succeeded, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.succeeded, 0);
    page.assert_async().await;

    let rows = driver.stores().master.read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    let record = Record::from_row(&CROSS_REFERENCE, &rows[0]);
    assert_eq!(record.get("Original Bushing Information - Catalog Number"), "11B2345");
    assert_eq!(record.get("Replacement Information - ABB Style Number"), "138N0812BA");
    assert!(driver.stores().raw.exists("42131"));
}

#[tokio::test]
async fn test_http_errors_are_logged_and_stale_pages_deleted() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    let missing = server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "7".into()))
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    let forbidden = server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "8".into()))
        .with_status(403)
        .expect(1)
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    driver.stores().raw.save("7", "<html>stale page</html>").unwrap();

    let report = driver.run(&ids(&["7", "8"]), WriteMode::Overwrite).await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.succeeded, 0);

    assert!(!driver.stores().raw.exists("7"));
    assert!(!driver.stores().raw.exists("8"));
    assert!(!driver.stores().master.exists());

    let errors = driver.stores().errors.read_rows().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0][1], "7");
    assert_eq!(errors[0][2], "HTTP_404");
    assert_eq!(errors[1][1], "8");
    assert_eq!(errors[1][2], "HTTP_403");
    assert_eq!(
        errors[0][4],
        format!("URL: {}{}?INDEX=7", server.url(), CROSS_REFERENCE_PATH)
    );
    assert_eq!(
        errors[1][4],
        format!("URL: {}{}?INDEX=8", server.url(), CROSS_REFERENCE_PATH)
    );

    // Logged identifiers are not requested again.
    let rerun = driver.run(&ids(&["7", "8"]), WriteMode::Overwrite).await.unwrap();
    assert_eq!(rerun.skipped, 2);
    missing.assert_async().await;
    forbidden.assert_async().await;
}

#[tokio::test]
async fn test_short_response_is_logged_as_empty() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "3".into()))
        .with_status(200)
        .with_body("<html></html>")
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    let report = driver.run(&ids(&["3"]), WriteMode::Append).await.unwrap();

    assert_eq!(report.failed, 1);
    let errors = driver.stores().errors.read_rows().unwrap();
    assert_eq!(errors[0][2], "EMPTY_RESPONSE");
    assert_eq!(errors[0][4], "Content length: 13");
}

#[tokio::test]
async fn test_scratch_mode_starts_from_empty_state() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "42131".into()))
        .with_status(200)
        .with_body(CROSS_REFERENCE_PAGE)
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    let stores = driver.stores();

    let mut old = Record::new(&CROSS_REFERENCE);
    old.set("Website Index", "99");
    old.set("Original Bushing Information - Catalog Number", "OLD-1");
    stores.master.save(&old, WriteMode::Append).unwrap();
    stores.raw.save("99", "<html>old</html>").unwrap();
    stores
        .errors
        .record(&ErrorEntry::now("42131", "TIMEOUT", "Request timeout", ""))
        .unwrap();

    let report = driver.run(&ids(&["42131"]), WriteMode::Scratch).await.unwrap();
    assert_eq!(report.succeeded, 1);

    let rows = stores.master.read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "42131");
    assert!(!stores.errors.exists());
    assert!(!stores.raw.exists("99"));
    assert!(stores.raw.exists("42131"));
}

#[tokio::test]
async fn test_overwrite_replaces_existing_row() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "42131".into()))
        .with_status(200)
        .with_body(CROSS_REFERENCE_PAGE)
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    let mut old = Record::new(&CROSS_REFERENCE);
    old.set("Website Index", "42131");
    old.set("Original Bushing Information - Catalog Number", "OUTDATED");
    driver.stores().master.save(&old, WriteMode::Append).unwrap();

    let report = driver.run(&ids(&["42131"]), WriteMode::Overwrite).await.unwrap();
    assert_eq!(report.succeeded, 1);

    let rows = driver.stores().master.read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    let record = Record::from_row(&CROSS_REFERENCE, &rows[0]);
    assert_eq!(record.get("Original Bushing Information - Catalog Number"), "11B2345");
}

#[tokio::test]
async fn test_scratch_mode_keeps_one_row_for_repeated_identifiers() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "42131".into()))
        .with_status(200)
        .with_body(CROSS_REFERENCE_PAGE)
        .expect(2)
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    let report = driver
        .run(&ids(&["42131", "42131"]), WriteMode::Scratch)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 2);

    let rows = driver.stores().master.read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "42131");
}

#[tokio::test]
async fn test_failed_save_is_retried_on_next_append_run() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.url(), dir.path());

    // A plain file where the master list's directory should be makes every save fail.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "not a directory").unwrap();
    config.hitachi.cross_reference.master_csv = blocker.join("cross_reference.csv");

    server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "42131".into()))
        .with_status(200)
        .with_body(CROSS_REFERENCE_PAGE)
        .expect(2)
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    let first = driver.run(&ids(&["42131"]), WriteMode::Append).await.unwrap();
    assert_eq!(first.failed, 1);
    assert!(!driver.stores().raw.exists("42131"));

    std::fs::remove_file(&blocker).unwrap();

    let second = driver.run(&ids(&["42131"]), WriteMode::Append).await.unwrap();
    assert_eq!(second.skipped, 0);
    assert_eq!(second.succeeded, 1);
    assert_eq!(driver.stores().master.read_rows().unwrap().len(), 1);
    assert!(driver.stores().raw.exists("42131"));
}

#[tokio::test]
async fn test_server_error_is_logged_as_http_error() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    server
        .mock("GET", CROSS_REFERENCE_PATH)
        .match_query(Matcher::UrlEncoded("INDEX".into(), "500".into()))
        .with_status(500)
        .with_body("Internal Server Error")
        .create_async()
        .await;

    let driver = cross_reference_driver(&config);
    let report = driver.run(&ids(&["500"]), WriteMode::Append).await.unwrap();

    assert_eq!(report.failed, 1);
    let errors = driver.stores().errors.read_rows().unwrap();
    assert_eq!(errors[0][2], "HTTP_ERROR");
    assert_eq!(errors[0][3], format!("HTTP error 500: {}{}?INDEX=500", server.url(), CROSS_REFERENCE_PATH));
}

#[tokio::test]
async fn test_unreachable_host_is_logged_as_connection_error() {
    let dir = TempDir::new().unwrap();
    // Nothing listens on port 1, so the connection is refused.
    let config = test_config("http://127.0.0.1:1", dir.path());

    let driver = cross_reference_driver(&config);
    let report = driver.run(&ids(&["5"]), WriteMode::Append).await.unwrap();

    assert_eq!(report.failed, 1);
    let errors = driver.stores().errors.read_rows().unwrap();
    assert_eq!(errors[0][1], "5");
    assert_eq!(errors[0][2], "CONNECTION_ERROR");
    assert!(!errors[0][4].is_empty());
}

#[tokio::test]
async fn test_silent_server_is_logged_as_timeout() {
    let dir = TempDir::new().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut open = Vec::new();
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            open.push(socket);
        }
    });

    let mut config = test_config(&format!("http://{}", address), dir.path());
    config.timeout = Duration::from_millis(300);

    let driver = cross_reference_driver(&config);
    let report = driver.run(&ids(&["6"]), WriteMode::Append).await.unwrap();
    silent.abort();

    assert_eq!(report.failed, 1);
    let errors = driver.stores().errors.read_rows().unwrap();
    assert_eq!(errors[0][2], "TIMEOUT");
    assert_eq!(
        errors[0][4],
        format!("URL: http://{}{}?INDEX=6", address, CROSS_REFERENCE_PATH)
    );
}

#[tokio::test]
async fn test_catalog_not_found_marker_is_logged() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    let body = format!(
        "<html><head><title>Bushing Lookup</title></head><body><p>{}</p><p>Please check the style number and try again.</p></body></html>",
        bushing_scraper::hitachi::catalog::NOT_FOUND_MARKER
    );
    server
        .mock("GET", CATALOG_PATH)
        .match_query(Matcher::UrlEncoded("StyleNumber".into(), "ZZZ999".into()))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let driver = catalog_driver(&config);
    let report = driver.run(&ids(&["ZZZ999"]), WriteMode::Append).await.unwrap();

    assert_eq!(report.failed, 1);
    let errors = driver.stores().errors.read_rows().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0][1], "ZZZ999");
    assert_eq!(errors[0][2], "NOT_FOUND");
    assert!(!driver.stores().raw.exists("ZZZ999"));
}

#[tokio::test]
async fn test_catalog_fills_initialized_master_list() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.url(), dir.path());

    let cross = DatasetStores::new(&CROSS_REFERENCE, &config.hitachi.cross_reference);
    let mut row = Record::new(&CROSS_REFERENCE);
    row.set("Website Index", "1");
    row.set("Replacement Information - Replacement Bushing Manufacturer", "ABB");
    row.set("Replacement Information - ABB Style Number", "138N0812BA");
    cross.master.save(&row, WriteMode::Append).unwrap();

    server
        .mock("GET", CATALOG_PATH)
        .match_query(Matcher::UrlEncoded("StyleNumber".into(), "138N0812BA".into()))
        .with_status(200)
        .with_body(CATALOG_PAGE)
        .create_async()
        .await;

    let driver = catalog_driver(&config);
    let master = &driver.stores().master;
    assert_eq!(driver.source().initialize_master_list(master, false).unwrap(), Some(1));

    let styles = master.keys().unwrap();
    let report = driver.run(&styles, WriteMode::Append).await.unwrap();
    assert_eq!(report.succeeded, 1);

    let rows = master.read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    let record = Record::from_row(&CATALOG, &rows[0]);
    assert_eq!(record.key(), "138N0812BA");
    assert_eq!(record.get("Voltage Class"), "138 kV");
    assert_eq!(record.get("Apparatus"), "Transformer");
}
