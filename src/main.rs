use anyhow::{bail, Context};
use bushing_scraper::{
    batch::{BatchDriver, BushingSource},
    config::ScraperConfig,
    hitachi::{CatalogScraper, CrossReferenceScraper, CATALOG, CROSS_REFERENCE},
    hubbell::HubbellScraper,
    input::{
        index_range, parse_indices, parse_list, read_identifier_file, require_identifiers,
        single_identifier,
    },
    storage::DatasetStores,
    ScraperError, WriteMode, DEFAULT_DELAY_SECS,
};
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Scrapes electrical bushing data from Hitachi Energy and Hubbell into CSV master lists.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Configuration file layered over the defaults (TOML, YAML or JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape Hitachi cross-reference pages by index.
    HitachiCrossRef(CrossReferenceArgs),
    /// Scrape Hitachi catalog pages by ABB style number.
    HitachiCatalog(CatalogArgs),
    /// Enumerate Hubbell condenser bushings through the Algolia index.
    Hubbell(HubbellArgs),
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Seconds to wait between two requests.
    #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
    delay: f64,

    /// How existing data is treated.
    #[arg(long, value_enum, default_value_t = WriteMode::Append)]
    mode: WriteMode,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["start", "indices", "file"])))]
struct CrossReferenceArgs {
    /// First index of the range.
    #[arg(long, requires = "end")]
    start: Option<u64>,

    /// Last index of the range, inclusive.
    #[arg(long, requires = "start")]
    end: Option<u64>,

    /// Comma-separated indices.
    #[arg(long)]
    indices: Option<String>,

    /// File with one index per line.
    #[arg(long)]
    file: Option<PathBuf>,

    #[command(flatten)]
    batch: BatchArgs,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").args(["all", "style", "styles", "file"])))]
struct CatalogArgs {
    /// Create the catalog master list from the cross-reference master list.
    #[arg(long)]
    initialize: bool,

    /// Recreate the master list even if it exists.
    #[arg(long, requires = "initialize")]
    force: bool,

    /// Scrape every style number of the catalog master list.
    #[arg(long)]
    all: bool,

    /// A single style number.
    #[arg(long)]
    style: Option<String>,

    /// Comma-separated style numbers.
    #[arg(long)]
    styles: Option<String>,

    /// File with one style number per line.
    #[arg(long)]
    file: Option<PathBuf>,

    #[command(flatten)]
    batch: BatchArgs,
}

#[derive(Args, Debug)]
struct HubbellArgs {
    /// Where to write the product list; defaults to the configured path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Check kV class filtering on one brand and exit.
    #[arg(long, conflicts_with = "facets")]
    probe: bool,

    /// List the facets of the bushing category and exit.
    #[arg(long)]
    facets: bool,
}

/// The main entry point of the application.
///
/// Initializes logging, loads the configuration and dispatches to the requested scraper.
/// Per-item failures end up in the error logs; anything returned here is fatal.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ScraperConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let start_time = Instant::now();

    match cli.command {
        Command::HitachiCrossRef(args) => run_cross_reference(config, args).await?,
        Command::HitachiCatalog(args) => run_catalog(config, args).await?,
        Command::Hubbell(args) => run_hubbell(config, args).await?,
    }

    info!("Finished in {:.2?}", start_time.elapsed());
    Ok(())
}

async fn run_cross_reference(config: ScraperConfig, args: CrossReferenceArgs) -> anyhow::Result<()> {
    validate_delay(args.batch.delay)?;

    let indices = match (args.start, args.end, args.indices, args.file) {
        (Some(start), Some(end), _, _) => index_range(start, end)?,
        (_, _, Some(list), _) => parse_indices(parse_list(&list)),
        (_, _, _, Some(path)) => parse_indices(
            read_identifier_file(&path)
                .with_context(|| format!("failed to read index file {}", path.display()))?,
        ),
        _ => bail!("no indices given"),
    };
    let indices = require_identifiers(indices, "no valid indices given")?;

    let stores = DatasetStores::new(&CROSS_REFERENCE, &config.hitachi.cross_reference);
    let scraper = CrossReferenceScraper::new(config)?;
    run_batch(scraper, stores, &indices, &args.batch).await
}

async fn run_catalog(config: ScraperConfig, args: CatalogArgs) -> anyhow::Result<()> {
    validate_delay(args.batch.delay)?;

    let stores = DatasetStores::new(&CATALOG, &config.hitachi.catalog);
    let scraper = CatalogScraper::new(config)?;

    if args.initialize {
        match scraper.initialize_master_list(&stores.master, args.force)? {
            Some(count) => println!(
                "✓ Initialized {} with {} style numbers",
                stores.master.path().display(),
                count
            ),
            None => println!(
                "Master list already exists: {} (use --force to recreate)",
                stores.master.path().display()
            ),
        }
    }

    let styles = if args.all {
        if !stores.master.exists() {
            return Err(ScraperError::MissingMasterList(stores.master.path().to_path_buf()))
                .context("run with --initialize first");
        }
        stores.master.keys()?
    } else if let Some(style) = args.style {
        single_identifier(&style)
    } else if let Some(list) = args.styles {
        parse_list(&list)
    } else if let Some(path) = args.file {
        read_identifier_file(&path)
            .with_context(|| format!("failed to read style file {}", path.display()))?
    } else if args.initialize {
        return Ok(());
    } else {
        bail!("nothing to do: pass --initialize, --all, --style, --styles or --file");
    };
    let styles = require_identifiers(styles, "no style numbers given")?;

    run_batch(scraper, stores, &styles, &args.batch).await
}

async fn run_hubbell(config: ScraperConfig, args: HubbellArgs) -> anyhow::Result<()> {
    let output = args.output.unwrap_or_else(|| config.hubbell.output_csv.clone());
    let scraper = HubbellScraper::new(config)?;

    if args.probe {
        if !scraper.probe().await? {
            bail!("kV class filtering check failed");
        }
        println!("✓ kV class filtering works");
        return Ok(());
    }

    if args.facets {
        let result = scraper.explore_facets().await?;
        println!("Total products in category: {}", result.nb_hits);
        let mut facets: Vec<_> = result.facets.into_iter().collect();
        facets.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, values) in facets {
            println!("{} ({} values)", name, values.len());
            let mut values: Vec<_> = values.into_iter().collect();
            values.sort();
            for (value, count) in values {
                println!("  {}: {}", value, count);
            }
        }
        return Ok(());
    }

    let report = scraper.scrape_all_products(&output).await?;

    println!("\n{}", "=".repeat(70));
    println!("Hubbell Scraping Complete");
    println!("{}", "=".repeat(70));
    println!("Raw products collected: {}", report.raw);
    println!("Duplicates removed: {}", report.duplicates_removed());
    println!("Unique products: {}", report.unique);
    for (brand, count) in &report.brands {
        println!("  {}: {}", brand, count);
    }
    println!("\n✓ Data saved to: {}", output.display());
    Ok(())
}

async fn run_batch<S: BushingSource>(
    source: S,
    stores: DatasetStores,
    identifiers: &[String],
    args: &BatchArgs,
) -> anyhow::Result<()> {
    let driver = BatchDriver::new(source, stores, args.delay);
    let report = driver.run(identifiers, args.mode).await?;
    driver.print_summary(&report, args.mode);
    Ok(())
}

fn validate_delay(delay: f64) -> anyhow::Result<()> {
    if !delay.is_finite() || delay < 0.0 {
        bail!("--delay must be a non-negative number of seconds, got {}", delay);
    }
    Ok(())
}
