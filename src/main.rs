mod detail;
mod enrich;
mod error;
mod harvest;
mod http;
mod omdb;
mod output;
mod record;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use detail::DetailSelectors;
use enrich::Enricher;
use harvest::{HarvestReport, Harvester};
use http::ReqwestFetcher;
use omdb::OmdbClient;
use output::OutputTable;
use settings::Settings;

#[derive(Parser)]
#[command(name = "flixable_scraper", about = "Netflix titles from flixable, enriched with OMDb")]
struct Cli {
    /// Secrets/config file (extension optional: secrets.toml, secrets.json, ...)
    #[arg(short, long, global = true, default_value = "secrets")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest list pages, enrich every title and write the CSV
    Run {
        /// Number of list pages to harvest (default: site.pages)
        #[arg(short = 'n', long)]
        pages: Option<u32>,
        /// Directory for the output table (default: output.dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Abort on the first list page that fails
        #[arg(long)]
        fail_fast: bool,
    },
    /// Harvest list pages only and print title/url pairs
    Harvest {
        #[arg(short = 'n', long)]
        pages: Option<u32>,
        /// Abort on the first list page that fails
        #[arg(long)]
        fail_fast: bool,
    },
    /// Enrich a single detail page and print the record as JSON
    Enrich { url: url::Url },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading configuration from '{}'", cli.config))?;
    let fetcher = ReqwestFetcher::new(&settings.http)?;

    let result = match cli.command {
        Commands::Run {
            pages,
            output_dir,
            fail_fast,
        } => {
            let pages = pages.unwrap_or(settings.site.pages);
            let fail_fast = fail_fast || settings.site.fail_fast;
            let report = harvest_links(&fetcher, &settings, pages, fail_fast).await?;
            let urls = report.urls();
            if urls.is_empty() {
                println!("No titles harvested from {} pages.", pages);
                return Ok(());
            }

            let selectors = DetailSelectors::compile(&settings.selectors)?;
            let omdb = OmdbClient::new(settings.omdb_endpoint()?, settings.omdb_key.clone());
            let enricher = Enricher::new(&fetcher, &selectors, &omdb);
            println!("Enriching {} titles...", urls.len());
            let outcomes = enricher.enrich_all(&urls, true).await;

            let dir = output_dir.unwrap_or_else(|| PathBuf::from(&settings.output.dir));
            let path = output::output_path(&dir, &settings.output.prefix, chrono::Local::now());

            let failures: Vec<_> = outcomes.iter().filter_map(|o| o.failure()).collect();
            if settings.output.failure_report && !failures.is_empty() {
                let failure_path = output::failure_report_path(&path);
                std::fs::create_dir_all(&dir)?;
                let file = std::fs::File::create(&failure_path)?;
                output::write_failures(file, &failures)?;
                info!(path = %failure_path.display(), count = failures.len(), "wrote failure report");
            }

            let records = outcomes.into_iter().map(|o| o.into_record()).collect();
            let table = OutputTable::new(records);
            table
                .write_to_path(&path)
                .with_context(|| format!("writing {}", path.display()))?;

            println!(
                "Wrote {} rows ({} degraded) to {}",
                table.len(),
                table.degraded(),
                path.display()
            );
            Ok(())
        }
        Commands::Harvest { pages, fail_fast } => {
            let pages = pages.unwrap_or(settings.site.pages);
            let fail_fast = fail_fast || settings.site.fail_fast;
            let report = harvest_links(&fetcher, &settings, pages, fail_fast).await?;
            for link in &report.links {
                println!("{}\t{}", link.title, link.url);
            }
            Ok(())
        }
        Commands::Enrich { url } => {
            let selectors = DetailSelectors::compile(&settings.selectors)?;
            let omdb = OmdbClient::new(settings.omdb_endpoint()?, settings.omdb_key.clone());
            let outcome = Enricher::new(&fetcher, &selectors, &omdb).enrich(url.as_str()).await;
            if let Some((_, reason)) = outcome.failure() {
                eprintln!("degraded: {}", reason);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.into_record())?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn harvest_links(
    fetcher: &ReqwestFetcher,
    settings: &Settings,
    pages: u32,
    fail_fast: bool,
) -> anyhow::Result<HarvestReport> {
    let harvester = Harvester::from_settings(settings)?;
    let query = settings.query.first_page();
    let report = harvester
        .harvest_pages(fetcher, &query, pages, fail_fast)
        .await
        .context("harvesting list pages")?;

    if !report.failed_pages.is_empty() {
        let failed: Vec<u32> = report.failed_pages.iter().map(|(p, _)| *p).collect();
        warn!(?failed, "some list pages could not be fetched");
    }
    println!(
        "Harvested {} titles from {} pages ({} failed, {} duplicate urls).",
        report.links.len(),
        pages,
        report.failed_pages.len(),
        report.duplicates
    );
    Ok(report)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
