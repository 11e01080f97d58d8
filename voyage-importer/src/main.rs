use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use voyage_core::storage::{AssetStore, FsAssetStore, InMemoryCatalog};
use voyage_importer::config::ImporterConfig;
use voyage_importer::observability::init_logging;
use voyage_importer::operator::{AutoOperator, OperatorChannel, TerminalOperator};
use voyage_importer::pipeline::assets::{AssetFetcher, HttpAssetFetcher};
use voyage_importer::pipeline::orchestrator::ImportPipeline;
use voyage_importer::pipeline::verify::SelfVerifier;
use voyage_importer::source::SourceDocument;
use voyage_importer::draft::Draft;

#[derive(Parser)]
#[command(name = "voyage-importer")]
#[command(about = "Itinerary import pipeline with verification and preview gating")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a source document without touching the catalog
    Verify {
        /// Path to the source JSON document
        #[arg(long)]
        source: PathBuf,
    },
    /// Run the full import pipeline for a source document
    Import {
        /// Path to the source JSON document
        #[arg(long)]
        source: PathBuf,
        /// Path to the catalog snapshot file
        #[arg(long)]
        catalog: PathBuf,
        /// Optional importer config TOML
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured asset store directory
        #[arg(long)]
        assets_dir: Option<PathBuf>,
        /// Answer every prompt automatically (best candidate, confirm)
        #[arg(long)]
        yes: bool,
    },
    /// Create or top up a catalog snapshot's sea-day placeholder pool
    Init {
        /// Path to the catalog snapshot file
        #[arg(long)]
        catalog: PathBuf,
        /// Number of sea-day placeholder slots to provision
        #[arg(long, default_value_t = 4)]
        sea_days: u8,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    init_logging();

    match cli.command {
        Commands::Verify { source } => {
            let doc = SourceDocument::from_path(&source)?;
            let draft = Draft::from_source(&doc)?;
            let report = SelfVerifier::new().verify(&draft, &doc);
            for check in &report.checks {
                let mark = if check.passed { "✅" } else { "❌" };
                println!("{} {}: {}", mark, check.check_name, check.detail);
            }
            if !report.passed() {
                anyhow::bail!("{} check(s) failed", report.failures().len());
            }
            println!("All checks passed for '{}'", doc.trip.name);
        }
        Commands::Import {
            source,
            catalog,
            config,
            assets_dir,
            yes,
        } => {
            let mut cfg = ImporterConfig::load(config.as_deref())?;
            if let Some(dir) = assets_dir {
                cfg.assets_dir = dir.display().to_string();
            }
            let doc = SourceDocument::from_path(&source)?;

            info!("Loading catalog snapshot from {}", catalog.display());
            let store = InMemoryCatalog::load_from_path(&catalog)?;

            let channel: Box<dyn OperatorChannel> = if yes {
                Box::new(AutoOperator)
            } else {
                Box::new(TerminalOperator)
            };
            let fetcher: Arc<dyn AssetFetcher> = Arc::new(HttpAssetFetcher::new());
            let asset_store: Arc<dyn AssetStore> = Arc::new(FsAssetStore::new(
                PathBuf::from(&cfg.assets_dir),
                cfg.internal_asset_prefix.clone(),
            ));

            let pipeline = ImportPipeline::new(
                &store,
                channel.as_ref(),
                fetcher,
                asset_store,
                cfg.internal_asset_prefix.clone(),
                cfg.all_aboard_buffer_minutes,
                cfg.asset_fetch_retries,
                cfg.asset_fetch_workers,
            );
            let report = pipeline.run(&doc).await?;

            store.save_to_path(&catalog)?;
            println!(
                "✅ Imported trip {} ({} stops, {} new locations, {} updated)",
                report.receipt.trip_id,
                report.receipt.stop_count,
                report.receipt.locations_created,
                report.receipt.locations_updated
            );
            for entry in &report.decisions {
                println!("  • {}", entry);
            }
        }
        Commands::Init { catalog, sea_days } => {
            let store = InMemoryCatalog::load_from_path(&catalog)?;
            let ids = store.seed_sea_day_pool(sea_days);
            store.save_to_path(&catalog)?;
            println!(
                "Catalog at {} now has {} sea-day slot(s)",
                catalog.display(),
                ids.len()
            );
        }
    }

    Ok(())
}
