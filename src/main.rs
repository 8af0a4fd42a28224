use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use snap_catalog::config::{AppConfig, AssetNaming};
use snap_catalog::database_ops::db::CatalogStore;
use snap_catalog::logging::init_tracing;
use snap_catalog::normalization::filters::CardFilters;
use snap_catalog::orchestrator::sync_from_config;
use snap_catalog::util::env as env_util;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "snapcat", version, about = "Marvel Snap card catalog sync and query tool")]
struct Cli {
    /// SQLite database path (overrides SNAP_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Fetch the remote catalog, materialize images and persist everything
    Sync(SyncArgs),
    /// Page through stored cards with the same filters as the web search
    List(ListArgs),
    /// Print one card and its variants as JSON
    Show {
        /// Card id
        cid: String,
    },
    /// Create the schema if missing and exit
    InitDb,
}

#[derive(Debug, Default, Args)]
struct SyncArgs {
    /// Concurrent image downloads (overrides SNAP_WORKERS)
    #[arg(long)]
    workers: Option<usize>,
    /// Image naming: `remote` (remote basename) or `id` (cid based)
    #[arg(long)]
    naming: Option<String>,
    /// Catalog endpoint (overrides SNAP_CATALOG_URL)
    #[arg(long)]
    url: Option<String>,
    /// Print the full result, warnings included, as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Default, Args)]
struct ListArgs {
    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Case-insensitive name substring
    #[arg(long, short)]
    query: Option<String>,
    /// Cost buckets, comma separated (1 = 1 or less, 6 = 6 or more)
    #[arg(long)]
    cost: Option<String>,
    /// Power buckets, comma separated
    #[arg(long)]
    power: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info,snap_catalog=info")?;

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Command::Sync(args) => run_sync(config, args).await,
        Command::List(args) => run_list(&config, args).await,
        Command::Show { cid } => run_show(&config, cid).await,
        Command::InitDb => {
            let path = config.db_path.clone();
            tokio::task::spawn_blocking(move || CatalogStore::open(&path, config.page_size))
                .await??;
            info!(path = %config.db_path.display(), "schema ready");
            Ok(())
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<CatalogStore>> {
    let path = config.db_path.clone();
    let page_size = config.page_size;
    let store = tokio::task::spawn_blocking(move || CatalogStore::open(&path, page_size))
        .await?
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    Ok(Arc::new(store))
}

async fn run_sync(mut config: AppConfig, args: SyncArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        config.worker_pool_size = workers.max(1);
    }
    if let Some(naming) = args.naming.as_deref() {
        config.asset_naming = naming.parse::<AssetNaming>()?;
    }
    if let Some(url) = args.url.as_deref() {
        config.catalog_url = snap_catalog::config::checked_catalog_url(url)?;
    }

    let store = open_store(&config).await?;
    let result = match sync_from_config(&config, store).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "sync failed");
            return Err(e);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "cards {} persisted / {} processed, variants {} (dropped {}), images {} downloaded / {} skipped / {} failed, {} warnings",
            result.cards_persisted,
            result.cards_processed,
            result.variants_persisted,
            result.variants_dropped,
            result.images_downloaded,
            result.images_skipped,
            result.images_failed,
            result.warnings.len()
        );
    }
    Ok(())
}

async fn run_list(config: &AppConfig, args: ListArgs) -> Result<()> {
    let store = open_store(config).await?;
    let filters = CardFilters::from_query(
        args.query.as_deref(),
        args.cost.as_deref(),
        args.power.as_deref(),
    );
    let page = args.page;
    let result = tokio::task::spawn_blocking(move || store.query_cards(page, &filters)).await??;

    for card in &result.cards {
        println!(
            "{:<24} {:<28} cost {:>3} power {:>3}",
            card.cid,
            card.name.as_deref().unwrap_or("-"),
            card.cost.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            card.power.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    println!(
        "page {}/{} ({} cards)",
        result.current_page, result.total_pages, result.total_cards
    );
    Ok(())
}

async fn run_show(config: &AppConfig, cid: String) -> Result<()> {
    let store = open_store(config).await?;
    let detail = tokio::task::spawn_blocking(move || store.get_card(&cid)).await??;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}
