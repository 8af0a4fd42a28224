use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::util::env::{env_opt, env_parse, env_path};

pub const DEFAULT_CATALOG_URL: &str =
    "https://marvelsnapzone.com/getinfo/?searchtype=cards&searchcardstype=true";
pub const DEFAULT_PAGE_SIZE: u32 = 30;
pub const DEFAULT_WORKERS: usize = 5;

/// How materialized images are named on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetNaming {
    /// Basename of the remote asset (card `art` URL, variant `art_filename`).
    #[default]
    Remote,
    /// `<cid>.png` for cards and `<cid>-<vid>.png` for variants.
    StableId,
}

impl FromStr for AssetNaming {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "basename" => Ok(AssetNaming::Remote),
            "id" | "stable" | "stable-id" => Ok(AssetNaming::StableId),
            other => bail!("unknown asset naming mode '{other}' (expected 'remote' or 'id')"),
        }
    }
}

/// Everything the store, client and orchestrator need. Built once and
/// passed to constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog_url: String,
    pub db_path: PathBuf,
    pub card_image_dir: PathBuf,
    pub variant_image_dir: PathBuf,
    pub page_size: u32,
    pub worker_pool_size: usize,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub asset_naming: AssetNaming,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            db_path: PathBuf::from("database/cards.db"),
            card_image_dir: PathBuf::from("static/images/cards"),
            variant_image_dir: PathBuf::from("static/images/variants"),
            page_size: DEFAULT_PAGE_SIZE,
            worker_pool_size: DEFAULT_WORKERS,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("snap-catalog/{}", env!("CARGO_PKG_VERSION")),
            asset_naming: AssetNaming::Remote,
        }
    }
}

impl AppConfig {
    /// Create config from environment variables (after loading .env).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let asset_naming = match env_opt("SNAP_ASSET_NAMING") {
            Some(raw) => raw.parse()?,
            None => defaults.asset_naming,
        };

        let catalog_url = match env_opt("SNAP_CATALOG_URL") {
            Some(raw) => checked_catalog_url(&raw)?,
            None => defaults.catalog_url,
        };

        Ok(Self {
            catalog_url,
            db_path: env_path("SNAP_DB_PATH", "database/cards.db"),
            card_image_dir: env_path("SNAP_CARD_IMAGE_DIR", "static/images/cards"),
            variant_image_dir: env_path("SNAP_VARIANT_IMAGE_DIR", "static/images/variants"),
            page_size: env_parse("SNAP_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1),
            worker_pool_size: env_parse("SNAP_WORKERS", DEFAULT_WORKERS).max(1),
            request_timeout: Duration::from_secs(env_parse("SNAP_HTTP_TIMEOUT_SECS", 30u64)),
            user_agent: env_opt("SNAP_USER_AGENT").unwrap_or(defaults.user_agent),
            asset_naming,
        })
    }
}

/// Catalog endpoint must be an absolute http(s) URL.
pub fn checked_catalog_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid catalog url '{raw}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => bail!("catalog url must be http(s), got '{other}'"),
    }
}
