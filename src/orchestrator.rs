//! Sync pipeline: fetch the remote catalog, materialize artwork, persist.
//!
//! Phases run `Fetching -> Materializing -> Persisting -> Done`. Only the
//! fetch (and a store failure while persisting) can end a run early; image
//! failures are collected per item and reported in the `SyncResult`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{stream, StreamExt};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::{AppConfig, AssetNaming};
use crate::database_ops::db::{Card, CatalogStore, Variant};
use crate::database_ops::media::{
    canonical_file_name, AssetTransport, HttpTransport, ImageFetcher, Materialized,
    CANONICAL_EXTENSION,
};
use crate::database_ops::snapzone::{self, CatalogSource, SnapZoneClient};
use crate::error::{MediaError, StoreError, SyncError};
use crate::normalization::card::{NormalizedCard, NormalizedCatalog, RecordWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Fetching,
    Materializing,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Fetching => "fetching",
            SyncPhase::Materializing => "materializing",
            SyncPhase::Persisting => "persisting",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-run summary handed back to the operator. Not persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub phase: SyncPhase,
    pub cards_processed: usize,
    pub cards_persisted: usize,
    pub variants_persisted: usize,
    pub variants_dropped: usize,
    pub images_downloaded: usize,
    pub images_skipped: usize,
    pub images_failed: usize,
    pub warnings: Vec<RecordWarning>,
}

impl SyncResult {
    pub fn log_summary(&self) {
        info!(
            phase = %self.phase,
            cards_processed = self.cards_processed,
            cards_persisted = self.cards_persisted,
            variants_persisted = self.variants_persisted,
            variants_dropped = self.variants_dropped,
            images_downloaded = self.images_downloaded,
            images_skipped = self.images_skipped,
            images_failed = self.images_failed,
            warnings = self.warnings.len(),
            "sync finished"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum AssetOwner {
    Card { cid: String },
    Variant { cid: String, index: usize, vid: Option<String> },
}

impl AssetOwner {
    fn warning(&self, message: String) -> RecordWarning {
        match self {
            AssetOwner::Card { cid } => RecordWarning::card(Some(cid), message),
            AssetOwner::Variant { cid, vid, .. } => {
                RecordWarning::variant(cid, vid.as_deref(), message)
            }
        }
    }
}

/// One file to materialize; several owners may share it.
#[derive(Debug)]
struct AssetJob {
    url: String,
    target: PathBuf,
    owners: Vec<AssetOwner>,
}

#[derive(Default)]
struct AssetPlan {
    jobs: Vec<AssetJob>,
    by_target: HashMap<PathBuf, usize>,
}

impl AssetPlan {
    fn add(
        &mut self,
        url: &str,
        target: PathBuf,
        owner: AssetOwner,
        warnings: &mut Vec<RecordWarning>,
    ) {
        if let Some(&idx) = self.by_target.get(&target) {
            let job = &mut self.jobs[idx];
            if job.url != url {
                warn!(
                    target = %target.display(),
                    kept = %job.url,
                    ignored = url,
                    "two remote images map to the same local file"
                );
                warnings.push(
                    owner
                        .warning(format!(
                            "image file name collides with {}; sharing {}",
                            job.url,
                            target.display()
                        ))
                        .with_url(url),
                );
            }
            job.owners.push(owner);
            return;
        }
        self.by_target.insert(target.clone(), self.jobs.len());
        self.jobs.push(AssetJob {
            url: url.to_string(),
            target,
            owners: vec![owner],
        });
    }
}

/// Reversible file-name encoding of a remote id: `[a-z0-9-]` pass through,
/// every other byte becomes `_XX` (uppercase hex). Distinct ids never share
/// a name, even on case-insensitive filesystems.
fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}

fn id_file_name(id: &str) -> String {
    format!("{}.{CANONICAL_EXTENSION}", encode_id(id))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

pub struct SyncOrchestrator<S, T> {
    source: S,
    fetcher: ImageFetcher<T>,
    store: Arc<CatalogStore>,
    card_dir: PathBuf,
    variant_dir: PathBuf,
    workers: usize,
    naming: AssetNaming,
}

impl<S: CatalogSource, T: AssetTransport> SyncOrchestrator<S, T> {
    pub fn new(config: &AppConfig, source: S, transport: T, store: Arc<CatalogStore>) -> Self {
        Self {
            source,
            fetcher: ImageFetcher::new(transport),
            store,
            card_dir: config.card_image_dir.clone(),
            variant_dir: config.variant_image_dir.clone(),
            workers: config.worker_pool_size.max(1),
            naming: config.asset_naming,
        }
    }

    fn enter(&self, result: &mut SyncResult, phase: SyncPhase) {
        result.phase = phase;
        info!(phase = %phase, "sync phase");
    }

    /// Run one full sync. Returns `Err` only for a failed catalog fetch or a
    /// failed store commit; everything else ends in `Done`.
    #[instrument(skip(self), fields(workers = self.workers))]
    pub async fn run(&self) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::default();

        self.enter(&mut result, SyncPhase::Fetching);
        let catalog = match self.source.fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                result.phase = SyncPhase::Failed;
                error!(error = %e, phase = %result.phase, "catalog fetch failed; nothing written");
                return Err(e.into());
            }
        };
        let cards = self.absorb_catalog(catalog, &mut result);

        self.enter(&mut result, SyncPhase::Materializing);
        let plan = self.plan_assets(&cards, &mut result.warnings);
        let local_paths = self.materialize(plan, &mut result).await;

        self.enter(&mut result, SyncPhase::Persisting);
        let entries = build_rows(cards, &local_paths);
        let store = Arc::clone(&self.store);
        let persisted = tokio::task::spawn_blocking(move || store.persist_catalog(&entries))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))
            .and_then(|r| r);
        let stats = match persisted {
            Ok(stats) => stats,
            Err(e) => {
                result.phase = SyncPhase::Failed;
                error!(error = %e, phase = %result.phase, "persist failed; previous snapshot kept");
                return Err(e.into());
            }
        };
        result.cards_persisted = stats.cards;
        result.variants_persisted = stats.variants;

        self.enter(&mut result, SyncPhase::Done);
        Ok(result)
    }

    /// Keep the first record per `cid` and fold normalization warnings in.
    fn absorb_catalog(
        &self,
        catalog: NormalizedCatalog,
        result: &mut SyncResult,
    ) -> Vec<NormalizedCard> {
        result.warnings.extend(catalog.warnings);
        result.variants_dropped = catalog.variants_dropped;

        let mut seen: HashSet<String> = HashSet::new();
        let mut cards = Vec::with_capacity(catalog.cards.len());
        for card in catalog.cards {
            if !seen.insert(card.cid.clone()) {
                warn!(cid = %card.cid, "duplicate card in catalog; keeping first");
                result
                    .warnings
                    .push(RecordWarning::card(Some(&card.cid), "duplicate cid in catalog; ignored"));
                continue;
            }
            cards.push(card);
        }
        result.cards_processed = cards.len();
        cards
    }

    fn card_target(&self, card: &NormalizedCard, url: &str) -> Option<PathBuf> {
        let name = match self.naming {
            AssetNaming::Remote => canonical_file_name(url)?,
            AssetNaming::StableId => id_file_name(&card.cid),
        };
        Some(self.card_dir.join(name))
    }

    fn variant_target(
        &self,
        cid: &str,
        index: usize,
        vid: Option<&str>,
        art_filename: &str,
    ) -> Option<PathBuf> {
        match self.naming {
            AssetNaming::Remote => Some(self.variant_dir.join(canonical_file_name(art_filename)?)),
            // `<variant_dir>/<cid>/<vid>.png`; `_n<index>` cannot come out of
            // `encode_id`, so it never meets a real vid.
            AssetNaming::StableId => {
                let name = match vid {
                    Some(vid) => id_file_name(vid),
                    None => format!("_n{index}.{CANONICAL_EXTENSION}"),
                };
                Some(self.variant_dir.join(encode_id(cid)).join(name))
            }
        }
    }

    fn plan_assets(
        &self,
        cards: &[NormalizedCard],
        warnings: &mut Vec<RecordWarning>,
    ) -> AssetPlan {
        let mut plan = AssetPlan::default();
        for card in cards {
            match card.art.as_deref() {
                None => warnings.push(RecordWarning::card(Some(&card.cid), "card has no artwork url")),
                Some(url) => match self.card_target(card, url) {
                    Some(target) => plan.add(
                        url,
                        target,
                        AssetOwner::Card { cid: card.cid.clone() },
                        warnings,
                    ),
                    None => warnings.push(
                        RecordWarning::card(Some(&card.cid), "artwork url has no file name")
                            .with_url(url),
                    ),
                },
            }

            for (index, variant) in card.variants.iter().enumerate() {
                let owner = AssetOwner::Variant {
                    cid: card.cid.clone(),
                    index,
                    vid: variant.vid.clone(),
                };
                match self.variant_target(&card.cid, index, variant.vid.as_deref(), &variant.art_filename) {
                    Some(target) => plan.add(&variant.art, target, owner, warnings),
                    None => warnings.push(
                        owner
                            .warning(format!("unusable art_filename '{}'", variant.art_filename))
                            .with_url(&variant.art),
                    ),
                }
            }
        }
        plan
    }

    /// Bounded fan-out over the plan; returns the local path (or `None`) per owner.
    async fn materialize(
        &self,
        plan: AssetPlan,
        result: &mut SyncResult,
    ) -> HashMap<AssetOwner, Option<String>> {
        info!(assets = plan.jobs.len(), workers = self.workers, "materializing images");
        let fetcher = &self.fetcher;
        let outcomes: Vec<(AssetJob, Result<Materialized, MediaError>)> = stream::iter(plan.jobs)
            .map(|job| async move {
                let outcome = fetcher.materialize_as(&job.url, &job.target).await;
                (job, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut local = HashMap::new();
        for (job, outcome) in outcomes {
            let path = match outcome {
                Ok(m) => {
                    match m {
                        Materialized::Downloaded(_) => result.images_downloaded += 1,
                        Materialized::Existing(_) => result.images_skipped += 1,
                    }
                    Some(path_string(m.path()))
                }
                Err(e) => {
                    result.images_failed += 1;
                    for owner in &job.owners {
                        warn!(url = %job.url, owner = ?owner, error = %e, "image materialization failed");
                        result
                            .warnings
                            .push(owner.warning(e.to_string()).with_url(&job.url));
                    }
                    None
                }
            };
            for owner in job.owners {
                local.insert(owner, path.clone());
            }
        }
        local
    }
}

/// Substitute local paths for remote URLs and shape rows for the store.
fn build_rows(
    cards: Vec<NormalizedCard>,
    local: &HashMap<AssetOwner, Option<String>>,
) -> Vec<(Card, Vec<Variant>)> {
    cards
        .into_iter()
        .map(|card| {
            let art = local
                .get(&AssetOwner::Card { cid: card.cid.clone() })
                .cloned()
                .flatten();
            let variants = card
                .variants
                .into_iter()
                .enumerate()
                .map(|(index, v)| {
                    let owner = AssetOwner::Variant {
                        cid: card.cid.clone(),
                        index,
                        vid: v.vid.clone(),
                    };
                    let variant_image = local.get(&owner).cloned().flatten();
                    Variant {
                        variant_id: None,
                        cid: card.cid.clone(),
                        vid: v.vid,
                        variant_url: Some(v.art),
                        variant_image,
                        rarity: v.rarity,
                        rarity_slug: v.rarity_slug,
                        variant_order: v.variant_order,
                        status: v.status,
                        full_description: v.full_description,
                        inker: v.inker,
                        sketcher: v.sketcher,
                        colorist: v.colorist,
                        release_date: v.release_date,
                    }
                })
                .collect();
            let row = Card {
                cid: card.cid,
                name: card.name,
                card_type: card.card_type,
                cost: card.cost,
                power: card.power,
                ability: card.ability,
                flavor: card.flavor,
                art,
                alternate_art: card.alternate_art,
                url: card.url,
                status: card.status,
                carddefid: card.carddefid,
            };
            (row, variants)
        })
        .collect()
}

/// Wire the HTTP client, catalog client and image transport from `config`
/// and run one sync against `store`.
pub async fn sync_from_config(
    config: &AppConfig,
    store: Arc<CatalogStore>,
) -> anyhow::Result<SyncResult> {
    let http = snapzone::http_client(config)?;
    let source = SnapZoneClient::new(http.clone(), config.catalog_url.clone());
    let orchestrator = SyncOrchestrator::new(config, source, HttpTransport::new(http), store);
    let result = orchestrator.run().await?;
    result.log_summary();
    Ok(result)
}
