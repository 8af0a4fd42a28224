//! Error taxonomy for the sync pipeline and the catalog store.
//!
//! Stage-fatal errors (`CatalogError`, `StoreError`) abort a sync run and are
//! folded into `SyncError`. `MediaError` is per-item: the orchestrator records
//! it as a warning and keeps going.

use thiserror::Error;

/// Failures of the remote catalog fetch. Both variants abort the run before
/// anything is written.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Network(String),
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
}

/// Failures while materializing a single image.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image download failed for {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("downloaded image for {url} could not be decoded: {reason}")]
    DecodeImage { url: String, reason: String },
    #[error("image file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("card {0} not found")]
    NotFound(String),
    #[error("database directory could not be prepared: {0}")]
    Io(#[from] std::io::Error),
    #[error("store connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors that terminate a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Network(CatalogError),
    #[error(transparent)]
    Decode(CatalogError),
    #[error("persisting catalog failed: {0}")]
    Store(#[from] StoreError),
}

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Network(_) => SyncError::Network(err),
            CatalogError::Decode(_) => SyncError::Decode(err),
        }
    }
}
