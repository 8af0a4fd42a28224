pub mod api;
pub mod config;
pub mod database_ops;
pub mod error;
pub mod logging;
pub mod normalization;
pub mod orchestrator;

pub mod util {
    pub mod env;
}

pub use config::AppConfig;
pub use database_ops::db::CatalogStore;
pub use error::{CatalogError, MediaError, StoreError, SyncError};
pub use orchestrator::{sync_from_config, SyncOrchestrator, SyncPhase, SyncResult};
