//! Marvel Snap Zone catalog provider.

pub mod client;

pub use client::{CatalogSource, SnapZoneClient};

use crate::config::AppConfig;

/// Shared reqwest client for catalog and image requests.
pub fn http_client(config: &AppConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout)
        .build()
}
