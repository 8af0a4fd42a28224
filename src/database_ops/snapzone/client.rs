use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::CatalogError;
use crate::normalization::card::{normalize_catalog, NormalizedCatalog};

/// Where a sync run gets its catalog from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<NormalizedCatalog, CatalogError>;
}

/// HTTP client for the `getinfo?searchtype=cards` endpoint.
#[derive(Clone)]
pub struct SnapZoneClient {
    http: reqwest::Client,
    url: String,
}

impl SnapZoneClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for SnapZoneClient {
    /// One GET; any transport or status failure is a `Network` error and no
    /// partial catalog is returned.
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_catalog(&self) -> Result<NormalizedCatalog, CatalogError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = %status, "catalog endpoint returned non-success status");
            return Err(CatalogError::Network(format!("HTTP {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        let catalog = decode_catalog(&body)?;

        info!(
            cards = catalog.cards.len(),
            warnings = catalog.warnings.len(),
            "catalog fetched"
        );
        Ok(catalog)
    }
}

/// Decode and normalize a raw response body.
pub fn decode_catalog(body: &str) -> Result<NormalizedCatalog, CatalogError> {
    if body.trim().is_empty() {
        return Err(CatalogError::Decode("empty response body".into()));
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| CatalogError::Decode(e.to_string()))?;
    Ok(normalize_catalog(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::media::tests::serve_fixed;

    #[test]
    fn empty_body_is_decode_error() {
        assert!(matches!(decode_catalog("  \n"), Err(CatalogError::Decode(_))));
    }

    #[test]
    fn malformed_json_is_decode_error() {
        let err = decode_catalog("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)));
    }

    #[test]
    fn decodes_envelope() {
        let body = r#"{"success":{"cards":[{"cid":"a1","name":"Ant-Man","cost":1,"power":1}]}}"#;
        let catalog = decode_catalog(body).unwrap();
        assert_eq!(catalog.cards.len(), 1);
        assert_eq!(catalog.cards[0].name.as_deref(), Some("Ant-Man"));
    }

    #[tokio::test]
    async fn error_status_is_network_error() {
        let base = serve_fixed("500 Internal Server Error", br#"{"success":{"cards":[]}}"#.to_vec()).await;
        let client = SnapZoneClient::new(reqwest::Client::new(), format!("{base}/getinfo/"));
        let err = client.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, CatalogError::Network(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn success_status_decodes_body() {
        let base = serve_fixed("200 OK", br#"{"success":{"cards":[{"cid":"x"}]}}"#.to_vec()).await;
        let client = SnapZoneClient::new(reqwest::Client::new(), base);
        let catalog = client.fetch_catalog().await.unwrap();
        assert_eq!(catalog.cards[0].cid, "x");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let client = SnapZoneClient::new(reqwest::Client::new(), "http://127.0.0.1:9/cards");
        let err = client.fetch_catalog().await.unwrap_err();
        assert!(matches!(err, CatalogError::Network(_)));
    }
}
