//! Image materialization: download a remote image once and keep a PNG copy
//! at a deterministic path.
//!
//! Layout: `<dest_dir>/<stem>.png`. The stem comes from the remote file name
//! (query string stripped) or from a caller supplied name. Bytes are first
//! streamed to a hidden `*.download` temp file next to the target, decoded,
//! re-encoded to a second temp file and renamed into place, so readers never
//! see a partial PNG. Both temp files are removed on every exit path.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::MediaError;

pub const CANONICAL_EXTENSION: &str = "png";

/// Byte source for remote images.
#[async_trait]
pub trait AssetTransport: Send + Sync {
    /// Stream the body behind `url` into `sink`; returns bytes written.
    async fn download(&self, url: &str, sink: &mut tokio::fs::File) -> Result<u64, MediaError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AssetTransport for HttpTransport {
    async fn download(&self, url: &str, sink: &mut tokio::fs::File) -> Result<u64, MediaError> {
        let network = |reason: String| MediaError::Network {
            url: url.to_string(),
            reason,
        };
        let mut resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(network(format!("HTTP {}", resp.status())));
        }

        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(|e| network(e.to_string()))? {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl<T: AssetTransport + ?Sized> AssetTransport for Arc<T> {
    async fn download(&self, url: &str, sink: &mut tokio::fs::File) -> Result<u64, MediaError> {
        (**self).download(url, sink).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// Fetched and converted during this call.
    Downloaded(PathBuf),
    /// Canonical file was already on disk; no request was made.
    Existing(PathBuf),
}

impl Materialized {
    pub fn path(&self) -> &Path {
        match self {
            Materialized::Downloaded(p) | Materialized::Existing(p) => p,
        }
    }
}

/// Last path segment of `source` with query string and fragment removed.
pub fn remote_file_name(source: &str) -> Option<&str> {
    let no_query = source.split(['?', '#']).next().unwrap_or(source);
    let name = no_query.rsplit('/').next().unwrap_or(no_query).trim();
    (!name.is_empty()).then_some(name)
}

/// `Foo.webp?v=2` -> `Foo.png`; names without an extension get one appended.
pub fn canonical_file_name(name: &str) -> Option<String> {
    let base = remote_file_name(name)?;
    let stem = Path::new(base).file_stem()?.to_str()?;
    if stem.is_empty() || stem == "." || stem == ".." {
        return None;
    }
    Some(format!("{stem}.{CANONICAL_EXTENSION}"))
}

pub struct ImageFetcher<T> {
    transport: T,
}

impl<T: AssetTransport> ImageFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Materialize `source_url` under `dest_dir`, named after the URL's file name.
    pub async fn materialize(
        &self,
        source_url: &str,
        dest_dir: &Path,
    ) -> Result<Materialized, MediaError> {
        let file_name = canonical_file_name(source_url).ok_or_else(|| MediaError::Network {
            url: source_url.to_string(),
            reason: "url has no file name".into(),
        })?;
        self.materialize_as(source_url, &dest_dir.join(file_name))
            .await
    }

    /// Materialize `source_url` at an explicit canonical `target` path.
    /// Returns immediately, without any request, if `target` exists.
    #[instrument(skip(self, target), fields(target = %target.display()))]
    pub async fn materialize_as(
        &self,
        source_url: &str,
        target: &Path,
    ) -> Result<Materialized, MediaError> {
        if tokio::fs::try_exists(target).await? {
            debug!(url = source_url, "canonical image present; skipping download");
            return Ok(Materialized::Existing(target.to_path_buf()));
        }

        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let download = tempfile::Builder::new()
            .prefix(".snap-")
            .suffix(".download")
            .tempfile_in(&dir)?;
        let mut sink = tokio::fs::File::from_std(download.reopen()?);
        let bytes = self.transport.download(source_url, &mut sink).await?;
        drop(sink);
        debug!(url = source_url, bytes, "image downloaded");

        let url = source_url.to_string();
        let target_buf = target.to_path_buf();
        tokio::task::spawn_blocking(move || convert_to_png(download, &dir, &target_buf, &url))
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))??;

        Ok(Materialized::Downloaded(target.to_path_buf()))
    }
}

/// Decode `download` and write it as PNG at `target`. Takes the download
/// temp file by value so it is deleted when this returns, success or not.
fn convert_to_png(
    download: NamedTempFile,
    dir: &Path,
    target: &Path,
    url: &str,
) -> Result<(), MediaError> {
    let decode_err = |reason: String| MediaError::DecodeImage {
        url: url.to_string(),
        reason,
    };

    let img = ImageReader::open(download.path())?
        .with_guessed_format()?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;

    let mut staged = tempfile::Builder::new()
        .prefix(".snap-")
        .suffix(".png.part")
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        img.write_to(&mut writer, ImageFormat::Png)
            .map_err(|e| decode_err(format!("png encode: {e}")))?;
        writer.flush()?;
    }
    staged.persist(target).map_err(|e| MediaError::Io(e.error))?;
    Ok(())
}
