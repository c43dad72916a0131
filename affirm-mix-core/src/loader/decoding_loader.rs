use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::decoder::{decode_bytes, FormatHint};
use super::handles::HandleRegistry;
use crate::models::error::MixerError;
use crate::models::source::{AudioBuffer, AudioSource};
use crate::traits::source_loader::SourceLoader;

/// Default `SourceLoader`: fetches over HTTP(S) or from disk and decodes
/// with symphonia on a blocking worker.
///
/// Supported inputs:
/// - `http://` / `https://` URLs
/// - `file://` URLs and plain filesystem paths
/// - in-memory blobs, tracked by a temporary `blob:` handle while decoding
#[derive(Debug, Clone)]
pub struct DecodingLoader {
    client: Client,
    handles: HandleRegistry,
}

impl DecodingLoader {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            handles: HandleRegistry::new(),
        }
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Blob handles currently held by in-flight loads.
    pub fn live_handles(&self) -> usize {
        self.handles.live_handles()
    }

    async fn load_url(&self, location: &str) -> Result<AudioBuffer, MixerError> {
        let (bytes, hint) = match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.fetch_http(url).await?,
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| MixerError::Fetch(format!("invalid file URL: {}", location)))?;
                read_file(&path).await?
            }
            // Single-letter schemes are Windows drive letters.
            Ok(url) if url.scheme().len() > 1 => {
                return Err(MixerError::Fetch(format!("unsupported URL scheme: {}", url.scheme())));
            }
            _ => read_file(&PathBuf::from(location)).await?,
        };
        decode_blocking(bytes, hint).await
    }

    async fn fetch_http(&self, url: Url) -> Result<(Arc<[u8]>, FormatHint), MixerError> {
        log::debug!("Fetching {}", url);
        let extension = extension_of(Path::new(url.path()));

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MixerError::Fetch(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MixerError::Fetch(format!("{} returned HTTP {}", url, status.as_u16())));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(mime_essence);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MixerError::Fetch(format!("failed to read body of {}: {}", url, e)))?;

        Ok((Arc::from(&bytes[..]), FormatHint { extension, mime }))
    }

    async fn load_blob(&self, bytes: Arc<[u8]>, mime: Option<String>) -> Result<AudioBuffer, MixerError> {
        // Held across the decode so the handle is released on every exit path,
        // including cancellation of this future.
        let handle = self.handles.register();
        log::debug!("Decoding {} ({} bytes)", handle.id(), bytes.len());

        let result = decode_blocking(bytes, FormatHint { extension: None, mime }).await;
        drop(handle);
        result
    }
}

impl Default for DecodingLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceLoader for DecodingLoader {
    async fn load(&self, source: AudioSource) -> Result<AudioBuffer, MixerError> {
        match source {
            AudioSource::Url(location) => self.load_url(&location).await,
            AudioSource::Blob { bytes, mime } => self.load_blob(bytes, mime).await,
        }
    }
}

async fn read_file(path: &Path) -> Result<(Arc<[u8]>, FormatHint), MixerError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| MixerError::Fetch(format!("failed to read {}: {}", path.display(), e)))?;
    Ok((
        Arc::from(bytes),
        FormatHint {
            extension: extension_of(path),
            mime: None,
        },
    ))
}

async fn decode_blocking(bytes: Arc<[u8]>, hint: FormatHint) -> Result<AudioBuffer, MixerError> {
    tokio::task::spawn_blocking(move || decode_bytes(bytes, &hint))
        .await
        .map_err(|e| MixerError::Decode(format!("decoder task failed: {}", e)))?
}

/// `audio/mpeg; charset=binary` → `audio/mpeg`. Empty values give no hint.
fn mime_essence(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next().unwrap_or(content_type).trim();
    (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
