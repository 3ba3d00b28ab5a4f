//! Top-level download coordination.

use std::{num::NonZeroU32, sync::Arc};

use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{HinaError, HinaResult},
    fetch::SegmentFetcher,
    key::KeyCache,
    merge::{self, TransportStream},
    playlist,
    util::http::{sanitize_headers, HttpClient},
};

/// Runs one HLS acquisition job: manifest fetch, variant selection,
/// segment download and assembly.
///
/// Manifest and media-playlist fetches are fatal on failure; segment and
/// key failures degrade (empty or undecrypted slots) without failing the
/// job.
pub struct HlsDownloader {
    client: HttpClient,
    concurrency: NonZeroU32,
    cancel: CancellationToken,
}

impl HlsDownloader {
    /// Builds a downloader replaying the captured page headers, with
    /// credential-sensitive ones stripped.
    pub fn new(headers: HeaderMap) -> Self {
        let client = HttpClient::new(
            reqwest::Client::builder().default_headers(sanitize_headers(&headers)),
        );
        Self::with_client(client)
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self {
            client,
            concurrency: NonZeroU32::new(5).unwrap(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: NonZeroU32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Token for aborting an in-flight job. Once cancelled, no new
    /// fetches are issued and the job fails with [`HinaError::Canceled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn download(&self, manifest_url: &str) -> HinaResult<TransportStream> {
        let manifest = self.fetch_text(manifest_url).await?;

        let (media_url, media_playlist) = if playlist::is_master_playlist(&manifest) {
            let variant_url = playlist::best_variant_url(&manifest, manifest_url)?;
            tracing::info!("Master playlist detected. Switching to best variant: {variant_url}");
            let media_playlist = self.fetch_text(&variant_url).await?;
            (variant_url, media_playlist)
        } else {
            (manifest_url.to_string(), manifest)
        };

        let segments = playlist::parse_media_playlist(&media_playlist, &media_url)?;
        tracing::info!("Found {} segments. Starting download...", segments.len());

        let keys = Arc::new(KeyCache::new(self.client.clone()));
        let fetcher = SegmentFetcher::new(
            self.client.clone(),
            keys,
            self.concurrency,
            self.cancel.clone(),
        );
        let buffers = fetcher.fetch_all(segments).await?;

        tracing::info!("Merging segments...");
        Ok(merge::concat(buffers))
    }

    async fn fetch_text(&self, url: &str) -> HinaResult<String> {
        if self.cancel.is_cancelled() {
            return Err(HinaError::Canceled);
        }
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(HinaError::HttpError(response.status()));
        }
        Ok(response.text().await?)
    }
}
