//! Bounded-concurrency segment fetching.
//!
//! Workers claim segment indices from a shared cursor, so a slow segment
//! never starves the rest, and write their result into the slot reserved
//! for that index. Output order is playlist order, never completion
//! order.

use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use tokio_util::sync::CancellationToken;

use crate::{
    decrypt::derive_iv,
    error::{HinaError, HinaResult},
    key::KeyCache,
    playlist::MediaSegment,
    util::http::HttpClient,
};

pub struct SegmentFetcher {
    client: HttpClient,
    keys: Arc<KeyCache>,
    concurrency: NonZeroU32,
    cancel: CancellationToken,
}

impl SegmentFetcher {
    pub fn new(
        client: HttpClient,
        keys: Arc<KeyCache>,
        concurrency: NonZeroU32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            keys,
            concurrency,
            cancel,
        }
    }

    /// Fetches (and decrypts) every segment, returning exactly one buffer
    /// per segment in playlist order.
    ///
    /// A segment failing twice in a row leaves a zero-length buffer in
    /// its slot; the job itself only fails on cancellation.
    pub async fn fetch_all(&self, segments: Vec<MediaSegment>) -> HinaResult<Vec<Vec<u8>>> {
        let total = segments.len();
        let segments = Arc::new(segments);
        let results = Arc::new(Mutex::new(vec![Vec::new(); total]));
        let cursor = Arc::new(AtomicUsize::new(0));

        tracing::info!(
            "Fetching {total} segments with {} workers.",
            self.concurrency.get()
        );

        let mut workers = Vec::with_capacity(self.concurrency.get() as usize);
        for _ in 0..self.concurrency.get() {
            let client = self.client.clone();
            let keys = self.keys.clone();
            let segments = segments.clone();
            let results = results.clone();
            let cursor = cursor.clone();
            let cancel = self.cancel.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= segments.len() {
                        break;
                    }

                    let segment = &segments[index];
                    let data = match fetch_segment(&client, &keys, segment).await {
                        Ok(data) => data,
                        Err(error) => {
                            tracing::warn!("Segment {index} failed, retrying once. {error}");
                            match fetch_segment(&client, &keys, segment).await {
                                Ok(data) => data,
                                Err(error) => {
                                    tracing::error!(
                                        "Segment {index} failed permanently, leaving its slot empty. {error}"
                                    );
                                    Vec::new()
                                }
                            }
                        }
                    };
                    results.lock().unwrap()[index] = data;
                }
            }));
        }

        for worker in workers {
            let _ = worker.await;
        }

        if self.cancel.is_cancelled() {
            return Err(HinaError::Canceled);
        }

        let mut results = results.lock().unwrap();
        Ok(std::mem::take(&mut *results))
    }
}

/// One fetch attempt: download the segment body and, when it carries a
/// resolvable AES-128 key, decrypt it before returning.
async fn fetch_segment(
    client: &HttpClient,
    keys: &KeyCache,
    segment: &MediaSegment,
) -> HinaResult<Vec<u8>> {
    let response = client.get(segment.url.as_str()).send().await?;
    if !response.status().is_success() {
        return Err(HinaError::HttpError(response.status()));
    }
    let bytes = response.bytes().await?;

    let Some(key) = &segment.key else {
        return Ok(bytes.to_vec());
    };
    let Some(resolved) = keys.resolve(key).await else {
        // Unsupported method or key fetch failure: pass the body through
        // undecrypted.
        return Ok(bytes.to_vec());
    };

    let iv = derive_iv(key, segment.media_sequence);
    resolved.to_decryptor(iv).decrypt(&bytes)
}
