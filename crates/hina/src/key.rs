//! Decryption-key resolution with a per-job cache.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    decrypt::ResolvedKey,
    error::{HinaError, HinaResult},
    playlist::{KeyMethod, KeyRef},
    util::http::HttpClient,
};

/// Fetches and imports AES-128 keys, cached by key URI for the duration
/// of one download job.
pub struct KeyCache {
    client: HttpClient,
    cache: Mutex<HashMap<String, Arc<ResolvedKey>>>,
}

impl KeyCache {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a key reference into a usable key handle.
    ///
    /// Returns `None` for unsupported methods and on fetch/import
    /// failure; the caller then skips decryption for that segment and the
    /// ciphertext passes through to the output.
    pub async fn resolve(&self, key: &KeyRef) -> Option<Arc<ResolvedKey>> {
        if key.method != KeyMethod::Aes128 {
            return None;
        }

        // The lock is held across the fetch: the first requester for a
        // URI performs it, every later one reuses the cached handle.
        let mut cache = self.cache.lock().await;
        if let Some(resolved) = cache.get(&key.uri) {
            return Some(resolved.clone());
        }

        match self.fetch_key(&key.uri).await {
            Ok(resolved) => {
                let resolved = Arc::new(resolved);
                cache.insert(key.uri.clone(), resolved.clone());
                Some(resolved)
            }
            Err(error) => {
                tracing::warn!("Failed to resolve decryption key from {}: {error}", key.uri);
                None
            }
        }
    }

    async fn fetch_key(&self, uri: &str) -> HinaResult<ResolvedKey> {
        let response = self.client.get(uri).send().await?;
        if !response.status().is_success() {
            return Err(HinaError::HttpError(response.status()));
        }

        let bytes = response.bytes().await?.to_vec();
        let key = bytes.try_into().map_err(HinaError::InvalidAes128Key)?;
        Ok(ResolvedKey::new(key))
    }
}
