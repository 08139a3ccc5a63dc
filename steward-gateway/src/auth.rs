//! Bearer-credential authentication.
//!
//! Credentials are verified against stored bcrypt digests — the
//! cost-hardened, timing-safe comparison of the hash scheme. Because
//! that verification is deliberately slow and runs on every request, a
//! verified credential is remembered for a short TTL under a keyed
//! SHA-256 fingerprint (never the raw credential). A cache hit still
//! re-reads the key row, so a key flipped inactive stops authenticating
//! immediately.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::gateway_error::GatewayError;
use crate::storage::{ApiKeyRecord, GatewayStore};

const CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    api_key_id: Uuid,
    cached_at: Instant,
}

/// Verifies bearer credentials and resolves them to API key records.
pub struct Authenticator {
    store: Arc<dyn GatewayStore>,
    secret_key: String,
    cache: DashMap<String, CacheEntry>,
    cache_ttl: Duration,
}

impl Authenticator {
    pub fn new(store: Arc<dyn GatewayStore>, secret_key: String) -> Self {
        Self {
            store,
            secret_key,
            cache: DashMap::new(),
            cache_ttl: CACHE_TTL,
        }
    }

    /// Fingerprint used as the cache key. Keyed with the process secret
    /// so the map never holds a plain digest of the raw credential.
    fn fingerprint(&self, credential: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret_key.as_bytes());
        hasher.update(credential.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    fn invalid_key() -> GatewayError {
        GatewayError::Auth {
            message: "Invalid API key".to_string(),
        }
    }

    /// Resolve a bearer credential to its active API key record.
    pub async fn authenticate(&self, credential: &str) -> Result<ApiKeyRecord, GatewayError> {
        let fingerprint = self.fingerprint(credential);

        if let Some(entry) = self.cache.get(&fingerprint) {
            if entry.cached_at.elapsed() < self.cache_ttl {
                let api_key_id = entry.api_key_id;
                drop(entry);

                match self.store.get_key(api_key_id).await? {
                    Some(key) if key.is_active => return Ok(key),
                    _ => {
                        self.cache.remove(&fingerprint);
                        return Err(Self::invalid_key());
                    }
                }
            }
            drop(entry);
            self.cache.remove(&fingerprint);
        }

        // TTL sweep piggybacks on the miss path.
        let ttl = self.cache_ttl;
        self.cache.retain(|_, entry| entry.cached_at.elapsed() < ttl);

        let keys = self.store.list_active_keys().await?;
        let candidate = credential.to_string();
        let matched = tokio::task::spawn_blocking(move || {
            keys.into_iter()
                .find(|key| bcrypt::verify(&candidate, &key.key_hash).unwrap_or(false))
        })
        .await
        .map_err(|e| GatewayError::Internal {
            message: format!("credential verification task failed: {e}"),
        })?;

        match matched {
            Some(key) => {
                self.cache.insert(
                    fingerprint,
                    CacheEntry {
                        api_key_id: key.id,
                        cached_at: Instant::now(),
                    },
                );
                Ok(key)
            }
            None => Err(Self::invalid_key()),
        }
    }
}
