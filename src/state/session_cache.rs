// TTL cache of verified session identities

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::core::errors::{RelayError, RelayResult};
use crate::core::models::Identity;

/// Default lifetime of a cached identity (15 minutes)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

struct CacheEntry {
    identity: Identity,
    expires_at: Instant,
}

/// Session token -> (identity, expiry) map with lazy expiry on read
///
/// Writes are not deduplicated: two requests that miss for the same token at
/// the same time both verify remotely and both write. Last writer wins, which
/// is fine because every writer stores the same externally verified identity.
pub struct SessionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached identity for `key`, or `NotFound` if absent or expired
    pub async fn get(&self, key: &str) -> RelayResult<Identity> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(entry.identity.clone()),
                Some(_) => {}
                None => return Err(RelayError::NotFound),
            }
        }

        // Expired: drop it unless a concurrent add already replaced it
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Err(RelayError::NotFound)
    }

    /// Insert or overwrite with a fresh expiry of now + TTL
    pub async fn add(&self, key: &str, identity: Identity) {
        let entry = CacheEntry {
            identity,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    pub async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of entries, expired ones included until read or purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
