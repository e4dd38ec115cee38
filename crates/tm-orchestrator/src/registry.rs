//! Quick tunnel registry
//!
//! The registry is the single source of truth for which targets are tunneled.
//! Entries are keyed by the caller's original target string.
//!
//! # Per-key serialization
//!
//! `get_or_create`, `stop` and `refresh` take a per-key async mutex before
//! touching the entry for that key, so at most one of them runs per target at
//! any time. Concurrent first-time requests for the same target therefore
//! spawn a single process: the first caller starts it, the others wait on the
//! key lock and then find the ready entry. Operations on different keys never
//! block each other.
//!
//! Entries are inserted only once the tunnel is ready, so lookups never observe
//! a tunnel without a URL. The health monitor evicts entries without taking the
//! key lock; it removes an entry only if it still holds the exact tunnel that
//! was found dead.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::{Mutex, OwnedMutexGuard};

use tm_core::error::{Result, TunnelError};
use tm_core::Target;

use crate::quick::{QuickTunnel, QuickTunnelSettings};

/// Registry of quick tunnels keyed by target string
pub struct TunnelRegistry {
    settings: QuickTunnelSettings,
    /// Ready tunnels
    tunnels: DashMap<String, Arc<QuickTunnel>>,
    /// Per-key critical sections for mutating operations
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TunnelRegistry {
    /// Create an empty registry
    pub fn new(settings: QuickTunnelSettings) -> Self {
        Self {
            settings,
            tunnels: DashMap::new(),
            key_locks: DashMap::new(),
        }
    }

    /// Settings used for new tunnels
    pub fn settings(&self) -> &QuickTunnelSettings {
        &self.settings
    }

    /// Return the live tunnel for `key`, creating and starting one if needed
    pub async fn get_or_create(&self, key: &str) -> Result<Arc<QuickTunnel>> {
        let _guard = self.lock_key(key).await;
        self.get_or_create_locked(key).await
    }

    /// Return the ready tunnel for `key` without creating one
    pub fn get_existing(&self, key: &str) -> Result<Arc<QuickTunnel>> {
        self.tunnels
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|tunnel| tunnel.is_ready())
            .ok_or_else(|| TunnelError::TunnelNotFound(key.to_string()))
    }

    /// Stop and remove the tunnel for `key`
    pub async fn stop(&self, key: &str) -> Result<()> {
        let _guard = self.lock_key(key).await;
        self.stop_locked(key).await
    }

    /// Tear down any tunnel for `key`, then create a fresh one.
    ///
    /// The old process has exited before the replacement is spawned.
    pub async fn refresh(&self, key: &str) -> Result<Arc<QuickTunnel>> {
        let _guard = self.lock_key(key).await;
        match self.stop_locked(key).await {
            Ok(()) | Err(TunnelError::TunnelNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.get_or_create_locked(key).await
    }

    /// Snapshot of target → URL for every ready tunnel
    pub fn list_all(&self) -> HashMap<String, String> {
        self.tunnels
            .iter()
            .filter_map(|entry| {
                let tunnel = entry.value();
                if !tunnel.is_ready() {
                    return None;
                }
                tunnel.url().map(|url| (entry.key().clone(), url))
            })
            .collect()
    }

    /// All registered tunnels
    pub fn entries(&self) -> Vec<(String, Arc<QuickTunnel>)> {
        self.tunnels
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Number of registered tunnels
    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }

    /// Remove `key` if it still maps to `tunnel`; returns whether it was removed
    pub fn evict(&self, key: &str, tunnel: &Arc<QuickTunnel>) -> bool {
        self.tunnels
            .remove_if(key, |_, current| Arc::ptr_eq(current, tunnel))
            .is_some()
    }

    /// Stop every tunnel concurrently and empty the registry.
    ///
    /// Every tunnel gets a termination attempt even if others fail.
    pub async fn shutdown(&self) -> Vec<(String, TunnelError)> {
        let keys: Vec<String> = self.tunnels.iter().map(|e| e.key().clone()).collect();
        let drained: Vec<(String, Arc<QuickTunnel>)> = keys
            .into_iter()
            .filter_map(|key| self.tunnels.remove(&key))
            .collect();

        if drained.is_empty() {
            return Vec::new();
        }
        tracing::info!("Stopping {} quick tunnels", drained.len());

        let results = join_all(drained.into_iter().map(|(key, tunnel)| async move {
            let result = tunnel.stop().await;
            (key, result)
        }))
        .await;

        let mut failures = Vec::new();
        for (key, result) in results {
            if let Err(e) = result {
                tracing::error!("Failed to stop quick tunnel {}: {}", key, e);
                failures.push((key, e));
            }
        }
        failures
    }

    async fn get_or_create_locked(&self, key: &str) -> Result<Arc<QuickTunnel>> {
        let existing = self.tunnels.get(key).map(|e| Arc::clone(e.value()));
        if let Some(tunnel) = existing {
            if tunnel.is_ready() && !tunnel.has_exited().await {
                return Ok(tunnel);
            }
            tracing::info!("Replacing stale quick tunnel for {}", key);
            if self.evict(key, &tunnel) {
                tunnel.reap().await;
            }
        }

        let target = Target::parse(key)?;
        let tunnel = QuickTunnel::start(key, target, &self.settings).await?;
        self.tunnels.insert(key.to_string(), Arc::clone(&tunnel));
        Ok(tunnel)
    }

    async fn stop_locked(&self, key: &str) -> Result<()> {
        let (_, tunnel) = self
            .tunnels
            .remove(key)
            .ok_or_else(|| TunnelError::TunnelNotFound(key.to_string()))?;
        tunnel.stop().await
    }

    /// Enter the critical section for `key`.
    ///
    /// The returned guard cleans up the lock entry when dropped, including when
    /// the caller is cancelled while waiting or while holding the lock.
    async fn lock_key(&self, key: &str) -> KeyGuard<'_> {
        let lock = self
            .key_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Declared before the wait so a cancelled wait drops its lock clone first
        let mut held = KeyGuard {
            key_locks: &self.key_locks,
            key: key.to_string(),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }
}

/// Holds a per-key lock; removes the map entry once nobody else holds or waits on it
struct KeyGuard<'a> {
    key_locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.key_locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
