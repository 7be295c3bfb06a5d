//! Shared cache of long-lived protocol clients.
//!
//! # Responsibilities
//! - Map a connection identity to one reusable client
//! - Build clients lazily, outside of any lock
//! - Resolve first-access races so exactly one client survives per key
//!
//! # Design Decisions
//! - Owned by the composition root and injected into checks, never a global
//! - Entries are never evicted; target cardinality is small
//! - First publisher wins: a losing racer drops its freshly built client

use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::observability::metrics;

/// Identity of a reusable client.
///
/// `target` is the human-readable address part, `fingerprint` covers every
/// other option that changes how the client is built (credentials, timeouts,
/// certificate policy). Two keys are equal only if both parts are.
///
/// The fingerprint is derived from secrets and never leaves the process:
/// `Display` renders the target alone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    target: String,
    fingerprint: u64,
}

impl ConnectionKey {
    /// Derive a key from a target label and the options the client is built from.
    pub fn derive<O: Hash + ?Sized>(target: impl Into<String>, options: &O) -> Self {
        let mut hasher = DefaultHasher::new();
        options.hash(&mut hasher);
        Self {
            target: target.into(),
            fingerprint: hasher.finish(),
        }
    }

    /// The address part of the key.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionKey")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)
    }
}

/// A thread-safe, cloneable handle to a keyed client cache.
pub struct ConnectionCache<C> {
    inner: Arc<DashMap<ConnectionKey, Arc<C>>>,
}

impl<C> ConnectionCache<C> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Return the cached client for `key`, building it with `factory` on a miss.
    ///
    /// The factory runs without holding any shard lock, so concurrent callers
    /// may each build a client. Only the first one published is kept; the
    /// others are dropped and every caller receives the published client.
    /// A factory error is returned as-is and nothing is cached.
    pub fn get_or_create<F, E>(&self, key: &ConnectionKey, factory: F) -> Result<Arc<C>, E>
    where
        F: FnOnce() -> Result<C, E>,
    {
        if let Some(existing) = self.inner.get(key) {
            return Ok(Arc::clone(existing.value()));
        }

        let built = Arc::new(factory()?);

        let published = Arc::clone(
            self.inner
                .entry(key.clone())
                .or_insert_with(|| Arc::clone(&built))
                .value(),
        );

        if Arc::ptr_eq(&published, &built) {
            tracing::debug!(node = key.target(), entries = self.inner.len(), "Cached new client");
            metrics::record_cache_size(self.inner.len());
        } else {
            tracing::debug!(node = key.target(), "Lost publish race, reusing cached client");
        }

        Ok(published)
    }

    /// Whether a client is cached for `key`.
    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<C> Clone for ConnectionCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> Default for ConnectionCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ConnectionCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("entries", &self.inner.len())
            .finish()
    }
}
