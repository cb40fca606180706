//! Role lookup caching.
//!
//! [`SecurityCache`] holds three unbounded concurrent maps (user roles, veto
//! roles and a reserved rule-role cache) plus hit/miss statistics.
//! [`CachingResolver`] memoizes `user_roles` and `veto_roles` over a list of
//! sources through it and passes every other lookup through.
//!
//! ## Design
//!
//! - **Get-or-compute**: a miss computes without holding any map lock, then
//!   stores with `entry().or_insert()` so the first stored value wins
//! - **Clear epoch**: `clear()` bumps an epoch under an exclusive gate; a
//!   value computed under an older epoch is returned but never stored
//! - **No eviction**: entries live until the next `clear()`

use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use indexmap::IndexSet;
use tracing::{debug, trace};

use rolegate_core::{MappingKey, RoleSet, RuleKey};

use crate::resolver::{RoleResolver, Sources, union_packages, union_roles};

// =============================================================================
// Statistics
// =============================================================================

/// Cache counters for monitoring.
#[derive(Debug, Default)]
struct CacheStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub user_entries: usize,
    pub veto_entries: usize,
    pub rule_entries: usize,
    /// Number of `clear()` calls so far.
    pub epoch: u64,
    pub hit_ratio: f64,
}

// =============================================================================
// Veto Keys
// =============================================================================

/// Owned key of the veto role cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VetoKey {
    rule: RuleKey,
    mapping: MappingKey,
}

/// A `(rule, mapping)` pair, owned or borrowed, usable for veto cache lookups.
trait VetoLookup {
    fn rule(&self) -> &RuleKey;
    fn mapping(&self) -> &MappingKey;
}

impl VetoLookup for VetoKey {
    fn rule(&self) -> &RuleKey {
        &self.rule
    }

    fn mapping(&self) -> &MappingKey {
        &self.mapping
    }
}

impl VetoLookup for (&RuleKey, &MappingKey) {
    fn rule(&self) -> &RuleKey {
        self.0
    }

    fn mapping(&self) -> &MappingKey {
        self.1
    }
}

impl<'a> Borrow<dyn VetoLookup + 'a> for VetoKey {
    fn borrow(&self) -> &(dyn VetoLookup + 'a) {
        self
    }
}

// Must hash exactly like the derived `Hash` of `VetoKey`.
impl Hash for dyn VetoLookup + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rule().hash(state);
        self.mapping().hash(state);
    }
}

impl PartialEq for dyn VetoLookup + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.rule() == other.rule() && self.mapping() == other.mapping()
    }
}

impl Eq for dyn VetoLookup + '_ {}

// =============================================================================
// Security Cache
// =============================================================================

/// Concurrent role caches shared by one or more caching resolvers.
#[derive(Default)]
pub struct SecurityCache {
    user_roles: DashMap<MappingKey, RoleSet>,
    veto_roles: DashMap<VetoKey, RoleSet>,
    rule_roles: DashMap<RuleKey, RoleSet>,
    epoch: AtomicU64,
    /// Held shared while storing, exclusively while clearing.
    gate: RwLock<()>,
    stats: CacheStatistics,
}

impl std::fmt::Debug for SecurityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl SecurityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached user roles for `key`, computing them on a miss.
    pub fn user_roles<F>(&self, key: &MappingKey, compute: F) -> RoleSet
    where
        F: FnOnce() -> RoleSet,
    {
        self.get_or_compute(&self.user_roles, key, || key.clone(), compute)
    }

    /// Cached veto roles for the `(rule, mapping)` pair, computing them on a miss.
    pub fn veto_roles<F>(&self, rule: &RuleKey, mapping: &MappingKey, compute: F) -> RoleSet
    where
        F: FnOnce() -> RoleSet,
    {
        let lookup = (rule, mapping);
        let owned = || VetoKey {
            rule: rule.clone(),
            mapping: mapping.clone(),
        };
        self.get_or_compute(&self.veto_roles, &lookup as &dyn VetoLookup, owned, compute)
    }

    /// Cached rule roles for `key`, computing them on a miss.
    ///
    /// Not used by [`CachingResolver`]; rule lookups are already exact map hits.
    pub fn rule_roles<F>(&self, key: &RuleKey, compute: F) -> RoleSet
    where
        F: FnOnce() -> RoleSet,
    {
        self.get_or_compute(&self.rule_roles, key, || key.clone(), compute)
    }

    /// Discard every cached entry.
    ///
    /// Safe to call while other threads read; lookups that started before the
    /// clear do not repopulate the cache.
    pub fn clear(&self) {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.user_roles.clear();
        self.veto_roles.clear();
        self.rule_roles.clear();
        debug!(epoch, "Security cache cleared");
    }

    /// Get a snapshot of current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStatsSnapshot {
            hits,
            misses,
            insertions: self.stats.insertions.load(Ordering::Relaxed),
            user_entries: self.user_roles.len(),
            veto_entries: self.veto_roles.len(),
            rule_entries: self.rule_roles.len(),
            epoch: self.epoch.load(Ordering::Acquire),
            hit_ratio: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// `owned` builds the stored key; it is only called when a value is stored.
    fn get_or_compute<K, Q, O, F>(
        &self,
        map: &DashMap<K, RoleSet>,
        key: &Q,
        owned: O,
        compute: F,
    ) -> RoleSet
    where
        K: Eq + Hash + Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        O: FnOnce() -> K,
        F: FnOnce() -> RoleSet,
    {
        if let Some(entry) = map.get(key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            trace!("Security cache hit");
            return entry.value().clone();
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let started = self.epoch.load(Ordering::Acquire);
        let value = compute();

        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if self.epoch.load(Ordering::Acquire) != started {
            return value;
        }

        let stored = map.entry(owned()).or_insert_with(|| {
            self.stats.insertions.fetch_add(1, Ordering::Relaxed);
            value
        });
        stored.value().clone()
    }
}

// =============================================================================
// Caching Resolver
// =============================================================================

/// Memoizes `user_roles` and `veto_roles` over the union of its sources.
pub struct CachingResolver {
    sources: Sources,
    cache: Arc<SecurityCache>,
}

impl CachingResolver {
    /// Wrap `sources` with a fresh cache.
    #[must_use]
    pub fn new(sources: Sources) -> Self {
        Self::with_cache(sources, Arc::new(SecurityCache::new()))
    }

    /// Wrap `sources` with a cache that may be shared with other resolvers.
    #[must_use]
    pub fn with_cache(sources: Sources, cache: Arc<SecurityCache>) -> Self {
        Self { sources, cache }
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<SecurityCache> {
        &self.cache
    }

    /// Discard every cached entry.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl RoleResolver for CachingResolver {
    fn rule_roles(&self, key: &RuleKey) -> RoleSet {
        union_roles(&self.sources, |source| source.rule_roles(key))
    }

    fn user_roles(&self, key: &MappingKey) -> RoleSet {
        self.cache.user_roles(key, || {
            union_roles(&self.sources, |source| source.user_roles(key))
        })
    }

    fn veto_roles(&self, rule: &RuleKey, mapping: &MappingKey) -> RoleSet {
        self.cache.veto_roles(rule, mapping, || {
            union_roles(&self.sources, |source| source.veto_roles(rule, mapping))
        })
    }

    fn all_roles(&self) -> RoleSet {
        union_roles(&self.sources, |source| source.all_roles())
    }

    fn context_packages(&self) -> IndexSet<String> {
        union_packages(&self.sources)
    }
}
