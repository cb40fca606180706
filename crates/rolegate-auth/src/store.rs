//! Policy store built once from a policy snapshot.
//!
//! The store owns two indexes:
//!
//! - an exact map from rule key to required roles, holding active rules only
//! - a list of mapping patterns, scanned linearly on every user lookup
//!
//! Indexes are published with a single compare-and-swap, so a store moves
//! from unbuilt to built exactly once and readers never observe a partially
//! built state.
//!
//! # Example
//!
//! ```
//! use rolegate_auth::{BuildOutcome, PolicyStore, RoleResolver};
//! use rolegate_core::{AccessRule, MappingKey, PolicySnapshot, RoleMapping, RuleKey};
//!
//! let snapshot = PolicySnapshot::builder()
//!     .roles(["ROLE_ADMIN", "ROLE_USER"])
//!     .rule(AccessRule::new(RuleKey::without_context("institutionManager", "save"), ["ROLE_ADMIN"]))
//!     .mapping(RoleMapping::new(MappingKey::for_user(1), ["ROLE_ADMIN"]))
//!     .build();
//!
//! let store = PolicyStore::new();
//! assert_eq!(store.build(&snapshot).unwrap(), BuildOutcome::Built);
//! assert!(store.user_roles(&MappingKey::for_user(1)).contains("ROLE_ADMIN"));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use indexmap::IndexSet;
use tracing::{debug, info};

use rolegate_core::{
    AccessError, AccessResult, KeyMatcher, MappingKey, PolicySnapshot, RoleSet, RuleKey,
};
use rolegate_loader::PolicyLoader;

use crate::config::PolicyConfig;
use crate::resolver::RoleResolver;

/// Result of a [`PolicyStore::build`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// This call published the indexes.
    Built,
    /// The store had already been built; nothing changed.
    AlreadyBuilt,
}

/// Immutable indexes published by a successful build.
#[derive(Debug, Default)]
struct PolicyIndex {
    rules: HashMap<RuleKey, RoleSet>,
    mappings: Vec<(MappingKey, RoleSet)>,
    roles: RoleSet,
    packages: IndexSet<String>,
}

impl PolicyIndex {
    fn from_snapshot(snapshot: &PolicySnapshot) -> AccessResult<Self> {
        // Duplicates are checked across active and inactive rules alike.
        let mut seen_rules = HashSet::with_capacity(snapshot.access_rules().len());
        for rule in snapshot.access_rules() {
            if !seen_rules.insert(&rule.key) {
                return Err(AccessError::duplicate_rule(&rule.key));
            }
        }

        let mut seen_mappings = HashSet::with_capacity(snapshot.role_mappings().len());
        for mapping in snapshot.role_mappings() {
            if !seen_mappings.insert(&mapping.key) {
                return Err(AccessError::duplicate_mapping(&mapping.key));
            }
        }

        let rules = snapshot
            .access_rules()
            .iter()
            .filter(|rule| rule.active)
            .map(|rule| (rule.key.clone(), rule.roles.clone()))
            .collect();

        let mappings = snapshot
            .role_mappings()
            .iter()
            .map(|mapping| (mapping.key.clone(), mapping.roles.clone()))
            .collect();

        Ok(Self {
            rules,
            mappings,
            roles: snapshot.all_roles().clone(),
            packages: snapshot.context_packages().clone(),
        })
    }
}

// =============================================================================
// Policy Store
// =============================================================================

/// One-shot policy store.
///
/// Every lookup answers with the empty set until [`PolicyStore::build`] has
/// succeeded.
#[derive(Debug, Default)]
pub struct PolicyStore {
    index: ArcSwapOption<PolicyIndex>,
}

impl PolicyStore {
    /// Create an unbuilt store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store and build it from `snapshot`.
    pub fn from_snapshot(snapshot: &PolicySnapshot) -> AccessResult<Self> {
        let store = Self::new();
        store.build(snapshot)?;
        Ok(store)
    }

    /// Load the configured policy files and build a store from them.
    ///
    /// With no files configured the store is returned unbuilt.
    pub fn from_config(config: &PolicyConfig, loader: &PolicyLoader) -> AccessResult<Self> {
        if config.files.is_empty() {
            debug!("No policy files configured, policy store left unbuilt");
            return Ok(Self::new());
        }

        let snapshot = loader.load_files(&config.files)?;
        Self::from_snapshot(&snapshot)
    }

    /// Whether a build has been published.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.index.load().is_some()
    }

    /// Build the indexes from `snapshot` and publish them.
    ///
    /// Only the first successful call has an effect. Later calls return
    /// [`BuildOutcome::AlreadyBuilt`] without inspecting the snapshot. A
    /// snapshot with two rules or two mappings sharing a key is rejected with
    /// [`AccessError::DuplicateKey`] and leaves the store unbuilt.
    pub fn build(&self, snapshot: &PolicySnapshot) -> AccessResult<BuildOutcome> {
        if self.is_built() {
            return Ok(BuildOutcome::AlreadyBuilt);
        }

        let index = Arc::new(PolicyIndex::from_snapshot(snapshot)?);
        let (rules, mappings, roles) = (index.rules.len(), index.mappings.len(), index.roles.len());

        let previous = self
            .index
            .compare_and_swap(&None::<Arc<PolicyIndex>>, Some(index));
        if previous.is_some() {
            debug!("Policy store built concurrently, discarding this build");
            return Ok(BuildOutcome::AlreadyBuilt);
        }

        info!(rules, mappings, roles, "Policy store built");
        Ok(BuildOutcome::Built)
    }
}

impl RoleResolver for PolicyStore {
    fn rule_roles(&self, key: &RuleKey) -> RoleSet {
        let guard = self.index.load();
        let Some(index) = guard.as_ref() else {
            return RoleSet::new();
        };

        match index.rules.get(key) {
            Some(roles) => roles.clone(),
            None => {
                debug!(rule = %key, "No access rule found");
                RoleSet::new()
            }
        }
    }

    fn user_roles(&self, key: &MappingKey) -> RoleSet {
        let guard = self.index.load();
        let Some(index) = guard.as_ref() else {
            return RoleSet::new();
        };

        let mut roles = RoleSet::new();
        for (pattern, granted) in &index.mappings {
            if KeyMatcher::matches_mapping(pattern, key) {
                roles.extend(granted.iter().cloned());
            }
        }
        roles
    }

    fn veto_roles(&self, _rule: &RuleKey, _mapping: &MappingKey) -> RoleSet {
        RoleSet::new()
    }

    fn all_roles(&self) -> RoleSet {
        self.index
            .load()
            .as_ref()
            .map(|index| index.roles.clone())
            .unwrap_or_default()
    }

    fn context_packages(&self) -> IndexSet<String> {
        self.index
            .load()
            .as_ref()
            .map(|index| index.packages.clone())
            .unwrap_or_default()
    }
}
