//! Access rules, role mappings, and the immutable policy snapshot.
//!
//! A [`PolicySnapshot`] is what a policy loader produces and what a policy
//! store consumes. It is not validated here; the loader checks references and
//! the store checks for duplicate keys.
//!
//! # Example
//!
//! ```
//! use rolegate_core::{AccessRule, MappingKey, PolicySnapshot, RoleMapping, RuleKey};
//!
//! let snapshot = PolicySnapshot::builder()
//!     .role("ROLE_ADMIN")
//!     .context_package("app.model")
//!     .rule(AccessRule::new(
//!         RuleKey::without_context("institutionManager", "save"),
//!         ["ROLE_ADMIN"],
//!     ))
//!     .mapping(RoleMapping::new(MappingKey::for_user(1), ["ROLE_ADMIN"]))
//!     .build();
//!
//! assert_eq!(snapshot.access_rules().len(), 1);
//! assert!(snapshot.all_roles().contains("ROLE_ADMIN"));
//! ```

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::RoleSet;
use crate::keys::{MappingKey, RuleKey};

// =============================================================================
// Access Rule
// =============================================================================

/// A rule granting an action to the holders of any of its roles.
///
/// Identity is the key alone; an inactive rule behaves as if it was absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    /// The rule key.
    pub key: RuleKey,

    /// Whether the rule participates in decisions.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Roles required (any of) for the action.
    pub roles: RoleSet,
}

fn default_active() -> bool {
    true
}

impl AccessRule {
    /// Create an active rule.
    #[must_use]
    pub fn new<R, S>(key: RuleKey, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key,
            active: true,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Set the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

impl PartialEq for AccessRule {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AccessRule {}

impl std::hash::Hash for AccessRule {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

// =============================================================================
// Role Mapping
// =============================================================================

/// A grant of roles to the users and contexts matched by a key pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleMapping {
    /// The mapping key pattern.
    pub key: MappingKey,

    /// Granted roles.
    pub roles: RoleSet,
}

impl RoleMapping {
    /// Create a mapping.
    #[must_use]
    pub fn new<R, S>(key: MappingKey, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl PartialEq for RoleMapping {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RoleMapping {}

impl std::hash::Hash for RoleMapping {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

// =============================================================================
// Policy Snapshot
// =============================================================================

/// Immutable bundle of everything a policy store is built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySnapshot {
    rules: Vec<AccessRule>,
    mappings: Vec<RoleMapping>,
    roles: RoleSet,
    context_packages: IndexSet<String>,
}

impl PolicySnapshot {
    /// Create a snapshot from its parts.
    #[must_use]
    pub fn new(
        rules: Vec<AccessRule>,
        mappings: Vec<RoleMapping>,
        roles: RoleSet,
        context_packages: IndexSet<String>,
    ) -> Self {
        Self {
            rules,
            mappings,
            roles,
            context_packages,
        }
    }

    /// Start building a snapshot.
    #[must_use]
    pub fn builder() -> PolicySnapshotBuilder {
        PolicySnapshotBuilder::default()
    }

    /// All rules, active or not, in load order.
    #[must_use]
    pub fn access_rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// All role mappings in load order.
    #[must_use]
    pub fn role_mappings(&self) -> &[RoleMapping] {
        &self.mappings
    }

    /// Declared roles.
    #[must_use]
    pub fn all_roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Ordered search path for context type names.
    #[must_use]
    pub fn context_packages(&self) -> &IndexSet<String> {
        &self.context_packages
    }
}

/// Builder for [`PolicySnapshot`].
#[derive(Debug, Default)]
pub struct PolicySnapshotBuilder {
    inner: PolicySnapshot,
}

impl PolicySnapshotBuilder {
    /// Declare a role.
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.inner.roles.insert(role.into());
        self
    }

    /// Declare several roles.
    #[must_use]
    pub fn roles<R, S>(mut self, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Append a package to the context search path.
    #[must_use]
    pub fn context_package(mut self, package: impl Into<String>) -> Self {
        self.inner.context_packages.insert(package.into());
        self
    }

    /// Add a rule.
    #[must_use]
    pub fn rule(mut self, rule: AccessRule) -> Self {
        self.inner.rules.push(rule);
        self
    }

    /// Add a role mapping.
    #[must_use]
    pub fn mapping(mut self, mapping: RoleMapping) -> Self {
        self.inner.mappings.push(mapping);
        self
    }

    /// Finish the snapshot.
    #[must_use]
    pub fn build(self) -> PolicySnapshot {
        self.inner
    }
}
