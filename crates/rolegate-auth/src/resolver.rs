//! The role resolution contract shared by every source and wrapper.

use std::sync::Arc;

use indexmap::IndexSet;
use rolegate_core::{MappingKey, RoleSet, RuleKey};

/// A source of role information.
///
/// Policy stores, veto sources, caches and composites all implement this
/// trait so they can be stacked freely. Lookups never fail; an unknown key
/// answers with the empty set.
pub trait RoleResolver: Send + Sync {
    /// Roles required by the rule with exactly this key.
    fn rule_roles(&self, key: &RuleKey) -> RoleSet;

    /// Roles granted to the user and context described by `key`.
    fn user_roles(&self, key: &MappingKey) -> RoleSet;

    /// Roles withdrawn from `mapping` for the rule `rule`.
    fn veto_roles(&self, rule: &RuleKey, mapping: &MappingKey) -> RoleSet;

    /// Every declared role.
    fn all_roles(&self) -> RoleSet;

    /// Ordered search path for context type names.
    fn context_packages(&self) -> IndexSet<String>;
}

impl<T: RoleResolver + ?Sized> RoleResolver for Arc<T> {
    fn rule_roles(&self, key: &RuleKey) -> RoleSet {
        (**self).rule_roles(key)
    }

    fn user_roles(&self, key: &MappingKey) -> RoleSet {
        (**self).user_roles(key)
    }

    fn veto_roles(&self, rule: &RuleKey, mapping: &MappingKey) -> RoleSet {
        (**self).veto_roles(rule, mapping)
    }

    fn all_roles(&self) -> RoleSet {
        (**self).all_roles()
    }

    fn context_packages(&self) -> IndexSet<String> {
        (**self).context_packages()
    }
}

/// Shared list of resolution sources.
pub type Sources = Vec<Arc<dyn RoleResolver>>;

/// Union of `lookup` over every source, in order.
pub(crate) fn union_roles<F>(sources: &[Arc<dyn RoleResolver>], lookup: F) -> RoleSet
where
    F: Fn(&dyn RoleResolver) -> RoleSet,
{
    let mut roles = RoleSet::new();
    for source in sources {
        roles.extend(lookup(source.as_ref()));
    }
    roles
}

/// Ordered union of the search paths of every source.
pub(crate) fn union_packages(sources: &[Arc<dyn RoleResolver>]) -> IndexSet<String> {
    let mut packages = IndexSet::new();
    for source in sources {
        packages.extend(source.context_packages());
    }
    packages
}
