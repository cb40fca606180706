//! Veto source keyed by action patterns.
//!
//! An [`ActionVetoSource`] withdraws roles from matching users for every
//! action whose name matches a regular expression, e.g. removing
//! `ROLE_CONTEST_MANAGER` from `update.*` once a contest is certified. It
//! answers nothing but `veto_roles` and is meant to be combined with a policy
//! store through a composite or caching resolver.
//!
//! # Example
//!
//! ```
//! use rolegate_auth::{ActionVetoSource, RoleResolver};
//! use rolegate_core::{ContextType, MappingKey, RuleKey};
//!
//! let contest = ContextType::new("app.model.Contest");
//! let source = ActionVetoSource::new().with_veto(
//!     RuleKey::any().with_category(Some("contestManager".into())).with_action(Some("update.*".into())),
//!     MappingKey::new(None, Some(contest.clone()), Some(4)),
//!     ["ROLE_CONTEST_MANAGER"],
//! );
//!
//! let vetoed = source.veto_roles(
//!     &RuleKey::typed("contestManager", "updateScores", [contest.clone()]),
//!     &MappingKey::for_context(3, contest, 4),
//! );
//! assert!(vetoed.contains("ROLE_CONTEST_MANAGER"));
//! ```

use indexmap::IndexSet;

use rolegate_core::{KeyMatcher, MappingKey, RoleSet, RuleKey};

use crate::resolver::RoleResolver;

/// One veto: roles withdrawn when both patterns match.
#[derive(Debug, Clone)]
pub struct VetoEntry {
    /// Rule pattern; its action is a regular expression.
    pub rule: RuleKey,
    pub mapping: MappingKey,
    pub roles: RoleSet,
}

/// Resolution source whose only answers are veto roles.
#[derive(Debug, Default)]
pub struct ActionVetoSource {
    matcher: KeyMatcher,
    entries: Vec<VetoEntry>,
}

impl ActionVetoSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a veto entry.
    #[must_use]
    pub fn with_veto<R, S>(mut self, rule: RuleKey, mapping: MappingKey, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(VetoEntry {
            rule,
            mapping,
            roles: roles.into_iter().map(Into::into).collect(),
        });
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[VetoEntry] {
        &self.entries
    }
}

impl RoleResolver for ActionVetoSource {
    fn rule_roles(&self, _key: &RuleKey) -> RoleSet {
        RoleSet::new()
    }

    fn user_roles(&self, _key: &MappingKey) -> RoleSet {
        RoleSet::new()
    }

    fn veto_roles(&self, rule: &RuleKey, mapping: &MappingKey) -> RoleSet {
        let mut roles = RoleSet::new();
        for entry in &self.entries {
            if self.matcher.matches_action_pattern(&entry.rule, rule)
                && KeyMatcher::matches_mapping(&entry.mapping, mapping)
            {
                roles.extend(entry.roles.iter().cloned());
            }
        }
        roles
    }

    fn all_roles(&self) -> RoleSet {
        RoleSet::new()
    }

    fn context_packages(&self) -> IndexSet<String> {
        IndexSet::new()
    }
}
