//! Access decision engine.
//!
//! # Evaluation Order
//!
//! 1. Build the rule key from category, action and the context types
//! 2. Look up the required roles; no rule means deny
//! 3. Without contexts, take the user's context-free grants and vetoes
//! 4. With contexts, start from every declared role and intersect the grants
//!    for each context object, collecting vetoes along the way
//! 5. Remove vetoed roles, intersect with the required roles, allow if any
//!    role is left
//!
//! Context-free grants are not added to the contextual result, so a user
//! holding a role only through `(user, *, *)` may pass a context-free check
//! and fail the same action on a specific object.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use rolegate_auth::{AccessEvaluator, EntityDomainService, PolicyStore, User};
//! use rolegate_core::{AccessRule, MappingKey, PolicySnapshot, RoleMapping, RuleKey};
//!
//! let snapshot = PolicySnapshot::builder()
//!     .roles(["ROLE_ADMIN"])
//!     .rule(AccessRule::new(RuleKey::without_context("institutionManager", "save"), ["ROLE_ADMIN"]))
//!     .mapping(RoleMapping::new(MappingKey::for_user(1), ["ROLE_ADMIN"]))
//!     .build();
//!
//! let store = Arc::new(PolicyStore::from_snapshot(&snapshot).unwrap());
//! let evaluator = AccessEvaluator::new(store, Arc::new(EntityDomainService::new()));
//!
//! assert!(evaluator.has_access("institutionManager", "save", &User::new(1), &[]).unwrap());
//! assert!(!evaluator.has_access("institutionManager", "save", &User::new(2), &[]).unwrap());
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use rolegate_core::{
    AccessError, AccessResult, ContextType, MAX_CONTEXTS, MappingKey, RoleSet, RuleKey,
};

use crate::cache::{CachingResolver, SecurityCache};
use crate::composite::{CompositeResolver, DiagnosticResolver};
use crate::config::AccessConfig;
use crate::domain::{ContextObject, DomainService, User};
use crate::resolver::{RoleResolver, Sources};

// =============================================================================
// Access Decision
// =============================================================================

/// Result of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "camelCase")]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Deny(reason) => Some(*reason),
            Self::Allow => None,
        }
    }
}

/// Reason for access denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// No active rule exists for the action and context types.
    NoMatchingRule,
    /// The user holds none of the required roles.
    NoGrantedRole,
    /// The user held a required role but every one was vetoed.
    Vetoed,
}

// =============================================================================
// Access Evaluator
// =============================================================================

/// Decides access checks against a role resolver.
pub struct AccessEvaluator {
    resolver: Arc<dyn RoleResolver>,
    domain: Arc<dyn DomainService>,
    cache: Option<Arc<SecurityCache>>,
    diagnostics: Option<Arc<DiagnosticResolver>>,
}

impl AccessEvaluator {
    /// Create an evaluator over a ready-made resolver.
    #[must_use]
    pub fn new(resolver: Arc<dyn RoleResolver>, domain: Arc<dyn DomainService>) -> Self {
        Self {
            resolver,
            domain,
            cache: None,
            diagnostics: None,
        }
    }

    /// Assemble the resolver stack over `sources` as configured.
    ///
    /// Diagnostics take precedence and are never cached; otherwise the
    /// sources are wrapped in a caching or a plain composite resolver.
    pub fn from_config(
        config: &AccessConfig,
        sources: Sources,
        domain: Arc<dyn DomainService>,
    ) -> AccessResult<Self> {
        config
            .validate()
            .map_err(|e| AccessError::configuration(e.to_string()))?;

        if config.diagnostics.enabled {
            let diagnostics = Arc::new(DiagnosticResolver::with_capacity(
                sources,
                config.diagnostics.trace_capacity,
            ));
            debug!(capacity = config.diagnostics.trace_capacity, "Using diagnostic resolver");
            return Ok(Self {
                resolver: diagnostics.clone(),
                domain,
                cache: None,
                diagnostics: Some(diagnostics),
            });
        }

        if config.cache.enabled {
            let caching = CachingResolver::new(sources);
            let cache = Arc::clone(caching.cache());
            debug!("Using caching resolver");
            return Ok(Self {
                resolver: Arc::new(caching),
                domain,
                cache: Some(cache),
                diagnostics: None,
            });
        }

        debug!("Using composite resolver");
        Ok(Self::new(Arc::new(CompositeResolver::new(sources)), domain))
    }

    /// The resolver decisions are made against.
    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn RoleResolver> {
        &self.resolver
    }

    /// The role cache, when the evaluator was assembled with caching.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<SecurityCache>> {
        self.cache.as_ref()
    }

    /// The diagnostic resolver, when the evaluator was assembled with diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&Arc<DiagnosticResolver>> {
        self.diagnostics.as_ref()
    }

    /// Whether `user` may perform `category.action` on `contexts`.
    ///
    /// An absent context element still contributes a wildcard type to the
    /// rule key; if a rule exists for that key the check fails with
    /// [`AccessError::UnresolvedIdentity`].
    pub fn has_access(
        &self,
        category: &str,
        action: &str,
        user: &User,
        contexts: &[Option<&dyn ContextObject>],
    ) -> AccessResult<bool> {
        Ok(self.evaluate(category, action, user, contexts)?.is_allowed())
    }

    /// Like [`AccessEvaluator::has_access`], reporting why access was denied.
    pub fn evaluate(
        &self,
        category: &str,
        action: &str,
        user: &User,
        contexts: &[Option<&dyn ContextObject>],
    ) -> AccessResult<AccessDecision> {
        let types: Vec<Option<ContextType>> = contexts
            .iter()
            .map(|context| context.map(|object| object.context_type()))
            .collect();
        let rule_key = RuleKey::new(category, action, types);

        let required = self.resolver.rule_roles(&rule_key);
        if required.is_empty() {
            debug!(rule = %rule_key, user = user.id, "Access denied, no matching rule");
            return Ok(AccessDecision::Deny(DenyReason::NoMatchingRule));
        }

        let (person, veto) = if contexts.is_empty() {
            let key = MappingKey::for_user(user.id);
            (
                self.resolver.user_roles(&key),
                self.resolver.veto_roles(&rule_key, &key),
            )
        } else {
            self.contextual_roles(&rule_key, user, contexts)?
        };

        let granted: RoleSet = person.intersection(&required).cloned().collect();
        let allowed: RoleSet = granted.difference(&veto).cloned().collect();

        let decision = if !allowed.is_empty() {
            AccessDecision::Allow
        } else if !granted.is_empty() {
            AccessDecision::Deny(DenyReason::Vetoed)
        } else {
            AccessDecision::Deny(DenyReason::NoGrantedRole)
        };

        debug!(
            rule = %rule_key,
            user = user.id,
            ?decision,
            roles = ?allowed,
            "Access evaluated"
        );
        Ok(decision)
    }

    fn contextual_roles(
        &self,
        rule_key: &RuleKey,
        user: &User,
        contexts: &[Option<&dyn ContextObject>],
    ) -> AccessResult<(RoleSet, RoleSet)> {
        if contexts.len() > MAX_CONTEXTS {
            return Err(AccessError::cardinality_exceeded(MAX_CONTEXTS, contexts.len()));
        }

        let mut person = self.resolver.all_roles();
        let mut veto = RoleSet::new();

        for (position, context) in contexts.iter().enumerate() {
            let object = context.ok_or_else(|| {
                AccessError::unresolved_identity(format!(
                    "context #{position} of {rule_key} is absent"
                ))
            })?;
            let id = self.domain.get_id(object)?;
            let key = MappingKey::for_context(user.id, object.context_type(), id);

            let granted = self.resolver.user_roles(&key);
            person.retain(|role| granted.contains(role));
            veto.extend(self.resolver.veto_roles(rule_key, &key));
        }

        Ok((person, veto))
    }

    /// The user's context-free roles; empty without a user.
    #[must_use]
    pub fn all_roles_for_user(&self, user: Option<&User>) -> RoleSet {
        match user {
            Some(user) => self.resolver.user_roles(&MappingKey::for_user(user.id)),
            None => RoleSet::new(),
        }
    }

    /// Whether `role` is among [`AccessEvaluator::all_roles_for_user`].
    ///
    /// Errors are logged and answered with `false`.
    #[must_use]
    pub fn has_role(&self, user: Option<&User>, role: &str) -> bool {
        match self.check_role(user, role) {
            Ok(held) => held,
            Err(e) => {
                warn!(error = %e, category = %e.category(), role, "Role check failed");
                false
            }
        }
    }

    fn check_role(&self, user: Option<&User>, role: &str) -> AccessResult<bool> {
        if role.is_empty() {
            return Err(AccessError::invalid_role(role));
        }
        Ok(self.all_roles_for_user(user).contains(role))
    }
}

impl std::fmt::Debug for AccessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEvaluator")
            .field("cached", &self.cache.is_some())
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityDomainService, EntityRef};
    use crate::store::PolicyStore;
    use indexmap::IndexSet;
    use rolegate_core::{AccessRule, PolicySnapshot, RoleMapping};

    fn contest() -> ContextType {
        ContextType::new("app.model.Contest")
    }

    fn store() -> Arc<PolicyStore> {
        let snapshot = PolicySnapshot::builder()
            .roles(["ROLE_ADMIN", "ROLE_CONTEST_MANAGER", "ROLE_USER"])
            .rule(AccessRule::new(
                RuleKey::without_context("institutionManager", "save"),
                ["ROLE_ADMIN"],
            ))
            .rule(AccessRule::new(
                RuleKey::typed("contestManager", "select", [contest()]),
                ["ROLE_ADMIN", "ROLE_CONTEST_MANAGER"],
            ))
            .rule(AccessRule::new(
                RuleKey::new("contestManager", "select", vec![None]),
                ["ROLE_ADMIN"],
            ))
            .mapping(RoleMapping::new(MappingKey::any(), ["ROLE_USER"]))
            .mapping(RoleMapping::new(MappingKey::for_user(1), ["ROLE_ADMIN"]))
            .mapping(RoleMapping::new(
                MappingKey::new(Some(2), Some(contest()), None),
                ["ROLE_CONTEST_MANAGER"],
            ))
            .build();
        Arc::new(PolicyStore::from_snapshot(&snapshot).unwrap())
    }

    fn evaluator() -> AccessEvaluator {
        AccessEvaluator::new(store(), Arc::new(EntityDomainService::new()))
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    #[test]
    fn test_no_rule_denies() {
        let decision = evaluator()
            .evaluate("institutionManager", "nope", &User::new(1), &[])
            .unwrap();
        assert_eq!(decision, AccessDecision::Deny(DenyReason::NoMatchingRule));
        assert_eq!(decision.deny_reason(), Some(DenyReason::NoMatchingRule));
    }

    #[test]
    fn test_no_granted_role() {
        let decision = evaluator()
            .evaluate("institutionManager", "save", &User::new(2), &[])
            .unwrap();
        assert_eq!(decision, AccessDecision::Deny(DenyReason::NoGrantedRole));
    }

    #[test]
    fn test_contextual_grant() {
        let evaluator = evaluator();
        let contest = EntityRef::new(contest(), 8);
        let contexts: [Option<&dyn ContextObject>; 1] = [Some(&contest)];

        assert!(evaluator
            .has_access("contestManager", "select", &User::new(2), &contexts)
            .unwrap());
        assert!(!evaluator
            .has_access("contestManager", "select", &User::new(3), &contexts)
            .unwrap());
    }

    #[test]
    fn test_six_contexts_without_rule_denies() {
        let evaluator = evaluator();
        let contest = EntityRef::new(contest(), 8);
        let object: &dyn ContextObject = &contest;
        let contexts = vec![Some(object); 6];

        // no rule for six contexts: denied before the cardinality check
        assert!(!evaluator
            .has_access("contestManager", "select", &User::new(1), &contexts)
            .unwrap());
    }

    #[test]
    fn test_absent_context_with_rule_is_unresolved() {
        let err = evaluator()
            .evaluate("contestManager", "select", &User::new(1), &[None])
            .unwrap_err();
        assert!(matches!(err, AccessError::UnresolvedIdentity { .. }));
    }

    #[test]
    fn test_transient_context_is_unresolved() {
        let draft = EntityRef::transient(contest());
        let object: &dyn ContextObject = &draft;
        let err = evaluator()
            .evaluate("contestManager", "select", &User::new(2), &[Some(object)])
            .unwrap_err();
        assert!(matches!(err, AccessError::UnresolvedIdentity { .. }));
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(AccessDecision::Deny(DenyReason::NoMatchingRule)).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["reason"], "no-matching-rule");

        let json = serde_json::to_value(AccessDecision::Allow).unwrap();
        assert_eq!(json["decision"], "allow");
    }

    #[test]
    fn test_more_contexts_never_grow_person_roles() {
        let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/contest_policy.toml");
        let registry: rolegate_loader::TypeRegistry =
            ["app.model.Contest", "app.model.Institution"].into_iter().collect();
        let snapshot = rolegate_loader::PolicyLoader::new(registry)
            .load_file(fixture)
            .unwrap();
        let evaluator = AccessEvaluator::new(
            Arc::new(PolicyStore::from_snapshot(&snapshot).unwrap()),
            Arc::new(EntityDomainService::new()),
        );

        let objects = [
            EntityRef::new(contest(), 4),
            EntityRef::new(contest(), 8),
            EntityRef::new("app.model.Institution", 1),
            EntityRef::new(contest(), 4),
        ];
        let contexts: Vec<Option<&dyn ContextObject>> = objects
            .iter()
            .map(|object| Some(object as &dyn ContextObject))
            .collect();
        let rule_key = RuleKey::typed("contestManager", "select", [contest()]);

        for id in 1..=3 {
            let user = User::new(id);
            let mut previous = evaluator.resolver.all_roles();
            for len in 1..=contexts.len() {
                let (person, _) = evaluator
                    .contextual_roles(&rule_key, &user, &contexts[..len])
                    .unwrap();
                assert!(
                    person.is_subset(&previous),
                    "user {id}: {person:?} grew past {previous:?} at {len} contexts"
                );
                previous = person;
            }
        }

        // user 3 keeps ROLE_CONTEST_MANAGER on contest 4 alone, loses it with contest 8
        let user = User::new(3);
        let (alone, _) = evaluator
            .contextual_roles(&rule_key, &user, &contexts[..1])
            .unwrap();
        let (both, _) = evaluator
            .contextual_roles(&rule_key, &user, &contexts[..2])
            .unwrap();
        assert!(alone.contains("ROLE_CONTEST_MANAGER"));
        assert!(!both.contains("ROLE_CONTEST_MANAGER"));
    }

    // =========================================================================
    // Roles
    // =========================================================================

    #[test]
    fn test_all_roles_for_user() {
        let evaluator = evaluator();
        assert!(evaluator.all_roles_for_user(None).is_empty());
        assert_eq!(
            evaluator.all_roles_for_user(Some(&User::new(1))),
            RoleSet::from(["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()])
        );
    }

    #[test]
    fn test_has_role() {
        let evaluator = evaluator();
        assert!(evaluator.has_role(Some(&User::new(1)), "ROLE_ADMIN"));
        assert!(!evaluator.has_role(Some(&User::new(2)), "ROLE_ADMIN"));
        assert!(!evaluator.has_role(None, "ROLE_USER"));

        // errors are swallowed
        assert!(!evaluator.has_role(Some(&User::new(1)), ""));
        assert!(!evaluator.has_role(Some(&User::new(1)), "ROLE_UNKNOWN"));
    }

    #[test]
    fn test_has_role_agrees_with_all_roles_for_user() {
        // ROLE_AUDITOR is granted but never declared
        let snapshot = PolicySnapshot::builder()
            .roles(["ROLE_ADMIN"])
            .mapping(RoleMapping::new(MappingKey::for_user(1), ["ROLE_AUDITOR"]))
            .build();
        let store = Arc::new(PolicyStore::from_snapshot(&snapshot).unwrap());
        let evaluator = AccessEvaluator::new(store, Arc::new(EntityDomainService::new()));
        let user = User::new(1);

        let roles = evaluator.all_roles_for_user(Some(&user));
        assert!(roles.contains("ROLE_AUDITOR"));
        for role in &roles {
            assert!(evaluator.has_role(Some(&user), role));
        }
        assert!(!evaluator.has_role(Some(&user), "ROLE_ADMIN"));
    }

    #[test]
    fn test_has_role_skips_declared_roles_lookup() {
        let domain: Arc<dyn DomainService> = Arc::new(EntityDomainService::new());
        let mut config = AccessConfig::default();
        config.diagnostics.enabled = true;
        let evaluator = AccessEvaluator::from_config(&config, vec![store()], domain).unwrap();

        assert!(evaluator.has_role(Some(&User::new(1)), "ROLE_ADMIN"));
        let trace = evaluator.diagnostics().unwrap().drain_trace();
        assert_eq!(trace.len(), 1);
        assert!(matches!(trace[0], crate::composite::TraceEntry::UserRoles { .. }));
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    #[test]
    fn test_from_config_stack_selection() {
        let domain: Arc<dyn DomainService> = Arc::new(EntityDomainService::new());
        let sources = || -> Sources { vec![store()] };

        let config = AccessConfig::default();
        let evaluator = AccessEvaluator::from_config(&config, sources(), domain.clone()).unwrap();
        assert!(evaluator.cache().is_some());
        assert!(evaluator.diagnostics().is_none());

        let mut config = AccessConfig::default();
        config.diagnostics.enabled = true;
        let evaluator = AccessEvaluator::from_config(&config, sources(), domain.clone()).unwrap();
        assert!(evaluator.cache().is_none());
        evaluator
            .has_access("institutionManager", "save", &User::new(1), &[])
            .unwrap();
        assert!(!evaluator.diagnostics().unwrap().trace().is_empty());

        let mut config = AccessConfig::default();
        config.cache.enabled = false;
        let evaluator = AccessEvaluator::from_config(&config, sources(), domain.clone()).unwrap();
        assert!(evaluator.cache().is_none());
        assert!(evaluator.diagnostics().is_none());
        assert_eq!(evaluator.resolver().context_packages(), IndexSet::<String>::new());
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = AccessConfig::default();
        config.diagnostics.enabled = true;
        config.diagnostics.trace_capacity = 0;

        let err = AccessEvaluator::from_config(&config, vec![], Arc::new(EntityDomainService::new()))
            .unwrap_err();
        assert!(matches!(err, AccessError::Configuration { .. }));
    }
}
