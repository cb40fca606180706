//! End-to-end access checks against the contest fixture.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexSet;
use rolegate_auth::{
    AccessConfig, AccessDecision, AccessEvaluator, ActionVetoSource, CachingResolver,
    CompositeResolver, ContextObject, DenyReason, EntityDomainService, EntityRef, PolicyStore,
    RoleResolver, Sources, User,
};
use rolegate_core::{AccessError, ContextType, MappingKey, RoleSet, RuleKey};
use rolegate_loader::{PolicyLoader, TypeRegistry};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("contest_policy.toml")
}

fn loader() -> PolicyLoader {
    let registry: TypeRegistry = [
        "app.model.Contest",
        "app.model.Institution",
        "app.model.Team",
    ]
    .into_iter()
    .collect();
    PolicyLoader::new(registry)
}

fn store() -> Arc<PolicyStore> {
    let snapshot = loader().load_file(fixture()).unwrap();
    Arc::new(PolicyStore::from_snapshot(&snapshot).unwrap())
}

fn contest_type() -> ContextType {
    ContextType::new("app.model.Contest")
}

fn contest(id: i64) -> EntityRef {
    EntityRef::new(contest_type(), id)
}

fn institution(id: i64) -> EntityRef {
    EntityRef::new("app.model.Institution", id)
}

fn evaluator_over(resolver: Arc<dyn RoleResolver>) -> AccessEvaluator {
    AccessEvaluator::new(resolver, Arc::new(EntityDomainService::new()))
}

fn check(
    evaluator: &AccessEvaluator,
    category: &str,
    action: &str,
    user: i64,
    contexts: &[&EntityRef],
) -> bool {
    let contexts: Vec<Option<&dyn ContextObject>> = contexts
        .iter()
        .map(|c| Some(*c as &dyn ContextObject))
        .collect();
    evaluator
        .has_access(category, action, &User::new(user), &contexts)
        .unwrap()
}

fn roles(names: &[&str]) -> RoleSet {
    names.iter().map(|name| name.to_string()).collect()
}

// =============================================================================
// Fixture expectations
// =============================================================================

#[test]
fn test_fixture_rule_roles() {
    let store = store();
    let institution_type = ContextType::new("app.model.Institution");

    assert_eq!(
        store.rule_roles(&RuleKey::without_context("institutionManager", "select")),
        roles(&["ROLE_ADMIN", "ROLE_CONTEST_MANAGER"])
    );
    assert_eq!(
        store.rule_roles(&RuleKey::typed(
            "institutionManager",
            "select",
            [institution_type]
        )),
        roles(&["ROLE_ADMIN", "ROLE_CONTEST_MANAGER", "ROLE_TEAM_MEMBER"])
    );
    assert_eq!(
        store.rule_roles(&RuleKey::typed("contestManager", "select", [contest_type()])),
        roles(&[
            "ROLE_ADMIN",
            "ROLE_CONTEST_MANAGER",
            "ROLE_TEAM_MANAGER",
            "ROLE_TEAM_MEMBER",
        ])
    );
}

#[test]
fn test_fixture_user_roles() {
    let store = store();
    let institution_type = ContextType::new("app.model.Institution");

    assert_eq!(
        store.user_roles(&MappingKey::for_user(1)),
        roles(&["ROLE_ADMIN", "ROLE_USER"])
    );
    // the context-free grant still applies to a specific contest
    assert_eq!(
        store.user_roles(&MappingKey::for_context(1, contest_type(), 8)),
        roles(&["ROLE_ADMIN", "ROLE_USER"])
    );
    assert_eq!(
        store.user_roles(&MappingKey::new(Some(2), Some(contest_type()), None)),
        roles(&["ROLE_CONTEST_MANAGER", "ROLE_USER"])
    );
    assert_eq!(
        store.user_roles(&MappingKey::new(Some(2), Some(institution_type), None)),
        roles(&["ROLE_USER"])
    );
    assert_eq!(
        store.user_roles(&MappingKey::for_context(3, contest_type(), 4)),
        roles(&["ROLE_CONTEST_MANAGER", "ROLE_USER"])
    );
    // no exact id, so the contest 4 mapping does not apply
    assert_eq!(
        store.user_roles(&MappingKey::new(Some(3), Some(contest_type()), None)),
        roles(&["ROLE_USER"])
    );
}

#[test]
fn test_fixture_declared_roles() {
    let store = store();
    assert_eq!(
        store.all_roles(),
        roles(&[
            "ROLE_ADMIN",
            "ROLE_CONTEST_MANAGER",
            "ROLE_TEAM_MANAGER",
            "ROLE_TEAM_MEMBER",
            "ROLE_USER",
        ])
    );
}

#[test]
fn test_context_free_rules() {
    let evaluator = evaluator_over(store());

    assert!(check(&evaluator, "institutionManager", "select", 1, &[]));
    assert!(!check(&evaluator, "institutionManager", "select", 2, &[]));
    assert!(check(&evaluator, "institutionManager", "save", 1, &[]));
    assert!(!check(&evaluator, "institutionManager", "save", 3, &[]));
    assert!(check(&evaluator, "institutionManager", "remove", 1, &[]));
    assert!(!check(&evaluator, "institutionManager", "select", 42, &[]));
}

#[test]
fn test_inactive_rule_denies() {
    let evaluator = evaluator_over(store());
    let decision = evaluator
        .evaluate("institutionManager", "archive", &User::new(1), &[])
        .unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::NoMatchingRule));
}

#[test]
fn test_contest_scoped_grants() {
    let evaluator = evaluator_over(store());

    // user 2 manages every contest
    assert!(check(&evaluator, "contestManager", "select", 2, &[&contest(8)]));
    assert!(check(&evaluator, "contestManager", "select", 2, &[&contest(4)]));

    // user 3 manages contest 4 only
    assert!(check(&evaluator, "contestManager", "select", 3, &[&contest(4)]));
    assert!(!check(&evaluator, "contestManager", "select", 3, &[&contest(8)]));

    // admin grant is context-free and matches every context
    assert!(check(&evaluator, "contestManager", "select", 1, &[&contest(8)]));

    // plain user on an institution
    assert!(!check(&evaluator, "institutionManager", "select", 2, &[&institution(1)]));
    assert!(check(&evaluator, "institutionManager", "select", 1, &[&institution(1)]));
}

#[test]
fn test_multi_context_intersection() {
    let evaluator = evaluator_over(store());

    // user 2 is a contest manager but holds nothing on the institution
    assert!(!check(
        &evaluator,
        "contestManager",
        "assign",
        2,
        &[&contest(8), &institution(1)]
    ));
    assert!(check(
        &evaluator,
        "contestManager",
        "assign",
        1,
        &[&contest(8), &institution(1)]
    ));
}

#[test]
fn test_context_order_selects_rule() {
    let evaluator = evaluator_over(store());
    let (first, second) = (institution(1), contest(8));
    let contexts: [Option<&dyn ContextObject>; 2] = [Some(&first), Some(&second)];
    let decision = evaluator
        .evaluate("contestManager", "assign", &User::new(1), &contexts)
        .unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::NoMatchingRule));
}

#[test]
fn test_cardinality_exceeded() {
    let evaluator = evaluator_over(store());
    let contests: Vec<EntityRef> = (1..=6).map(contest).collect();
    let contexts: Vec<Option<&dyn ContextObject>> = contests
        .iter()
        .map(|c| Some(c as &dyn ContextObject))
        .collect();

    let err = evaluator
        .has_access("contestManager", "compare", &User::new(1), &contexts)
        .unwrap_err();
    assert_eq!(err, AccessError::cardinality_exceeded(5, 6));
}

// =============================================================================
// Context-free vs contextual
// =============================================================================

/// Grants ROLE_ADMIN only for the exact key `(1, *, *)`.
struct ExactGrantSource;

impl RoleResolver for ExactGrantSource {
    fn rule_roles(&self, _key: &RuleKey) -> RoleSet {
        RoleSet::from(["ROLE_ADMIN".to_string()])
    }

    fn user_roles(&self, key: &MappingKey) -> RoleSet {
        if *key == MappingKey::for_user(1) {
            RoleSet::from(["ROLE_ADMIN".to_string()])
        } else {
            RoleSet::new()
        }
    }

    fn veto_roles(&self, _rule: &RuleKey, _mapping: &MappingKey) -> RoleSet {
        RoleSet::new()
    }

    fn all_roles(&self) -> RoleSet {
        RoleSet::from(["ROLE_ADMIN".to_string()])
    }

    fn context_packages(&self) -> IndexSet<String> {
        IndexSet::new()
    }
}

#[test]
fn test_context_free_grants_not_added_to_contextual_checks() {
    let evaluator = evaluator_over(Arc::new(ExactGrantSource));

    assert!(check(&evaluator, "contestManager", "select", 1, &[]));
    assert!(!check(&evaluator, "contestManager", "select", 1, &[&contest(8)]));
}

// =============================================================================
// Vetoes
// =============================================================================

fn veto_source() -> Arc<ActionVetoSource> {
    Arc::new(ActionVetoSource::new().with_veto(
        RuleKey::any()
            .with_category(Some("contestManager".to_string()))
            .with_action(Some("update.*|save".to_string())),
        MappingKey::new(None, Some(contest_type()), Some(4)),
        ["ROLE_CONTEST_MANAGER"],
    ))
}

#[test]
fn test_veto_withdraws_granted_role() {
    let sources: Sources = vec![store(), veto_source()];
    let evaluator = evaluator_over(Arc::new(CompositeResolver::new(sources)));

    let target = contest(4);
    let contexts: [Option<&dyn ContextObject>; 1] = [Some(&target)];
    let decision = evaluator
        .evaluate("contestManager", "update", &User::new(3), &contexts)
        .unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::Vetoed));

    // the veto is scoped to contest 4
    assert!(check(&evaluator, "contestManager", "update", 2, &[&contest(8)]));
    // and to matching actions
    assert!(check(&evaluator, "contestManager", "select", 3, &[&contest(4)]));
}

#[test]
fn test_veto_through_cache() {
    let sources: Sources = vec![store(), veto_source()];
    let caching = Arc::new(CachingResolver::new(sources));
    let evaluator = evaluator_over(caching.clone());

    for _ in 0..3 {
        assert!(!check(&evaluator, "contestManager", "update", 2, &[&contest(4)]));
    }
    let stats = caching.cache().stats();
    assert_eq!(stats.veto_entries, 1);
    assert!(stats.hits >= 4);
}

#[test]
fn test_without_veto_source_update_allowed() {
    let evaluator = evaluator_over(store());
    assert!(check(&evaluator, "contestManager", "update", 3, &[&contest(4)]));
}

// =============================================================================
// Caching
// =============================================================================

#[test]
fn test_cached_user_roles_equal_uncached() {
    let store = store();
    let sources: Sources = vec![store.clone()];
    let caching = CachingResolver::new(sources);

    let keys = [
        MappingKey::any(),
        MappingKey::for_user(1),
        MappingKey::for_user(2),
        MappingKey::for_context(2, contest_type(), 8),
        MappingKey::for_context(3, contest_type(), 4),
        MappingKey::for_context(3, contest_type(), 8),
        MappingKey::new(Some(2), Some(contest_type()), None),
    ];

    for _ in 0..2 {
        for key in &keys {
            assert_eq!(caching.user_roles(key), store.user_roles(key), "key {key}");
        }
    }
    assert_eq!(caching.cache().stats().user_entries, keys.len());
}

#[test]
fn test_concurrent_checks_with_clear() {
    let sources: Sources = vec![store()];
    let caching = Arc::new(CachingResolver::new(sources));
    let evaluator = evaluator_over(caching.clone());

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    assert!(check(&evaluator, "contestManager", "select", 3, &[&contest(4)]));
                    assert!(!check(&evaluator, "contestManager", "select", 3, &[&contest(8)]));
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..20 {
                caching.clear();
            }
        });
    });
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_assembled_from_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let config_path = dir.path().join("access.toml");
    std::fs::write(
        &config_path,
        format!(
            "[policy]\nfiles = [{:?}]\n\n[diagnostics]\nenabled = true\ntrace_capacity = 16\n",
            fixture().display().to_string()
        ),
    )
    .unwrap();

    let config = AccessConfig::from_file(&config_path).unwrap();
    let store = PolicyStore::from_config(&config.policy, &loader()).unwrap();
    assert!(store.is_built());

    let sources: Sources = vec![Arc::new(store)];
    let evaluator =
        AccessEvaluator::from_config(&config, sources, Arc::new(EntityDomainService::new()))
            .unwrap();

    assert!(check(&evaluator, "institutionManager", "select", 1, &[]));

    let trace = evaluator.diagnostics().unwrap().trace();
    assert_eq!(trace.len(), 3);
}

#[test]
fn test_empty_policy_config_leaves_store_unbuilt() {
    let store = PolicyStore::from_config(&AccessConfig::default().policy, &loader()).unwrap();
    assert!(!store.is_built());

    let evaluator = evaluator_over(Arc::new(store));
    assert!(!check(&evaluator, "institutionManager", "select", 1, &[]));
}
