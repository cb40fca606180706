//! Role resolution and access decisions for Rolegate.
//!
//! This crate turns a [`rolegate_core::PolicySnapshot`] into access decisions:
//!
//! - **Policy store** - one-shot, duplicate-checked indexes over a snapshot
//! - **Resolvers** - caching, composite and diagnostic wrappers over any
//!   number of [`RoleResolver`] sources, plus an action-pattern veto source
//! - **Evaluator** - the grant/deny algorithm over users and context objects
//! - **Configuration** - TOML-loadable settings choosing the resolver stack
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use rolegate_auth::{AccessConfig, AccessEvaluator, EntityDomainService, EntityRef, PolicyStore, Sources, User};
//! use rolegate_auth::ContextObject;
//! use rolegate_core::{AccessRule, ContextType, MappingKey, PolicySnapshot, RoleMapping, RuleKey};
//!
//! let contest = ContextType::new("app.model.Contest");
//! let snapshot = PolicySnapshot::builder()
//!     .roles(["ROLE_CONTEST_MANAGER"])
//!     .rule(AccessRule::new(
//!         RuleKey::typed("contestManager", "select", [contest.clone()]),
//!         ["ROLE_CONTEST_MANAGER"],
//!     ))
//!     .mapping(RoleMapping::new(
//!         MappingKey::new(Some(2), Some(contest.clone()), None),
//!         ["ROLE_CONTEST_MANAGER"],
//!     ))
//!     .build();
//!
//! let sources: Sources = vec![Arc::new(PolicyStore::from_snapshot(&snapshot)?)];
//! let evaluator = AccessEvaluator::from_config(
//!     &AccessConfig::default(),
//!     sources,
//!     Arc::new(EntityDomainService::new()),
//! )?;
//!
//! let target = EntityRef::new(contest, 8);
//! let contexts: [Option<&dyn ContextObject>; 1] = [Some(&target)];
//! assert!(evaluator.has_access("contestManager", "select", &User::new(2), &contexts)?);
//! # Ok::<(), rolegate_core::AccessError>(())
//! ```

pub mod cache;
pub mod composite;
pub mod config;
pub mod domain;
pub mod engine;
pub mod resolver;
pub mod store;
pub mod veto;

pub use cache::{CacheStatsSnapshot, CachingResolver, SecurityCache};
pub use composite::{CompositeResolver, DEFAULT_TRACE_CAPACITY, DiagnosticResolver, TraceEntry};
pub use config::{AccessConfig, CacheConfig, ConfigError, DiagnosticsConfig, PolicyConfig};
pub use domain::{ContextObject, DomainService, EntityDomainService, EntityRef, User};
pub use engine::{AccessDecision, AccessEvaluator, DenyReason};
pub use resolver::{RoleResolver, Sources};
pub use store::{BuildOutcome, PolicyStore};
pub use veto::{ActionVetoSource, VetoEntry};
