//! Core types for the Rolegate access-control engine.
//!
//! This crate holds the pieces every other Rolegate crate shares:
//!
//! - [`keys`] - rule and mapping keys with `None` as the wildcard
//! - [`matcher`] - the non-symmetric wildcard matching predicates
//! - [`policy`] - access rules, role mappings and the policy snapshot
//! - [`error`] - [`AccessError`] and the [`AccessResult`] alias

pub mod error;
pub mod keys;
pub mod matcher;
pub mod policy;

use std::collections::BTreeSet;

pub use error::{AccessError, AccessResult, ErrorCategory};
pub use keys::{ContextType, EntityId, MappingKey, RuleKey, UserId};
pub use matcher::{KeyMatcher, field_matches};
pub use policy::{AccessRule, PolicySnapshot, PolicySnapshotBuilder, RoleMapping};

/// A set of role names, ordered for stable output.
pub type RoleSet = BTreeSet<String>;

/// Maximum number of context objects a single access check may carry.
pub const MAX_CONTEXTS: usize = 5;
