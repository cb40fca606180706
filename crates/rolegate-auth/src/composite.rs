//! Resolvers that combine several sources.
//!
//! [`CompositeResolver`] answers every lookup with the union over its sources.
//! [`DiagnosticResolver`] does the same and additionally records each call in
//! a bounded trace for inspection; it is meant to run uncached so the trace
//! reflects every lookup the evaluator makes.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexSet;
use serde::Serialize;

use rolegate_core::{MappingKey, RoleSet, RuleKey};

use crate::resolver::{RoleResolver, Sources, union_packages, union_roles};

// =============================================================================
// Composite Resolver
// =============================================================================

/// Union of several resolution sources, queried in order.
pub struct CompositeResolver {
    sources: Sources,
}

impl CompositeResolver {
    #[must_use]
    pub fn new(sources: Sources) -> Self {
        Self { sources }
    }

    /// Number of configured sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl RoleResolver for CompositeResolver {
    fn rule_roles(&self, key: &RuleKey) -> RoleSet {
        union_roles(&self.sources, |source| source.rule_roles(key))
    }

    fn user_roles(&self, key: &MappingKey) -> RoleSet {
        union_roles(&self.sources, |source| source.user_roles(key))
    }

    fn veto_roles(&self, rule: &RuleKey, mapping: &MappingKey) -> RoleSet {
        union_roles(&self.sources, |source| source.veto_roles(rule, mapping))
    }

    fn all_roles(&self) -> RoleSet {
        union_roles(&self.sources, |source| source.all_roles())
    }

    fn context_packages(&self) -> IndexSet<String> {
        union_packages(&self.sources)
    }
}

// =============================================================================
// Diagnostic Resolver
// =============================================================================

/// One recorded lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum TraceEntry {
    RuleRoles {
        key: RuleKey,
        roles: RoleSet,
    },
    UserRoles {
        key: MappingKey,
        roles: RoleSet,
    },
    VetoRoles {
        rule: RuleKey,
        mapping: MappingKey,
        roles: RoleSet,
    },
    AllRoles {
        roles: RoleSet,
    },
    ContextPackages {
        packages: Vec<String>,
    },
}

/// Default number of trace entries retained.
pub const DEFAULT_TRACE_CAPACITY: usize = 1024;

/// Composite resolver that records every call.
///
/// Only the most recent `capacity` entries are kept.
pub struct DiagnosticResolver {
    inner: CompositeResolver,
    trace: Mutex<VecDeque<TraceEntry>>,
    capacity: usize,
}

impl DiagnosticResolver {
    #[must_use]
    pub fn new(sources: Sources) -> Self {
        Self::with_capacity(sources, DEFAULT_TRACE_CAPACITY)
    }

    /// Create a resolver retaining at most `capacity` trace entries.
    #[must_use]
    pub fn with_capacity(sources: Sources, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: CompositeResolver::new(sources),
            trace: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_TRACE_CAPACITY))),
            capacity,
        }
    }

    /// Copy of the retained trace, oldest first.
    #[must_use]
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.lock_trace().iter().cloned().collect()
    }

    /// Remove and return the retained trace, oldest first.
    pub fn drain_trace(&self) -> Vec<TraceEntry> {
        self.lock_trace().drain(..).collect()
    }

    fn lock_trace(&self) -> MutexGuard<'_, VecDeque<TraceEntry>> {
        match self.trace.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Diagnostic trace mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn record(&self, entry: TraceEntry) {
        tracing::debug!(entry = ?entry, "Role lookup");
        let mut trace = self.lock_trace();
        if trace.len() == self.capacity {
            trace.pop_front();
        }
        trace.push_back(entry);
    }
}

impl RoleResolver for DiagnosticResolver {
    fn rule_roles(&self, key: &RuleKey) -> RoleSet {
        let roles = self.inner.rule_roles(key);
        self.record(TraceEntry::RuleRoles {
            key: key.clone(),
            roles: roles.clone(),
        });
        roles
    }

    fn user_roles(&self, key: &MappingKey) -> RoleSet {
        let roles = self.inner.user_roles(key);
        self.record(TraceEntry::UserRoles {
            key: key.clone(),
            roles: roles.clone(),
        });
        roles
    }

    fn veto_roles(&self, rule: &RuleKey, mapping: &MappingKey) -> RoleSet {
        let roles = self.inner.veto_roles(rule, mapping);
        self.record(TraceEntry::VetoRoles {
            rule: rule.clone(),
            mapping: mapping.clone(),
            roles: roles.clone(),
        });
        roles
    }

    fn all_roles(&self) -> RoleSet {
        let roles = self.inner.all_roles();
        self.record(TraceEntry::AllRoles {
            roles: roles.clone(),
        });
        roles
    }

    fn context_packages(&self) -> IndexSet<String> {
        let packages = self.inner.context_packages();
        self.record(TraceEntry::ContextPackages {
            packages: packages.iter().cloned().collect(),
        });
        packages
    }
}
