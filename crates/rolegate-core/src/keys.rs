//! Lookup keys for access rules and role mappings.
//!
//! Both key shapes use `None` as the wildcard marker. A key loaded from policy
//! plays the pattern side of a match, a key built from a live access check
//! plays the candidate side. See [`crate::matcher`] for the matching rules.
//!
//! # Example
//!
//! ```
//! use rolegate_core::{ContextType, MappingKey, RuleKey};
//!
//! let contest = ContextType::new("app.model.Contest");
//!
//! // Rule: contestManager.select(Contest)
//! let rule = RuleKey::new("contestManager", "select", vec![Some(contest.clone())]);
//! assert_eq!(rule.arity(), Some(1));
//!
//! // Mapping: user 2 in any Contest
//! let mapping = MappingKey::new(Some(2), Some(contest), None);
//! assert!(mapping.context_id.is_none());
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Persistent identifier of a user.
pub type UserId = i64;

/// Persistent identifier of a domain entity used as an access context.
pub type EntityId = i64;

// =============================================================================
// Context Type
// =============================================================================

/// Fully-qualified type identifier of a context object (e.g. `app.model.Contest`).
///
/// Cheap to clone; equality and hashing are by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextType(Arc<str>);

impl ContextType {
    /// Create a type identifier from its fully-qualified name.
    #[must_use]
    pub fn new(qualified_name: impl AsRef<str>) -> Self {
        Self(Arc::from(qualified_name.as_ref()))
    }

    /// The fully-qualified name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The name without its package prefix (`app.model.Contest` → `Contest`).
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// =============================================================================
// Rule Key
// =============================================================================

/// Key of an access rule: `category.action(context types...)`.
///
/// `contexts` is an ordered sequence. When the whole sequence is `None` it is
/// a wildcard; otherwise each entry is a concrete type or `None` for an
/// intentionally untyped slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleKey {
    /// Category name, `None` matches any category.
    pub category: Option<String>,

    /// Action name, `None` matches any action.
    pub action: Option<String>,

    /// Ordered context types, `None` matches any sequence.
    pub contexts: Option<Vec<Option<ContextType>>>,
}

impl RuleKey {
    /// Create a fully specified key with the given context slots.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        action: impl Into<String>,
        contexts: Vec<Option<ContextType>>,
    ) -> Self {
        Self {
            category: Some(category.into()),
            action: Some(action.into()),
            contexts: Some(contexts),
        }
    }

    /// Create a key whose context slots are all typed.
    #[must_use]
    pub fn typed(
        category: impl Into<String>,
        action: impl Into<String>,
        contexts: impl IntoIterator<Item = ContextType>,
    ) -> Self {
        Self::new(category, action, contexts.into_iter().map(Some).collect())
    }

    /// Create a key without any context (`category.action()`).
    #[must_use]
    pub fn without_context(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(category, action, Vec::new())
    }

    /// A key with every field wildcarded.
    #[must_use]
    pub fn any() -> Self {
        Self {
            category: None,
            action: None,
            contexts: None,
        }
    }

    /// Replace the category.
    #[must_use]
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Replace the action.
    #[must_use]
    pub fn with_action(mut self, action: Option<String>) -> Self {
        self.action = action;
        self
    }

    /// Replace the context sequence.
    #[must_use]
    pub fn with_contexts(mut self, contexts: Option<Vec<Option<ContextType>>>) -> Self {
        self.contexts = contexts;
        self
    }

    /// Number of context slots, `None` when the sequence is a wildcard.
    #[must_use]
    pub fn arity(&self) -> Option<usize> {
        self.contexts.as_ref().map(Vec::len)
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.category.as_deref().unwrap_or("*"),
            self.action.as_deref().unwrap_or("*")
        )?;
        match &self.contexts {
            None => f.write_str("(*)"),
            Some(contexts) => {
                f.write_str("(")?;
                for (i, context) in contexts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match context {
                        Some(ty) => f.write_str(ty.simple_name())?,
                        None => f.write_str("*")?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}

// =============================================================================
// Mapping Key
// =============================================================================

/// Key of a role mapping: `(user, context type, context id)`.
///
/// Each field is independently a wildcard when `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingKey {
    /// User the roles are granted to.
    pub user_id: Option<UserId>,

    /// Type of the context the grant applies to.
    pub context_type: Option<ContextType>,

    /// Identifier of the context instance the grant applies to.
    pub context_id: Option<EntityId>,
}

impl MappingKey {
    /// Create a mapping key from its three optional fields.
    #[must_use]
    pub fn new(
        user_id: Option<UserId>,
        context_type: Option<ContextType>,
        context_id: Option<EntityId>,
    ) -> Self {
        Self {
            user_id,
            context_type,
            context_id,
        }
    }

    /// Key for the user's context-free grants: `(user, *, *)`.
    #[must_use]
    pub fn for_user(user_id: UserId) -> Self {
        Self::new(Some(user_id), None, None)
    }

    /// Key for a user acting on one specific context object.
    #[must_use]
    pub fn for_context(user_id: UserId, context_type: ContextType, context_id: EntityId) -> Self {
        Self::new(Some(user_id), Some(context_type), Some(context_id))
    }

    /// `(*, *, *)` - matches every lookup when used as a pattern.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        match self.user_id {
            Some(id) => write!(f, "{id}")?,
            None => f.write_str("*")?,
        }
        f.write_str(", ")?;
        match &self.context_type {
            Some(ty) => f.write_str(ty.simple_name())?,
            None => f.write_str("*")?,
        }
        f.write_str(", ")?;
        match self.context_id {
            Some(id) => write!(f, "{id}")?,
            None => f.write_str("*")?,
        }
        f.write_str(")")
    }
}
