//! Wildcard matching for rule and mapping keys.
//!
//! Matching is not symmetric: the left-hand key is the pattern and supplies
//! the wildcard semantics, the right-hand key is the candidate. A `None` field
//! on the pattern matches any candidate value; a set field requires equality.
//!
//! ```
//! use rolegate_core::{ContextType, KeyMatcher, MappingKey};
//!
//! let contest = ContextType::new("app.model.Contest");
//! let pattern = MappingKey::new(Some(2), Some(contest.clone()), None);
//!
//! assert!(KeyMatcher::matches_mapping(&pattern, &MappingKey::for_context(2, contest, 8)));
//! assert!(!KeyMatcher::matches_mapping(&pattern, &MappingKey::for_user(2)));
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;

use crate::keys::{MappingKey, RuleKey};

/// Field-wise wildcard test: a `None` pattern matches anything, otherwise the
/// candidate must hold an equal value.
#[must_use]
pub fn field_matches<T: PartialEq>(pattern: Option<&T>, candidate: Option<&T>) -> bool {
    pattern.is_none_or(|p| candidate == Some(p))
}

// =============================================================================
// Key Matcher
// =============================================================================

/// Key matcher with regex caching for the action-pattern mode.
///
/// The default matching predicates are associated functions and need no
/// instance. This struct is thread-safe and can be shared across requests.
pub struct KeyMatcher {
    /// Cache for compiled action patterns.
    regex_cache: RwLock<HashMap<String, Option<Regex>>>,
}

impl Default for KeyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMatcher")
            .field("cached_patterns", &self.cached_patterns())
            .finish()
    }
}

impl KeyMatcher {
    /// Create a new key matcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regex_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Check whether a rule key pattern matches a candidate.
    ///
    /// The context sequence is compared as a whole: a `None` sequence on the
    /// pattern matches any candidate sequence, a present sequence must be
    /// equal element by element (including untyped slots).
    #[must_use]
    pub fn matches_rule(pattern: &RuleKey, candidate: &RuleKey) -> bool {
        field_matches(pattern.category.as_ref(), candidate.category.as_ref())
            && field_matches(pattern.action.as_ref(), candidate.action.as_ref())
            && field_matches(pattern.contexts.as_ref(), candidate.contexts.as_ref())
    }

    /// Check whether a mapping key pattern matches a candidate.
    ///
    /// All three fields are independently wildcardable.
    #[must_use]
    pub fn matches_mapping(pattern: &MappingKey, candidate: &MappingKey) -> bool {
        field_matches(pattern.user_id.as_ref(), candidate.user_id.as_ref())
            && field_matches(
                pattern.context_type.as_ref(),
                candidate.context_type.as_ref(),
            )
            && field_matches(pattern.context_id.as_ref(), candidate.context_id.as_ref())
    }

    /// Rule matching where the pattern's action is a regular expression.
    ///
    /// The expression must match the candidate's whole action. A candidate
    /// without an action, or a pattern that fails to compile, never matches.
    /// Category and contexts behave as in [`KeyMatcher::matches_rule`].
    #[must_use]
    pub fn matches_action_pattern(&self, pattern: &RuleKey, candidate: &RuleKey) -> bool {
        if !field_matches(pattern.category.as_ref(), candidate.category.as_ref()) {
            return false;
        }

        let action_ok = match (&pattern.action, &candidate.action) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(expr), Some(action)) => self.is_full_match(expr, action),
        };

        action_ok && field_matches(pattern.contexts.as_ref(), candidate.contexts.as_ref())
    }

    /// Number of distinct action patterns compiled so far.
    #[must_use]
    pub fn cached_patterns(&self) -> usize {
        self.regex_cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    fn is_full_match(&self, expr: &str, value: &str) -> bool {
        if let Ok(cache) = self.regex_cache.read()
            && let Some(compiled) = cache.get(expr)
        {
            return compiled.as_ref().is_some_and(|re| re.is_match(value));
        }

        // Anchor so the expression has to cover the whole action.
        let compiled = Regex::new(&format!("^(?:{expr})$")).ok();
        if compiled.is_none() {
            tracing::warn!(pattern = %expr, "Invalid action pattern, treating as non-matching");
        }
        let matched = compiled.as_ref().is_some_and(|re| re.is_match(value));

        if let Ok(mut cache) = self.regex_cache.write() {
            cache.insert(expr.to_string(), compiled);
        }

        matched
    }
}
