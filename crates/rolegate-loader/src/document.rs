//! Serde model of a policy document.
//!
//! The same shape is accepted as TOML and as JSON:
//!
//! ```toml
//! roles = ["ROLE_ADMIN", "ROLE_USER"]
//! context_packages = ["app.model"]
//!
//! [[categories]]
//! name = "institutionManager"
//!
//! [[categories.rules]]
//! action = "select"
//! contexts = ["Institution"]
//! roles = ["ROLE_ADMIN"]
//!
//! [[role_mappings]]
//! user_id = 1
//! roles = ["ROLE_ADMIN"]
//! ```
//!
//! Context type names are short names resolved against `context_packages`.

use serde::{Deserialize, Serialize};

use rolegate_core::{EntityId, UserId};

/// Top-level policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    /// Declared roles. Every role used below must appear here.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Ordered package search path for context type names.
    #[serde(default)]
    pub context_packages: Vec<String>,

    /// Rule categories.
    #[serde(default)]
    pub categories: Vec<CategoryDocument>,

    /// Role grants.
    #[serde(default)]
    pub role_mappings: Vec<MappingDocument>,
}

/// A named group of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryDocument {
    /// Category name shared by every rule in the group.
    pub name: String,

    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

/// One access rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDocument {
    pub action: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Ordered context type names.
    #[serde(default)]
    pub contexts: Vec<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

fn default_active() -> bool {
    true
}

/// One role mapping. Omitted fields are wildcards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<EntityId>,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl MappingDocument {
    /// Human-readable location used in error messages.
    pub(crate) fn describe(&self, index: usize) -> String {
        let field = |v: Option<String>| v.unwrap_or_else(|| "*".to_string());
        format!(
            "role mapping #{index} ({}, {}, {})",
            field(self.user_id.map(|id| id.to_string())),
            field(self.context_type.clone()),
            field(self.context_id.map(|id| id.to_string())),
        )
    }
}
