//! Turns policy documents into validated [`PolicySnapshot`]s.
//!
//! # Example
//!
//! ```
//! use rolegate_loader::{PolicyLoader, TypeRegistry};
//!
//! let registry = TypeRegistry::new().with_type("app.model.Contest");
//! let loader = PolicyLoader::new(registry);
//!
//! let snapshot = loader
//!     .load_toml(
//!         r#"
//!         roles = ["ROLE_ADMIN"]
//!         context_packages = ["app.model"]
//!
//!         [[categories]]
//!         name = "contestManager"
//!
//!         [[categories.rules]]
//!         action = "select"
//!         contexts = ["Contest"]
//!         roles = ["ROLE_ADMIN"]
//!         "#,
//!     )
//!     .unwrap();
//!
//! assert_eq!(snapshot.access_rules().len(), 1);
//! ```

use std::path::Path;

use indexmap::IndexSet;
use rolegate_core::{AccessRule, MappingKey, PolicySnapshot, RoleMapping, RoleSet, RuleKey};

use crate::document::{MappingDocument, PolicyDocument, RuleDocument};
use crate::error::{LoadError, LoadResult};
use crate::types::{TypeRegistry, TypeResolver};

/// Supported policy document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Toml,
    Json,
}

impl PolicyFormat {
    /// Pick the format from a file extension (`.toml` or `.json`).
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(LoadError::UnsupportedFormat { extension }),
        }
    }
}

// =============================================================================
// Policy Loader
// =============================================================================

/// Parses policy documents and validates their references.
///
/// Every role used by a rule or mapping must be declared, and every context
/// type name must resolve through the document's package search path.
/// Duplicate keys are passed through untouched for the policy store to reject.
#[derive(Debug, Clone)]
pub struct PolicyLoader {
    resolver: TypeResolver,
}

impl PolicyLoader {
    /// Create a loader that resolves context types against `registry`.
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            resolver: TypeResolver::new(registry),
        }
    }

    /// The type resolver used for context names.
    #[must_use]
    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Parse and validate a document in the given format.
    pub fn load_str(&self, format: PolicyFormat, text: &str) -> LoadResult<PolicySnapshot> {
        let document = parse_document(format, text)?;
        self.load_document(document)
    }

    pub fn load_toml(&self, text: &str) -> LoadResult<PolicySnapshot> {
        self.load_str(PolicyFormat::Toml, text)
    }

    pub fn load_json(&self, text: &str) -> LoadResult<PolicySnapshot> {
        self.load_str(PolicyFormat::Json, text)
    }

    /// Load a single file; the format follows the extension.
    pub fn load_file(&self, path: impl AsRef<Path>) -> LoadResult<PolicySnapshot> {
        self.load_files([path])
    }

    /// Load several files as one policy.
    ///
    /// Documents are concatenated in order before validation, so a role
    /// declared in one file may be used by a rule in another.
    pub fn load_files<I, P>(&self, paths: I) -> LoadResult<PolicySnapshot>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut merged = PolicyDocument::default();
        for path in paths {
            let path = path.as_ref();
            let format = PolicyFormat::from_path(path)?;
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!(path = %path.display(), ?format, "Reading policy document");

            let document = parse_document(format, &text)?;
            merged.roles.extend(document.roles);
            merged.context_packages.extend(document.context_packages);
            merged.categories.extend(document.categories);
            merged.role_mappings.extend(document.role_mappings);
        }
        self.load_document(merged)
    }

    /// Validate an already parsed document.
    pub fn load_document(&self, document: PolicyDocument) -> LoadResult<PolicySnapshot> {
        let roles: RoleSet = document.roles.into_iter().collect();
        let packages: IndexSet<String> = document.context_packages.into_iter().collect();

        let mut rules = Vec::new();
        for category in &document.categories {
            for rule in &category.rules {
                rules.push(self.convert_rule(&category.name, rule, &roles, &packages)?);
            }
        }

        let mut mappings = Vec::with_capacity(document.role_mappings.len());
        for (index, mapping) in document.role_mappings.iter().enumerate() {
            mappings.push(self.convert_mapping(index, mapping, &roles, &packages)?);
        }

        tracing::info!(
            rules = rules.len(),
            mappings = mappings.len(),
            roles = roles.len(),
            packages = packages.len(),
            "Loaded policy document"
        );

        Ok(PolicySnapshot::new(rules, mappings, roles, packages))
    }

    fn convert_rule(
        &self,
        category: &str,
        rule: &RuleDocument,
        declared: &RoleSet,
        packages: &IndexSet<String>,
    ) -> LoadResult<AccessRule> {
        let location = format!("{category}.{}", rule.action);

        let roles = check_roles(&location, &rule.roles, declared)?;

        let mut contexts = Vec::with_capacity(rule.contexts.len());
        for name in &rule.contexts {
            let ty = self.resolver.resolve(packages, name).ok_or_else(|| {
                LoadError::invalid_reference(
                    &location,
                    format!("no type found for context {name} in the context packages"),
                )
            })?;
            contexts.push(ty);
        }

        Ok(AccessRule {
            key: RuleKey::typed(category, &rule.action, contexts),
            active: rule.active,
            roles,
        })
    }

    fn convert_mapping(
        &self,
        index: usize,
        mapping: &MappingDocument,
        declared: &RoleSet,
        packages: &IndexSet<String>,
    ) -> LoadResult<RoleMapping> {
        let location = mapping.describe(index);

        let roles = check_roles(&location, &mapping.roles, declared)?;

        let context_type = match &mapping.context_type {
            None => None,
            Some(name) => Some(self.resolver.resolve(packages, name).ok_or_else(|| {
                LoadError::invalid_reference(
                    &location,
                    format!("no type found for context {name} in the context packages"),
                )
            })?),
        };

        Ok(RoleMapping {
            key: MappingKey::new(mapping.user_id, context_type, mapping.context_id),
            roles,
        })
    }
}

fn parse_document(format: PolicyFormat, text: &str) -> LoadResult<PolicyDocument> {
    match format {
        PolicyFormat::Toml => Ok(toml::from_str(text)?),
        PolicyFormat::Json => Ok(serde_json::from_str(text)?),
    }
}

fn check_roles(location: &str, roles: &[String], declared: &RoleSet) -> LoadResult<RoleSet> {
    roles
        .iter()
        .map(|role| {
            if declared.contains(role) {
                Ok(role.clone())
            } else {
                Err(LoadError::invalid_reference(
                    location,
                    format!("undeclared role {role}"),
                ))
            }
        })
        .collect()
}
