//! Context type registry and search-path resolution.
//!
//! Policy documents name context types by their short name (`Contest`). The
//! [`TypeResolver`] turns such a name into a fully-qualified [`ContextType`]
//! by trying each package of the search path in order against the types the
//! application has registered.

use std::collections::HashMap;

use indexmap::IndexSet;
use rolegate_core::ContextType;

// =============================================================================
// Type Registry
// =============================================================================

/// The set of context types the application knows about.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, ContextType>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fully-qualified type name.
    pub fn register(&mut self, qualified_name: impl AsRef<str>) -> ContextType {
        let name = qualified_name.as_ref();
        self.types
            .entry(name.to_string())
            .or_insert_with(|| ContextType::new(name))
            .clone()
    }

    /// Builder-style variant of [`TypeRegistry::register`].
    #[must_use]
    pub fn with_type(mut self, qualified_name: impl AsRef<str>) -> Self {
        self.register(qualified_name);
        self
    }

    /// Look up a fully-qualified name.
    #[must_use]
    pub fn get(&self, qualified_name: &str) -> Option<&ContextType> {
        self.types.get(qualified_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut registry = Self::new();
        for name in iter {
            registry.register(name);
        }
        registry
    }
}

// =============================================================================
// Type Resolver
// =============================================================================

/// Resolves short type names against an ordered package search path.
#[derive(Debug, Clone)]
pub struct TypeResolver {
    registry: TypeRegistry,
}

impl TypeResolver {
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Resolve `name` by trying `package.name` for each package in order.
    ///
    /// The first registered match wins; `None` when no package yields one.
    #[must_use]
    pub fn resolve(&self, search_path: &IndexSet<String>, name: &str) -> Option<ContextType> {
        search_path.iter().find_map(|package| {
            let qualified = format!("{package}.{name}");
            self.registry.get(&qualified).cloned()
        })
    }
}
