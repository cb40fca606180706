//! Policy loading for Rolegate.
//!
//! Reads TOML or JSON policy documents, resolves context type names through
//! the document's package search path, validates role references and produces
//! a [`rolegate_core::PolicySnapshot`].

pub mod document;
pub mod error;
pub mod loader;
pub mod types;

pub use document::{CategoryDocument, MappingDocument, PolicyDocument, RuleDocument};
pub use error::{LoadError, LoadResult};
pub use loader::{PolicyFormat, PolicyLoader};
pub use types::{TypeRegistry, TypeResolver};
