//! Users, context objects, and the domain service that identifies them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use rolegate_core::{AccessError, AccessResult, ContextType, EntityId, UserId};

/// The subject of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}

impl User {
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self { id }
    }
}

// =============================================================================
// Context Objects
// =============================================================================

/// A domain object an action operates on.
pub trait ContextObject: fmt::Debug + Send + Sync {
    /// Fully-qualified type of the object.
    fn context_type(&self) -> ContextType;

    /// Persistent identifier, `None` for objects that were never stored.
    fn persistent_id(&self) -> Option<EntityId> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Minimal context object carrying only a type and an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    context_type: ContextType,
    id: Option<EntityId>,
}

impl EntityRef {
    /// A stored entity.
    #[must_use]
    pub fn new(context_type: impl Into<ContextType>, id: EntityId) -> Self {
        Self {
            context_type: context_type.into(),
            id: Some(id),
        }
    }

    /// An entity without a persistent identifier.
    #[must_use]
    pub fn transient(context_type: impl Into<ContextType>) -> Self {
        Self {
            context_type: context_type.into(),
            id: None,
        }
    }
}

impl ContextObject for EntityRef {
    fn context_type(&self) -> ContextType {
        self.context_type.clone()
    }

    fn persistent_id(&self) -> Option<EntityId> {
        self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Domain Service
// =============================================================================

/// Identifies context objects and loads them back by identifier.
pub trait DomainService: Send + Sync {
    /// The persistent identifier of `object`.
    ///
    /// Fails with [`AccessError::UnresolvedIdentity`] when the object has none.
    fn get_id(&self, object: &dyn ContextObject) -> AccessResult<EntityId>;

    /// Load the object of the given type and identifier, if known.
    fn read_object_by_id(
        &self,
        context_type: &ContextType,
        id: EntityId,
    ) -> Option<Arc<dyn ContextObject>>;
}

/// In-memory domain service.
///
/// Identifiers come from [`ContextObject::persistent_id`]; registered objects
/// can be read back by type and identifier.
#[derive(Debug, Default)]
pub struct EntityDomainService {
    objects: DashMap<(ContextType, EntityId), Arc<dyn ContextObject>>,
}

impl EntityDomainService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object so it can be read back by identifier.
    ///
    /// Replaces any object previously registered under the same type and id.
    pub fn register(&self, object: Arc<dyn ContextObject>) -> AccessResult<EntityId> {
        let id = self.get_id(object.as_ref())?;
        self.objects.insert((object.context_type(), id), object);
        Ok(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl DomainService for EntityDomainService {
    fn get_id(&self, object: &dyn ContextObject) -> AccessResult<EntityId> {
        object.persistent_id().ok_or_else(|| {
            AccessError::unresolved_identity(format!(
                "{} has no persistent identifier",
                object.context_type().simple_name()
            ))
        })
    }

    fn read_object_by_id(
        &self,
        context_type: &ContextType,
        id: EntityId,
    ) -> Option<Arc<dyn ContextObject>> {
        self.objects
            .get(&(context_type.clone(), id))
            .map(|entry| Arc::clone(entry.value()))
    }
}
