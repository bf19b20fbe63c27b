//! Value/target model - immutable descriptors identifying what is wanted
//! (a named value on a target) and what was produced (the same, plus the
//! producing function's identity).

mod requirement;
mod target;

pub use requirement::{
    ComputedValue, ValueConstraints, ValueRequirement, ValueSpecification,
    LIVE_DATA_SOURCING_FUNCTION,
};
pub use target::{
    ComputationTarget, ComputationTargetSpecification, ComputationTargetType, TargetObject,
    UniqueIdentifier,
};

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::TargetError;

/// Resolves a target specification to the full target, looking the wrapped
/// object up in whatever master data source backs the implementation.
pub trait ComputationTargetResolver: Send + Sync {
    fn resolve(
        &self,
        specification: &ComputationTargetSpecification,
    ) -> Result<ComputationTarget, TargetError>;
}

/// Target resolver backed by a map of registered objects. Primitive
/// specifications with no identifier resolve to an anonymous primitive.
#[derive(Default)]
pub struct InMemoryComputationTargetResolver {
    objects: RwLock<HashMap<UniqueIdentifier, TargetObject>>,
}

impl InMemoryComputationTargetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, object: TargetObject) {
        if let Some(id) = object.unique_id().cloned() {
            self.objects
                .write()
                .expect("target resolver lock poisoned")
                .insert(id, object);
        }
    }
}

impl ComputationTargetResolver for InMemoryComputationTargetResolver {
    fn resolve(
        &self,
        specification: &ComputationTargetSpecification,
    ) -> Result<ComputationTarget, TargetError> {
        let Some(id) = &specification.identifier else {
            return ComputationTarget::checked(
                specification.target_type,
                TargetObject::Primitive { id: None },
            );
        };
        let objects = self.objects.read().expect("target resolver lock poisoned");
        let object = objects
            .get(id)
            .cloned()
            .ok_or_else(|| TargetError::Unresolved(specification.clone()))?;
        ComputationTarget::checked(specification.target_type, object)
    }
}
