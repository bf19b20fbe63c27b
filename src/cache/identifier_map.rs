//! Bijection between value specifications and compact numeric identifiers.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::CacheError;
use crate::value::ValueSpecification;

/// Maps specifications to stable numeric identifiers and back, so that jobs
/// sent to workers need not repeat full descriptors. Identifiers are created
/// lazily on first encounter and persist for the lifetime of the owning cache
/// generation. Safe for concurrent read/insert.
pub trait IdentifierMap: Send + Sync {
    /// Identifier for the specification, allocating one if never seen.
    fn identifier(&self, specification: &ValueSpecification) -> u64;

    /// Batch form of [`identifier`](Self::identifier).
    fn identifiers(&self, specifications: &[ValueSpecification]) -> Vec<u64> {
        specifications.iter().map(|s| self.identifier(s)).collect()
    }

    /// Inverse lookup; fails for identifiers never allocated.
    fn specification(&self, identifier: u64) -> Result<ValueSpecification, CacheError>;

    /// Batch form of [`specification`](Self::specification).
    fn specifications(&self, identifiers: &[u64]) -> Result<Vec<ValueSpecification>, CacheError> {
        identifiers.iter().map(|&id| self.specification(id)).collect()
    }
}

#[derive(Default)]
struct Inner {
    forward: HashMap<ValueSpecification, u64>,
    reverse: HashMap<u64, ValueSpecification>,
    next: u64,
}

/// In-process identifier map. One lock guards both directions so the two maps
/// can never disagree; allocation is monotonic and identifiers are never
/// reused within a generation.
#[derive(Default)]
pub struct InMemoryIdentifierMap {
    inner: RwLock<Inner>,
}

impl InMemoryIdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("identifier map lock poisoned").forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentifierMap for InMemoryIdentifierMap {
    fn identifier(&self, specification: &ValueSpecification) -> u64 {
        {
            let inner = self.inner.read().expect("identifier map lock poisoned");
            if let Some(&id) = inner.forward.get(specification) {
                return id;
            }
        }
        let mut inner = self.inner.write().expect("identifier map lock poisoned");
        // Re-check under the write lock; another thread may have won the race.
        if let Some(&id) = inner.forward.get(specification) {
            return id;
        }
        let id = inner.next;
        inner.next += 1;
        inner.forward.insert(specification.clone(), id);
        inner.reverse.insert(id, specification.clone());
        id
    }

    fn specification(&self, identifier: u64) -> Result<ValueSpecification, CacheError> {
        let inner = self.inner.read().expect("identifier map lock poisoned");
        inner
            .reverse
            .get(&identifier)
            .cloned()
            .ok_or(CacheError::UnknownIdentifier(identifier))
    }
}
