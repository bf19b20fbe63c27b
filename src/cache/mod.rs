//! Value cache addressing - the identifier map, cache partitioning hints and
//! the view computation cache boundary.

mod identifier_map;
mod select_hint;

pub use identifier_map::{IdentifierMap, InMemoryIdentifierMap};
pub use select_hint::CacheSelectHint;

use std::collections::HashMap;
use std::sync::RwLock;

use crate::value::{ComputedValue, ValueSpecification};

/// One generation of computed values, keyed by specification. Shared across
/// concurrently executing fragments of the same graph; implementations must
/// be safe for concurrent read/insert.
pub trait ViewComputationCache: Send + Sync {
    fn put(&self, value: ComputedValue);
    fn get(&self, specification: &ValueSpecification) -> Option<serde_json::Value>;
}

/// In-process cache generation.
#[derive(Default)]
pub struct InMemoryViewComputationCache {
    values: RwLock<HashMap<ValueSpecification, serde_json::Value>>,
}

impl InMemoryViewComputationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ViewComputationCache for InMemoryViewComputationCache {
    fn put(&self, value: ComputedValue) {
        self.values
            .write()
            .expect("cache lock poisoned")
            .insert(value.specification, value.value);
    }

    fn get(&self, specification: &ValueSpecification) -> Option<serde_json::Value> {
        self.values
            .read()
            .expect("cache lock poisoned")
            .get(specification)
            .cloned()
    }
}
