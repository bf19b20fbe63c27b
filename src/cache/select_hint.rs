//! Shared-vs-private cache partitioning hints.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::CacheError;
use crate::value::ValueSpecification;

use super::identifier_map::IdentifierMap;

/// A filter deciding whether a given value goes to the private per-job cache
/// or the shared cross-job cache.
///
/// The listed set always denotes the minority partition: when `is_private` is
/// true, listed values are private and everything else is shared; when false,
/// listed values are shared and everything else is private. A job with mostly
/// shared values therefore only lists its few private ones, and vice versa.
/// This is purely a wire-size optimization.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CacheSelectHint {
    #[serde(skip)]
    specifications: BTreeSet<ValueSpecification>,
    identifiers: Option<SmallVec<[u64; 8]>>,
    is_private: bool,
}

impl CacheSelectHint {
    /// Hint listing the private values; everything else is shared.
    pub fn private_values(values: impl IntoIterator<Item = ValueSpecification>) -> Self {
        Self {
            specifications: values.into_iter().collect(),
            identifiers: None,
            is_private: true,
        }
    }

    /// Hint listing the shared values; everything else is private.
    pub fn shared_values(values: impl IntoIterator<Item = ValueSpecification>) -> Self {
        Self {
            specifications: values.into_iter().collect(),
            identifiers: None,
            is_private: false,
        }
    }

    /// Every value shared: an empty private set.
    pub fn all_shared() -> Self {
        Self::private_values([])
    }

    /// Every value private: an empty shared set.
    pub fn all_private() -> Self {
        Self::shared_values([])
    }

    /// Reconstructs a hint from its wire form.
    pub fn from_identifiers(identifiers: impl Into<SmallVec<[u64; 8]>>, is_private: bool) -> Self {
        Self {
            specifications: BTreeSet::new(),
            identifiers: Some(identifiers.into()),
            is_private,
        }
    }

    /// Converts the listed specifications to numeric identifiers for wire
    /// transfer. Idempotent: converts at most once.
    pub fn convert_specifications(&mut self, identifier_map: &dyn IdentifierMap) {
        if self.identifiers.is_none() {
            let specs: Vec<ValueSpecification> = self.specifications.iter().cloned().collect();
            self.identifiers = Some(identifier_map.identifiers(&specs).into());
        }
    }

    /// Converts numeric identifiers back to full specifications after
    /// receipt. Idempotent: resolves at most once.
    pub fn resolve_specifications(
        &mut self,
        identifier_map: &dyn IdentifierMap,
    ) -> Result<(), CacheError> {
        if self.specifications.is_empty() {
            if let Some(identifiers) = &self.identifiers {
                self.specifications = identifier_map
                    .specifications(identifiers)?
                    .into_iter()
                    .collect();
            }
        }
        Ok(())
    }

    /// Whether the given value belongs to the private partition.
    pub fn is_private_value(&self, specification: &ValueSpecification) -> bool {
        if self.is_private {
            self.specifications.contains(specification)
        } else {
            !self.specifications.contains(specification)
        }
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn identifiers(&self) -> Option<&[u64]> {
        self.identifiers.as_deref()
    }
}
