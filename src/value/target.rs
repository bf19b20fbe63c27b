//! Computation targets - the subjects of computation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TargetError;

/// A persistent unique identifier: scheme plus value, e.g. `PortMaster::123-0`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueIdentifier {
    /// Naming scheme the value is unique within
    pub scheme: String,
    /// Identifier value
    pub value: String,
}

impl UniqueIdentifier {
    pub fn new(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scheme, self.value)
    }
}

impl FromStr for UniqueIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, value) = s
            .split_once("::")
            .ok_or_else(|| format!("Invalid unique identifier: {s}"))?;
        Ok(Self::new(scheme, value))
    }
}

/// The type that computation will be based on.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputationTargetType {
    /// A set of positions (a portfolio node, or whole portfolio).
    PortfolioNode,
    /// A position.
    Position,
    /// A security.
    Security,
    /// A simple type, effectively "anything else".
    Primitive,
}

impl ComputationTargetType {
    /// Checks if the type is compatible with the wrapped object.
    pub fn is_compatible(&self, object: &TargetObject) -> bool {
        *self == ComputationTargetType::determine_from(object)
    }

    /// Derives the type for the given object.
    pub fn determine_from(object: &TargetObject) -> Self {
        match object {
            TargetObject::Portfolio { .. } | TargetObject::PortfolioNode { .. } => {
                ComputationTargetType::PortfolioNode
            }
            TargetObject::Position { .. } => ComputationTargetType::Position,
            TargetObject::Security { .. } => ComputationTargetType::Security,
            TargetObject::Primitive { .. } => ComputationTargetType::Primitive,
        }
    }
}

impl fmt::Display for ComputationTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComputationTargetType::PortfolioNode => "PORTFOLIO_NODE",
            ComputationTargetType::Position => "POSITION",
            ComputationTargetType::Security => "SECURITY",
            ComputationTargetType::Primitive => "PRIMITIVE",
        };
        f.write_str(s)
    }
}

/// The object a computation target wraps. A whole portfolio and a portfolio
/// node both classify as `PortfolioNode`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TargetObject {
    Portfolio {
        id: UniqueIdentifier,
        name: String,
    },
    PortfolioNode {
        id: UniqueIdentifier,
        name: String,
    },
    Position {
        id: UniqueIdentifier,
        /// Signed holding quantity
        quantity: f64,
        /// Security the position is held in
        security: UniqueIdentifier,
    },
    Security {
        id: UniqueIdentifier,
        /// Asset-class discriminator, e.g. "EQUITY_OPTION"
        security_type: String,
    },
    /// Anything else; identity is optional (e.g. an ad-hoc curve name).
    Primitive {
        id: Option<UniqueIdentifier>,
    },
}

impl TargetObject {
    /// Persistent identity of the object, if it has one.
    pub fn unique_id(&self) -> Option<&UniqueIdentifier> {
        match self {
            TargetObject::Portfolio { id, .. }
            | TargetObject::PortfolioNode { id, .. }
            | TargetObject::Position { id, .. }
            | TargetObject::Security { id, .. } => Some(id),
            TargetObject::Primitive { id } => id.as_ref(),
        }
    }
}

/// Identifies a computation target without carrying the object itself: the
/// form used in requirements, specifications and wire messages.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ComputationTargetSpecification {
    pub target_type: ComputationTargetType,
    pub identifier: Option<UniqueIdentifier>,
}

impl ComputationTargetSpecification {
    pub fn new(target_type: ComputationTargetType, identifier: UniqueIdentifier) -> Self {
        Self {
            target_type,
            identifier: Some(identifier),
        }
    }

    /// Specification of an anonymous primitive target.
    pub fn anonymous(target_type: ComputationTargetType) -> Self {
        Self {
            target_type,
            identifier: None,
        }
    }
}

impl fmt::Display for ComputationTargetSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "CTSpec[{}, {}]", self.target_type, id),
            None => write!(f, "CTSpec[{}]", self.target_type),
        }
    }
}

/// A fully resolved computation target: specification plus the wrapped object.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputationTarget {
    specification: ComputationTargetSpecification,
    object: TargetObject,
}

impl ComputationTarget {
    /// Creates a target, deriving the type structurally from the object.
    pub fn from_object(object: TargetObject) -> Self {
        let target_type = ComputationTargetType::determine_from(&object);
        let specification = ComputationTargetSpecification {
            target_type,
            identifier: object.unique_id().cloned(),
        };
        Self {
            specification,
            object,
        }
    }

    /// Creates a target with an explicitly declared type, checking that the
    /// declared type is consistent with the object.
    pub fn checked(
        target_type: ComputationTargetType,
        object: TargetObject,
    ) -> Result<Self, TargetError> {
        let actual = ComputationTargetType::determine_from(&object);
        if target_type != actual {
            return Err(TargetError::Incompatible {
                declared: target_type,
                actual,
            });
        }
        Ok(Self::from_object(object))
    }

    pub fn specification(&self) -> &ComputationTargetSpecification {
        &self.specification
    }

    pub fn target_type(&self) -> ComputationTargetType {
        self.specification.target_type
    }

    pub fn unique_id(&self) -> Option<&UniqueIdentifier> {
        self.specification.identifier.as_ref()
    }

    pub fn object(&self) -> &TargetObject {
        &self.object
    }
}

impl fmt::Display for ComputationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.specification.fmt(f)
    }
}
