//! Identity types for package objects.
//!
//! [`ObjectId`] is the stable cross-package identity of one object and
//! [`ObjectType`] is the closed set of object kinds a package can contain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// The stable UUID of a package object.
///
/// The same UUID names the same logical object in the base, customized and
/// vendor packages, even when its content changes. Any opaque string is
/// accepted as long as it is non-empty, contains no whitespace and is at most
/// [`ObjectId::MAX_LEN`] characters.
///
/// Deserialization does not validate; [`crate::model::Package::new`] checks
/// every identifier so that a bad UUID surfaces as a
/// [`crate::error::StructuralError`] naming the offending object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// The maximum length of an object UUID.
    pub const MAX_LEN: usize = 255;

    /// Create a new `ObjectId`, validating its format.
    ///
    /// # Errors
    /// Returns an error if the value is empty, too long, or contains whitespace.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the UUID as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check an already-constructed identifier (e.g. one read by serde).
    ///
    /// # Errors
    /// Same conditions as [`ObjectId::new`].
    pub fn check(&self) -> Result<(), ValidationError> {
        Self::validate(&self.0)
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.is_empty() {
            return Err(ValidationError {
                value: s.to_owned(),
                reason: "object uuid must not be empty".to_owned(),
            });
        }
        if s.len() > Self::MAX_LEN {
            return Err(ValidationError {
                value: s.to_owned(),
                reason: format!(
                    "object uuid must be at most {} characters, got {}",
                    Self::MAX_LEN,
                    s.len()
                ),
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(ValidationError {
                value: s.to_owned(),
                reason: "object uuid must not contain whitespace".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// ObjectType
// ---------------------------------------------------------------------------

/// The kind of a package object.
///
/// Declaration order is the canonical type order used for display; review
/// ordering does not depend on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// A user interface definition.
    Interface,
    /// A reusable expression rule.
    ExpressionRule,
    /// A process model (nodes + flows).
    ProcessModel,
    /// A record type.
    RecordType,
    /// A custom data type.
    DataType,
    /// A named constant.
    Constant,
    /// An outbound integration.
    Integration,
    /// An inbound web API.
    WebApi,
    /// A site (navigation container).
    Site,
    /// A user group.
    Group,
    /// A connected system definition.
    ConnectedSystem,
}

impl ObjectType {
    /// All object types in canonical order.
    pub const ALL: [Self; 11] = [
        Self::Interface,
        Self::ExpressionRule,
        Self::ProcessModel,
        Self::RecordType,
        Self::DataType,
        Self::Constant,
        Self::Integration,
        Self::WebApi,
        Self::Site,
        Self::Group,
        Self::ConnectedSystem,
    ];

    /// The snake_case tag used in serialized packages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interface => "interface",
            Self::ExpressionRule => "expression_rule",
            Self::ProcessModel => "process_model",
            Self::RecordType => "record_type",
            Self::DataType => "data_type",
            Self::Constant => "constant",
            Self::Integration => "integration",
            Self::WebApi => "web_api",
            Self::Site => "site",
            Self::Group => "group",
            Self::ConnectedSystem => "connected_system",
        }
    }

    /// Human-readable label (e.g. `"Process Model"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Interface => "Interface",
            Self::ExpressionRule => "Expression Rule",
            Self::ProcessModel => "Process Model",
            Self::RecordType => "Record Type",
            Self::DataType => "Data Type",
            Self::Constant => "Constant",
            Self::Integration => "Integration",
            Self::WebApi => "Web API",
            Self::Site => "Site",
            Self::Group => "Group",
            Self::ConnectedSystem => "Connected System",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ObjectType {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError {
                value: s.to_owned(),
                reason: "unknown object type".to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// A value failed identity validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_accepts_opaque_uuids() {
        assert!(ObjectId::new("_a-0000e6a4-1b2c-8000-9bc0-011c48011c48_1234").is_ok());
        assert!(ObjectId::new("6f1c2b8e-0d6a-4a4f-9d57-3b0a1f1e9a77").is_ok());
    }

    #[test]
    fn object_id_rejects_empty() {
        let err = ObjectId::new("").unwrap_err();
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn object_id_rejects_whitespace() {
        assert!(ObjectId::new("abc def").is_err());
        assert!(ObjectId::new(" abc").is_err());
    }

    #[test]
    fn object_id_rejects_too_long() {
        assert!(ObjectId::new(&"a".repeat(ObjectId::MAX_LEN + 1)).is_err());
        assert!(ObjectId::new(&"a".repeat(ObjectId::MAX_LEN)).is_ok());
    }

    #[test]
    fn object_id_serde_is_transparent() {
        let id = ObjectId::new("uuid-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"uuid-1\"");
        let back: ObjectId = serde_json::from_str("\"uuid-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn object_type_round_trips_through_str() {
        for t in ObjectType::ALL {
            assert_eq!(t.as_str().parse::<ObjectType>().unwrap(), t);
        }
        assert!("widget".parse::<ObjectType>().is_err());
    }

    #[test]
    fn object_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&ObjectType::ProcessModel).unwrap();
        assert_eq!(json, "\"process_model\"");
    }

    #[test]
    fn object_type_display_is_label() {
        assert_eq!(ObjectType::WebApi.to_string(), "Web API");
    }
}
