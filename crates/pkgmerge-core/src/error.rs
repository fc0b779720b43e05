//! Error and diagnostic types for the reconciliation core.
//!
//! Only [`StructuralError`] is fatal. It is raised while a package is being
//! assembled ([`crate::model::Package::new`]) and aborts the run before any
//! comparison starts. Everything downstream of a valid package is total.
//!
//! [`UnresolvedReference`] is a non-fatal diagnostic: a named reference that
//! could not be matched to a sibling object is left out of the dependency
//! graph and recorded here instead.

use std::fmt;

use serde::Serialize;

use crate::model::types::{ObjectId, ValidationError};

// ---------------------------------------------------------------------------
// StructuralError
// ---------------------------------------------------------------------------

/// A package mapping is malformed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StructuralError {
    /// An object's UUID failed validation.
    InvalidObjectId {
        /// Name of the object carrying the bad UUID (may be empty).
        name: String,
        /// Why the UUID is invalid.
        source: ValidationError,
    },

    /// A required identity field is missing or empty.
    MissingField {
        /// The object missing the field.
        uuid: ObjectId,
        /// The field name (`"name"` or `"version_uuid"`).
        field: &'static str,
    },

    /// The same UUID appears more than once within one package.
    DuplicateObject {
        /// The repeated UUID.
        uuid: ObjectId,
        /// Name of the first object seen with this UUID.
        first_name: String,
        /// Name of the later duplicate.
        duplicate_name: String,
    },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidObjectId { name, source } => {
                if name.is_empty() {
                    write!(f, "object has an invalid uuid: {source}")?;
                } else {
                    write!(f, "object '{name}' has an invalid uuid: {source}")?;
                }
                write!(
                    f,
                    "\n  To fix: re-export the package; every object needs a non-empty uuid without whitespace."
                )
            }
            Self::MissingField { uuid, field } => {
                write!(
                    f,
                    "object {uuid} is missing required field '{field}'.\n  To fix: re-export the package so every object carries uuid, name and version_uuid."
                )
            }
            Self::DuplicateObject {
                uuid,
                first_name,
                duplicate_name,
            } => {
                write!(
                    f,
                    "uuid {uuid} appears more than once ('{first_name}' and '{duplicate_name}').\n  To fix: a package must contain each object exactly once; check the export for duplicated entries."
                )
            }
        }
    }
}

impl std::error::Error for StructuralError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidObjectId { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// UnresolvedReference
// ---------------------------------------------------------------------------

/// Where in an object an unresolved reference was found.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceSite {
    /// The object's own code.
    Code,
    /// The script of a process model node.
    NodeScript {
        /// The node carrying the script.
        node_uuid: String,
    },
    /// The interface link of a process model node.
    NodeInterface {
        /// The node carrying the link.
        node_uuid: String,
    },
    /// A record type relationship.
    Relationship {
        /// Relationship name.
        name: String,
    },
}

impl fmt::Display for ReferenceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => write!(f, "code"),
            Self::NodeScript { node_uuid } => write!(f, "script of node {node_uuid}"),
            Self::NodeInterface { node_uuid } => write!(f, "interface of node {node_uuid}"),
            Self::Relationship { name } => write!(f, "relationship '{name}'"),
        }
    }
}

/// A reference that could not be resolved to a sibling object.
///
/// Non-fatal: the reference is simply absent from the dependency graph.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnresolvedReference {
    /// The referencing object.
    pub from: ObjectId,
    /// The reference as written (e.g. `rule!Missing` or a UUID).
    pub reference: String,
    /// Where the reference appeared.
    pub site: ReferenceSite,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: unresolved reference '{}' in {}",
            self.from, self.reference, self.site
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
