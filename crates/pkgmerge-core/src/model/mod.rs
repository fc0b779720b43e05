//! Package data model: identities, objects and packages.

pub mod object;
pub mod package;
pub mod types;

pub use object::{
    ConstantBody, FieldMap, Flow, Node, Object, Payload, ProcessModelBody, RecordField,
    RecordTypeBody, Relationship,
};
pub use package::{NameIndex, Package};
pub use types::{ObjectId, ObjectType, ValidationError};
