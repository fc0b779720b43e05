//! Package objects: a common identity header plus a kind-specific payload.
//!
//! Objects serialize flat (`uuid`, `name`, `object_type`, `code`, `nodes`,
//! ...) so that ingestion tools can emit one JSON object per package entry.
//! In memory the kind-specific content lives in [`Payload`], which is what
//! the comparator and dependency analyzer dispatch on.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::types::{ObjectId, ObjectType};

/// Generic ordered key/value content (`fields`, `properties`).
///
/// Keys are kept sorted; key order is not significant for comparison.
pub type FieldMap = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Process model payload
// ---------------------------------------------------------------------------

/// One node of a process model.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Node identity, unique within its process model.
    pub node_uuid: String,
    /// Node kind (e.g. `"user_input_task"`, `"script_task"`).
    pub node_type: String,
    /// Display name.
    #[serde(default)]
    pub node_name: String,
    /// UUID of the interface this node renders, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_uuid: Option<ObjectId>,
    /// Expression evaluated by this node, if any. Scanned for named references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// A directed flow between two process model nodes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Flow {
    /// Source node.
    pub from_node_uuid: String,
    /// Destination node.
    pub to_node_uuid: String,
    /// Optional flow label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Optional gateway condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Nodes and flows of a process model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessModelBody {
    /// Nodes in authored order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Flows in authored order.
    #[serde(default)]
    pub flows: Vec<Flow>,
}

// ---------------------------------------------------------------------------
// Constant payload
// ---------------------------------------------------------------------------

/// The value held by a constant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantBody {
    /// The constant's value.
    #[serde(default)]
    pub value: Option<Value>,
    /// Declared type of the value (e.g. `"Text"`, `"Integer"`).
    #[serde(default)]
    pub value_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Record type payload
// ---------------------------------------------------------------------------

/// One field of a record type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordField {
    /// Field name, unique within the record type.
    pub name: String,
    /// Declared data type.
    #[serde(default)]
    pub data_type: String,
    /// Whether this field is (part of) the primary key.
    #[serde(default)]
    pub primary_key: bool,
}

/// A relationship from one record type to another.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship name, unique within the record type.
    pub name: String,
    /// UUID of the related record type.
    pub target_uuid: ObjectId,
}

/// Fields and relationships of a record type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeBody {
    /// Record fields in authored order.
    #[serde(default)]
    pub record_fields: Vec<RecordField>,
    /// Relationships in authored order.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Kind-specific content of an object. The variant determines the
/// object's [`ObjectType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// An interface.
    Interface,
    /// An expression rule.
    ExpressionRule,
    /// A process model with its nodes and flows.
    ProcessModel(ProcessModelBody),
    /// A record type with its fields and relationships.
    RecordType(RecordTypeBody),
    /// A custom data type.
    DataType,
    /// A constant with its value.
    Constant(ConstantBody),
    /// An integration.
    Integration,
    /// A web API.
    WebApi,
    /// A site.
    Site,
    /// A group.
    Group,
    /// A connected system.
    ConnectedSystem,
}

impl Payload {
    /// An empty payload of the given kind.
    #[must_use]
    pub fn empty(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Interface => Self::Interface,
            ObjectType::ExpressionRule => Self::ExpressionRule,
            ObjectType::ProcessModel => Self::ProcessModel(ProcessModelBody::default()),
            ObjectType::RecordType => Self::RecordType(RecordTypeBody::default()),
            ObjectType::DataType => Self::DataType,
            ObjectType::Constant => Self::Constant(ConstantBody::default()),
            ObjectType::Integration => Self::Integration,
            ObjectType::WebApi => Self::WebApi,
            ObjectType::Site => Self::Site,
            ObjectType::Group => Self::Group,
            ObjectType::ConnectedSystem => Self::ConnectedSystem,
        }
    }

    /// The object kind this payload belongs to.
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::Interface => ObjectType::Interface,
            Self::ExpressionRule => ObjectType::ExpressionRule,
            Self::ProcessModel(_) => ObjectType::ProcessModel,
            Self::RecordType(_) => ObjectType::RecordType,
            Self::DataType => ObjectType::DataType,
            Self::Constant(_) => ObjectType::Constant,
            Self::Integration => ObjectType::Integration,
            Self::WebApi => ObjectType::WebApi,
            Self::Site => ObjectType::Site,
            Self::Group => ObjectType::Group,
            Self::ConnectedSystem => ObjectType::ConnectedSystem,
        }
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// An immutable snapshot of one package object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawObject", into = "RawObject")]
pub struct Object {
    /// Stable identity.
    pub uuid: ObjectId,
    /// Object name as authored. Named references resolve against this.
    pub name: String,
    /// Version identifier; changes on every save of the object.
    pub version_uuid: String,
    /// Free-text expression or definition.
    pub code: Option<String>,
    /// Generic fields.
    pub fields: FieldMap,
    /// Generic properties.
    pub properties: FieldMap,
    /// Kind-specific content.
    pub payload: Payload,
}

impl Object {
    /// Create an object with an empty payload of the given kind.
    #[must_use]
    pub fn new(uuid: ObjectId, name: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            uuid,
            name: name.into(),
            version_uuid: String::new(),
            code: None,
            fields: FieldMap::new(),
            properties: FieldMap::new(),
            payload: Payload::empty(object_type),
        }
    }

    /// Set the version UUID.
    #[must_use]
    pub fn with_version(mut self, version_uuid: impl Into<String>) -> Self {
        self.version_uuid = version_uuid.into();
        self
    }

    /// Set the code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Insert a generic field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Insert a generic property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Replace the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// The object kind.
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        self.payload.object_type()
    }

    /// Process model nodes (empty for other kinds).
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        match &self.payload {
            Payload::ProcessModel(pm) => &pm.nodes,
            _ => &[],
        }
    }

    /// Process model flows (empty for other kinds).
    #[must_use]
    pub fn flows(&self) -> &[Flow] {
        match &self.payload {
            Payload::ProcessModel(pm) => &pm.flows,
            _ => &[],
        }
    }

    /// Constant body, if this is a constant.
    #[must_use]
    pub const fn constant(&self) -> Option<&ConstantBody> {
        match &self.payload {
            Payload::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Record type body, if this is a record type.
    #[must_use]
    pub const fn record_type(&self) -> Option<&RecordTypeBody> {
        match &self.payload {
            Payload::RecordType(r) => Some(r),
            _ => None,
        }
    }

    /// SHA-256 over the tracked content of this object, as lowercase hex.
    ///
    /// Two objects with equal fingerprints are unchanged with respect to each
    /// other: version, code, fields, properties and the kind-specific payload
    /// are all hashed. Node, flow, record field and relationship lists are
    /// hashed in canonical (sorted) order, so authored order does not count.
    #[must_use]
    pub fn content_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(self.object_type().as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.version_uuid.as_bytes());
        hasher.update(b"\n");
        match &self.code {
            Some(code) => {
                hasher.update(b"code:");
                hasher.update(code.as_bytes());
            }
            None => hasher.update(b"nocode"),
        }
        hasher.update(b"\n");
        hash_field_map(&mut hasher, b"fields", &self.fields);
        hash_field_map(&mut hasher, b"properties", &self.properties);

        match &self.payload {
            Payload::ProcessModel(pm) => {
                let mut nodes: Vec<&Node> = pm.nodes.iter().collect();
                nodes.sort();
                for n in nodes {
                    hasher.update(format!("node:{n:?}\n").as_bytes());
                }
                let mut flows: Vec<&Flow> = pm.flows.iter().collect();
                flows.sort();
                for fl in flows {
                    hasher.update(format!("flow:{fl:?}\n").as_bytes());
                }
            }
            Payload::Constant(c) => {
                let value = c.value.as_ref().map(Value::to_string);
                hasher.update(format!("const:{value:?}:{:?}\n", c.value_type).as_bytes());
            }
            Payload::RecordType(r) => {
                let mut fields: Vec<&RecordField> = r.record_fields.iter().collect();
                fields.sort();
                for rf in fields {
                    hasher.update(format!("rfield:{rf:?}\n").as_bytes());
                }
                let mut rels: Vec<&Relationship> = r.relationships.iter().collect();
                rels.sort();
                for rel in rels {
                    hasher.update(format!("rel:{rel:?}\n").as_bytes());
                }
            }
            _ => {}
        }

        let result = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for b in &result {
            let _ = write!(hex, "{b:02x}");
        }
        hex
    }
}

fn hash_field_map(hasher: &mut Sha256, tag: &[u8], map: &FieldMap) {
    hasher.update(tag);
    hasher.update(b"{\n");
    for (k, v) in map {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"}\n");
}

// ---------------------------------------------------------------------------
// Flat wire shape
// ---------------------------------------------------------------------------

/// Flat serialized form of an [`Object`].
///
/// Kind-specific keys that do not belong to `object_type` are ignored on
/// input and never written on output.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawObject {
    uuid: ObjectId,
    #[serde(default)]
    name: String,
    object_type: ObjectType,
    #[serde(default)]
    version_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "FieldMap::is_empty")]
    fields: FieldMap,
    #[serde(default, skip_serializing_if = "FieldMap::is_empty")]
    properties: FieldMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nodes: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flows: Option<Vec<Flow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record_fields: Option<Vec<RecordField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relationships: Option<Vec<Relationship>>,
}

impl From<RawObject> for Object {
    fn from(raw: RawObject) -> Self {
        let payload = match raw.object_type {
            ObjectType::ProcessModel => Payload::ProcessModel(ProcessModelBody {
                nodes: raw.nodes.unwrap_or_default(),
                flows: raw.flows.unwrap_or_default(),
            }),
            ObjectType::Constant => Payload::Constant(ConstantBody {
                value: raw.value,
                value_type: raw.value_type,
            }),
            ObjectType::RecordType => Payload::RecordType(RecordTypeBody {
                record_fields: raw.record_fields.unwrap_or_default(),
                relationships: raw.relationships.unwrap_or_default(),
            }),
            other => Payload::empty(other),
        };
        Self {
            uuid: raw.uuid,
            name: raw.name,
            version_uuid: raw.version_uuid,
            code: raw.code,
            fields: raw.fields,
            properties: raw.properties,
            payload,
        }
    }
}

impl From<Object> for RawObject {
    fn from(obj: Object) -> Self {
        let object_type = obj.object_type();
        let mut raw = Self {
            uuid: obj.uuid,
            name: obj.name,
            object_type,
            version_uuid: obj.version_uuid,
            code: obj.code,
            fields: obj.fields,
            properties: obj.properties,
            nodes: None,
            flows: None,
            value: None,
            value_type: None,
            record_fields: None,
            relationships: None,
        };
        match obj.payload {
            Payload::ProcessModel(pm) => {
                raw.nodes = Some(pm.nodes);
                raw.flows = Some(pm.flows);
            }
            Payload::Constant(c) => {
                raw.value = c.value;
                raw.value_type = c.value_type;
            }
            Payload::RecordType(r) => {
                raw.record_fields = Some(r.record_fields);
                raw.relationships = Some(r.relationships);
            }
            _ => {}
        }
        raw
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> ObjectId {
        ObjectId::new(s).unwrap()
    }

    fn node(uuid: &str) -> Node {
        Node {
            node_uuid: uuid.to_owned(),
            node_type: "script_task".to_owned(),
            node_name: format!("Node {uuid}"),
            interface_uuid: None,
            script: None,
        }
    }

    #[test]
    fn deserializes_flat_process_model() {
        let raw = json!({
            "uuid": "pm-1",
            "name": "Onboard Customer",
            "object_type": "process_model",
            "version_uuid": "v1",
            "nodes": [{"node_uuid": "n1", "node_type": "start_event", "node_name": "Start"}],
            "flows": [{"from_node_uuid": "n1", "to_node_uuid": "n2"}]
        });
        let obj: Object = serde_json::from_value(raw).unwrap();
        assert_eq!(obj.object_type(), ObjectType::ProcessModel);
        assert_eq!(obj.nodes().len(), 1);
        assert_eq!(obj.flows().len(), 1);
        assert!(obj.code.is_none());
    }

    #[test]
    fn ignores_payload_keys_of_other_kinds() {
        let raw = json!({
            "uuid": "r-1",
            "name": "rule",
            "object_type": "expression_rule",
            "nodes": [{"node_uuid": "n1", "node_type": "x"}],
            "value": 3
        });
        let obj: Object = serde_json::from_value(raw).unwrap();
        assert_eq!(obj.payload, Payload::ExpressionRule);
        assert!(obj.nodes().is_empty());
    }

    #[test]
    fn serializes_back_to_flat_shape() {
        let obj = Object::new(id("c-1"), "MAX_ITEMS", ObjectType::Constant)
            .with_version("v1")
            .with_payload(Payload::Constant(ConstantBody {
                value: Some(json!(10)),
                value_type: Some("Integer".to_owned()),
            }));
        let value = serde_json::to_value(&obj).unwrap();
        assert_eq!(value["object_type"], "constant");
        assert_eq!(value["value"], 10);
        assert!(value.get("nodes").is_none());

        let back: Object = serde_json::from_value(value).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn fingerprint_ignores_node_order() {
        let a = Object::new(id("pm"), "pm", ObjectType::ProcessModel).with_payload(
            Payload::ProcessModel(ProcessModelBody {
                nodes: vec![node("n1"), node("n2")],
                flows: vec![],
            }),
        );
        let b = Object::new(id("pm"), "pm", ObjectType::ProcessModel).with_payload(
            Payload::ProcessModel(ProcessModelBody {
                nodes: vec![node("n2"), node("n1")],
                flows: vec![],
            }),
        );
        assert_eq!(a.content_fingerprint(), b.content_fingerprint());
    }

    #[test]
    fn fingerprint_tracks_code_and_constant_value() {
        let base = Object::new(id("x"), "x", ObjectType::ExpressionRule).with_code("a");
        let changed = base.clone().with_code("b");
        assert_ne!(base.content_fingerprint(), changed.content_fingerprint());

        let c1 = Object::new(id("c"), "c", ObjectType::Constant).with_payload(Payload::Constant(
            ConstantBody {
                value: Some(json!("x")),
                value_type: None,
            },
        ));
        let c2 = Object::new(id("c"), "c", ObjectType::Constant).with_payload(Payload::Constant(
            ConstantBody {
                value: Some(json!("y")),
                value_type: None,
            },
        ));
        assert_ne!(c1.content_fingerprint(), c2.content_fingerprint());
    }

    #[test]
    fn fingerprint_is_lowercase_hex() {
        let fp = Object::new(id("x"), "x", ObjectType::Site).content_fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
