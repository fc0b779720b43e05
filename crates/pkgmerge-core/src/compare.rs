//! COMPARE step: diff two complete packages into a [`Delta`].
//!
//! ```text
//! added    = keys(target) − keys(base)
//! removed  = keys(base) − keys(target)
//! modified = common keys whose tracked content differs
//! ```
//!
//! Tracked content is the version UUID, code, generic fields and properties,
//! and the kind-specific payload (constant value, process model nodes and
//! flows, record type fields and relationships). A content fingerprint is
//! checked first; only objects whose fingerprints differ are compared field
//! by field.
//!
//! All three lists are sorted by UUID. The comparison is pure.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::model::{Flow, Node, Object, ObjectId, ObjectType, Package, RecordField, Relationship};

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

/// What happened to an object between two packages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only in the target.
    Added,
    /// Present in both, tracked content differs.
    Modified,
    /// Present only in the base.
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Delta entries
// ---------------------------------------------------------------------------

/// Identity of one changed object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeltaEntry {
    /// Object UUID.
    pub uuid: ObjectId,
    /// Object name (from the target for added/modified, the base for removed).
    pub name: String,
    /// Object kind (same source as `name`).
    pub object_type: ObjectType,
}

impl DeltaEntry {
    /// Entry describing `obj`.
    #[must_use]
    pub fn of(obj: &Object) -> Self {
        Self {
            uuid: obj.uuid.clone(),
            name: obj.name.clone(),
            object_type: obj.object_type(),
        }
    }
}

/// One key of `fields`/`properties` that changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyChange {
    /// The key.
    pub key: String,
    /// Value in the base (`None` if the key was added).
    pub before: Option<Value>,
    /// Value in the target (`None` if the key was removed).
    pub after: Option<Value>,
}

/// A keyed list item that exists on both sides with different content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemChange<T> {
    /// The item in the base.
    pub before: T,
    /// The item in the target.
    pub after: T,
}

/// Before/after detail for one tracked field of a modified object.
///
/// Only fields that actually changed are reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    /// The version UUID changed.
    VersionUuid {
        /// Base version.
        before: String,
        /// Target version.
        after: String,
    },
    /// The object's kind changed under the same UUID.
    ObjectType {
        /// Base kind.
        before: ObjectType,
        /// Target kind.
        after: ObjectType,
    },
    /// The code changed.
    Code {
        /// Base code.
        before: Option<String>,
        /// Target code.
        after: Option<String>,
    },
    /// One or more generic fields changed.
    Fields {
        /// Changed keys in key order.
        changes: Vec<KeyChange>,
    },
    /// One or more generic properties changed.
    Properties {
        /// Changed keys in key order.
        changes: Vec<KeyChange>,
    },
    /// A constant's value changed.
    ConstantValue {
        /// Base value.
        before: Option<Value>,
        /// Target value.
        after: Option<Value>,
    },
    /// A constant's declared value type changed.
    ConstantType {
        /// Base type.
        before: Option<String>,
        /// Target type.
        after: Option<String>,
    },
    /// Process model nodes changed (matched by `node_uuid`).
    Nodes {
        /// Node count in the base.
        before_count: usize,
        /// Node count in the target.
        after_count: usize,
        /// Nodes only in the target.
        added: Vec<Node>,
        /// Nodes only in the base.
        removed: Vec<Node>,
        /// Nodes on both sides with different content.
        changed: Vec<ItemChange<Node>>,
    },
    /// Process model flows changed (compared as a multiset).
    Flows {
        /// Flow count in the base.
        before_count: usize,
        /// Flow count in the target.
        after_count: usize,
        /// Flows only in the target.
        added: Vec<Flow>,
        /// Flows only in the base.
        removed: Vec<Flow>,
    },
    /// Record type fields changed (matched by name).
    RecordFields {
        /// Fields only in the target.
        added: Vec<RecordField>,
        /// Fields only in the base.
        removed: Vec<RecordField>,
        /// Fields on both sides with different content.
        changed: Vec<ItemChange<RecordField>>,
    },
    /// Record type relationships changed (matched by name).
    Relationships {
        /// Relationships only in the target.
        added: Vec<Relationship>,
        /// Relationships only in the base.
        removed: Vec<Relationship>,
        /// Relationships on both sides with different content.
        changed: Vec<ItemChange<Relationship>>,
    },
}

impl FieldChange {
    /// Short name of the changed field (matches the serialized tag).
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::VersionUuid { .. } => "version_uuid",
            Self::ObjectType { .. } => "object_type",
            Self::Code { .. } => "code",
            Self::Fields { .. } => "fields",
            Self::Properties { .. } => "properties",
            Self::ConstantValue { .. } => "constant_value",
            Self::ConstantType { .. } => "constant_type",
            Self::Nodes { .. } => "nodes",
            Self::Flows { .. } => "flows",
            Self::RecordFields { .. } => "record_fields",
            Self::Relationships { .. } => "relationships",
        }
    }
}

/// A modified object together with its field-level changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModifiedEntry {
    /// Identity of the object (as it appears in the target).
    #[serde(flatten)]
    pub entry: DeltaEntry,
    /// Changed fields, never empty.
    pub changes: Vec<FieldChange>,
}

impl ModifiedEntry {
    /// Returns `true` if the given field changed.
    #[must_use]
    pub fn changed(&self, field: &str) -> bool {
        self.changes.iter().any(|c| c.field_name() == field)
    }
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// The added/modified/removed partition between two packages.
///
/// The three lists are disjoint and each is sorted by UUID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Delta {
    /// UUIDs only in the target.
    pub added: Vec<DeltaEntry>,
    /// UUIDs in both with differing tracked content.
    pub modified: Vec<ModifiedEntry>,
    /// UUIDs only in the base.
    pub removed: Vec<DeltaEntry>,
}

impl Delta {
    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed objects.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// Iterate over every changed object with its change kind.
    ///
    /// Order: added, then modified, then removed; UUID order within each.
    pub fn entries(&self) -> impl Iterator<Item = (ChangeKind, &DeltaEntry)> {
        self.added
            .iter()
            .map(|e| (ChangeKind::Added, e))
            .chain(self.modified.iter().map(|m| (ChangeKind::Modified, &m.entry)))
            .chain(self.removed.iter().map(|e| (ChangeKind::Removed, e)))
    }

    /// The set of changed UUIDs.
    #[must_use]
    pub fn changed_uuids(&self) -> BTreeSet<&ObjectId> {
        self.entries().map(|(_, e)| &e.uuid).collect()
    }

    /// What happened to `uuid`, if it changed.
    #[must_use]
    pub fn action(&self, uuid: &ObjectId) -> Option<ChangeKind> {
        self.entries()
            .find(|(_, e)| &e.uuid == uuid)
            .map(|(kind, _)| kind)
    }

    /// The modified entry for `uuid`, if it was modified.
    #[must_use]
    pub fn modified_entry(&self, uuid: &ObjectId) -> Option<&ModifiedEntry> {
        self.modified
            .binary_search_by(|m| m.entry.uuid.cmp(uuid))
            .ok()
            .map(|i| &self.modified[i])
    }
}

// ---------------------------------------------------------------------------
// compare
// ---------------------------------------------------------------------------

/// Compare two complete packages.
///
/// Both packages were validated on construction, so the comparison is total:
/// empty packages and fully disjoint packages produce a well-formed delta.
#[must_use]
pub fn compare(base: &Package, target: &Package) -> Delta {
    let mut delta = Delta::default();

    for obj in target.objects() {
        if !base.contains(&obj.uuid) {
            delta.added.push(DeltaEntry::of(obj));
        }
    }

    for before in base.objects() {
        match target.get(&before.uuid) {
            None => delta.removed.push(DeltaEntry::of(before)),
            Some(after) => {
                let changes = diff_objects(before, after);
                if !changes.is_empty() {
                    delta.modified.push(ModifiedEntry {
                        entry: DeltaEntry::of(after),
                        changes,
                    });
                }
            }
        }
    }

    tracing::debug!(
        added = delta.added.len(),
        modified = delta.modified.len(),
        removed = delta.removed.len(),
        "package comparison complete"
    );

    delta
}

/// Field-level differences between two snapshots of the same object.
///
/// Returns an empty list when the objects are unchanged in every tracked
/// field. Node and flow order is not significant; see the module docs.
#[must_use]
pub fn diff_objects(before: &Object, after: &Object) -> Vec<FieldChange> {
    if before.content_fingerprint() == after.content_fingerprint() {
        return Vec::new();
    }

    let mut changes = Vec::new();

    if before.version_uuid != after.version_uuid {
        changes.push(FieldChange::VersionUuid {
            before: before.version_uuid.clone(),
            after: after.version_uuid.clone(),
        });
    }
    if before.object_type() != after.object_type() {
        changes.push(FieldChange::ObjectType {
            before: before.object_type(),
            after: after.object_type(),
        });
    }
    if before.code != after.code {
        changes.push(FieldChange::Code {
            before: before.code.clone(),
            after: after.code.clone(),
        });
    }

    let field_changes = diff_maps(&before.fields, &after.fields);
    if !field_changes.is_empty() {
        changes.push(FieldChange::Fields {
            changes: field_changes,
        });
    }
    let property_changes = diff_maps(&before.properties, &after.properties);
    if !property_changes.is_empty() {
        changes.push(FieldChange::Properties {
            changes: property_changes,
        });
    }

    diff_constant(before, after, &mut changes);
    diff_process_model(before, after, &mut changes);
    diff_record_type(before, after, &mut changes);

    changes
}

fn diff_constant(before: &Object, after: &Object, changes: &mut Vec<FieldChange>) {
    let (b_value, b_type) = before
        .constant()
        .map_or((None, None), |c| (c.value.as_ref(), c.value_type.as_ref()));
    let (a_value, a_type) = after
        .constant()
        .map_or((None, None), |c| (c.value.as_ref(), c.value_type.as_ref()));

    if b_value != a_value {
        changes.push(FieldChange::ConstantValue {
            before: b_value.cloned(),
            after: a_value.cloned(),
        });
    }
    if b_type != a_type {
        changes.push(FieldChange::ConstantType {
            before: b_type.cloned(),
            after: a_type.cloned(),
        });
    }
}

fn diff_process_model(before: &Object, after: &Object, changes: &mut Vec<FieldChange>) {
    let (b_nodes, a_nodes) = (before.nodes(), after.nodes());
    if !same_multiset(b_nodes, a_nodes) {
        let (added, removed, changed) = keyed_diff(b_nodes, a_nodes, |n| n.node_uuid.as_str());
        changes.push(FieldChange::Nodes {
            before_count: b_nodes.len(),
            after_count: a_nodes.len(),
            added,
            removed,
            changed,
        });
    }

    let (b_flows, a_flows) = (before.flows(), after.flows());
    if !same_multiset(b_flows, a_flows) {
        let (added, removed) = multiset_diff(b_flows, a_flows);
        changes.push(FieldChange::Flows {
            before_count: b_flows.len(),
            after_count: a_flows.len(),
            added,
            removed,
        });
    }
}

fn diff_record_type(before: &Object, after: &Object, changes: &mut Vec<FieldChange>) {
    let empty_fields: &[RecordField] = &[];
    let empty_rels: &[Relationship] = &[];
    let b_fields = before
        .record_type()
        .map_or(empty_fields, |r| r.record_fields.as_slice());
    let a_fields = after
        .record_type()
        .map_or(empty_fields, |r| r.record_fields.as_slice());
    if !same_multiset(b_fields, a_fields) {
        let (added, removed, changed) = keyed_diff(b_fields, a_fields, |f| f.name.as_str());
        changes.push(FieldChange::RecordFields {
            added,
            removed,
            changed,
        });
    }

    let b_rels = before
        .record_type()
        .map_or(empty_rels, |r| r.relationships.as_slice());
    let a_rels = after
        .record_type()
        .map_or(empty_rels, |r| r.relationships.as_slice());
    if !same_multiset(b_rels, a_rels) {
        let (added, removed, changed) = keyed_diff(b_rels, a_rels, |r| r.name.as_str());
        changes.push(FieldChange::Relationships {
            added,
            removed,
            changed,
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Changed keys between two maps, in key order.
pub(crate) fn diff_maps(
    before: &BTreeMap<String, Value>,
    after: &BTreeMap<String, Value>,
) -> Vec<KeyChange> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let b = before.get(key);
            let a = after.get(key);
            (b != a).then(|| KeyChange {
                key: key.clone(),
                before: b.cloned(),
                after: a.cloned(),
            })
        })
        .collect()
}

/// Order-insensitive equality of two lists.
pub(crate) fn same_multiset<T: Ord>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&T> = a.iter().collect();
    let mut b: Vec<&T> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

/// Items in `after` but not `before` (added) and vice versa (removed),
/// counting duplicates. Both outputs are sorted.
pub(crate) fn multiset_diff<T: Ord + Clone>(before: &[T], after: &[T]) -> (Vec<T>, Vec<T>) {
    let mut counts: BTreeMap<&T, i64> = BTreeMap::new();
    for item in after {
        *counts.entry(item).or_default() += 1;
    }
    for item in before {
        *counts.entry(item).or_default() -= 1;
    }

    let mut added = Vec::new();
    let mut removed = Vec::new();
    for (item, count) in counts {
        for _ in 0..count.max(0) {
            added.push(item.clone());
        }
        for _ in 0..(-count).max(0) {
            removed.push(item.clone());
        }
    }
    (added, removed)
}

/// Diff two lists matched by a key.
///
/// Returns `(added, removed, changed)`, each in key order. A key carried by
/// more than one item on either side has no stable pairing; its items are
/// diffed as a multiset and only ever show up as added or removed.
pub(crate) fn keyed_diff<'a, T, F>(
    before: &'a [T],
    after: &'a [T],
    key: F,
) -> (Vec<T>, Vec<T>, Vec<ItemChange<T>>)
where
    T: Ord + Clone + 'a,
    F: Fn(&'a T) -> &'a str,
{
    let group = |items: &'a [T]| {
        let mut map: BTreeMap<&'a str, Vec<T>> = BTreeMap::new();
        for item in items {
            map.entry(key(item)).or_default().push(item.clone());
        }
        map
    };
    let b = group(before);
    let a = group(after);
    let keys: BTreeSet<&str> = b.keys().chain(a.keys()).copied().collect();

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();
    for k in keys {
        match (b.get(k).map(Vec::as_slice), a.get(k).map(Vec::as_slice)) {
            (Some([bv]), Some([av])) => {
                if bv != av {
                    changed.push(ItemChange {
                        before: bv.clone(),
                        after: av.clone(),
                    });
                }
            }
            (before_items, after_items) => {
                let (plus, minus) = multiset_diff(
                    before_items.unwrap_or_default(),
                    after_items.unwrap_or_default(),
                );
                added.extend(plus);
                removed.extend(minus);
            }
        }
    }

    (added, removed, changed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
