//! A package: one complete snapshot of application objects.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::collections::HashMap;

use crate::error::StructuralError;

use super::object::Object;
use super::types::ObjectId;

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// A validated mapping from UUID to [`Object`].
///
/// Iteration through [`Package::objects`] is in UUID order. The authored
/// order of the input is kept separately because named references resolve to
/// the first object (in authored order) carrying the name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Package {
    objects: BTreeMap<ObjectId, Object>,
    authored: Vec<ObjectId>,
}

impl Package {
    /// Build a package, validating identity fields and uniqueness.
    ///
    /// # Errors
    /// Returns [`StructuralError`] if an object has an invalid UUID, an empty
    /// `name` or `version_uuid`, or if a UUID appears twice.
    pub fn new(objects: impl IntoIterator<Item = Object>) -> Result<Self, StructuralError> {
        let mut map = BTreeMap::new();
        let mut authored = Vec::new();

        for obj in objects {
            if let Err(source) = obj.uuid.check() {
                return Err(StructuralError::InvalidObjectId {
                    name: obj.name,
                    source,
                });
            }
            if obj.name.is_empty() {
                return Err(StructuralError::MissingField {
                    uuid: obj.uuid,
                    field: "name",
                });
            }
            if obj.version_uuid.is_empty() {
                return Err(StructuralError::MissingField {
                    uuid: obj.uuid,
                    field: "version_uuid",
                });
            }
            match map.entry(obj.uuid.clone()) {
                Entry::Occupied(existing) => {
                    let first: &Object = existing.get();
                    return Err(StructuralError::DuplicateObject {
                        uuid: obj.uuid,
                        first_name: first.name.clone(),
                        duplicate_name: obj.name,
                    });
                }
                Entry::Vacant(slot) => {
                    authored.push(obj.uuid.clone());
                    slot.insert(obj);
                }
            }
        }

        Ok(Self {
            objects: map,
            authored,
        })
    }

    /// An empty package.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up an object by UUID.
    #[must_use]
    pub fn get(&self, uuid: &ObjectId) -> Option<&Object> {
        self.objects.get(uuid)
    }

    /// Returns `true` if the package contains `uuid`.
    #[must_use]
    pub fn contains(&self, uuid: &ObjectId) -> bool {
        self.objects.contains_key(uuid)
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the package has no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in UUID order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// All UUIDs in UUID order.
    pub fn uuids(&self) -> impl Iterator<Item = &ObjectId> {
        self.objects.keys()
    }

    /// All objects in the order they were supplied to [`Package::new`].
    pub fn objects_authored(&self) -> impl Iterator<Item = &Object> {
        self.authored.iter().filter_map(|id| self.objects.get(id))
    }

    /// Build the name → UUID index for reference resolution.
    #[must_use]
    pub fn name_index(&self) -> NameIndex {
        NameIndex::build(self)
    }
}

// ---------------------------------------------------------------------------
// NameIndex
// ---------------------------------------------------------------------------

/// Name → UUID lookup, built once per package.
///
/// Names are matched exactly as authored (case-sensitive). When several
/// objects share a name, the first one in authored order wins.
#[derive(Clone, Debug, Default)]
pub struct NameIndex {
    by_name: HashMap<String, ObjectId>,
}

impl NameIndex {
    fn build(package: &Package) -> Self {
        let mut by_name = HashMap::with_capacity(package.len());
        for obj in package.objects_authored() {
            by_name
                .entry(obj.name.clone())
                .or_insert_with(|| obj.uuid.clone());
        }
        Self { by_name }
    }

    /// Resolve a name to a UUID.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ObjectId> {
        self.by_name.get(name)
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no names are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::ObjectType;

    fn obj(uuid: &str, name: &str) -> Object {
        Object::new(ObjectId::new(uuid).unwrap(), name, ObjectType::ExpressionRule)
            .with_version("v1")
    }

    #[test]
    fn empty_package() {
        let pkg = Package::new(Vec::new()).unwrap();
        assert!(pkg.is_empty());
        assert_eq!(pkg.len(), 0);
        assert_eq!(pkg, Package::empty());
    }

    #[test]
    fn objects_iterate_in_uuid_order() {
        let pkg = Package::new(vec![obj("c", "C"), obj("a", "A"), obj("b", "B")]).unwrap();
        let ids: Vec<_> = pkg.uuids().map(ObjectId::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let authored: Vec<_> = pkg.objects_authored().map(|o| o.name.as_str()).collect();
        assert_eq!(authored, vec!["C", "A", "B"]);
    }

    #[test]
    fn duplicate_uuid_is_structural_error() {
        let err = Package::new(vec![obj("a", "First"), obj("a", "Second")]).unwrap_err();
        match err {
            StructuralError::DuplicateObject {
                uuid,
                first_name,
                duplicate_name,
            } => {
                assert_eq!(uuid.as_str(), "a");
                assert_eq!(first_name, "First");
                assert_eq!(duplicate_name, "Second");
            }
            other => panic!("expected DuplicateObject, got {other:?}"),
        }
    }

    #[test]
    fn missing_name_is_structural_error() {
        let err = Package::new(vec![obj("a", "")]).unwrap_err();
        assert!(matches!(
            err,
            StructuralError::MissingField { field: "name", .. }
        ));
    }

    #[test]
    fn missing_version_is_structural_error() {
        let o = Object::new(ObjectId::new("a").unwrap(), "A", ObjectType::Site);
        let err = Package::new(vec![o]).unwrap_err();
        assert!(matches!(
            err,
            StructuralError::MissingField {
                field: "version_uuid",
                ..
            }
        ));
    }

    #[test]
    fn invalid_uuid_from_serde_is_structural_error() {
        let o: Object = serde_json::from_value(serde_json::json!({
            "uuid": "has space",
            "name": "Bad",
            "object_type": "site",
            "version_uuid": "v1"
        }))
        .unwrap();
        let err = Package::new(vec![o]).unwrap_err();
        assert!(matches!(err, StructuralError::InvalidObjectId { .. }));
    }

    #[test]
    fn name_index_first_authored_match_wins() {
        let pkg = Package::new(vec![obj("z", "Shared"), obj("a", "Shared"), obj("m", "Other")])
            .unwrap();
        let index = pkg.name_index();
        assert_eq!(index.resolve("Shared").unwrap().as_str(), "z");
        assert_eq!(index.resolve("Other").unwrap().as_str(), "m");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn name_index_is_case_sensitive() {
        let pkg = Package::new(vec![obj("a", "GetUser")]).unwrap();
        let index = pkg.name_index();
        assert!(index.resolve("GetUser").is_some());
        assert!(index.resolve("getuser").is_none());
    }
}
