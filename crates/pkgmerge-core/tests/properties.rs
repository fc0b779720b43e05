//! Property tests for the reconciliation pipeline.
//!
//! Random three-package scenarios are drawn from a small UUID universe so
//! that objects are frequently shared, removed, added and cross-referenced
//! (including self-references and mutual cycles).
//!
//! # Coverage
//!
//! - **Delta completeness**: added/removed are exact key differences.
//! - **Classification**: exhaustive, unique, removed-vs-modified edge case.
//! - **Ordering**: group priority, type contiguity, dependency order (across
//!   types when the type-level graph is acyclic),
//!   complete and duplicate-free output under cycles.
//! - **Guidance**: identical snapshots yield no modifications; code changes
//!   always yield a `code` modification.
//! - **Determinism**: input order and repeated runs never change the report.

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use pkgmerge_core::{
    ChangeKind, Classification, ClassifiedChange, GraphOptions, ItemType, Object, ObjectId,
    ObjectType, Package, ReconcileOptions, build_graph, classify, compare, generate,
    order_changes, reconcile,
};

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const UNIVERSE: usize = 12;

const TYPES: [ObjectType; 4] = [
    ObjectType::ExpressionRule,
    ObjectType::Interface,
    ObjectType::Constant,
    ObjectType::DataType,
];

fn uuid(i: usize) -> String {
    format!("o{i:02}")
}

fn id(s: &str) -> ObjectId {
    ObjectId::new(s).unwrap()
}

/// Code made of a literal plus zero to three named references.
fn arb_code() -> impl Strategy<Value = String> {
    (
        "[a-c]{1,2}",
        prop::collection::vec(0..UNIVERSE, 0..=3usize),
    )
        .prop_map(|(literal, refs)| {
            let mut parts = vec![literal];
            parts.extend(refs.into_iter().map(|r| format!("rule!{}", uuid(r))));
            parts.join(" + ")
        })
}

/// One slot of a package: absent, or present with a type and code.
fn arb_slot() -> impl Strategy<Value = Option<(usize, String)>> {
    prop::option::weighted(0.7, (0..TYPES.len(), arb_code()))
}

fn object(i: usize, type_idx: usize, code: &str) -> Object {
    let u = uuid(i);
    Object::new(id(&u), u.clone(), TYPES[type_idx])
        .with_version(format!("v-{code}"))
        .with_code(code)
}

fn build(slots: &[Option<(usize, String)>]) -> Vec<Object> {
    slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|(t, c)| object(i, *t, c)))
        .collect()
}

fn arb_package() -> impl Strategy<Value = Package> {
    prop::collection::vec(arb_slot(), UNIVERSE).prop_map(|slots| Package::new(build(&slots)).unwrap())
}

/// Customer and vendor derived from base: each slot is kept, changed, dropped
/// or (if absent in base) added.
fn arb_scenario() -> impl Strategy<Value = (Vec<Object>, Vec<Object>, Vec<Object>)> {
    (
        prop::collection::vec(arb_slot(), UNIVERSE),
        prop::collection::vec((0..4u8, arb_slot()), UNIVERSE),
        prop::collection::vec((0..4u8, arb_slot()), UNIVERSE),
    )
        .prop_map(|(base, cust_edits, vend_edits)| {
            let derive = |edits: &[(u8, Option<(usize, String)>)]| -> Vec<Option<(usize, String)>> {
                base.iter()
                    .zip(edits)
                    .map(|(b, (action, replacement))| match action {
                        0 | 1 => b.clone(),
                        2 => replacement.clone(),
                        _ => None,
                    })
                    .collect()
            };
            let customer = derive(&cust_edits);
            let vendor = derive(&vend_edits);
            (build(&base), build(&customer), build(&vendor))
        })
}

fn keys(p: &Package) -> BTreeSet<ObjectId> {
    p.uuids().cloned().collect()
}

/// Whether a `(from, to)` edge set over object types has no cycle.
fn is_acyclic(edges: &BTreeSet<(ObjectType, ObjectType)>) -> bool {
    let mut remaining = edges.clone();
    loop {
        let targets: BTreeSet<ObjectType> = remaining.iter().map(|(_, to)| *to).collect();
        let before = remaining.len();
        remaining.retain(|(from, _)| targets.contains(from));
        if remaining.is_empty() {
            return true;
        }
        if remaining.len() == before {
            return false;
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_delta_is_exact_key_difference(a in arb_package(), b in arb_package()) {
        let delta = compare(&a, &b);
        let (ka, kb) = (keys(&a), keys(&b));

        let added: BTreeSet<_> = delta.added.iter().map(|e| e.uuid.clone()).collect();
        let removed: BTreeSet<_> = delta.removed.iter().map(|e| e.uuid.clone()).collect();
        prop_assert_eq!(&added, &kb.difference(&ka).cloned().collect::<BTreeSet<_>>());
        prop_assert_eq!(&removed, &ka.difference(&kb).cloned().collect::<BTreeSet<_>>());

        for m in &delta.modified {
            prop_assert!(ka.contains(&m.entry.uuid) && kb.contains(&m.entry.uuid));
            prop_assert!(!m.changes.is_empty());
        }
        // Lists are sorted by UUID.
        prop_assert!(delta.added.windows(2).all(|w| w[0].uuid < w[1].uuid));
        prop_assert!(delta.modified.windows(2).all(|w| w[0].entry.uuid < w[1].entry.uuid));
        prop_assert!(delta.removed.windows(2).all(|w| w[0].uuid < w[1].uuid));
    }

    #[test]
    fn prop_package_compared_with_itself_is_empty(a in arb_package()) {
        prop_assert!(compare(&a, &a).is_empty());
    }

    #[test]
    fn prop_classification_is_exhaustive_and_unique(scenario in arb_scenario()) {
        let (base, customer, vendor) = scenario;
        let base = Package::new(base).unwrap();
        let customer = Package::new(customer).unwrap();
        let vendor = Package::new(vendor).unwrap();

        let vd = compare(&base, &vendor);
        let cd = compare(&base, &customer);
        let result = classify(&vd, &cd);

        let changed: BTreeSet<ObjectId> = vd
            .changed_uuids()
            .into_iter()
            .chain(cd.changed_uuids())
            .cloned()
            .collect();
        prop_assert_eq!(result.total(), changed.len());

        let mut seen = BTreeMap::new();
        for c in result.iter() {
            *seen.entry(c.uuid.clone()).or_insert(0) += 1;
        }
        prop_assert_eq!(seen.keys().cloned().collect::<BTreeSet<_>>(), changed);
        prop_assert!(seen.values().all(|n| *n == 1));

        for c in result.iter() {
            let v = vd.action(&c.uuid);
            let k = cd.action(&c.uuid);
            if v == Some(ChangeKind::Removed) && k == Some(ChangeKind::Modified) {
                prop_assert_eq!(c.classification, Classification::RemovedButCustomized);
            }
            if v.is_some() && k.is_none() {
                prop_assert_eq!(c.classification, Classification::NoConflict);
            }
            if v.is_none() && k.is_some() {
                prop_assert_eq!(c.classification, Classification::CustomerOnly);
            }
        }
    }

    #[test]
    fn prop_ordering_invariants(scenario in arb_scenario()) {
        let (base, customer, vendor) = scenario;
        let base = Package::new(base).unwrap();
        let customer = Package::new(customer).unwrap();
        let vendor = Package::new(vendor).unwrap();

        let result = classify(&compare(&base, &vendor), &compare(&base, &customer));
        let opts = GraphOptions::default();
        let graph = build_graph(&customer, &opts).union(&build_graph(&vendor, &opts));
        let seq = order_changes(&result, &graph);

        // Complete, duplicate-free, contiguous display order.
        prop_assert_eq!(seq.len(), result.total());
        let uuids: BTreeSet<_> = seq.iter().map(|c| c.change.uuid.clone()).collect();
        prop_assert_eq!(uuids.len(), seq.len());
        for (i, c) in seq.iter().enumerate() {
            prop_assert_eq!(c.display_order, i);
        }

        // Group priority.
        prop_assert!(seq
            .changes
            .windows(2)
            .all(|w| w[0].change.classification <= w[1].change.classification));

        // Type contiguity within each group.
        for group in Classification::ALL {
            let mut closed: BTreeSet<ObjectType> = BTreeSet::new();
            let mut current: Option<ObjectType> = None;
            for c in seq.group(group) {
                let t = c.change.object_type;
                if current != Some(t) {
                    prop_assert!(!closed.contains(&t), "type {:?} reappeared in {:?}", t, group);
                    if let Some(prev) = current {
                        closed.insert(prev);
                    }
                    current = Some(t);
                }
            }
        }

        // Dependency order for same-group edges that were not dropped. Same-type
        // edges always hold; cross-type edges hold when the group's type-level
        // graph is acyclic.
        let position: BTreeMap<&ObjectId, &ClassifiedChange> =
            seq.iter().map(|c| (&c.change.uuid, &c.change)).collect();
        let index = |u: &ObjectId| seq.position(u);
        let dropped: BTreeSet<(ObjectId, ObjectId)> = seq
            .cycles
            .iter()
            .map(|r| (r.broken_edge.dependent.clone(), r.broken_edge.dependency.clone()))
            .collect();
        let mut type_edges: BTreeMap<Classification, BTreeSet<(ObjectType, ObjectType)>> =
            BTreeMap::new();
        let mut kept: Vec<(&ObjectId, &ObjectId, Classification, bool)> = Vec::new();
        for (dependent, deps) in graph.iter() {
            for dependency in deps {
                let (Some(a), Some(b)) = (position.get(dependent), position.get(dependency)) else {
                    continue;
                };
                if a.classification != b.classification
                    || dropped.contains(&(dependent.clone(), dependency.clone()))
                {
                    continue;
                }
                let same_type = a.object_type == b.object_type;
                if !same_type {
                    type_edges
                        .entry(a.classification)
                        .or_default()
                        .insert((b.object_type, a.object_type));
                }
                kept.push((dependent, dependency, a.classification, same_type));
            }
        }
        for (dependent, dependency, group, same_type) in kept {
            let checked = same_type
                || type_edges.get(&group).is_none_or(is_acyclic);
            if !checked {
                continue;
            }
            prop_assert!(
                index(dependency) < index(dependent),
                "{} should precede {}",
                dependency,
                dependent
            );
        }
    }

    #[test]
    fn prop_reconcile_is_deterministic(scenario in arb_scenario()) {
        let (base, customer, vendor) = scenario;
        let forward = (
            Package::new(base.clone()).unwrap(),
            Package::new(customer.clone()).unwrap(),
            Package::new(vendor.clone()).unwrap(),
        );
        let reversed = (
            Package::new(base.into_iter().rev()).unwrap(),
            Package::new(customer.into_iter().rev()).unwrap(),
            Package::new(vendor.into_iter().rev()).unwrap(),
        );
        let opts = ReconcileOptions::default();
        let r1 = reconcile(&forward.0, &forward.1, &forward.2, &opts, None);
        let r2 = reconcile(&forward.0, &forward.1, &forward.2, &opts, None);
        prop_assert_eq!(&r1, &r2);

        // Authored order only affects name resolution when names collide,
        // and generated names are unique.
        let r3 = reconcile(&reversed.0, &reversed.1, &reversed.2, &opts, None);
        prop_assert_eq!(&r1.sequence, &r3.sequence);
        prop_assert_eq!(&r1.guidance, &r3.guidance);
        prop_assert_eq!(r1.guidance.len(), r1.sequence.len());
    }

    #[test]
    fn prop_guidance_code_modifications(before in arb_code(), after in arb_code()) {
        let base = object(0, 0, &before);
        let vendor = object(0, 0, &after);
        let change = ClassifiedChange {
            uuid: base.uuid.clone(),
            name: base.name.clone(),
            object_type: base.object_type(),
            classification: Classification::NoConflict,
            vendor_action: Some(ChangeKind::Modified),
            customer_action: None,
        };

        let same = generate(&change, Some(&base), Some(&base), Some(&base));
        prop_assert!(same.vendor_modifications.is_empty());

        let g = generate(&change, Some(&base), Some(&base), Some(&vendor));
        if before != after {
            prop_assert!(g.vendor_modifications.iter().any(|m| m.item_type == ItemType::Code));
        } else {
            prop_assert!(g.vendor_modifications.is_empty());
        }
    }
}
