//! ORDER step: turn a classification into the single review sequence.
//!
//! Ordering keys, highest priority first:
//!
//! 1. **Classification**: `NO_CONFLICT` < `CONFLICT` < `CUSTOMER_ONLY` <
//!    `REMOVED_BUT_CUSTOMIZED`. Each group is contiguous.
//! 2. **Type block**: within a group, objects of one [`ObjectType`] are
//!    contiguous.
//! 3. **Dependency order**: within a group, a dependency precedes its
//!    dependents.
//!
//! The effective sort key per object is
//! `(classification, type_block_position, topological_rank)`. Groups are
//! walked in [`Classification::ALL`] order, with one pre-pass per group.
//!
//! # Topological rank
//!
//! Depth-first traversal over the group's sub-graph, roots taken in UUID
//! order, dependencies visited in adjacency-list order, objects emitted in
//! post-order (dependencies first). An edge to an object still on the
//! traversal stack closes a cycle: that edge is dropped, a [`CycleReport`] is
//! recorded, and traversal continues. The rule is fixed, so the same input
//! always breaks the same edges.
//!
//! # Type block position
//!
//! Type blocks are ordered by a topological pass over the type-level graph
//! (type of a dependency before type of its dependent, dropped edges
//! excluded). Among the blocks that are ready, or among all remaining blocks
//! when the type-level graph is cyclic, the block whose first member has the
//! lowest topological rank goes next. Type contiguity outranks dependency
//! order, so a cross-type dependency is only guaranteed to be honoured when
//! the type-level graph has no cycle.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::classify::{Classification, ClassificationResult, ClassifiedChange};
use crate::graph::DependencyGraph;
use crate::model::{ObjectId, ObjectType};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A classified change with its position in the review sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderedChange {
    /// The classified change.
    #[serde(flatten)]
    pub change: ClassifiedChange,
    /// Zero-based, contiguous, unique position in the review sequence.
    pub display_order: usize,
}

/// A dependency edge dropped to break a cycle.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BrokenEdge {
    /// The referencing object.
    pub dependent: ObjectId,
    /// The referenced object.
    pub dependency: ObjectId,
}

impl fmt::Display for BrokenEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.dependent, self.dependency)
    }
}

/// A cycle detected (and broken) while ordering one classification group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// The group in which the cycle was found.
    pub classification: Classification,
    /// Cycle members in traversal order, starting at the object the dropped
    /// edge points back to.
    pub cycle: Vec<ObjectId>,
    /// The edge that closed the cycle and was dropped.
    pub broken_edge: BrokenEdge,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle in {} group: ", self.classification)?;
        for (i, id) in self.cycle.iter().enumerate() {
            if i > 0 {
                write!(f, " → ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, " (dropped {})", self.broken_edge)
    }
}

/// The ordered review list plus any cycles broken while producing it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSequence {
    /// Changes in review order; `changes[i].display_order == i`.
    pub changes: Vec<OrderedChange>,
    /// Cycles detected and broken, in detection order.
    pub cycles: Vec<CycleReport>,
}

impl ReviewSequence {
    /// Number of ordered changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if there is nothing to review.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterate in review order.
    pub fn iter(&self) -> impl Iterator<Item = &OrderedChange> {
        self.changes.iter()
    }

    /// Review position of `uuid`.
    #[must_use]
    pub fn position(&self, uuid: &ObjectId) -> Option<usize> {
        self.changes.iter().position(|c| &c.change.uuid == uuid)
    }

    /// The contiguous slice of changes with the given classification.
    #[must_use]
    pub fn group(&self, classification: Classification) -> &[OrderedChange] {
        let start = self
            .changes
            .partition_point(|c| c.change.classification < classification);
        let end = self
            .changes
            .partition_point(|c| c.change.classification <= classification);
        &self.changes[start..end]
    }
}

// ---------------------------------------------------------------------------
// order_changes
// ---------------------------------------------------------------------------

/// Produce the review sequence for a classification.
///
/// Never fails: cycles are broken deterministically and reported in
/// [`ReviewSequence::cycles`].
#[must_use]
pub fn order_changes(
    classification: &ClassificationResult,
    graph: &DependencyGraph,
) -> ReviewSequence {
    let mut sequence = ReviewSequence::default();

    for group in Classification::ALL {
        let members = classification.get(group);
        if members.is_empty() {
            continue;
        }

        let ordered = order_group(group, members, graph, &mut sequence.cycles);
        for index in ordered {
            let display_order = sequence.changes.len();
            sequence.changes.push(OrderedChange {
                change: members[index].clone(),
                display_order,
            });
        }

        tracing::debug!(
            classification = %group,
            members = members.len(),
            "classification group ordered"
        );
    }

    sequence
}

/// Order one classification group. Returns indices into `members`.
fn order_group(
    group: Classification,
    members: &[ClassifiedChange],
    graph: &DependencyGraph,
    cycles: &mut Vec<CycleReport>,
) -> Vec<usize> {
    // Members arrive sorted by UUID; that is the root order.
    let local: HashMap<&ObjectId, usize> = members
        .iter()
        .enumerate()
        .map(|(i, c)| (&c.uuid, i))
        .collect();

    let adjacency: Vec<Vec<usize>> = members
        .iter()
        .map(|c| {
            graph
                .dependencies_of(&c.uuid)
                .iter()
                .filter_map(|dep| local.get(dep).copied())
                .collect()
        })
        .collect();

    let traversal = topological_ranks(&adjacency);

    for (dependent, dependency, path) in &traversal.back_edges {
        let report = CycleReport {
            classification: group,
            cycle: path.iter().map(|&i| members[i].uuid.clone()).collect(),
            broken_edge: BrokenEdge {
                dependent: members[*dependent].uuid.clone(),
                dependency: members[*dependency].uuid.clone(),
            },
        };
        tracing::warn!(
            classification = %group,
            dropped = %report.broken_edge,
            cycle_len = report.cycle.len(),
            "dependency cycle detected; dropping closing edge"
        );
        cycles.push(report);
    }

    let dropped: BTreeSet<(usize, usize)> = traversal
        .back_edges
        .iter()
        .map(|(from, to, _)| (*from, *to))
        .collect();

    order_type_blocks(members, &adjacency, &dropped, &traversal.rank)
}

// ---------------------------------------------------------------------------
// Topological pass
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Result of the depth-first pass over one group.
struct Traversal {
    /// `rank[i]` = post-order position of member `i`.
    rank: Vec<usize>,
    /// Dropped edges `(dependent, dependency, cycle path)` in detection order.
    back_edges: Vec<(usize, usize, Vec<usize>)>,
}

/// Iterative depth-first post-order over `adjacency`.
///
/// Roots are visited in index order and edges in list order. An edge to a
/// node on the current stack is a back edge and is dropped.
fn topological_ranks(adjacency: &[Vec<usize>]) -> Traversal {
    let n = adjacency.len();
    let mut marks = vec![Mark::Unvisited; n];
    let mut rank = vec![0; n];
    let mut next_rank = 0;
    let mut back_edges = Vec::new();

    for root in 0..n {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, index of next edge to follow)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;

        while let Some(&(node, next)) = stack.last() {
            if let Some(&dep) = adjacency[node].get(next) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::OnStack;
                        stack.push((dep, 0));
                    }
                    Mark::OnStack => {
                        let start = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                        let path = stack[start..].iter().map(|&(n, _)| n).collect();
                        back_edges.push((node, dep, path));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                rank[node] = next_rank;
                next_rank += 1;
                stack.pop();
            }
        }
    }

    Traversal { rank, back_edges }
}

// ---------------------------------------------------------------------------
// Type blocks
// ---------------------------------------------------------------------------

/// Arrange members into contiguous type blocks, each in topological order.
fn order_type_blocks(
    members: &[ClassifiedChange],
    adjacency: &[Vec<usize>],
    dropped: &BTreeSet<(usize, usize)>,
    rank: &[usize],
) -> Vec<usize> {
    let mut blocks: BTreeMap<ObjectType, Vec<usize>> = BTreeMap::new();
    for (i, change) in members.iter().enumerate() {
        blocks.entry(change.object_type).or_default().push(i);
    }
    for block in blocks.values_mut() {
        block.sort_by_key(|&i| rank[i]);
    }

    // Type-level precedence: dependency's type before dependent's type.
    let mut must_precede: BTreeSet<(ObjectType, ObjectType)> = BTreeSet::new();
    for (dependent, deps) in adjacency.iter().enumerate() {
        for &dependency in deps {
            if dropped.contains(&(dependent, dependency)) {
                continue;
            }
            let before = members[dependency].object_type;
            let after = members[dependent].object_type;
            if before != after {
                must_precede.insert((before, after));
            }
        }
    }

    let first_rank = |t: &ObjectType| {
        blocks
            .get(t)
            .and_then(|b| b.first())
            .map_or(usize::MAX, |&i| rank[i])
    };

    let mut remaining: BTreeSet<ObjectType> = blocks.keys().copied().collect();
    let mut order = Vec::with_capacity(members.len());

    while !remaining.is_empty() {
        let ready: Vec<ObjectType> = remaining
            .iter()
            .copied()
            .filter(|t| {
                !must_precede
                    .iter()
                    .any(|(before, after)| after == t && remaining.contains(before))
            })
            .collect();

        let candidates = if ready.is_empty() {
            tracing::debug!(
                remaining = remaining.len(),
                "type-level dependency cycle; falling back to first-rank block order"
            );
            remaining.iter().copied().collect()
        } else {
            ready
        };

        let Some(next) = candidates.into_iter().min_by_key(&first_rank) else {
            break;
        };
        remaining.remove(&next);
        if let Some(block) = blocks.get(&next) {
            order.extend_from_slice(block);
        }
    }

    order
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ChangeKind;

    fn id(s: &str) -> ObjectId {
        ObjectId::new(s).unwrap()
    }

    fn change(uuid: &str, object_type: ObjectType, classification: Classification) -> ClassifiedChange {
        ClassifiedChange {
            uuid: id(uuid),
            name: format!("obj_{uuid}"),
            object_type,
            classification,
            vendor_action: Some(ChangeKind::Modified),
            customer_action: None,
        }
    }

    fn no_conflict(items: &[(&str, ObjectType)]) -> ClassificationResult {
        let mut list: Vec<_> = items
            .iter()
            .map(|(u, t)| change(u, *t, Classification::NoConflict))
            .collect();
        list.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        ClassificationResult {
            no_conflict: list,
            ..ClassificationResult::default()
        }
    }

    fn edges(pairs: &[(&str, &str)]) -> DependencyGraph {
        DependencyGraph::from_edges(pairs.iter().map(|(a, b)| (id(a), id(b))))
    }

    fn order_of(seq: &ReviewSequence) -> Vec<&str> {
        seq.changes.iter().map(|c| c.change.uuid.as_str()).collect()
    }

    const RULE: ObjectType = ObjectType::ExpressionRule;
    const UI: ObjectType = ObjectType::Interface;
    const CONST: ObjectType = ObjectType::Constant;

    // -- Basics --

    #[test]
    fn empty_classification_gives_empty_sequence() {
        let seq = order_changes(&ClassificationResult::default(), &DependencyGraph::new());
        assert!(seq.is_empty());
        assert!(seq.cycles.is_empty());
    }

    #[test]
    fn display_order_is_contiguous_from_zero() {
        let cls = no_conflict(&[("a", RULE), ("b", UI), ("c", CONST)]);
        let seq = order_changes(&cls, &DependencyGraph::new());
        let orders: Vec<_> = seq.changes.iter().map(|c| c.display_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn classification_groups_are_in_priority_order() {
        let cls = ClassificationResult {
            no_conflict: vec![change("d", RULE, Classification::NoConflict)],
            conflict: vec![change("c", RULE, Classification::Conflict)],
            customer_only: vec![change("b", RULE, Classification::CustomerOnly)],
            removed_but_customized: vec![change(
                "a",
                RULE,
                Classification::RemovedButCustomized,
            )],
        };
        // Edge from an early group into a later one has no effect across groups.
        let seq = order_changes(&cls, &edges(&[("d", "a")]));
        assert_eq!(order_of(&seq), vec!["d", "c", "b", "a"]);
        assert_eq!(seq.group(Classification::Conflict).len(), 1);
        assert_eq!(seq.group(Classification::Conflict)[0].change.uuid, id("c"));
    }

    // -- Dependency order --

    #[test]
    fn dependency_precedes_dependent_within_type() {
        // a depends on b, b depends on c.
        let cls = no_conflict(&[("a", RULE), ("b", RULE), ("c", RULE)]);
        let seq = order_changes(&cls, &edges(&[("a", "b"), ("b", "c")]));
        assert_eq!(order_of(&seq), vec!["c", "b", "a"]);
    }

    #[test]
    fn cross_type_dependency_orders_type_blocks() {
        // Interface "a" uses rule "r" which uses constant "z".
        let cls = no_conflict(&[("a", UI), ("r", RULE), ("z", CONST)]);
        let seq = order_changes(&cls, &edges(&[("a", "r"), ("r", "z")]));
        assert_eq!(order_of(&seq), vec!["z", "r", "a"]);
    }

    #[test]
    fn types_stay_contiguous() {
        let cls = no_conflict(&[
            ("a1", UI),
            ("a2", UI),
            ("r1", RULE),
            ("r2", RULE),
            ("c1", CONST),
        ]);
        let seq = order_changes(&cls, &edges(&[("a1", "r1"), ("r2", "c1"), ("a2", "c1")]));
        let types: Vec<_> = seq.changes.iter().map(|c| c.change.object_type).collect();
        let mut seen = Vec::new();
        for t in &types {
            if seen.last() != Some(t) {
                assert!(!seen.contains(t), "type {t:?} reappeared in {types:?}");
                seen.push(*t);
            }
        }
        // constants before rules before interfaces here.
        assert_eq!(seen, vec![CONST, RULE, UI]);
    }

    #[test]
    fn type_grouping_wins_over_cross_type_cycle() {
        // rule a → interface b → rule c: rules cannot all precede or follow b.
        let cls = no_conflict(&[("a", RULE), ("b", UI), ("c", RULE)]);
        let seq = order_changes(&cls, &edges(&[("a", "b"), ("b", "c")]));
        let order = order_of(&seq);
        assert_eq!(order.len(), 3);
        let rule_positions: Vec<_> = order
            .iter()
            .enumerate()
            .filter(|(_, u)| **u != "b")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(rule_positions[1] - rule_positions[0], 1, "rules must be adjacent");
        // Within the rule block c (a dependency) still precedes a.
        let pos = |u: &str| order.iter().position(|x| *x == u).unwrap();
        assert!(pos("c") < pos("a"));
        assert!(seq.cycles.is_empty());
    }

    #[test]
    fn edges_outside_group_are_ignored() {
        let cls = ClassificationResult {
            no_conflict: vec![change("a", RULE, Classification::NoConflict)],
            conflict: vec![change("b", RULE, Classification::Conflict)],
            ..ClassificationResult::default()
        };
        let seq = order_changes(&cls, &edges(&[("a", "b"), ("b", "a")]));
        assert_eq!(order_of(&seq), vec!["a", "b"]);
        assert!(seq.cycles.is_empty());
    }

    // -- Cycles --

    #[test]
    fn self_reference_is_broken_and_reported() {
        let cls = no_conflict(&[("f", RULE)]);
        let seq = order_changes(&cls, &edges(&[("f", "f")]));
        assert_eq!(order_of(&seq), vec!["f"]);
        assert_eq!(seq.cycles.len(), 1);
        assert_eq!(seq.cycles[0].cycle, vec![id("f")]);
        assert_eq!(
            seq.cycles[0].broken_edge,
            BrokenEdge {
                dependent: id("f"),
                dependency: id("f"),
            }
        );
    }

    #[test]
    fn mutual_cycle_drops_closing_edge() {
        // a → b → a. DFS from a: a, b, then b → a closes the cycle.
        let cls = no_conflict(&[("a", RULE), ("b", RULE)]);
        let seq = order_changes(&cls, &edges(&[("a", "b"), ("b", "a")]));
        assert_eq!(order_of(&seq), vec!["b", "a"]);
        assert_eq!(seq.cycles.len(), 1);
        let report = &seq.cycles[0];
        assert_eq!(report.classification, Classification::NoConflict);
        assert_eq!(report.cycle, vec![id("a"), id("b")]);
        assert_eq!(
            report.broken_edge,
            BrokenEdge {
                dependent: id("b"),
                dependency: id("a"),
            }
        );
    }

    #[test]
    fn long_cycle_terminates_without_duplicates() {
        let names: Vec<String> = (0..50).map(|i| format!("n{i:02}")).collect();
        let items: Vec<(&str, ObjectType)> = names.iter().map(|n| (n.as_str(), RULE)).collect();
        let cls = no_conflict(&items);
        let mut pairs: Vec<(&str, &str)> = names
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        pairs.push((names[49].as_str(), names[0].as_str()));
        let seq = order_changes(&cls, &edges(&pairs));

        assert_eq!(seq.len(), 50);
        let unique: BTreeSet<_> = order_of(&seq).into_iter().collect();
        assert_eq!(unique.len(), 50);
        assert_eq!(seq.cycles.len(), 1);
        assert_eq!(seq.cycles[0].cycle.len(), 50);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let names: Vec<String> = (0..20_000).map(|i| format!("n{i:05}")).collect();
        let items: Vec<(&str, ObjectType)> = names.iter().map(|n| (n.as_str(), RULE)).collect();
        let cls = no_conflict(&items);
        let pairs: Vec<(&str, &str)> = names
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        let seq = order_changes(&cls, &edges(&pairs));
        assert_eq!(seq.len(), 20_000);
        assert_eq!(seq.changes[0].change.uuid.as_str(), "n19999");
    }

    #[test]
    fn ordering_is_deterministic() {
        let cls = no_conflict(&[("a", RULE), ("b", UI), ("c", RULE), ("d", CONST), ("e", UI)]);
        let graph = edges(&[("a", "c"), ("c", "a"), ("b", "a"), ("e", "d"), ("c", "d")]);
        let first = order_changes(&cls, &graph);
        for _ in 0..5 {
            assert_eq!(order_changes(&cls, &graph), first);
        }
    }

    #[test]
    fn cycle_report_display() {
        let report = CycleReport {
            classification: Classification::Conflict,
            cycle: vec![id("a"), id("b")],
            broken_edge: BrokenEdge {
                dependent: id("b"),
                dependency: id("a"),
            },
        };
        assert_eq!(
            report.to_string(),
            "cycle in CONFLICT group: a → b (dropped b → a)"
        );
    }
}
