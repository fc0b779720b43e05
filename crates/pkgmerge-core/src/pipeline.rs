//! The full reconciliation pipeline: compare → classify → graph → order → guide.
//!
//! [`reconcile`] wires the four components together over three validated
//! packages and returns everything they produce as one serializable
//! [`ReconcileReport`]. Data flows strictly forward; each stage reads only
//! the outputs of earlier stages.
//!
//! With the `parallel` feature and [`ReconcileOptions::parallel`] set, the
//! two deltas, the two graphs and the per-change guidance are computed on the
//! rayon pool. The report is identical to a sequential run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::classify::{Classification, ClassificationResult, classify};
use crate::compare::{Delta, compare};
use crate::error::UnresolvedReference;
use crate::events::{EventSink, PipelineEvent, Stage, dispatch};
use crate::graph::{DependencyGraph, GraphOptions, build_graph};
use crate::guidance::{Guidance, GuidanceOptions, MergeStrategy, generate_with};
use crate::model::{ObjectId, Package};
use crate::order::{ReviewSequence, order_changes};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Settings for one reconciliation run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Dependency graph construction.
    pub graph: GraphOptions,
    /// Guidance generation.
    pub guidance: GuidanceOptions,
    /// Use the rayon pool where the pipeline allows it. Ignored without the
    /// `parallel` feature.
    pub parallel: bool,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Headline numbers for a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Objects in the base package.
    pub base_objects: usize,
    /// Objects in the customized package.
    pub customer_objects: usize,
    /// Objects in the new vendor package.
    pub vendor_objects: usize,
    /// Entries in the base → vendor delta.
    pub vendor_changes: usize,
    /// Entries in the base → customer delta.
    pub customer_changes: usize,
    /// Changes per classification (all four keys present).
    pub classified: BTreeMap<Classification, usize>,
    /// Guidance records per strategy (only strategies that occur).
    pub strategies: BTreeMap<MergeStrategy, usize>,
    /// Dependency cycles broken while ordering.
    pub cycles_broken: usize,
    /// Named references that resolved to nothing.
    pub unresolved_references: usize,
}

impl ReconcileSummary {
    /// Number of changes in one classification.
    #[must_use]
    pub fn count(&self, classification: Classification) -> usize {
        self.classified.get(&classification).copied().unwrap_or(0)
    }

    /// Total number of classified changes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.classified.values().sum()
    }
}

/// Everything a reconciliation run produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Headline numbers.
    pub summary: ReconcileSummary,
    /// base → vendor.
    pub vendor_delta: Delta,
    /// base → customer.
    pub customer_delta: Delta,
    /// The four-way partition of changed objects.
    pub classification: ClassificationResult,
    /// Union of the customer and vendor dependency graphs.
    pub graph: DependencyGraph,
    /// Changes in review order, plus cycles broken on the way.
    pub sequence: ReviewSequence,
    /// One record per entry of `sequence`, in the same order.
    pub guidance: Vec<Guidance>,
}

impl ReconcileReport {
    /// Guidance for one object, if it changed.
    #[must_use]
    pub fn guidance_for(&self, uuid: &ObjectId) -> Option<&Guidance> {
        self.guidance.iter().find(|g| &g.uuid == uuid)
    }

    /// Unresolved references found in either graph.
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedReference] {
        self.graph.unresolved()
    }
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Run the whole pipeline over base, customized and new-vendor packages.
///
/// Never fails: packages are validated on construction, and cycles and
/// unresolved references are recorded in the report. `sink`, when given,
/// receives every [`PipelineEvent`]; without it the run is unchanged.
#[must_use]
pub fn reconcile(
    base: &Package,
    customer: &Package,
    vendor: &Package,
    options: &ReconcileOptions,
    sink: Option<&dyn EventSink>,
) -> ReconcileReport {
    let parallel = options.parallel;

    // -- Compare --
    dispatch(sink, &PipelineEvent::StageStarted { stage: Stage::Compare });
    let (vendor_delta, customer_delta) =
        join(parallel, || compare(base, vendor), || compare(base, customer));
    dispatch(
        sink,
        &PipelineEvent::StageCompleted {
            stage: Stage::Compare,
            items: vendor_delta.change_count() + customer_delta.change_count(),
        },
    );

    // -- Classify --
    dispatch(sink, &PipelineEvent::StageStarted { stage: Stage::Classify });
    let classification = classify(&vendor_delta, &customer_delta);
    dispatch(
        sink,
        &PipelineEvent::StageCompleted {
            stage: Stage::Classify,
            items: classification.total(),
        },
    );

    // -- Graph --
    dispatch(sink, &PipelineEvent::StageStarted { stage: Stage::Graph });
    let (customer_graph, vendor_graph) = join(
        parallel,
        || build_graph(customer, &options.graph),
        || build_graph(vendor, &options.graph),
    );
    let graph = customer_graph.union(&vendor_graph);
    for reference in graph.unresolved() {
        dispatch(
            sink,
            &PipelineEvent::ReferenceUnresolved {
                reference: reference.clone(),
            },
        );
    }
    dispatch(
        sink,
        &PipelineEvent::StageCompleted {
            stage: Stage::Graph,
            items: graph.edge_count(),
        },
    );

    // -- Order --
    dispatch(sink, &PipelineEvent::StageStarted { stage: Stage::Order });
    let sequence = order_changes(&classification, &graph);
    for report in &sequence.cycles {
        dispatch(
            sink,
            &PipelineEvent::CycleDetected {
                classification: report.classification,
                report: report.clone(),
            },
        );
    }
    dispatch(
        sink,
        &PipelineEvent::StageCompleted {
            stage: Stage::Order,
            items: sequence.len(),
        },
    );

    // -- Guide --
    dispatch(sink, &PipelineEvent::StageStarted { stage: Stage::Guide });
    let guidance = map_ordered(parallel, &sequence, |ordered| {
        let uuid = &ordered.change.uuid;
        generate_with(
            &ordered.change,
            base.get(uuid),
            customer.get(uuid),
            vendor.get(uuid),
            &options.guidance,
        )
    });
    dispatch(
        sink,
        &PipelineEvent::StageCompleted {
            stage: Stage::Guide,
            items: guidance.len(),
        },
    );

    let summary = summarize(
        base,
        customer,
        vendor,
        &vendor_delta,
        &customer_delta,
        &classification,
        &graph,
        &sequence,
        &guidance,
    );

    tracing::debug!(
        total = summary.total(),
        conflicts = summary.count(Classification::Conflict),
        cycles = summary.cycles_broken,
        unresolved = summary.unresolved_references,
        "reconciliation complete"
    );

    ReconcileReport {
        summary,
        vendor_delta,
        customer_delta,
        classification,
        graph,
        sequence,
        guidance,
    }
}

#[allow(clippy::too_many_arguments)]
fn summarize(
    base: &Package,
    customer: &Package,
    vendor: &Package,
    vendor_delta: &Delta,
    customer_delta: &Delta,
    classification: &ClassificationResult,
    graph: &DependencyGraph,
    sequence: &ReviewSequence,
    guidance: &[Guidance],
) -> ReconcileSummary {
    let classified = Classification::ALL
        .iter()
        .map(|c| (*c, classification.get(*c).len()))
        .collect();

    let mut strategies: BTreeMap<MergeStrategy, usize> = BTreeMap::new();
    for g in guidance {
        *strategies.entry(g.strategy).or_default() += 1;
    }

    ReconcileSummary {
        base_objects: base.len(),
        customer_objects: customer.len(),
        vendor_objects: vendor.len(),
        vendor_changes: vendor_delta.change_count(),
        customer_changes: customer_delta.change_count(),
        classified,
        strategies,
        cycles_broken: sequence.cycles.len(),
        unresolved_references: graph.unresolved().len(),
    }
}

// ---------------------------------------------------------------------------
// Execution helpers
// ---------------------------------------------------------------------------

#[cfg(feature = "parallel")]
fn join<A, B, FA, FB>(parallel: bool, a: FA, b: FB) -> (A, B)
where
    A: Send,
    B: Send,
    FA: FnOnce() -> A + Send,
    FB: FnOnce() -> B + Send,
{
    if parallel { rayon::join(a, b) } else { (a(), b()) }
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, FA, FB>(_parallel: bool, a: FA, b: FB) -> (A, B)
where
    FA: FnOnce() -> A,
    FB: FnOnce() -> B,
{
    (a(), b())
}

#[cfg(feature = "parallel")]
fn map_ordered<F>(parallel: bool, sequence: &ReviewSequence, f: F) -> Vec<Guidance>
where
    F: Fn(&crate::order::OrderedChange) -> Guidance + Sync + Send,
{
    use rayon::prelude::*;

    if parallel {
        // Indexed parallel collect keeps sequence order.
        sequence.changes.par_iter().map(f).collect()
    } else {
        sequence.changes.iter().map(f).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn map_ordered<F>(_parallel: bool, sequence: &ReviewSequence, f: F) -> Vec<Guidance>
where
    F: Fn(&crate::order::OrderedChange) -> Guidance,
{
    sequence.changes.iter().map(f).collect()
}
