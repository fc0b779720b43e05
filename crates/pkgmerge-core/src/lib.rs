//! Three-way package reconciliation engine.
//!
//! Given a **base** package, the **customized** package derived from it and a
//! **new vendor** package, this crate works out what each side changed, which
//! changes collide, in what order a human should review them, and how each
//! one should be merged.
//!
//! # Crate layout
//!
//! - [`model`]: object, payload and package types ([`Package`], [`Object`],
//!   [`ObjectId`], [`ObjectType`]).
//! - [`compare`]: [`compare()`] two packages into a [`Delta`].
//! - [`classify`]: [`classify()`] a vendor/customer delta pair into the four
//!   [`Classification`] groups.
//! - [`graph`]: [`build_graph()`] from cross-object references.
//! - [`order`]: [`order_changes()`] into a [`ReviewSequence`], breaking
//!   dependency cycles deterministically.
//! - [`guidance`]: [`generate()`] a [`Guidance`] record per change.
//! - [`pipeline`]: [`reconcile()`] runs all of the above.
//! - [`events`]: optional [`EventSink`] hook for stage events.
//! - [`error`]: [`StructuralError`] and reference diagnostics.
//!
//! All components are pure functions over immutable inputs. The only
//! fallible step is building a [`Package`].

pub mod classify;
pub mod compare;
pub mod error;
pub mod events;
pub mod graph;
pub mod guidance;
pub mod model;
pub mod order;
pub mod pipeline;

pub use classify::{Classification, ClassificationResult, ClassifiedChange, classify};
pub use compare::{ChangeKind, Delta, DeltaEntry, FieldChange, ModifiedEntry, compare, diff_objects};
pub use error::{ReferenceSite, StructuralError, UnresolvedReference};
pub use events::{CollectingSink, EventSink, PipelineEvent, Stage};
pub use graph::{DependencyGraph, Dependencies, GraphOptions, build_graph, get_dependencies};
pub use guidance::{
    ConflictSection, Guidance, GuidanceItem, GuidanceOptions, ItemType, MergeStrategy, generate,
    generate_with,
};
pub use model::{Object, ObjectId, ObjectType, Package, Payload};
pub use order::{BrokenEdge, CycleReport, OrderedChange, ReviewSequence, order_changes};
pub use pipeline::{ReconcileOptions, ReconcileReport, ReconcileSummary, reconcile};
