//! Structured pipeline events and the optional [`EventSink`] hook.
//!
//! Every event is also emitted through `tracing`, so a run without a sink
//! logs the same information and produces the same report.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

use crate::classify::Classification;
use crate::error::UnresolvedReference;
use crate::order::CycleReport;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of the reconciliation pipeline, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// base → vendor and base → customer deltas.
    Compare,
    /// Four-way classification of changed objects.
    Classify,
    /// Dependency graphs for the customer and vendor packages.
    Graph,
    /// Review sequence construction.
    Order,
    /// Per-change merge guidance.
    Guide,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [
        Self::Compare,
        Self::Classify,
        Self::Graph,
        Self::Order,
        Self::Guide,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare => write!(f, "compare"),
            Self::Classify => write!(f, "classify"),
            Self::Graph => write!(f, "graph"),
            Self::Order => write!(f, "order"),
            Self::Guide => write!(f, "guide"),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// A structured event raised while a reconciliation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage is about to run.
    StageStarted {
        /// The stage.
        stage: Stage,
    },
    /// A stage finished.
    StageCompleted {
        /// The stage.
        stage: Stage,
        /// Number of items the stage produced (changes, edges, guidance records).
        items: usize,
    },
    /// A dependency cycle was broken while ordering.
    CycleDetected {
        /// The group that contained the cycle.
        classification: Classification,
        /// Full report, including the dropped edge.
        report: CycleReport,
    },
    /// A named reference did not resolve to any object in its package.
    ReferenceUnresolved {
        /// The reference.
        reference: UnresolvedReference,
    },
}

impl PipelineEvent {
    /// Log the event through `tracing`.
    pub(crate) fn trace(&self) {
        match self {
            Self::StageStarted { stage } => tracing::debug!(%stage, "stage started"),
            Self::StageCompleted { stage, items } => {
                tracing::debug!(%stage, items, "stage completed");
            }
            Self::CycleDetected {
                classification,
                report,
            } => tracing::info!(
                %classification,
                dropped = %report.broken_edge,
                cycle_len = report.cycle.len(),
                "cycle broken"
            ),
            Self::ReferenceUnresolved { reference } => {
                tracing::debug!(%reference, "reference unresolved");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Receiver for [`PipelineEvent`]s.
///
/// Implemented for any `Fn(&PipelineEvent)` closure.
pub trait EventSink: Sync {
    /// Handle one event. Must not panic.
    fn emit(&self, event: &PipelineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&PipelineEvent) + Sync,
{
    fn emit(&self, event: &PipelineEvent) {
        self(event);
    }
}

/// A sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the events recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Trace `event` and forward it to `sink`, if any.
pub(crate) fn dispatch(sink: Option<&dyn EventSink>, event: &PipelineEvent) {
    event.trace();
    if let Some(sink) = sink {
        sink.emit(event);
    }
}
