//! CLASSIFY step: merge the vendor and customer deltas into four categories.
//!
//! Builds an inverted index from UUID → (vendor action, customer action) over
//! both deltas, then assigns each UUID exactly one [`Classification`]:
//!
//! | vendor    | customer  | result                     |
//! |-----------|-----------|----------------------------|
//! | changed   | unchanged | `NO_CONFLICT`              |
//! | unchanged | changed   | `CUSTOMER_ONLY`            |
//! | removed   | modified  | `REMOVED_BUT_CUSTOMIZED`   |
//! | changed   | changed   | `CONFLICT` (all other pairs) |
//!
//! # Example
//!
//! ```text
//! Vendor delta:   modified X, removed Y, added Z
//! Customer delta: modified Y, modified Z, modified W
//!
//! X → NO_CONFLICT
//! Y → REMOVED_BUT_CUSTOMIZED
//! Z → CONFLICT
//! W → CUSTOMER_ONLY
//! ```
//!
//! Every list is sorted by UUID.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::compare::{ChangeKind, Delta, DeltaEntry};
use crate::model::{ObjectId, ObjectType};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a changed object relates to both sides of the merge.
///
/// Declaration order is review priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// Changed by the vendor only.
    NoConflict,
    /// Changed by both sides, and not the removed/modified case.
    Conflict,
    /// Changed by the customer only.
    CustomerOnly,
    /// Removed by the vendor, modified by the customer.
    RemovedButCustomized,
}

impl Classification {
    /// All classifications in review order.
    pub const ALL: [Self; 4] = [
        Self::NoConflict,
        Self::Conflict,
        Self::CustomerOnly,
        Self::RemovedButCustomized,
    ];

    /// The upper-case tag (`"NO_CONFLICT"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoConflict => "NO_CONFLICT",
            Self::Conflict => "CONFLICT",
            Self::CustomerOnly => "CUSTOMER_ONLY",
            Self::RemovedButCustomized => "REMOVED_BUT_CUSTOMIZED",
        }
    }

    /// Apply the decision table to one UUID's pair of actions.
    ///
    /// Returns `None` when neither side changed the object.
    #[must_use]
    pub const fn decide(vendor: Option<ChangeKind>, customer: Option<ChangeKind>) -> Option<Self> {
        match (vendor, customer) {
            (None, None) => None,
            (Some(_), None) => Some(Self::NoConflict),
            (None, Some(_)) => Some(Self::CustomerOnly),
            (Some(ChangeKind::Removed), Some(ChangeKind::Modified)) => {
                Some(Self::RemovedButCustomized)
            }
            (Some(_), Some(_)) => Some(Self::Conflict),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ClassifiedChange
// ---------------------------------------------------------------------------

/// One changed object with its classification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassifiedChange {
    /// Object UUID.
    pub uuid: ObjectId,
    /// Object name (vendor side when the vendor touched it, else customer).
    pub name: String,
    /// Object kind (same source as `name`).
    pub object_type: ObjectType,
    /// The assigned category.
    pub classification: Classification,
    /// What the vendor did, if anything.
    pub vendor_action: Option<ChangeKind>,
    /// What the customer did, if anything.
    pub customer_action: Option<ChangeKind>,
}

impl ClassifiedChange {
    /// Returns `true` if the vendor removed this object.
    #[must_use]
    pub fn vendor_removed(&self) -> bool {
        matches!(self.vendor_action, Some(ChangeKind::Removed))
    }
}

// ---------------------------------------------------------------------------
// ClassificationResult
// ---------------------------------------------------------------------------

/// The four disjoint classification lists, each sorted by UUID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// Vendor-only changes.
    pub no_conflict: Vec<ClassifiedChange>,
    /// Changes made by both sides.
    pub conflict: Vec<ClassifiedChange>,
    /// Customer-only changes.
    pub customer_only: Vec<ClassifiedChange>,
    /// Vendor removals of customer-modified objects.
    pub removed_but_customized: Vec<ClassifiedChange>,
}

impl ClassificationResult {
    /// The list for one classification.
    #[must_use]
    pub fn get(&self, classification: Classification) -> &[ClassifiedChange] {
        match classification {
            Classification::NoConflict => &self.no_conflict,
            Classification::Conflict => &self.conflict,
            Classification::CustomerOnly => &self.customer_only,
            Classification::RemovedButCustomized => &self.removed_but_customized,
        }
    }

    fn get_mut(&mut self, classification: Classification) -> &mut Vec<ClassifiedChange> {
        match classification {
            Classification::NoConflict => &mut self.no_conflict,
            Classification::Conflict => &mut self.conflict,
            Classification::CustomerOnly => &mut self.customer_only,
            Classification::RemovedButCustomized => &mut self.removed_but_customized,
        }
    }

    /// All classified changes in review-priority order, UUID order within each.
    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedChange> {
        Classification::ALL
            .into_iter()
            .flat_map(move |c| self.get(c).iter())
    }

    /// Total number of classified UUIDs.
    #[must_use]
    pub fn total(&self) -> usize {
        Classification::ALL
            .into_iter()
            .map(|c| self.get(c).len())
            .sum()
    }

    /// Returns `true` if nothing was classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The classification of `uuid`, if it was classified.
    #[must_use]
    pub fn classification_of(&self, uuid: &ObjectId) -> Option<Classification> {
        self.iter()
            .find(|c| &c.uuid == uuid)
            .map(|c| c.classification)
    }

    /// Returns `true` if every change merges without a conflict decision
    /// (no `CONFLICT` or `REMOVED_BUT_CUSTOMIZED` entries).
    #[must_use]
    pub fn is_conflict_free(&self) -> bool {
        self.conflict.is_empty() && self.removed_but_customized.is_empty()
    }
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Per-UUID record in the inverted index.
#[derive(Default)]
struct Sides<'a> {
    vendor: Option<(ChangeKind, &'a DeltaEntry)>,
    customer: Option<(ChangeKind, &'a DeltaEntry)>,
}

/// Classify every UUID changed by either side.
///
/// # Determinism
///
/// - UUIDs are processed in lexicographic order (via [`BTreeMap`]).
/// - Each UUID lands in exactly one list, so the total equals the size of
///   the union of both deltas' changed UUIDs.
#[must_use]
pub fn classify(vendor_delta: &Delta, customer_delta: &Delta) -> ClassificationResult {
    let mut index: BTreeMap<&ObjectId, Sides<'_>> = BTreeMap::new();

    for (kind, entry) in vendor_delta.entries() {
        index.entry(&entry.uuid).or_default().vendor = Some((kind, entry));
    }
    for (kind, entry) in customer_delta.entries() {
        index.entry(&entry.uuid).or_default().customer = Some((kind, entry));
    }

    let mut result = ClassificationResult::default();

    for (uuid, sides) in index {
        let vendor_action = sides.vendor.map(|(k, _)| k);
        let customer_action = sides.customer.map(|(k, _)| k);
        let Some(classification) = Classification::decide(vendor_action, customer_action) else {
            continue;
        };
        let Some((_, entry)) = sides.vendor.or(sides.customer) else {
            continue;
        };

        result.get_mut(classification).push(ClassifiedChange {
            uuid: uuid.clone(),
            name: entry.name.clone(),
            object_type: entry.object_type,
            classification,
            vendor_action,
            customer_action,
        });
    }

    tracing::debug!(
        no_conflict = result.no_conflict.len(),
        conflict = result.conflict.len(),
        customer_only = result.customer_only.len(),
        removed_but_customized = result.removed_but_customized.len(),
        "classification complete"
    );

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
