//! GUIDE step: per-change merge recommendations.
//!
//! [`generate`] looks at the three snapshots of one changed object (any of
//! which may be absent) and produces a [`Guidance`] record:
//!
//! | Classification | Strategy |
//! |---|---|
//! | `NO_CONFLICT` | `ADOPT_VENDOR_CHANGES`, or `REVIEW_VENDOR_REMOVAL` if the vendor removed it |
//! | `CONFLICT` | `MANUAL_MERGE_REQUIRED`, or `INCORPORATE_VENDOR_ADDITIONS` when the vendor's edits are purely additive and nothing diverges |
//! | `CUSTOMER_ONLY` | `KEEP_CUSTOMER_VERSION` |
//! | `REMOVED_BUT_CUSTOMIZED` | `KEEP_CUSTOMER_VERSION` |
//!
//! * **vendor additions**: content in vendor that is in neither base nor
//!   customer (new code lines, keys, nodes, flows, record fields).
//! * **vendor modifications**: base content the vendor changed. One entry
//!   per code hunk, so a code difference always yields a `code` entry. Empty
//!   when base and vendor are identical.
//! * **conflict sections**: places where base, customer and vendor all
//!   differ, with truncated excerpts of each side.
//!
//! Generation is pure and deterministic.

mod code;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::classify::{Classification, ClassifiedChange};
use crate::compare::{ChangeKind, FieldChange, KeyChange, diff_objects};
use crate::model::{FieldMap, Node, Object, ObjectId, RecordField, Relationship};

/// Default cap on lines per conflict excerpt.
pub const DEFAULT_MAX_EXCERPT_LINES: usize = 20;

// ---------------------------------------------------------------------------
// MergeStrategy
// ---------------------------------------------------------------------------

/// Recommended resolution action for one classified change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    /// Take the vendor version.
    AdoptVendorChanges,
    /// The vendor removed the object; confirm the removal.
    ReviewVendorRemoval,
    /// Both sides changed the same content; merge by hand.
    ManualMergeRequired,
    /// Keep the customer version and add the vendor's additions to it.
    IncorporateVendorAdditions,
    /// Keep the customer version.
    KeepCustomerVersion,
}

impl MergeStrategy {
    /// Pick the strategy for a change.
    ///
    /// `additive` is only consulted for conflicts: `true` when the vendor's
    /// edits can be layered onto the customer version without overlap.
    #[must_use]
    pub const fn select(change: &ClassifiedChange, additive: bool) -> Self {
        match change.classification {
            Classification::NoConflict => {
                if matches!(change.vendor_action, Some(ChangeKind::Removed)) {
                    Self::ReviewVendorRemoval
                } else {
                    Self::AdoptVendorChanges
                }
            }
            Classification::Conflict => {
                if additive {
                    Self::IncorporateVendorAdditions
                } else {
                    Self::ManualMergeRequired
                }
            }
            Classification::CustomerOnly | Classification::RemovedButCustomized => {
                Self::KeepCustomerVersion
            }
        }
    }

    /// Stable upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdoptVendorChanges => "ADOPT_VENDOR_CHANGES",
            Self::ReviewVendorRemoval => "REVIEW_VENDOR_REMOVAL",
            Self::ManualMergeRequired => "MANUAL_MERGE_REQUIRED",
            Self::IncorporateVendorAdditions => "INCORPORATE_VENDOR_ADDITIONS",
            Self::KeepCustomerVersion => "KEEP_CUSTOMER_VERSION",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Items and sections
// ---------------------------------------------------------------------------

/// What part of an object a guidance item refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// The object as a whole.
    Object,
    /// Lines of `code`.
    Code,
    /// A generic field.
    Field,
    /// A generic property.
    Property,
    /// A constant's value or value type.
    ConstantValue,
    /// A process model node.
    Node,
    /// A process model flow.
    Flow,
    /// A record type field.
    RecordField,
    /// A record type relationship.
    Relationship,
}

impl ItemType {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Code => "code",
            Self::Field => "field",
            Self::Property => "property",
            Self::ConstantValue => "constant_value",
            Self::Node => "node",
            Self::Flow => "flow",
            Self::RecordField => "record_field",
            Self::Relationship => "relationship",
        }
    }

    /// Capitalized label for descriptions.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Object => "Object",
            Self::Code => "Code",
            Self::Field => "Field",
            Self::Property => "Property",
            Self::ConstantValue => "Constant value",
            Self::Node => "Node",
            Self::Flow => "Flow",
            Self::RecordField => "Record field",
            Self::Relationship => "Relationship",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vendor addition or modification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GuidanceItem {
    /// What kind of content this is.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Human-readable description.
    pub description: String,
    /// Where in the object, e.g. `code:L3-5` or `fields.label`.
    pub location: String,
}

impl GuidanceItem {
    fn new(item_type: ItemType, description: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            item_type,
            description: description.into(),
            location: location.into(),
        }
    }
}

/// A place where base, customer and vendor all differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConflictSection {
    /// What kind of content diverges.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Where in the object.
    pub location: String,
    /// Human-readable description.
    pub description: String,
    /// Base excerpt (`None` if absent on that side).
    pub base: Option<String>,
    /// Customer excerpt.
    pub customer: Option<String>,
    /// Vendor excerpt.
    pub vendor: Option<String>,
}

/// Merge guidance for one classified change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Guidance {
    /// The object this guidance is for.
    pub uuid: ObjectId,
    /// Recommended action.
    pub strategy: MergeStrategy,
    /// Ordered human-readable advice. Always present, possibly empty.
    pub recommendations: Vec<String>,
    /// Vendor content new to both base and customer.
    pub vendor_additions: Vec<GuidanceItem>,
    /// Base content the vendor changed.
    pub vendor_modifications: Vec<GuidanceItem>,
    /// Three-way divergences.
    pub conflict_sections: Vec<ConflictSection>,
}

/// Knobs for guidance generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuidanceOptions {
    /// Maximum lines kept in each conflict excerpt.
    pub max_excerpt_lines: usize,
}

impl Default for GuidanceOptions {
    fn default() -> Self {
        Self {
            max_excerpt_lines: DEFAULT_MAX_EXCERPT_LINES,
        }
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

/// Generate guidance with default options.
#[must_use]
pub fn generate(
    change: &ClassifiedChange,
    base: Option<&Object>,
    customer: Option<&Object>,
    vendor: Option<&Object>,
) -> Guidance {
    generate_with(change, base, customer, vendor, &GuidanceOptions::default())
}

/// Generate guidance for one classified change.
///
/// Any snapshot may be absent: `base` for objects added on one or both
/// sides, `vendor` or `customer` for objects removed on that side.
#[must_use]
pub fn generate_with(
    change: &ClassifiedChange,
    base: Option<&Object>,
    customer: Option<&Object>,
    vendor: Option<&Object>,
    options: &GuidanceOptions,
) -> Guidance {
    let mut analysis = Analysis::default();

    match (base, vendor) {
        (None, Some(v)) => {
            analysis.additions.push(GuidanceItem::new(
                ItemType::Object,
                format!("New {} '{}' added by vendor", v.object_type(), v.name),
                "object",
            ));
        }
        (Some(b), None) => {
            analysis.additive = false;
            analysis.modifications.push(GuidanceItem::new(
                ItemType::Object,
                format!("{} '{}' removed by vendor", b.object_type(), b.name),
                "object",
            ));
        }
        (Some(b), Some(v)) => analysis.vendor_edits(b, customer, v),
        (None, None) => {}
    }

    match (base, customer, vendor) {
        (Some(b), Some(c), Some(v)) => analysis.divergences(b, c, v, options),
        (None, Some(c), Some(v)) => analysis.double_addition(c, v, options),
        _ => {}
    }

    let additive = analysis.additive
        && analysis.conflicts.is_empty()
        && base.is_some()
        && customer.is_some()
        && vendor.is_some();
    let strategy = MergeStrategy::select(change, additive);
    let recommendations = recommendations(change, strategy, &analysis, customer.is_none());

    tracing::trace!(
        uuid = %change.uuid,
        strategy = %strategy,
        additions = analysis.additions.len(),
        modifications = analysis.modifications.len(),
        conflicts = analysis.conflicts.len(),
        "guidance generated"
    );

    Guidance {
        uuid: change.uuid.clone(),
        strategy,
        recommendations,
        vendor_additions: analysis.additions,
        vendor_modifications: analysis.modifications,
        conflict_sections: analysis.conflicts,
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Accumulated findings for one object.
struct Analysis {
    additions: Vec<GuidanceItem>,
    modifications: Vec<GuidanceItem>,
    conflicts: Vec<ConflictSection>,
    /// Every vendor edit so far only added content.
    additive: bool,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            additions: Vec::new(),
            modifications: Vec::new(),
            conflicts: Vec::new(),
            additive: true,
        }
    }
}

impl Analysis {
    /// Base→vendor edits, split into additions and modifications.
    fn vendor_edits(&mut self, base: &Object, customer: Option<&Object>, vendor: &Object) {
        for change in diff_objects(base, vendor) {
            match change {
                FieldChange::VersionUuid { .. } => {}
                FieldChange::ObjectType { before, after } => {
                    self.additive = false;
                    self.modifications.push(GuidanceItem::new(
                        ItemType::Object,
                        format!("Object type changed from {before} to {after}"),
                        "object",
                    ));
                }
                FieldChange::Code { .. } => self.code_edits(base, customer, vendor),
                FieldChange::Fields { changes } => {
                    let theirs = customer.map(|c| &c.fields);
                    self.key_edits(ItemType::Field, "fields", &changes, theirs);
                }
                FieldChange::Properties { changes } => {
                    let theirs = customer.map(|c| &c.properties);
                    self.key_edits(ItemType::Property, "properties", &changes, theirs);
                }
                FieldChange::ConstantValue { before, after } => {
                    self.additive = false;
                    self.modifications.push(GuidanceItem::new(
                        ItemType::ConstantValue,
                        format!(
                            "Constant value changed from {} to {}",
                            render_opt(before.as_ref()),
                            render_opt(after.as_ref())
                        ),
                        "constant.value",
                    ));
                }
                FieldChange::ConstantType { before, after } => {
                    self.additive = false;
                    self.modifications.push(GuidanceItem::new(
                        ItemType::ConstantValue,
                        format!(
                            "Constant type changed from {} to {}",
                            before.as_deref().unwrap_or("(none)"),
                            after.as_deref().unwrap_or("(none)")
                        ),
                        "constant.value_type",
                    ));
                }
                FieldChange::Nodes {
                    added,
                    removed,
                    changed,
                    ..
                } => {
                    let theirs = nodes_of(customer);
                    for node in added {
                        if !theirs.contains(&node) {
                            self.additions.push(GuidanceItem::new(
                                ItemType::Node,
                                format!("New {} node '{}'", node.node_type, node.node_name),
                                format!("nodes[{}]", node.node_uuid),
                            ));
                        }
                    }
                    for node in removed {
                        self.additive = false;
                        self.modifications.push(GuidanceItem::new(
                            ItemType::Node,
                            format!("Node '{}' removed", node.node_name),
                            format!("nodes[{}]", node.node_uuid),
                        ));
                    }
                    for item in changed {
                        self.additive = false;
                        self.modifications.push(GuidanceItem::new(
                            ItemType::Node,
                            format!("Node '{}' changed", item.after.node_name),
                            format!("nodes[{}]", item.after.node_uuid),
                        ));
                    }
                }
                FieldChange::Flows { added, removed, .. } => {
                    let theirs = customer.map(Object::flows).unwrap_or_default();
                    for flow in added {
                        if !theirs.contains(&flow) {
                            self.additions.push(GuidanceItem::new(
                                ItemType::Flow,
                                format!(
                                    "New flow {} → {}",
                                    flow.from_node_uuid, flow.to_node_uuid
                                ),
                                flow_location(&flow.from_node_uuid, &flow.to_node_uuid),
                            ));
                        }
                    }
                    for flow in removed {
                        self.additive = false;
                        self.modifications.push(GuidanceItem::new(
                            ItemType::Flow,
                            format!("Flow {} → {} removed", flow.from_node_uuid, flow.to_node_uuid),
                            flow_location(&flow.from_node_uuid, &flow.to_node_uuid),
                        ));
                    }
                }
                FieldChange::RecordFields {
                    added,
                    removed,
                    changed,
                } => {
                    let theirs = record_fields_of(customer);
                    for field in added {
                        if !theirs.contains(&field) {
                            self.additions.push(GuidanceItem::new(
                                ItemType::RecordField,
                                format!("New record field '{}' ({})", field.name, field.data_type),
                                format!("record_fields.{}", field.name),
                            ));
                        }
                    }
                    self.additive &= removed.is_empty() && changed.is_empty();
                    for field in removed {
                        self.modifications.push(GuidanceItem::new(
                            ItemType::RecordField,
                            format!("Record field '{}' removed", field.name),
                            format!("record_fields.{}", field.name),
                        ));
                    }
                    for item in changed {
                        self.modifications.push(GuidanceItem::new(
                            ItemType::RecordField,
                            format!(
                                "Record field '{}' changed ({} → {})",
                                item.after.name, item.before.data_type, item.after.data_type
                            ),
                            format!("record_fields.{}", item.after.name),
                        ));
                    }
                }
                FieldChange::Relationships {
                    added,
                    removed,
                    changed,
                } => {
                    let theirs = relationships_of(customer);
                    for rel in added {
                        if !theirs.contains(&rel) {
                            self.additions.push(GuidanceItem::new(
                                ItemType::Relationship,
                                format!("New relationship '{}' to {}", rel.name, rel.target_uuid),
                                format!("relationships.{}", rel.name),
                            ));
                        }
                    }
                    self.additive &= removed.is_empty() && changed.is_empty();
                    for rel in removed {
                        self.modifications.push(GuidanceItem::new(
                            ItemType::Relationship,
                            format!("Relationship '{}' removed", rel.name),
                            format!("relationships.{}", rel.name),
                        ));
                    }
                    for item in changed {
                        self.modifications.push(GuidanceItem::new(
                            ItemType::Relationship,
                            format!(
                                "Relationship '{}' retargeted from {} to {}",
                                item.after.name, item.before.target_uuid, item.after.target_uuid
                            ),
                            format!("relationships.{}", item.after.name),
                        ));
                    }
                }
            }
        }
    }

    fn code_edits(&mut self, base: &Object, customer: Option<&Object>, vendor: &Object) {
        let base_lines = code::lines(base.code.as_deref());
        let vendor_lines = code::lines(vendor.code.as_deref());
        let customer_lines = code::lines(customer.and_then(|c| c.code.as_deref()));
        let hunks = code::hunks(&base_lines, &vendor_lines);

        if hunks.is_empty() {
            // Only presence or trailing whitespace differs.
            self.additive = false;
            self.modifications.push(GuidanceItem::new(
                ItemType::Code,
                "Code changed (presence or line endings only)",
                "code",
            ));
            return;
        }

        let known: BTreeSet<&str> = base_lines
            .iter()
            .chain(customer_lines.iter())
            .copied()
            .collect();

        for hunk in &hunks {
            self.additive &= hunk.is_insert();
            self.modifications.push(GuidanceItem::new(
                ItemType::Code,
                hunk.describe(),
                hunk.location(),
            ));

            let new_lines: Vec<&str> = vendor_lines[hunk.other.clone()]
                .iter()
                .copied()
                .filter(|l| !l.trim().is_empty() && !known.contains(l))
                .collect();
            if let Some(first) = new_lines.first() {
                self.additions.push(GuidanceItem::new(
                    ItemType::Code,
                    format!(
                        "{} new line(s) added by vendor, starting `{}`",
                        new_lines.len(),
                        first.trim()
                    ),
                    format!("code:{}", code::compact_span(&hunk.other)),
                ));
            }
        }
    }

    fn key_edits(
        &mut self,
        item_type: ItemType,
        prefix: &str,
        changes: &[KeyChange],
        customer: Option<&FieldMap>,
    ) {
        for change in changes {
            let location = format!("{prefix}.{}", change.key);
            match (&change.before, &change.after) {
                (None, Some(value)) => {
                    if !customer.is_some_and(|c| c.contains_key(&change.key)) {
                        self.additions.push(GuidanceItem::new(
                            item_type,
                            format!("New {item_type} '{}' = {value}", change.key),
                            location,
                        ));
                    }
                }
                (Some(_), None) => {
                    self.additive = false;
                    self.modifications.push(GuidanceItem::new(
                        item_type,
                        format!("{} '{}' removed", item_type.label(), change.key),
                        location,
                    ));
                }
                (Some(before), Some(after)) => {
                    self.additive = false;
                    self.modifications.push(GuidanceItem::new(
                        item_type,
                        format!(
                            "{} '{}' changed from {before} to {after}",
                            item_type.label(),
                            change.key
                        ),
                        location,
                    ));
                }
                (None, None) => {}
            }
        }
    }

    /// Three-way divergences when all snapshots exist.
    fn divergences(
        &mut self,
        base: &Object,
        customer: &Object,
        vendor: &Object,
        options: &GuidanceOptions,
    ) {
        let max = options.max_excerpt_lines;

        let base_lines = code::lines(base.code.as_deref());
        let customer_lines = code::lines(customer.code.as_deref());
        let vendor_lines = code::lines(vendor.code.as_deref());
        if customer.code != base.code && vendor.code != base.code {
            for d in code::divergences(&base_lines, &customer_lines, &vendor_lines) {
                let location = if d.base.is_empty() {
                    format!("code:after L{}", d.base.start)
                } else {
                    format!("code:{}", code::compact_span(&d.base))
                };
                let description = if d.base.is_empty() {
                    format!(
                        "Vendor and customer both inserted different lines after base line {}",
                        d.base.start
                    )
                } else {
                    format!(
                        "Vendor and customer changed base {} differently",
                        code::line_span(&d.base)
                    )
                };
                self.conflicts.push(ConflictSection {
                    item_type: ItemType::Code,
                    location,
                    description,
                    base: code::excerpt(&base_lines, d.base, max),
                    customer: code::excerpt(&customer_lines, d.customer, max),
                    vendor: code::excerpt(&vendor_lines, d.vendor, max),
                });
            }
        }

        self.map_divergences(ItemType::Field, "fields", &base.fields, &customer.fields, &vendor.fields);
        self.map_divergences(
            ItemType::Property,
            "properties",
            &base.properties,
            &customer.properties,
            &vendor.properties,
        );

        let value = |o: &Object| o.constant().and_then(|c| c.value.clone());
        let (b, c, v) = (value(base), value(customer), value(vendor));
        if diverges(&b, &c, &v) {
            self.conflicts.push(ConflictSection {
                item_type: ItemType::ConstantValue,
                location: "constant.value".to_owned(),
                description: "Vendor and customer set different constant values".to_owned(),
                base: b.as_ref().map(Value::to_string),
                customer: c.as_ref().map(Value::to_string),
                vendor: v.as_ref().map(Value::to_string),
            });
        }

        for (key, b, c, v) in keyed_divergences(base.nodes(), customer.nodes(), vendor.nodes(), |n| {
            n.node_uuid.as_str()
        }) {
            self.conflicts.push(ConflictSection {
                item_type: ItemType::Node,
                location: format!("nodes[{key}]"),
                description: format!("Node {key} differs on all three sides"),
                base: b.and_then(to_json),
                customer: c.and_then(to_json),
                vendor: v.and_then(to_json),
            });
        }

        for (key, b, c, v) in keyed_divergences(
            record_fields_of(Some(base)),
            record_fields_of(Some(customer)),
            record_fields_of(Some(vendor)),
            |f| f.name.as_str(),
        ) {
            self.conflicts.push(ConflictSection {
                item_type: ItemType::RecordField,
                location: format!("record_fields.{key}"),
                description: format!("Record field '{key}' differs on all three sides"),
                base: b.and_then(to_json),
                customer: c.and_then(to_json),
                vendor: v.and_then(to_json),
            });
        }

        for (key, b, c, v) in keyed_divergences(
            relationships_of(Some(base)),
            relationships_of(Some(customer)),
            relationships_of(Some(vendor)),
            |r| r.name.as_str(),
        ) {
            self.conflicts.push(ConflictSection {
                item_type: ItemType::Relationship,
                location: format!("relationships.{key}"),
                description: format!("Relationship '{key}' differs on all three sides"),
                base: b.and_then(to_json),
                customer: c.and_then(to_json),
                vendor: v.and_then(to_json),
            });
        }
    }

    fn map_divergences(
        &mut self,
        item_type: ItemType,
        prefix: &str,
        base: &FieldMap,
        customer: &FieldMap,
        vendor: &FieldMap,
    ) {
        let keys: BTreeSet<&String> = base
            .keys()
            .chain(customer.keys())
            .chain(vendor.keys())
            .collect();
        for key in keys {
            let (b, c, v) = (base.get(key), customer.get(key), vendor.get(key));
            if diverges(&b, &c, &v) {
                self.conflicts.push(ConflictSection {
                    item_type,
                    location: format!("{prefix}.{key}"),
                    description: format!(
                        "{} '{key}' set differently by vendor and customer",
                        item_type.label()
                    ),
                    base: b.map(Value::to_string),
                    customer: c.map(Value::to_string),
                    vendor: v.map(Value::to_string),
                });
            }
        }
    }

    /// Both sides added the same UUID with different content.
    fn double_addition(&mut self, customer: &Object, vendor: &Object, options: &GuidanceOptions) {
        if customer.content_fingerprint() == vendor.content_fingerprint() {
            return;
        }
        let max = options.max_excerpt_lines;
        let side = |o: &Object| {
            let lines = code::lines(o.code.as_deref());
            code::excerpt(&lines, 0..lines.len(), max)
        };
        self.conflicts.push(ConflictSection {
            item_type: ItemType::Object,
            location: "object".to_owned(),
            description: "Vendor and customer both added this object with different content"
                .to_owned(),
            base: None,
            customer: side(customer),
            vendor: side(vendor),
        });
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

fn recommendations(
    change: &ClassifiedChange,
    strategy: MergeStrategy,
    analysis: &Analysis,
    customer_removed: bool,
) -> Vec<String> {
    let name = &change.name;
    let kind = change.object_type;
    let mut out = Vec::new();

    match strategy {
        MergeStrategy::AdoptVendorChanges => {
            if change.vendor_action == Some(ChangeKind::Added) {
                out.push(format!("Import the new {kind} '{name}' from the vendor package."));
            } else {
                out.push(format!("Accept the vendor version of {kind} '{name}'."));
            }
            if !analysis.modifications.is_empty() {
                out.push(format!(
                    "Skim the {} vendor modification(s) before accepting.",
                    analysis.modifications.len()
                ));
            }
        }
        MergeStrategy::ReviewVendorRemoval => {
            out.push(format!("The vendor removed {kind} '{name}'."));
            out.push(
                "Confirm no customized object still references it before accepting the removal."
                    .to_owned(),
            );
        }
        MergeStrategy::ManualMergeRequired => {
            out.push(format!(
                "Both the vendor and the customer changed {kind} '{name}'; merge by hand."
            ));
            if customer_removed {
                out.push(
                    "The customer removed this object; decide whether the vendor changes should bring it back."
                        .to_owned(),
                );
            }
            if !analysis.conflicts.is_empty() {
                let locations: Vec<&str> = analysis
                    .conflicts
                    .iter()
                    .map(|c| c.location.as_str())
                    .collect();
                out.push(format!(
                    "Resolve {} conflicting section(s): {}.",
                    analysis.conflicts.len(),
                    locations.join(", ")
                ));
            }
            if !analysis.additions.is_empty() {
                out.push(format!(
                    "Carry over the {} vendor addition(s) into the merged version.",
                    analysis.additions.len()
                ));
            }
        }
        MergeStrategy::IncorporateVendorAdditions => {
            out.push(format!("Keep the customer version of {kind} '{name}'."));
            if analysis.additions.is_empty() {
                out.push("The vendor changes add nothing new; no further action needed.".to_owned());
            } else {
                out.push(format!(
                    "Apply the {} vendor addition(s) on top of it; they do not overlap customer edits.",
                    analysis.additions.len()
                ));
            }
        }
        MergeStrategy::KeepCustomerVersion => {
            if change.classification == Classification::RemovedButCustomized {
                out.push(format!(
                    "The vendor removed {kind} '{name}', but it carries customer changes."
                ));
                out.push(
                    "Keep the customer version and verify it still works without vendor support."
                        .to_owned(),
                );
            } else {
                out.push(format!(
                    "Only the customer changed {kind} '{name}'; keep the customer version."
                ));
            }
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// All three differ pairwise.
fn diverges<T: PartialEq>(base: &T, customer: &T, vendor: &T) -> bool {
    base != customer && base != vendor && customer != vendor
}

type Divergent<'a, T> = (&'a str, Option<&'a T>, Option<&'a T>, Option<&'a T>);

/// Keys whose items differ on all three sides. First item per key wins.
fn keyed_divergences<'a, T, F>(
    base: &'a [T],
    customer: &'a [T],
    vendor: &'a [T],
    key: F,
) -> Vec<Divergent<'a, T>>
where
    T: PartialEq,
    F: Fn(&'a T) -> &'a str,
{
    let index = |items: &'a [T]| {
        let mut map: BTreeMap<&'a str, &'a T> = BTreeMap::new();
        for item in items {
            map.entry(key(item)).or_insert(item);
        }
        map
    };
    let (b, c, v) = (index(base), index(customer), index(vendor));
    let keys: BTreeSet<&str> = b.keys().chain(c.keys()).chain(v.keys()).copied().collect();

    keys.into_iter()
        .filter_map(|k| {
            let (bi, ci, vi) = (b.get(k).copied(), c.get(k).copied(), v.get(k).copied());
            diverges(&bi, &ci, &vi).then_some((k, bi, ci, vi))
        })
        .collect()
}

fn to_json<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}

fn render_opt(value: Option<&Value>) -> String {
    value.map_or_else(|| "(none)".to_owned(), Value::to_string)
}

fn flow_location(from: &str, to: &str) -> String {
    format!("flows[{from}->{to}]")
}

fn nodes_of(object: Option<&Object>) -> &[Node] {
    object.map(Object::nodes).unwrap_or_default()
}

fn record_fields_of(object: Option<&Object>) -> &[RecordField] {
    object
        .and_then(Object::record_type)
        .map(|r| r.record_fields.as_slice())
        .unwrap_or_default()
}

fn relationships_of(object: Option<&Object>) -> &[Relationship] {
    object
        .and_then(Object::record_type)
        .map(|r| r.relationships.as_slice())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
