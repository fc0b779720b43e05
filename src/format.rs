//! Report output: JSON for machines, a plain-text digest for people.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::Serialize;

use pkgmerge_core::{Classification, DependencyGraph, ReconcileReport};

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text digest.
    #[default]
    Text,
    /// JSON - machine-parseable
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{s}'. Use: text or json"),
        }
    }
}

impl OutputFormat {
    /// Serialize data as JSON.
    ///
    /// # Errors
    /// Fails for the text format, which has a dedicated renderer per value,
    /// or if serialization fails.
    pub fn serialize<T: Serialize>(self, data: &T) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(data)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}")),
            Self::Text => bail!("Text format should not use serialize()"),
        }
    }

    /// Render a reconciliation report.
    ///
    /// # Errors
    /// Returns an error if JSON serialization fails.
    pub fn report(self, report: &ReconcileReport) -> Result<String> {
        match self {
            Self::Json => self.serialize(report),
            Self::Text => Ok(report_text(report)),
        }
    }

    /// Render a dependency graph.
    ///
    /// # Errors
    /// Returns an error if JSON serialization fails.
    pub fn graph(self, graph: &DependencyGraph) -> Result<String> {
        match self {
            Self::Json => self.serialize(graph),
            Self::Text => Ok(graph_text(graph)),
        }
    }
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

/// Digest of a report: counts, review sequence, cycles, unresolved references.
#[must_use]
pub fn report_text(report: &ReconcileReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Packages: base {}, customer {}, vendor {}",
        s.base_objects, s.customer_objects, s.vendor_objects
    );
    let _ = writeln!(
        out,
        "Changes: vendor {}, customer {}, to review {}",
        s.vendor_changes,
        s.customer_changes,
        s.total()
    );
    for classification in Classification::ALL {
        let _ = writeln!(out, "  {classification:<24} {}", s.count(classification));
    }
    if !s.strategies.is_empty() {
        out.push_str("Strategies:\n");
        for (strategy, n) in &s.strategies {
            let _ = writeln!(out, "  {strategy:<30} {n}");
        }
    }

    if report.sequence.is_empty() {
        out.push_str("\nNothing to review.\n");
    } else {
        out.push_str("\nReview sequence:\n");
        for (ordered, guidance) in report.sequence.iter().zip(&report.guidance) {
            let c = &ordered.change;
            let _ = writeln!(
                out,
                "  #{:<3} [{}] {} {} ({}) → {}",
                ordered.display_order + 1,
                c.classification,
                c.object_type,
                c.name,
                c.uuid,
                guidance.strategy
            );
            if !guidance.conflict_sections.is_empty() {
                let _ = writeln!(
                    out,
                    "        {} conflict section(s)",
                    guidance.conflict_sections.len()
                );
            }
        }
    }

    if !report.sequence.cycles.is_empty() {
        out.push_str("\nCycles broken:\n");
        for cycle in &report.sequence.cycles {
            let _ = writeln!(out, "  {cycle}");
        }
    }

    let unresolved = report.unresolved();
    if !unresolved.is_empty() {
        out.push_str("\nUnresolved references:\n");
        for r in unresolved {
            let _ = writeln!(out, "  {r}");
        }
    }
    out
}

/// One line per object: `uuid → dep, dep`, then unresolved references.
#[must_use]
pub fn graph_text(graph: &DependencyGraph) -> String {
    let mut out = String::new();
    for (uuid, deps) in graph.iter() {
        if deps.is_empty() {
            let _ = writeln!(out, "{uuid}");
        } else {
            let deps: Vec<&str> = deps.iter().map(|d| d.as_str()).collect();
            let _ = writeln!(out, "{uuid} → {}", deps.join(", "));
        }
    }
    for r in graph.unresolved() {
        let _ = writeln!(out, "warning: {r}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgmerge_core::{Object, ObjectId, ObjectType, Package, ReconcileOptions, reconcile};

    fn rule(uuid: &str, name: &str, code: &str) -> Object {
        Object::new(ObjectId::new(uuid).unwrap(), name, ObjectType::ExpressionRule)
            .with_version(format!("{uuid}:{code}"))
            .with_code(code)
    }

    fn report(base: Vec<Object>, customer: Vec<Object>, vendor: Vec<Object>) -> ReconcileReport {
        reconcile(
            &Package::new(base).unwrap(),
            &Package::new(customer).unwrap(),
            &Package::new(vendor).unwrap(),
            &ReconcileOptions::default(),
            None,
        )
    }

    #[test]
    fn format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("toml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn text_cannot_serialize() {
        assert!(OutputFormat::Text.serialize(&1).is_err());
    }

    #[test]
    fn text_report_lists_review_sequence() {
        let r = report(
            vec![rule("x", "calc", "a")],
            vec![rule("x", "calc", "c")],
            vec![rule("x", "calc", "b")],
        );
        let text = report_text(&r);
        assert!(text.contains("CONFLICT"), "{text}");
        assert!(text.contains("#1"), "{text}");
        assert!(text.contains("calc (x) → MANUAL_MERGE_REQUIRED"), "{text}");
        assert!(text.contains("1 conflict section(s)"), "{text}");
    }

    #[test]
    fn text_report_for_identical_packages() {
        let pkg = vec![rule("x", "calc", "a")];
        let text = report_text(&report(pkg.clone(), pkg.clone(), pkg));
        assert!(text.contains("Nothing to review."));
        assert!(!text.contains("Cycles broken"));
    }

    #[test]
    fn text_report_shows_unresolved_and_cycles() {
        let base = vec![rule("a", "alpha", "rule!beta"), rule("b", "beta", "rule!alpha")];
        let vendor = vec![
            rule("a", "alpha", "rule!beta + rule!gone"),
            rule("b", "beta", "rule!alpha + 1"),
        ];
        let text = report_text(&report(base.clone(), base, vendor));
        assert!(text.contains("Cycles broken:"), "{text}");
        assert!(text.contains("rule!gone"), "{text}");
    }

    #[test]
    fn json_report_is_parseable() {
        let r = report(vec![rule("x", "calc", "a")], vec![], vec![]);
        let json = OutputFormat::Json.report(&r).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["summary"].is_object());
    }

    #[test]
    fn graph_text_lists_edges() {
        let r = report(
            vec![],
            vec![],
            vec![rule("a", "alpha", "rule!beta"), rule("b", "beta", "1")],
        );
        let text = graph_text(&r.graph);
        assert!(text.contains("a → b"), "{text}");
        assert!(text.lines().any(|l| l == "b"), "{text}");
    }
}
