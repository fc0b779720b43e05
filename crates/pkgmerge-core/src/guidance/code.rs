//! Line-level analysis of object `code` text.
//!
//! Two-way hunks come from a Myers diff (`similar`). Three-way divergences
//! are clusters of base→vendor and base→customer hunks whose base ranges
//! overlap or touch; a cluster is a divergence only when the vendor and
//! customer texts for it differ.

use std::fmt::Write as _;
use std::ops::Range;

use similar::{Algorithm, DiffTag, capture_diff_slices};

/// One contiguous change between a base text and another text.
///
/// Ranges are zero-based, half-open line indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub base: Range<usize>,
    pub other: Range<usize>,
}

impl Hunk {
    /// Lines were only inserted.
    pub const fn is_insert(&self) -> bool {
        self.base.start == self.base.end
    }

    /// Lines were only deleted.
    pub const fn is_delete(&self) -> bool {
        self.other.start == self.other.end
    }

    /// Human-readable summary of the hunk, using one-based line numbers.
    pub fn describe(&self) -> String {
        let inserted = self.other.len();
        let deleted = self.base.len();
        if self.is_insert() {
            format!(
                "{inserted} line(s) inserted after base line {}",
                self.base.start
            )
        } else if self.is_delete() {
            format!("{deleted} line(s) deleted at {}", line_span(&self.base))
        } else {
            format!(
                "{} replaced ({deleted} → {inserted} line(s))",
                line_span(&self.base)
            )
        }
    }

    /// Location string in base line numbers.
    pub fn location(&self) -> String {
        if self.is_insert() {
            format!("code:after L{}", self.base.start)
        } else {
            format!("code:{}", compact_span(&self.base))
        }
    }
}

/// Split optional code into lines. Absent code has no lines.
pub fn lines(code: Option<&str>) -> Vec<&str> {
    code.map(|c| c.lines().collect()).unwrap_or_default()
}

/// Diff `base` against `other` into merged hunks, in base order.
pub fn hunks(base: &[&str], other: &[&str]) -> Vec<Hunk> {
    let mut out: Vec<Hunk> = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, base, other) {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            continue;
        }
        if let Some(last) = out.last_mut()
            && last.base.end == old.start
            && last.other.end == new.start
        {
            last.base.end = old.end;
            last.other.end = new.end;
        } else {
            out.push(Hunk {
                base: old,
                other: new,
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Three-way divergence
// ---------------------------------------------------------------------------

/// A base region that vendor and customer changed to different text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence {
    pub base: Range<usize>,
    pub customer: Range<usize>,
    pub vendor: Range<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Customer,
    Vendor,
}

struct Cluster<'a> {
    base: Range<usize>,
    customer: Vec<&'a Hunk>,
    vendor: Vec<&'a Hunk>,
}

impl<'a> Cluster<'a> {
    fn start(side: Side, hunk: &'a Hunk) -> Self {
        let mut cluster = Self {
            base: hunk.base.clone(),
            customer: Vec::new(),
            vendor: Vec::new(),
        };
        cluster.push(side, hunk);
        cluster
    }

    fn push(&mut self, side: Side, hunk: &'a Hunk) {
        self.base.end = self.base.end.max(hunk.base.end);
        match side {
            Side::Customer => self.customer.push(hunk),
            Side::Vendor => self.vendor.push(hunk),
        }
    }
}

/// Regions where base, customer and vendor code all differ.
pub fn divergences(base: &[&str], customer: &[&str], vendor: &[&str]) -> Vec<Divergence> {
    let customer_hunks = hunks(base, customer);
    let vendor_hunks = hunks(base, vendor);

    let mut tagged: Vec<(Side, &Hunk)> = customer_hunks
        .iter()
        .map(|h| (Side::Customer, h))
        .chain(vendor_hunks.iter().map(|h| (Side::Vendor, h)))
        .collect();
    tagged.sort_by_key(|(side, h)| (h.base.start, h.base.end, *side));

    // Touching ranges join a cluster.
    let mut clusters: Vec<Cluster<'_>> = Vec::new();
    for (side, hunk) in tagged {
        match clusters.last_mut() {
            Some(current) if hunk.base.start <= current.base.end => current.push(side, hunk),
            _ => clusters.push(Cluster::start(side, hunk)),
        }
    }

    clusters
        .into_iter()
        .filter(|c| !c.customer.is_empty() && !c.vendor.is_empty())
        .filter_map(|c| {
            let customer_range = project(&c.base, &c.customer);
            let vendor_range = project(&c.base, &c.vendor);
            let differs = customer.get(customer_range.clone()) != vendor.get(vendor_range.clone());
            differs.then_some(Divergence {
                base: c.base,
                customer: customer_range,
                vendor: vendor_range,
            })
        })
        .collect()
}

/// Map a base range onto one side's text, given that side's hunks inside it.
///
/// Lines of the range outside those hunks are unchanged on that side.
fn project(range: &Range<usize>, side_hunks: &[&Hunk]) -> Range<usize> {
    match (side_hunks.first(), side_hunks.last()) {
        (Some(first), Some(last)) => {
            let lead = first.base.start.saturating_sub(range.start);
            let trail = range.end.saturating_sub(last.base.end);
            first.other.start.saturating_sub(lead)..last.other.end + trail
        }
        _ => range.clone(),
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `"line 3"` or `"lines 3-5"`, one-based.
pub fn line_span(range: &Range<usize>) -> String {
    if range.len() == 1 {
        format!("line {}", range.start + 1)
    } else {
        format!("lines {}-{}", range.start + 1, range.end)
    }
}

/// `"L3"` or `"L3-5"`, one-based.
pub fn compact_span(range: &Range<usize>) -> String {
    if range.len() == 1 {
        format!("L{}", range.start + 1)
    } else {
        format!("L{}-{}", range.start + 1, range.end)
    }
}

/// Join `lines[range]`, keeping at most `max_lines` lines.
///
/// Returns `None` for an out-of-range slice.
pub fn excerpt(lines: &[&str], range: Range<usize>, max_lines: usize) -> Option<String> {
    let slice = lines.get(range)?;
    let mut text = slice
        .iter()
        .take(max_lines)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if slice.len() > max_lines {
        let more = slice.len() - max_lines;
        if !text.is_empty() {
            text.push('\n');
        }
        let _ = write!(text, "… ({more} more line(s))");
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    // -- Two-way hunks --

    #[test]
    fn identical_texts_have_no_hunks() {
        let a = split("x\ny\nz");
        assert!(hunks(&a, &a).is_empty());
    }

    #[test]
    fn single_line_replace() {
        let h = hunks(&split("a"), &split("b"));
        assert_eq!(
            h,
            vec![Hunk {
                base: 0..1,
                other: 0..1,
            }]
        );
        assert!(!h[0].is_insert());
        assert_eq!(h[0].location(), "code:L1");
    }

    #[test]
    fn appended_lines_form_one_insert_hunk() {
        let h = hunks(&split("a\nb"), &split("a\nb\nc\nd"));
        assert_eq!(h.len(), 1);
        assert!(h[0].is_insert());
        assert_eq!(h[0].base, 2..2);
        assert_eq!(h[0].other, 2..4);
        assert_eq!(h[0].describe(), "2 line(s) inserted after base line 2");
    }

    #[test]
    fn deleted_lines_form_delete_hunk() {
        let h = hunks(&split("a\nb\nc"), &split("a"));
        assert_eq!(h.len(), 1);
        assert!(h[0].is_delete());
        assert_eq!(h[0].describe(), "2 line(s) deleted at lines 2-3");
    }

    #[test]
    fn absent_code_has_no_lines() {
        assert!(lines(None).is_empty());
        assert_eq!(lines(Some("a\nb\n")), vec!["a", "b"]);
    }

    // -- Three-way divergence --

    #[test]
    fn same_line_changed_differently_diverges() {
        let d = divergences(&split("a"), &split("c"), &split("b"));
        assert_eq!(
            d,
            vec![Divergence {
                base: 0..1,
                customer: 0..1,
                vendor: 0..1,
            }]
        );
    }

    #[test]
    fn same_change_on_both_sides_is_not_divergence() {
        let d = divergences(&split("a\nb"), &split("a\nX"), &split("a\nX"));
        assert!(d.is_empty());
    }

    #[test]
    fn disjoint_edits_do_not_diverge() {
        let base = split("a\nb\nc\nd\ne");
        let customer = split("A\nb\nc\nd\ne");
        let vendor = split("a\nb\nc\nd\ne\nf");
        assert!(divergences(&base, &customer, &vendor).is_empty());
    }

    #[test]
    fn touching_edits_diverge() {
        let base = split("a\nb\nc");
        let customer = split("A\nb\nc");
        let vendor = split("a\nB\nc");
        let d = divergences(&base, &customer, &vendor);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].base, 0..2);
        assert_eq!(customer[d[0].customer.clone()], ["A", "b"]);
        assert_eq!(vendor[d[0].vendor.clone()], ["a", "B"]);
    }

    #[test]
    fn inserts_at_same_point_diverge() {
        let base = split("a");
        let d = divergences(&base, &split("a\nc1"), &split("a\nv1"));
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].base, 1..1);
    }

    // -- Excerpts --

    #[test]
    fn excerpt_truncates() {
        let l = split("1\n2\n3\n4");
        assert_eq!(excerpt(&l, 0..4, 2).as_deref(), Some("1\n2\n… (2 more line(s))"));
        assert_eq!(excerpt(&l, 1..3, 10).as_deref(), Some("2\n3"));
        assert_eq!(excerpt(&l, 3..9, 10), None);
    }

    #[test]
    fn span_formatting() {
        assert_eq!(line_span(&(2..3)), "line 3");
        assert_eq!(line_span(&(2..5)), "lines 3-5");
        assert_eq!(compact_span(&(0..2)), "L1-2");
    }
}
