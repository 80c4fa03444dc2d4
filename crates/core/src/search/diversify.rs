//! Picks the final display set from filtered candidates, spreading across
//! presentation formats and avoiding near-duplicate variants of the same
//! underlying design.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::product::Product;

/// How many products a reply shows at most.
pub const DISPLAY_LIMIT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresentationFormat {
    Glass,
    Framed,
    Canvas,
    Other,
}

impl PresentationFormat {
    /// Detected by substring on the product name; the store encodes the
    /// mounting variant there.
    pub fn detect(name: &str) -> Self {
        if name.contains("זכוכית") {
            Self::Glass
        } else if name.contains("מסגרת") || name.contains("ממוסגרת") {
            Self::Framed
        } else if name.contains("קנבס") {
            Self::Canvas
        } else {
            Self::Other
        }
    }
}

fn design_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"דגם\s*(\d+)").expect("hard-coded pattern"))
}

/// Grouping key for "same artwork, different mounting": the numeric design
/// code when the name carries one, else the full name.
pub fn design_key(name: &str) -> String {
    design_code_pattern()
        .captures(name)
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_str().to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Select up to `limit` products: first one of each format in priority order
/// (glass, framed, canvas), each with a design not yet used, then top up from
/// the merged pool. If the diversity constraints would select nothing at all,
/// the first remaining candidate is accepted regardless of design.
pub fn pick_display_set(candidates: &[Product], limit: usize) -> Vec<Product> {
    let mut glass = Vec::new();
    let mut framed = Vec::new();
    let mut canvas = Vec::new();
    let mut other = Vec::new();
    for product in candidates {
        match PresentationFormat::detect(&product.name) {
            PresentationFormat::Glass => glass.push(product),
            PresentationFormat::Framed => framed.push(product),
            PresentationFormat::Canvas => canvas.push(product),
            PresentationFormat::Other => other.push(product),
        }
    }

    let mut selected: Vec<Product> = Vec::new();
    let mut used_designs: HashSet<String> = HashSet::new();

    for bucket in [&glass, &framed, &canvas] {
        for product in bucket {
            let key = design_key(&product.name);
            if !used_designs.contains(&key) {
                selected.push((*product).clone());
                used_designs.insert(key);
                break;
            }
        }
    }

    for product in glass.iter().chain(&framed).chain(&canvas).chain(&other) {
        if selected.len() >= limit {
            break;
        }
        let key = design_key(&product.name);
        if !used_designs.contains(&key) {
            selected.push((*product).clone());
            used_designs.insert(key);
        } else if selected.is_empty() {
            // Never let the diversity rules turn a non-empty candidate list
            // into an empty reply.
            selected.push((*product).clone());
        }
    }

    selected.truncate(limit);
    selected
}
