//! Thin wrapper around `node-semver`'s range grammar, plus a fallback
//! comparator for the occasional non-semver version string (npm tolerates
//! these in old packuments).

use crate::error::{NpmError, Result};
use node_semver::{Range, Version};
use std::cmp::Ordering;

pub fn parse(req: &str) -> Result<Range> {
    let trimmed = req.trim();
    let normalized = if trimmed.is_empty() { "*" } else { trimmed };
    Range::parse(normalized).map_err(|_| NpmError::InvalidVersionSpecifier(req.to_string()))
}

pub fn satisfies(version: &str, range: &Range) -> bool {
    match Version::parse(version) {
        Ok(v) => range.satisfies(&v),
        Err(_) => false,
    }
}

/// Compares two version strings, newest-first ordering achieved by the
/// caller reversing the comparator. Falls back to a dotted-numeric
/// comparison when a version string isn't valid semver.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        _ => fallback_compare(a, b),
    }
}

fn fallback_compare(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<u64> = a.split('.').map(|p| p.parse().unwrap_or(0)).collect();
    let b_parts: Vec<u64> = b.split('.').map(|p| p.parse().unwrap_or(0)).collect();
    a_parts.cmp(&b_parts).then_with(|| a.cmp(b))
}
