//! PEP 440 version comparison and specifier matching, backed by `pep440_rs`.

use crate::error::{PipError, Result};
use pep440_rs::{Version as Pep440Version, VersionSpecifiers};
use std::cmp::Ordering;
use std::str::FromStr;

/// Parses a PEP 440 specifier set (e.g. `>=1.0,<2.0`, `~=3.1`, `==4.2.*`).
pub fn parse_specifiers(req: &str) -> Result<VersionSpecifiers> {
    VersionSpecifiers::from_str(req).map_err(|_| PipError::InvalidVersionSpecifier(req.to_string()))
}

/// Whether `version` satisfies every specifier in `specifiers`.
pub fn satisfies(version: &str, specifiers: &VersionSpecifiers) -> bool {
    match Pep440Version::from_str(version) {
        Ok(parsed) => specifiers.contains(&parsed),
        Err(_) => false,
    }
}

/// Compares two version strings per PEP 440 when both parse; falls back to a
/// permissive numeric/lexicographic split comparator (numeric components
/// compare numerically, others lexicographically, missing components treat
/// as zero) for anything `pep440_rs` rejects outright.
pub fn compare_pep440_like(a: &str, b: &str) -> Ordering {
    match (Pep440Version::from_str(a), Pep440Version::from_str(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        _ => fallback_compare(a, b),
    }
}

fn fallback_compare(a: &str, b: &str) -> Ordering {
    let split = |s: &str| -> Vec<String> {
        s.split(|c| c == '.' || c == '-')
            .map(|part| part.to_string())
            .collect()
    };
    let (pa, pb) = (split(a), split(b));
    for i in 0..pa.len().max(pb.len()) {
        let ca = pa.get(i).map(String::as_str).unwrap_or("0");
        let cb = pb.get(i).map(String::as_str).unwrap_or("0");
        let ordering = match (ca.parse::<u64>(), cb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => ca.cmp(cb),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
