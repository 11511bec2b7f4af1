//! A pragmatic subset of conda's MatchSpec grammar:
//! `channel::name[version-spec][=build]`, where `version-spec` is a
//! comma-separated (AND) list of pipe-separated (OR) clauses, each an
//! operator (`>=`,`<=`,`==`,`!=`,`>`,`<`) plus version, a bare `=version`
//! (prefix match), a trailing-`.*` wildcard, or a literal `*` (match all).

use crate::error::{CondaError, Result};
use crate::version::compare;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec {
    pub channel: Option<String>,
    pub name: String,
    pub version_spec: Option<String>,
    pub build: Option<String>,
}

impl MatchSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CondaError::InvalidMatchSpec(raw.to_string()));
        }

        let (channel, rest) = match trimmed.split_once("::") {
            Some((c, r)) => (Some(c.to_string()), r),
            None => (None, trimmed),
        };
        let rest = rest.trim();

        let name_end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '.'))
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_string();
        if name.is_empty() {
            return Err(CondaError::InvalidMatchSpec(raw.to_string()));
        }

        let remainder = rest[name_end..].trim();
        if remainder.is_empty() {
            return Ok(MatchSpec { channel, name, version_spec: None, build: None });
        }

        const COMPARATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];
        if COMPARATORS.iter().any(|op| remainder.starts_with(op)) {
            return Ok(MatchSpec {
                channel,
                name,
                version_spec: Some(remainder.to_string()),
                build: None,
            });
        }

        if let Some(stripped) = remainder.strip_prefix('=') {
            let mut parts = stripped.splitn(2, '=');
            let version = parts.next().unwrap_or_default().to_string();
            let build = parts.next().map(str::to_string);
            return Ok(MatchSpec {
                channel,
                name,
                version_spec: Some(format!("={version}")),
                build,
            });
        }

        Ok(MatchSpec { channel, name, version_spec: Some(remainder.to_string()), build: None })
    }

    /// Whether a candidate `(version, build)` pair satisfies this spec.
    pub fn matches(&self, version: &str, build: &str) -> bool {
        let version_ok = match &self.version_spec {
            None => true,
            Some(spec) => matches_version_spec(spec, version),
        };
        let build_ok = match &self.build {
            None => true,
            Some(wanted) => wildcard_match(wanted, build),
        };
        version_ok && build_ok
    }
}

fn matches_version_spec(spec: &str, version: &str) -> bool {
    if spec == "*" {
        return true;
    }
    // Top-level OR on `|`, each side is a comma-separated AND of clauses.
    spec.split('|').any(|or_clause| or_clause.split(',').all(|clause| matches_clause(clause.trim(), version)))
}

fn matches_clause(clause: &str, version: &str) -> bool {
    if clause.is_empty() || clause == "*" {
        return true;
    }
    if let Some(rest) = clause.strip_prefix(">=") {
        return compare(version, rest.trim()) != Ordering::Less;
    }
    if let Some(rest) = clause.strip_prefix("<=") {
        return compare(version, rest.trim()) != Ordering::Greater;
    }
    if let Some(rest) = clause.strip_prefix("==") {
        return compare(version, rest.trim()) == Ordering::Equal;
    }
    if let Some(rest) = clause.strip_prefix("!=") {
        return compare(version, rest.trim()) != Ordering::Equal;
    }
    if let Some(rest) = clause.strip_prefix('>') {
        return compare(version, rest.trim()) == Ordering::Greater;
    }
    if let Some(rest) = clause.strip_prefix('<') {
        return compare(version, rest.trim()) == Ordering::Less;
    }
    if let Some(rest) = clause.strip_prefix('=') {
        return wildcard_match(rest.trim(), version) || version.starts_with(rest.trim());
    }
    wildcard_match(clause, version)
}

/// `*` wildcard match: `1.20.*` matches any version starting with `1.20.`.
fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => candidate.starts_with(prefix),
        None => pattern == candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let spec = MatchSpec::parse("numpy").unwrap();
        assert_eq!(spec.name, "numpy");
        assert_eq!(spec.version_spec, None);
    }

    #[test]
    fn parses_channel_and_exact_version_and_build() {
        let spec = MatchSpec::parse("conda-forge::numpy=1.26.4=py310h5f9d8a6_0").unwrap();
        assert_eq!(spec.channel.as_deref(), Some("conda-forge"));
        assert_eq!(spec.name, "numpy");
        assert_eq!(spec.version_spec.as_deref(), Some("=1.26.4"));
        assert_eq!(spec.build.as_deref(), Some("py310h5f9d8a6_0"));
    }

    #[test]
    fn parses_comparator_range() {
        let spec = MatchSpec::parse("numpy>=1.20,<2.0").unwrap();
        assert_eq!(spec.version_spec.as_deref(), Some(">=1.20,<2.0"));
    }

    #[test]
    fn matches_respects_and_semantics() {
        let spec = MatchSpec::parse("numpy>=1.20,<2.0").unwrap();
        assert!(spec.matches("1.26.4", "py310_0"));
        assert!(!spec.matches("2.1.0", "py310_0"));
        assert!(!spec.matches("1.10.0", "py310_0"));
    }

    #[test]
    fn matches_respects_or_semantics() {
        let spec = MatchSpec::parse("numpy==1.20.0|==1.21.0").unwrap();
        assert!(spec.matches("1.21.0", "py310_0"));
        assert!(!spec.matches("1.22.0", "py310_0"));
    }

    #[test]
    fn wildcard_version_matches_prefix() {
        let spec = MatchSpec::parse("numpy=1.20.*").unwrap();
        assert!(spec.matches("1.20.3", "py310_0"));
        assert!(!spec.matches("1.21.0", "py310_0"));
    }

    #[test]
    fn empty_spec_is_invalid() {
        assert!(MatchSpec::parse("").is_err());
    }
}
