//! PEP 508 environment-marker evaluation against a *target* platform rather
//! than the host the tool runs on. Deliberately narrow: only the marker
//! variables the spec calls out (`platform_system`, `sys_platform`,
//! `platform_machine`) are evaluated; anything mentioning `extra` is always
//! excluded, and an unset target platform excludes every marked dependency
//! rather than guessing.

use depssmuggler_core::{normalize_arch, TargetPlatform};

/// Returns `true` if the dependency carrying this marker string should be
/// **excluded** from the transitive closure for `target`.
pub fn excludes(marker: &str, target: &TargetPlatform) -> bool {
    if marker.contains("extra") {
        return true;
    }
    if target.is_unset() {
        return true;
    }
    !evaluate(marker, target)
}

/// Evaluates a marker expression string (pep508_rs's `Display` form, e.g.
/// `sys_platform == "win32" and platform_machine == "x86_64"`) against
/// `target`. Unrecognized atoms (anything other than the three platform
/// variables and `python_version`) are treated as satisfied, since the
/// adapter only constrains what the spec says it constrains.
fn evaluate(expr: &str, target: &TargetPlatform) -> bool {
    // Top-level disjunction: split on " or " outside parens.
    for clause in split_outside_parens(expr, " or ") {
        if split_outside_parens(&clause, " and ").into_iter().all(|atom| evaluate_atom(&atom, target)) {
            return true;
        }
    }
    false
}

fn split_outside_parens(s: &str, sep: &str) -> Vec<String> {
    let trimmed = s.trim();
    let trimmed = strip_matching_parens(trimmed);
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let bytes: Vec<char> = trimmed.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && trimmed[byte_index(&bytes, i)..].starts_with(sep) {
            parts.push(current.trim().to_string());
            current.clear();
            i += sep.chars().count();
            continue;
        }
        current.push(c);
        i += 1;
    }
    parts.push(current.trim().to_string());
    parts
}

fn byte_index(chars: &[char], idx: usize) -> usize {
    chars[..idx].iter().map(|c| c.len_utf8()).sum()
}

fn strip_matching_parens(s: &str) -> &str {
    let s = s.trim();
    if s.starts_with('(') && s.ends_with(')') {
        let inner = &s[1..s.len() - 1];
        if balanced(inner) {
            return inner.trim();
        }
    }
    s
}

fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn evaluate_atom(atom: &str, target: &TargetPlatform) -> bool {
    let atom = strip_matching_parens(atom.trim());
    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some((lhs, rhs)) = atom.split_once(op) {
            let key = lhs.trim();
            let value = rhs.trim().trim_matches(|c| c == '"' || c == '\'');
            return evaluate_comparison(key, op, value, target);
        }
    }
    // Unrecognized shape (e.g. `in` / `not in` clauses) — don't constrain.
    true
}

fn evaluate_comparison(key: &str, op: &str, value: &str, target: &TargetPlatform) -> bool {
    match key {
        "platform_system" => {
            let Some(os) = &target.os else { return true };
            equality(op, &platform_system(os), value)
        }
        "sys_platform" => {
            let Some(os) = &target.os else { return true };
            equality(op, &sys_platform(os), value)
        }
        "platform_machine" => {
            let Some(arch) = &target.arch else { return true };
            equality(op, normalize_arch(arch), &normalize_arch(value).to_string())
        }
        "python_version" => {
            let Some(python_version) = &target.python_version else { return true };
            compare_versions(op, python_version, value)
        }
        _ => true,
    }
}

fn equality(op: &str, actual: &str, expected: &str) -> bool {
    let equal = actual.eq_ignore_ascii_case(expected);
    match op {
        "==" => equal,
        "!=" => !equal,
        _ => equal,
    }
}

fn platform_system(os: &str) -> String {
    match os.to_ascii_lowercase().as_str() {
        "windows" | "win32" => "Windows".to_string(),
        "darwin" | "macos" | "osx" => "Darwin".to_string(),
        "linux" => "Linux".to_string(),
        other => other.to_string(),
    }
}

fn sys_platform(os: &str) -> String {
    match os.to_ascii_lowercase().as_str() {
        "windows" | "win32" => "win32".to_string(),
        "darwin" | "macos" | "osx" => "darwin".to_string(),
        "linux" => "linux".to_string(),
        other => other.to_string(),
    }
}

fn compare_versions(op: &str, actual: &str, expected: &str) -> bool {
    let parse = |s: &str| -> Vec<u32> { s.split('.').filter_map(|p| p.parse().ok()).collect() };
    let (a, e) = (parse(actual), parse(expected));
    let ordering = a.cmp(&e);
    match op {
        "==" => ordering == std::cmp::Ordering::Equal,
        "!=" => ordering != std::cmp::Ordering::Equal,
        ">=" => ordering != std::cmp::Ordering::Less,
        "<=" => ordering != std::cmp::Ordering::Greater,
        ">" => ordering == std::cmp::Ordering::Greater,
        "<" => ordering == std::cmp::Ordering::Less,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_mentioning_extra_is_always_excluded() {
        let target = TargetPlatform {
            os: Some("linux".into()),
            ..Default::default()
        };
        assert!(excludes("extra == \"socks\"", &target));
    }

    #[test]
    fn unset_target_excludes_any_marked_dependency() {
        assert!(excludes("sys_platform == \"win32\"", &TargetPlatform::default()));
    }

    #[test]
    fn matching_sys_platform_is_not_excluded() {
        let target = TargetPlatform {
            os: Some("windows".into()),
            ..Default::default()
        };
        assert!(!excludes("sys_platform == \"win32\"", &target));
    }

    #[test]
    fn non_matching_sys_platform_is_excluded() {
        let target = TargetPlatform {
            os: Some("linux".into()),
            ..Default::default()
        };
        assert!(excludes("sys_platform == \"win32\"", &target));
    }

    #[test]
    fn and_clause_requires_both_sides() {
        let target = TargetPlatform {
            os: Some("linux".into()),
            arch: Some("x86_64".into()),
            ..Default::default()
        };
        assert!(!excludes("sys_platform == \"linux\" and platform_machine == \"x86_64\"", &target));
        assert!(excludes("sys_platform == \"linux\" and platform_machine == \"arm64\"", &target));
    }

    #[test]
    fn or_clause_accepts_either_side() {
        let target = TargetPlatform {
            os: Some("darwin".into()),
            ..Default::default()
        };
        assert!(!excludes("sys_platform == \"win32\" or sys_platform == \"darwin\"", &target));
    }

    #[test]
    fn python_version_comparison() {
        let target = TargetPlatform {
            python_version: Some("3.10".into()),
            ..Default::default()
        };
        assert!(!excludes("python_version >= \"3.8\"", &target));
        assert!(excludes("python_version < \"3.8\"", &target));
    }
}
