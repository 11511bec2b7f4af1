//! APT's `Packages` index: RFC822-style paragraphs separated by a blank
//! line, one paragraph per binary package, gzip-compressed on the wire.

use crate::types::OsPackage;
use std::collections::HashMap;

/// Splits `Depends`/`Pre-Depends`/`Recommends` field values into bare
/// package names, dropping version constraints (`foo (>= 1.0)` -> `foo`)
/// and alternatives (`foo | bar` keeps only the first alternative, the
/// one apt actually prefers when all are available).
pub fn split_dependency_field(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|entry| entry.split('|').next())
        .map(|alt| alt.split('(').next().unwrap_or(alt).trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parses an (already gunzipped) `Packages` file into [`OsPackage`]
/// records. `include_recommends` controls whether `Recommends` is folded
/// into `requires` alongside `Depends`/`Pre-Depends`.
pub fn parse_packages(text: &str, include_recommends: bool) -> Vec<OsPackage> {
    let mut packages = Vec::new();
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;

    let flush = |fields: &mut HashMap<String, String>, packages: &mut Vec<OsPackage>, include_recommends: bool| {
        if fields.is_empty() {
            return;
        }
        if let Some(pkg) = build_package(fields, include_recommends) {
            packages.push(pkg);
        }
        fields.clear();
    };

    for line in text.lines() {
        if line.is_empty() {
            flush(&mut fields, &mut packages, include_recommends);
            last_key = None;
            continue;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            // Continuation line for the previous field (apt wraps long
            // Depends lines with a leading space).
            if let Some(key) = &last_key {
                if let Some(existing) = fields.get_mut(key) {
                    existing.push(' ');
                    existing.push_str(rest.trim());
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            fields.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }
    flush(&mut fields, &mut packages, include_recommends);

    packages
}

fn build_package(fields: &HashMap<String, String>, include_recommends: bool) -> Option<OsPackage> {
    let name = fields.get("Package")?.clone();
    let version = fields.get("Version")?.clone();
    let arch = fields.get("Architecture").cloned().unwrap_or_else(|| "all".to_string());
    let filename = fields.get("Filename").cloned().unwrap_or_default();
    let size_bytes = fields.get("Size").and_then(|s| s.parse().ok());
    let sha1 = fields.get("SHA1").cloned();
    let sha256 = fields.get("SHA256").cloned();

    let mut requires = Vec::new();
    if let Some(depends) = fields.get("Depends") {
        requires.extend(split_dependency_field(depends));
    }
    if let Some(pre_depends) = fields.get("Pre-Depends") {
        requires.extend(split_dependency_field(pre_depends));
    }
    if include_recommends {
        if let Some(recommends) = fields.get("Recommends") {
            requires.extend(split_dependency_field(recommends));
        }
    }

    let mut provides = vec![name.clone()];
    if let Some(field) = fields.get("Provides") {
        provides.extend(split_dependency_field(field));
    }

    Some(OsPackage {
        name,
        version,
        arch,
        download_url: filename.clone(),
        filename: filename.rsplit('/').next().unwrap_or(&filename).to_string(),
        size_bytes,
        sha1,
        sha256,
        provides,
        requires,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGES: &str = "\
Package: curl
Version: 7.81.0-1ubuntu1.15
Architecture: amd64
Depends: libc6 (>= 2.34), libcurl4 (= 7.81.0-1ubuntu1.15)
Filename: pool/main/c/curl/curl_7.81.0-1ubuntu1.15_amd64.deb
Size: 226826
SHA256: abcdef0123456789

Package: libcurl4
Version: 7.81.0-1ubuntu1.15
Architecture: amd64
Provides: libcurl3-gnutls
Filename: pool/main/c/curl/libcurl4_7.81.0-1ubuntu1.15_amd64.deb
Size: 386836
";

    #[test]
    fn parses_paragraphs_into_packages() {
        let packages = parse_packages(PACKAGES, false);
        assert_eq!(packages.len(), 2);
        let curl = packages.iter().find(|p| p.name == "curl").unwrap();
        assert_eq!(curl.requires, vec!["libc6".to_string(), "libcurl4".to_string()]);
        assert_eq!(curl.sha256.as_deref(), Some("abcdef0123456789"));
        assert_eq!(curl.filename, "curl_7.81.0-1ubuntu1.15_amd64.deb");

        let libcurl4 = packages.iter().find(|p| p.name == "libcurl4").unwrap();
        assert!(libcurl4.provides.contains(&"libcurl3-gnutls".to_string()));
    }

    #[test]
    fn split_dependency_field_drops_constraints_and_picks_first_alternative() {
        let parts = split_dependency_field("libc6 (>= 2.34), foo | bar (>= 1.0), baz");
        assert_eq!(parts, vec!["libc6".to_string(), "foo".to_string(), "baz".to_string()]);
    }
}
