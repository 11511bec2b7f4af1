//! Alpine's `APKINDEX.tar.gz`: a tar archive whose `APKINDEX` member is a
//! sequence of `K:value` lines, one blank line per package record.

use crate::types::OsPackage;
use std::io::Read;

/// Extracts the `APKINDEX` member out of the (already gunzipped) tar
/// stream and parses it. Alpine also ships a `DESCRIPTION` member in the
/// same archive, which we ignore.
pub fn extract_and_parse(tar_bytes: &[u8]) -> std::io::Result<Vec<OsPackage>> {
    let mut archive = tar::Archive::new(tar_bytes);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_path_buf();
        if path.file_name().and_then(|n| n.to_str()) == Some("APKINDEX") {
            let mut contents = String::new();
            entry.read_to_string(&mut contents)?;
            return Ok(parse_apkindex(&contents));
        }
    }
    Ok(Vec::new())
}

/// Field codes, per Alpine's `apk` source: `P` name, `V` version, `A`
/// arch, `S` size, `C` checksum (base64 SHA-1, `Q1` prefixed), `D`
/// depends (space separated, `!foo` conflicts filtered out), `p`
/// provides.
pub fn parse_apkindex(text: &str) -> Vec<OsPackage> {
    let mut packages = Vec::new();
    let mut builder = RecordBuilder::default();

    for line in text.lines() {
        if line.is_empty() {
            if let Some(pkg) = builder.take().finish() {
                packages.push(pkg);
            }
            continue;
        }
        let Some((code, value)) = line.split_at_checked(1).map(|(c, v)| (c, v.trim_start_matches(':'))) else {
            continue;
        };
        builder.apply(code, value);
    }
    if let Some(pkg) = builder.finish() {
        packages.push(pkg);
    }

    packages
}

#[derive(Default)]
struct RecordBuilder {
    name: Option<String>,
    version: Option<String>,
    arch: Option<String>,
    size: Option<u64>,
    checksum: Option<String>,
    depends: Vec<String>,
    provides: Vec<String>,
}

impl RecordBuilder {
    fn apply(&mut self, code: &str, value: &str) {
        match code {
            "P" => self.name = Some(value.to_string()),
            "V" => self.version = Some(value.to_string()),
            "A" => self.arch = Some(value.to_string()),
            "S" => self.size = value.parse().ok(),
            "C" => self.checksum = Some(value.trim_start_matches("Q1").to_string()),
            "D" => self.depends = value.split_whitespace().filter(|d| !d.starts_with('!')).map(str::to_string).collect(),
            "p" => self.provides = value.split_whitespace().map(str::to_string).collect(),
            _ => {}
        }
    }

    fn take(&mut self) -> RecordBuilder {
        std::mem::take(self)
    }

    fn finish(self) -> Option<OsPackage> {
        let name = self.name?;
        let version = self.version?;
        let arch = self.arch.unwrap_or_else(|| "noarch".to_string());
        let filename = format!("{name}-{version}.apk");
        let mut provides = self.provides;
        provides.push(name.clone());
        Some(OsPackage {
            name,
            version,
            arch,
            download_url: filename.clone(),
            filename,
            size_bytes: self.size,
            sha1: self.checksum,
            sha256: None,
            provides,
            requires: self.depends,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APKINDEX: &str = "\
P:musl
V:1.2.4-r2
A:x86_64
S:383
C:Q1abc123==
p:so:libc.musl-x86_64.so.1=1

P:curl
V:8.5.0-r0
A:x86_64
S:178000
D:musl ca-certificates !curl-meta
p:so:libcurl.so.4=4
";

    #[test]
    fn parses_multiple_records_separated_by_blank_lines() {
        let packages = parse_apkindex(APKINDEX);
        assert_eq!(packages.len(), 2);
        let musl = packages.iter().find(|p| p.name == "musl").unwrap();
        assert_eq!(musl.version, "1.2.4-r2");
        assert_eq!(musl.sha1.as_deref(), Some("abc123=="));
        assert!(musl.provides.contains(&"so:libc.musl-x86_64.so.1=1".to_string()));

        let curl = packages.iter().find(|p| p.name == "curl").unwrap();
        assert_eq!(curl.requires, vec!["musl".to_string(), "ca-certificates".to_string()]);
    }
}
