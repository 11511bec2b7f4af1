//! YUM/DNF repodata codecs: `repomd.xml` (locates the `primary` record)
//! and `primary.xml` (the actual package index), both pull-parsed with
//! `quick-xml` the way the Maven adapter parses POMs.

use crate::types::OsPackage;
use quick_xml::events::Event;
use quick_xml::Reader;

/// One `<data type="...">` entry from `repomd.xml`: the file a repodata
/// type of interest (`primary`, `filelists`, ...) actually lives at.
#[derive(Debug, Clone, Default)]
pub struct RepomdEntry {
    pub data_type: String,
    pub location_href: String,
    pub checksum: Option<String>,
}

/// Parses `repomd.xml`, returning every `<data>` entry. The caller picks
/// the one with `data_type == "primary"`.
pub fn parse_repomd(bytes: &[u8]) -> Result<Vec<RepomdEntry>, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current: Option<RepomdEntry> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "data" => {
                        let data_type = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"type")
                            .map(|a| String::from_utf8_lossy(&a.value).to_string())
                            .unwrap_or_default();
                        current = Some(RepomdEntry {
                            data_type,
                            location_href: String::new(),
                            checksum: None,
                        });
                    }
                    "location" => {
                        if let Some(entry) = current.as_mut() {
                            entry.location_href = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"href")
                                .map(|a| String::from_utf8_lossy(&a.value).to_string())
                                .unwrap_or_default();
                        }
                    }
                    "checksum" => {}
                    _ => {}
                }
            }
            Event::End(e) => {
                if local_name(e.name().as_ref()) == "data" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// Parses `primary.xml` (already decompressed if it was gzipped) into a
/// flat list of [`OsPackage`] records, `rpm:requires`/`rpm:provides`
/// entries preserved as raw capability strings for the resolver to filter
/// and match.
pub fn parse_primary(bytes: &[u8]) -> Result<Vec<OsPackage>, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();

    let mut packages = Vec::new();
    let mut current: Option<PackageBuild> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = local_name(e.name().as_ref());
                stack.push(name.clone());
                text.clear();

                match name.as_str() {
                    "package" => current = Some(PackageBuild::default()),
                    "version" => {
                        if let Some(pkg) = current.as_mut() {
                            for attr in e.attributes().flatten() {
                                let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                                let value = String::from_utf8_lossy(&attr.value).to_string();
                                match key.as_str() {
                                    "epoch" => pkg.epoch = value,
                                    "ver" => pkg.ver = value,
                                    "rel" => pkg.rel = value,
                                    _ => {}
                                }
                            }
                        }
                    }
                    "checksum" => {
                        if let Some(pkg) = current.as_mut() {
                            let checksum_type = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"type")
                                .map(|a| String::from_utf8_lossy(&a.value).to_string())
                                .unwrap_or_default();
                            pkg.checksum_type = checksum_type;
                        }
                    }
                    "size" => {
                        if let Some(pkg) = current.as_mut() {
                            pkg.size_bytes = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"package")
                                .and_then(|a| String::from_utf8_lossy(&a.value).parse().ok());
                        }
                    }
                    "location" => {
                        if let Some(pkg) = current.as_mut() {
                            pkg.location_href = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"href")
                                .map(|a| String::from_utf8_lossy(&a.value).to_string())
                                .unwrap_or_default();
                        }
                    }
                    "entry" => {
                        if let Some(pkg) = current.as_mut() {
                            let capability = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"name")
                                .map(|a| String::from_utf8_lossy(&a.value).to_string());
                            if let Some(capability) = capability {
                                match stack.iter().rev().nth(1).map(String::as_str) {
                                    Some("provides") => pkg.provides.push(capability),
                                    Some("requires") => pkg.requires.push(capability),
                                    _ => {}
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = local_name(e.name().as_ref());
                // `<location>`, `<size>`, `<entry>` are always self-closing
                // in yum's primary.xml; re-run the same attribute handling
                // as a `Start` event would, without pushing onto `stack`.
                match name.as_str() {
                    "location" => {
                        if let Some(pkg) = current.as_mut() {
                            pkg.location_href = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"href")
                                .map(|a| String::from_utf8_lossy(&a.value).to_string())
                                .unwrap_or_default();
                        }
                    }
                    "size" => {
                        if let Some(pkg) = current.as_mut() {
                            pkg.size_bytes = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"package")
                                .and_then(|a| String::from_utf8_lossy(&a.value).parse().ok());
                        }
                    }
                    "entry" => {
                        if let Some(pkg) = current.as_mut() {
                            let capability = e
                                .attributes()
                                .flatten()
                                .find(|a| a.key.as_ref() == b"name")
                                .map(|a| String::from_utf8_lossy(&a.value).to_string());
                            if let Some(capability) = capability {
                                if stack.last().map(String::as_str) == Some("package") {
                                    // unreachable in well-formed primary.xml
                                } else {
                                    let parent = stack.last().map(String::as_str);
                                    match parent {
                                        Some("provides") => pkg.provides.push(capability),
                                        Some("requires") => pkg.requires.push(capability),
                                        _ => {}
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                text.push_str(&e.unescape().unwrap_or_default());
            }
            Event::End(e) => {
                let name = local_name(e.name().as_ref());
                if name == "name" || name == "arch" {
                    if let Some(pkg) = current.as_mut() {
                        if stack.len() == 2 {
                            match name.as_str() {
                                "name" => pkg.name = text.clone(),
                                "arch" => pkg.arch = text.clone(),
                                _ => {}
                            }
                        }
                    }
                }
                if name == "checksum" && stack.len() == 2 {
                    if let Some(pkg) = current.as_mut() {
                        pkg.checksum_value = text.clone();
                    }
                }
                if name == "package" {
                    if let Some(pkg) = current.take() {
                        packages.push(pkg.finish());
                    }
                }
                stack.pop();
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(packages)
}

#[derive(Debug, Clone, Default)]
struct PackageBuild {
    name: String,
    arch: String,
    epoch: String,
    ver: String,
    rel: String,
    checksum_type: String,
    checksum_value: String,
    size_bytes: Option<u64>,
    location_href: String,
    provides: Vec<String>,
    requires: Vec<String>,
}

impl PackageBuild {
    fn finish(self) -> OsPackage {
        let version = match (self.epoch.as_str(), self.rel.as_str()) {
            ("", "") => self.ver.clone(),
            ("", rel) => format!("{}-{}", self.ver, rel),
            (epoch, "") => format!("{}:{}", epoch, self.ver),
            (epoch, rel) => format!("{}:{}-{}", epoch, self.ver, rel),
        };
        let (sha1, sha256) = match self.checksum_type.as_str() {
            "sha" | "sha1" => (Some(self.checksum_value.clone()), None),
            "sha256" => (None, Some(self.checksum_value.clone())),
            _ => (None, None),
        };
        let filename = self.location_href.rsplit('/').next().unwrap_or(&self.location_href).to_string();
        OsPackage {
            name: self.name,
            version,
            arch: self.arch,
            download_url: self.location_href,
            filename,
            size_bytes: self.size_bytes,
            sha1,
            sha256,
            provides: self.provides,
            requires: self.requires,
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPOMD: &str = r#"<?xml version="1.0"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <data type="primary">
    <checksum type="sha256">abc123</checksum>
    <location href="repodata/abc-primary.xml.gz"/>
  </data>
  <data type="filelists">
    <location href="repodata/def-filelists.xml.gz"/>
  </data>
</repomd>"#;

    const PRIMARY: &str = r#"<?xml version="1.0"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="1">
  <package type="rpm">
    <name>httpd</name>
    <arch>x86_64</arch>
    <version epoch="0" ver="2.4.57" rel="1.el9"/>
    <checksum type="sha256" pkgid="YES">deadbeef</checksum>
    <size package="123456"/>
    <location href="Packages/httpd-2.4.57-1.el9.x86_64.rpm"/>
    <format>
      <rpm:provides>
        <rpm:entry name="httpd" flags="EQ" epoch="0" ver="2.4.57" rel="1.el9"/>
        <rpm:entry name="webserver"/>
      </rpm:provides>
      <rpm:requires>
        <rpm:entry name="libc.so.6()(64bit)"/>
        <rpm:entry name="httpd-filesystem"/>
      </rpm:requires>
    </format>
  </package>
</metadata>"#;

    #[test]
    fn parses_repomd_and_finds_primary_location() {
        let entries = parse_repomd(REPOMD.as_bytes()).unwrap();
        let primary = entries.iter().find(|e| e.data_type == "primary").unwrap();
        assert_eq!(primary.location_href, "repodata/abc-primary.xml.gz");
    }

    #[test]
    fn parses_primary_xml_into_package_records() {
        let packages = parse_primary(PRIMARY.as_bytes()).unwrap();
        assert_eq!(packages.len(), 1);
        let pkg = &packages[0];
        assert_eq!(pkg.name, "httpd");
        assert_eq!(pkg.arch, "x86_64");
        assert_eq!(pkg.version, "2.4.57-1.el9");
        assert_eq!(pkg.sha256.as_deref(), Some("deadbeef"));
        assert_eq!(pkg.size_bytes, Some(123456));
        assert!(pkg.provides.contains(&"webserver".to_string()));
        assert!(pkg.requires.contains(&"httpd-filesystem".to_string()));
        assert_eq!(pkg.filename, "httpd-2.4.57-1.el9.x86_64.rpm");
    }
}
