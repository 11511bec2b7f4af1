//! A hand-rolled, pull-based POM parser. Maven POMs mix sibling
//! `<dependencies>` sections under `<project>`, `<dependencyManagement>`,
//! and (ignored here) `<build><plugins>`, which a naive tag-name-only
//! match would conflate; this walks an explicit path stack so only the
//! sections the resolver cares about are captured.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub dep_type: Option<String>,
    pub classifier: Option<String>,
    pub optional: bool,
    pub exclusions: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub parent: Option<ParentRef>,
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub properties: HashMap<String, String>,
    pub dependency_management: Vec<Dependency>,
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepTarget {
    Management,
    Direct,
}

/// Parses a POM document, tolerating unknown elements (plugin
/// configuration, reporting, CI management, ...) by simply ignoring any
/// path it doesn't recognize.
pub fn parse_pom(bytes: &[u8]) -> Result<Pom, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();

    let mut pom = Pom::default();
    let mut parent_build: Option<ParentRef> = None;
    let mut parent_depth: usize = 0;

    let mut current_dep: Option<Dependency> = None;
    let mut dep_target: Option<DepTarget> = None;
    let mut dep_depth: usize = 0;
    let mut pending_excl_group: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = local_name(e.name().as_ref());
                stack.push(name.clone());
                text.clear();

                if name == "parent" && stack.len() == 2 {
                    parent_build = Some(ParentRef::default());
                    parent_depth = stack.len();
                } else if name == "dependency" {
                    let target = if stack.len() >= 3
                        && stack[stack.len() - 2] == "dependencies"
                        && stack.len() >= 4
                        && stack[stack.len() - 3] == "dependencyManagement"
                    {
                        Some(DepTarget::Management)
                    } else if stack.len() == 3 && stack[stack.len() - 2] == "dependencies" {
                        Some(DepTarget::Direct)
                    } else {
                        None
                    };
                    if let Some(target) = target {
                        dep_target = Some(target);
                        current_dep = Some(Dependency::default());
                        dep_depth = stack.len();
                    }
                }
            }
            Event::Empty(e) => {
                // Self-closing elements (`<optional/>`) carry no text; the
                // only one that matters defaults to its existing value.
                let name = local_name(e.name().as_ref());
                let _ = name;
            }
            Event::Text(e) => {
                text.push_str(&e.unescape().unwrap_or_default());
            }
            Event::End(_) => {
                let closing = stack.last().cloned().unwrap_or_default();

                if let Some(parent) = parent_build.as_mut() {
                    if stack.len() == parent_depth + 1 {
                        match closing.as_str() {
                            "groupId" => parent.group_id = text.clone(),
                            "artifactId" => parent.artifact_id = text.clone(),
                            "version" => parent.version = text.clone(),
                            _ => {}
                        }
                    }
                }
                if closing == "parent" && stack.len() == parent_depth {
                    pom.parent = parent_build.take();
                }

                if let Some(dep) = current_dep.as_mut() {
                    if stack.len() == dep_depth + 1 {
                        match closing.as_str() {
                            "groupId" => dep.group_id = text.clone(),
                            "artifactId" => dep.artifact_id = text.clone(),
                            "version" => {
                                if !text.is_empty() {
                                    dep.version = Some(text.clone());
                                }
                            }
                            "scope" => dep.scope = Some(text.clone()),
                            "type" => dep.dep_type = Some(text.clone()),
                            "classifier" => dep.classifier = Some(text.clone()),
                            "optional" => dep.optional = text.trim().eq_ignore_ascii_case("true"),
                            _ => {}
                        }
                    } else if stack.len() == dep_depth + 3
                        && stack[dep_depth] == "exclusions"
                        && stack[dep_depth + 1] == "exclusion"
                    {
                        match closing.as_str() {
                            "groupId" => pending_excl_group = Some(text.clone()),
                            "artifactId" => {
                                if let Some(group) = pending_excl_group.take() {
                                    dep.exclusions.push((group, text.clone()));
                                }
                            }
                            _ => {}
                        }
                    }
                }
                if closing == "dependency" && stack.len() == dep_depth {
                    if let (Some(dep), Some(target)) = (current_dep.take(), dep_target.take()) {
                        match target {
                            DepTarget::Management => pom.dependency_management.push(dep),
                            DepTarget::Direct => pom.dependencies.push(dep),
                        }
                    }
                }

                if current_dep.is_none() && parent_build.is_none() {
                    if stack.len() == 3 && stack[0] == "project" && stack[1] == "properties" {
                        pom.properties.insert(closing.clone(), text.clone());
                    } else if stack.len() == 2 && stack[0] == "project" {
                        match closing.as_str() {
                            "groupId" => pom.group_id = Some(text.clone()),
                            "artifactId" => pom.artifact_id = Some(text.clone()),
                            "version" => pom.version = Some(text.clone()),
                            "packaging" => pom.packaging = Some(text.clone()),
                            _ => {}
                        }
                    }
                }

                stack.pop();
                text.clear();
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(pom)
}

fn local_name(raw: &[u8]) -> String {
    let s = std::str::from_utf8(raw).unwrap_or_default();
    match s.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => s.to_string(),
    }
}

/// Parses `maven-metadata.xml`, extracting every `<version>` under
/// `<versioning><versions>`.
pub fn parse_metadata_versions(bytes: &[u8]) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut versions = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                stack.push(local_name(e.name().as_ref()));
                text.clear();
            }
            Event::Text(e) => text.push_str(&e.unescape().unwrap_or_default()),
            Event::End(_) => {
                if stack.as_slice() == ["metadata", "versioning", "versions", "version"] && !text.is_empty() {
                    versions.push(text.clone());
                }
                stack.pop();
                text.clear();
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_POM: &str = r#"<?xml version="1.0"?>
    <project>
        <parent>
            <groupId>org.example</groupId>
            <artifactId>parent-pom</artifactId>
            <version>1.0.0</version>
        </parent>
        <groupId>org.example</groupId>
        <artifactId>widget</artifactId>
        <version>2.0.0</version>
        <packaging>jar</packaging>
        <properties>
            <jackson.version>2.15.2</jackson.version>
        </properties>
        <dependencyManagement>
            <dependencies>
                <dependency>
                    <groupId>org.springframework.boot</groupId>
                    <artifactId>spring-boot-dependencies</artifactId>
                    <version>3.1.0</version>
                    <type>pom</type>
                    <scope>import</scope>
                </dependency>
            </dependencies>
        </dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>com.fasterxml.jackson.core</groupId>
                <artifactId>jackson-databind</artifactId>
                <version>${jackson.version}</version>
                <exclusions>
                    <exclusion>
                        <groupId>com.fasterxml.jackson.core</groupId>
                        <artifactId>jackson-annotations</artifactId>
                    </exclusion>
                </exclusions>
            </dependency>
            <dependency>
                <groupId>junit</groupId>
                <artifactId>junit</artifactId>
                <version>4.13.2</version>
                <scope>test</scope>
                <optional>true</optional>
            </dependency>
        </dependencies>
    </project>"#;

    #[test]
    fn parses_parent_coordinates() {
        let pom = parse_pom(SAMPLE_POM.as_bytes()).unwrap();
        let parent = pom.parent.unwrap();
        assert_eq!(parent.group_id, "org.example");
        assert_eq!(parent.artifact_id, "parent-pom");
        assert_eq!(parent.version, "1.0.0");
    }

    #[test]
    fn parses_root_coordinates_and_properties() {
        let pom = parse_pom(SAMPLE_POM.as_bytes()).unwrap();
        assert_eq!(pom.group_id.as_deref(), Some("org.example"));
        assert_eq!(pom.artifact_id.as_deref(), Some("widget"));
        assert_eq!(pom.version.as_deref(), Some("2.0.0"));
        assert_eq!(pom.properties.get("jackson.version").map(String::as_str), Some("2.15.2"));
    }

    #[test]
    fn separates_dependency_management_from_direct_dependencies() {
        let pom = parse_pom(SAMPLE_POM.as_bytes()).unwrap();
        assert_eq!(pom.dependency_management.len(), 1);
        assert_eq!(pom.dependency_management[0].artifact_id, "spring-boot-dependencies");
        assert_eq!(pom.dependency_management[0].scope.as_deref(), Some("import"));

        assert_eq!(pom.dependencies.len(), 2);
        assert_eq!(pom.dependencies[0].version.as_deref(), Some("${jackson.version}"));
        assert_eq!(pom.dependencies[0].exclusions, vec![("com.fasterxml.jackson.core".to_string(), "jackson-annotations".to_string())]);
        assert!(pom.dependencies[1].optional);
        assert_eq!(pom.dependencies[1].scope.as_deref(), Some("test"));
    }

    #[test]
    fn parses_metadata_version_list() {
        let xml = r#"<metadata>
            <groupId>org.example</groupId>
            <artifactId>widget</artifactId>
            <versioning>
                <versions>
                    <version>1.0.0</version>
                    <version>1.1.0</version>
                    <version>2.0.0</version>
                </versions>
            </versioning>
        </metadata>"#;
        let versions = parse_metadata_versions(xml.as_bytes()).unwrap();
        assert_eq!(versions, vec!["1.0.0", "1.1.0", "2.0.0"]);
    }
}
