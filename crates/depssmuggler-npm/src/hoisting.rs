//! `node_modules` hoisting tree, built incrementally as the resolver
//! discovers each dependency. Mirrors npm's placement rules closely enough
//! to produce a realistic, deduplicated install layout without actually
//! writing files: reuse a compatible ancestor if one exists, otherwise
//! place as shallow as possible, otherwise nest directly under the
//! requesting package.

use std::collections::HashMap;

#[derive(Debug, Clone)]
struct InstalledEntry {
    version: String,
}

/// A path of package names from the project root down to where a package
/// is installed, e.g. `["a", "b"]` for `node_modules/a/node_modules/b`.
pub type InstallPath = Vec<String>;

#[derive(Debug, Default)]
pub struct HoistTree {
    installed: HashMap<InstallPath, InstalledEntry>,
}

/// Outcome of placing a package in the tree.
pub struct Placement {
    pub path: InstallPath,
    /// `true` when an existing compatible installation was reused rather
    /// than a new node being created.
    pub hoisted: bool,
}

impl HoistTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders an install path as a `node_modules/...` string for display
    /// and metadata purposes.
    pub fn render_path(path: &[String]) -> String {
        path.iter()
            .map(|segment| format!("node_modules/{segment}"))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Places `name`@`version` under `parent_path` (the install path of the
    /// package that depends on it; `&[]` for a direct/root dependency).
    /// `satisfies` decides whether an already-installed version at some
    /// ancestor is compatible with the requirement that brought this
    /// package in.
    pub fn place(
        &mut self,
        name: &str,
        version: &str,
        parent_path: &[String],
        satisfies: impl Fn(&str) -> bool,
    ) -> Placement {
        // Pass 1: walk from the immediate parent up to the project root,
        // reusing the first compatible installation found.
        for i in (0..=parent_path.len()).rev() {
            let key = Self::key(&parent_path[..i], name);
            if let Some(existing) = self.installed.get(&key) {
                if satisfies(&existing.version) {
                    return Placement { path: key, hoisted: true };
                }
            }
        }

        // Pass 2: no compatible ancestor; place as shallow as possible,
        // walking from the project root down to the immediate parent.
        for i in 0..=parent_path.len() {
            let key = Self::key(&parent_path[..i], name);
            if !self.installed.contains_key(&key) {
                self.installed.insert(key.clone(), InstalledEntry { version: version.to_string() });
                return Placement { path: key, hoisted: false };
            }
        }

        // Every candidate level already holds an incompatible version;
        // nest directly under the requesting package.
        let key = Self::key(parent_path, name);
        self.installed.insert(key.clone(), InstalledEntry { version: version.to_string() });
        Placement { path: key, hoisted: false }
    }

    fn key(dir: &[String], name: &str) -> InstallPath {
        let mut key = dir.to_vec();
        key.push(name.to_string());
        key
    }
}
