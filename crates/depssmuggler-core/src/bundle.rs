//! Output bundle assembly: the `packages/` layout plus bash/PowerShell
//! install-script emission, per the bit-exact layout required by
//! downstream installers.

use crate::package::{Ecosystem, ResolvedPackage};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Assembles the output tree for a completed download batch: creates
/// `outputDir/packages/` (actual artifact placement is done by each
/// adapter's downloader, which already knows its own ecosystem-appropriate
/// sub-layout) and emits the two driver scripts at the bundle root.
pub struct BundleWriter {
    output_dir: PathBuf,
}

impl BundleWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.output_dir.join("packages")
    }

    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.packages_dir())
    }

    /// Writes `install.sh` (mode 0755) and `install.ps1`, each grouping
    /// packages by ecosystem in the order they appear in `packages`.
    pub fn write_install_scripts(&self, packages: &[ResolvedPackage]) -> std::io::Result<()> {
        let grouped = group_by_ecosystem(packages);

        let sh_path = self.output_dir.join("install.sh");
        let mut sh = std::fs::File::create(&sh_path)?;
        write!(sh, "{}", render_bash_script(&grouped))?;
        drop(sh);
        set_executable(&sh_path)?;

        let ps1_path = self.output_dir.join("install.ps1");
        let mut ps1 = std::fs::File::create(&ps1_path)?;
        write!(ps1, "{}", render_powershell_script(&grouped))?;

        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn group_by_ecosystem(packages: &[ResolvedPackage]) -> BTreeMap<Ecosystem, Vec<&ResolvedPackage>> {
    let mut grouped: BTreeMap<Ecosystem, Vec<&ResolvedPackage>> = BTreeMap::new();
    for pkg in packages {
        grouped.entry(pkg.ecosystem).or_default().push(pkg);
    }
    grouped
}

// `Ecosystem` needs Ord for the BTreeMap above; derive it via discriminant
// order, which matches declaration order in `package.rs`.
impl PartialOrd for Ecosystem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ecosystem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

fn render_bash_script(grouped: &BTreeMap<Ecosystem, Vec<&ResolvedPackage>>) -> String {
    let mut out = String::from("#!/usr/bin/env bash\nset -euo pipefail\nDIR=\"$(cd \"$(dirname \"${BASH_SOURCE[0]}\")\" && pwd)\"\n\n");
    for (ecosystem, packages) in grouped {
        out.push_str(&format!("echo \"Installing {} packages ({} total)\"\n", ecosystem, packages.len()));
        match ecosystem {
            Ecosystem::Pip => out.push_str("pip install --no-index --find-links \"$DIR/packages\" \\\n"),
            Ecosystem::Npm => out.push_str("npm install --offline --prefix \"$DIR\" \"$DIR\"/packages/*.tgz\n"),
            Ecosystem::Maven => out.push_str("# Maven artifacts: point your settings.xml at a repository mirroring $DIR/packages\n"),
            Ecosystem::Conda => out.push_str("conda install --offline -c \"$DIR/packages\" \\\n"),
            Ecosystem::Docker => out.push_str("for t in \"$DIR\"/packages/*.tar; do docker load -i \"$t\"; done\n"),
            Ecosystem::Yum => out.push_str("yum localinstall -y \"$DIR\"/packages/*.rpm\n"),
            Ecosystem::Apt => out.push_str("dpkg -i \"$DIR\"/packages/*.deb\n"),
            Ecosystem::Apk => out.push_str("apk add --allow-untrusted \"$DIR\"/packages/*.apk\n"),
        }
        if matches!(ecosystem, Ecosystem::Pip | Ecosystem::Conda) {
            for pkg in packages {
                out.push_str(&format!("  {}=={} \\\n", pkg.name, pkg.version));
            }
            out.push('\n');
        }
    }
    out
}

fn render_powershell_script(grouped: &BTreeMap<Ecosystem, Vec<&ResolvedPackage>>) -> String {
    let mut out = String::from("$ErrorActionPreference = 'Stop'\n$Dir = Split-Path -Parent $MyInvocation.MyCommand.Path\n\n");
    for (ecosystem, packages) in grouped {
        out.push_str(&format!("Write-Host \"Installing {} packages ({} total)\"\n", ecosystem, packages.len()));
        match ecosystem {
            Ecosystem::Pip => out.push_str(&format!(
                "pip install --no-index --find-links \"$Dir\\packages\" {}\n",
                packages.iter().map(|p| format!("{}=={}", p.name, p.version)).collect::<Vec<_>>().join(" ")
            )),
            Ecosystem::Npm => out.push_str("npm install --offline --prefix $Dir (Get-ChildItem \"$Dir\\packages\\*.tgz\")\n"),
            Ecosystem::Maven => out.push_str("# Maven artifacts: point your settings.xml at a repository mirroring $Dir\\packages\n"),
            Ecosystem::Conda => out.push_str(&format!(
                "conda install --offline -c \"$Dir\\packages\" {}\n",
                packages.iter().map(|p| format!("{}=={}", p.name, p.version)).collect::<Vec<_>>().join(" ")
            )),
            Ecosystem::Docker => out.push_str("Get-ChildItem \"$Dir\\packages\\*.tar\" | ForEach-Object { docker load -i $_.FullName }\n"),
            Ecosystem::Yum => out.push_str("Write-Host 'RPM install must be run on a Linux host'\n"),
            Ecosystem::Apt => out.push_str("Write-Host 'DEB install must be run on a Linux host'\n"),
            Ecosystem::Apk => out.push_str("Write-Host 'APK install must be run on a Linux host'\n"),
        }
    }
    out
}
