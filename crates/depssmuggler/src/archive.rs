//! Optional whole-bundle archiving: packages the `outputDir` into a single
//! `.zip` or `.tar.gz`, per the output-bundle layout's "Optional" clause.
//! This lives in the bin crate rather than `depssmuggler-core` because
//! it's a packaging convenience over an already-complete bundle, not part
//! of the download/verification core.

use crate::error::{CliError, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use walkdir_free::walk_files;

/// Output archive format selected by `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Dir,
    Zip,
    #[value(name = "tar.gz")]
    TarGz,
}

/// Archives `output_dir` into `<output_dir>.zip` or `<output_dir>.tar.gz`
/// next to it, depending on `format`. A no-op for [`OutputFormat::Dir`].
pub fn archive(output_dir: &Path, format: OutputFormat) -> Result<Option<std::path::PathBuf>> {
    match format {
        OutputFormat::Dir => Ok(None),
        OutputFormat::Zip => Ok(Some(write_zip(output_dir)?)),
        OutputFormat::TarGz => Ok(Some(write_tar_gz(output_dir)?)),
    }
}

fn archive_path(output_dir: &Path, extension: &str) -> std::path::PathBuf {
    let mut path = output_dir.as_os_str().to_owned();
    path.push(extension);
    std::path::PathBuf::from(path)
}

fn write_zip(output_dir: &Path) -> Result<std::path::PathBuf> {
    let dest = archive_path(output_dir, ".zip");
    let file = File::create(&dest)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in walk_files(output_dir)? {
        let relative = entry.strip_prefix(output_dir).unwrap_or(&entry);
        writer
            .start_file(relative.to_string_lossy(), options)
            .map_err(|e| CliError::UnsupportedArchiveFormat(e.to_string()))?;
        let bytes = std::fs::read(&entry)?;
        writer.write_all(&bytes)?;
    }
    writer.finish().map_err(|e| CliError::UnsupportedArchiveFormat(e.to_string()))?;
    Ok(dest)
}

fn write_tar_gz(output_dir: &Path) -> Result<std::path::PathBuf> {
    let dest = archive_path(output_dir, ".tar.gz");
    let file = File::create(&dest)?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let root_name = output_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "bundle".to_string());
    builder.append_dir_all(&root_name, output_dir)?;
    builder.into_inner()?.finish()?;
    Ok(dest)
}

/// A tiny directory walker kept in-crate rather than pulling in `walkdir`:
/// the bundle tree is shallow (`packages/` plus two install scripts), so a
/// recursive `read_dir` is simpler than a new dependency for this alone.
mod walkdir_free {
    use std::path::{Path, PathBuf};

    pub fn walk_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        visit(root, &mut out)?;
        Ok(out)
    }

    fn visit(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                visit(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_format_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(archive(dir.path(), OutputFormat::Dir).unwrap(), None);
    }

    #[test]
    fn zip_archive_contains_written_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("packages")).unwrap();
        std::fs::write(dir.path().join("packages").join("a.whl"), b"data").unwrap();
        std::fs::write(dir.path().join("install.sh"), b"#!/bin/sh").unwrap();

        let archived = archive(dir.path(), OutputFormat::Zip).unwrap().unwrap();
        assert!(archived.exists());

        let file = File::open(&archived).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let names: Vec<String> = (0..zip.len()).map(|i| zip.by_index(i).unwrap().name().to_string()).collect();
        assert!(names.iter().any(|n| n.contains("a.whl")));
        assert!(names.iter().any(|n| n.contains("install.sh")));
    }

    #[test]
    fn tar_gz_archive_is_created() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("packages")).unwrap();
        std::fs::write(dir.path().join("packages").join("a.whl"), b"data").unwrap();

        let archived = archive(dir.path(), OutputFormat::TarGz).unwrap().unwrap();
        assert!(archived.exists());

        let file = File::open(&archived).unwrap();
        let decoder = flate2::read::GzDecoder::new(file);
        let mut tar = tar::Archive::new(decoder);
        let entries: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(entries.iter().any(|n| n.contains("a.whl")));
    }
}
