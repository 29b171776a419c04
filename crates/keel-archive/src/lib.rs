//! Zip access for plugin package archives.
//!
//! Plugin packages are plain zip files. This crate is the only place that
//! touches the zip format directly: everything above it works in terms of
//! entry listings, single-entry reads, and prefixed extraction.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use zip::ZipArchive;

/// A plugin package archive on disk.
#[derive(Clone, Debug)]
pub struct Archive {
    path: PathBuf,
}

/// Name and kind of one archive entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
}

impl Archive {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name with the final extension stripped.
    ///
    /// Callers must guarantee the file name carries an extension; a name
    /// without one is returned unchanged.
    #[must_use]
    pub fn basename(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// List entry names and kinds in encounter order.
    pub fn entries(&self) -> anyhow::Result<Vec<ArchiveEntry>> {
        let mut zip = self.open()?;
        let mut out = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip.by_index(index).with_context(|| {
                format!("failed to read entry {} of {}", index, self.path.display())
            })?;
            out.push(ArchiveEntry {
                name: entry.name().to_string(),
                is_dir: entry.is_dir(),
            });
        }
        Ok(out)
    }

    /// Read a file from the archive.
    ///
    /// Returns `Ok(None)` when the file isn't present.
    pub fn read(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut zip = self.open()?;
        let result = match zip.by_name(name) {
            Ok(mut entry) => {
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf).with_context(|| {
                    format!("failed to read {} from {}", name, self.path.display())
                })?;
                Ok(Some(buf))
            }
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(err) => Err(err).with_context(|| {
                format!("failed to read {} from zip {}", name, self.path.display())
            }),
        };
        result
    }

    /// Extract every entry whose name starts with `prefix` into `dest`, with
    /// `strip_prefix` removed from the front of each materialized path.
    ///
    /// Entries shorter than `strip_prefix` (such as the prefix directory
    /// entry itself) are skipped. Entry names that would escape `dest` are
    /// rejected.
    pub fn extract_entries(
        &self,
        dest: &Path,
        prefix: &str,
        strip_prefix: &str,
    ) -> anyhow::Result<()> {
        let mut zip = self.open()?;
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).with_context(|| {
                format!("failed to read entry {} of {}", index, self.path.display())
            })?;
            let name = entry.name().to_string();
            if !name.starts_with(prefix) {
                continue;
            }
            let Some(stripped) = name.strip_prefix(strip_prefix) else {
                continue;
            };
            if stripped.is_empty() {
                continue;
            }
            let relative = safe_entry_path(stripped)
                .with_context(|| format!("refusing to extract {} from {}", name, self.path.display()))?;
            let target = dest.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("failed to create {}", target.display()))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let mut out = File::create(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
            io::copy(&mut entry, &mut out)
                .with_context(|| format!("failed to write {}", target.display()))?;
        }
        Ok(())
    }

    fn open(&self) -> anyhow::Result<ZipArchive<File>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open archive {}", self.path.display()))?;
        ZipArchive::new(file)
            .with_context(|| format!("failed to read zip {}", self.path.display()))
    }
}

/// Validate that an entry name stays inside the extraction root.
fn safe_entry_path(name: &str) -> anyhow::Result<&Path> {
    let path = Path::new(name);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                anyhow::bail!("entry path {name} escapes the extraction root");
            }
        }
    }
    Ok(path)
}
