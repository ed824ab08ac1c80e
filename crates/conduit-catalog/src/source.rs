//! Descriptor sources: archives and directory trees.
//!
//! A [`SourceReader`] turns a [`DescriptorSource`] into a lazy sequence of
//! [`RawDescriptor`]s. Excluded directories are pruned, not descended into.
//! Files that cannot be read are logged and skipped; only a source that cannot
//! be opened at all is an error. Every call to [`SourceReader::entries`] starts
//! an independent full read.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{CatalogError, CatalogResult};

/// Predicate deciding, by file name, whether a file is worth reading
pub type NameFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Lazy sequence of descriptors read from one source
pub type Descriptors = Box<dyn Iterator<Item = RawDescriptor> + Send>;

const ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "jar"];

/// Where descriptors are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
    Archive(PathBuf),
    Directory(PathBuf),
}

impl DescriptorSource {
    /// Classify a location by extension: `.zip` and `.jar` are archives,
    /// anything else is walked as a directory.
    pub fn from_location(location: &str) -> Self {
        let path = PathBuf::from(location);
        let is_archive = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| ARCHIVE_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)));
        if is_archive {
            DescriptorSource::Archive(path)
        } else {
            DescriptorSource::Directory(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DescriptorSource::Archive(p) | DescriptorSource::Directory(p) => p,
        }
    }
}

impl fmt::Display for DescriptorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorSource::Archive(p) => write!(f, "archive:{}", p.display()),
            DescriptorSource::Directory(p) => write!(f, "dir:{}", p.display()),
        }
    }
}

/// One candidate descriptor file and its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDescriptor {
    /// File name without directories (e.g. `browse.json`)
    pub name: String,
    /// Path relative to the source root
    pub path: String,
    pub content: String,
}

/// Enumerates descriptor files of a source
#[derive(Debug, Clone)]
pub struct SourceReader {
    excluded_dirs: Vec<String>,
}

impl SourceReader {
    pub fn new<I, S>(excluded_dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_dirs: excluded_dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_excluded(&self, dir_name: &str) -> bool {
        is_excluded(&self.excluded_dirs, dir_name)
    }

    /// Open `source` and return its matching files.
    ///
    /// Fails only when the source itself is missing or unreadable.
    pub fn entries(&self, source: &DescriptorSource, accept: NameFilter) -> CatalogResult<Descriptors> {
        match source {
            DescriptorSource::Directory(root) => self.directory_entries(root, accept),
            DescriptorSource::Archive(path) => self.archive_entries(path, accept),
        }
    }

    fn directory_entries(&self, root: &Path, accept: NameFilter) -> CatalogResult<Descriptors> {
        if !root.exists() {
            return Err(CatalogError::SourceNotFound(root.to_path_buf()));
        }

        let excluded = self.excluded_dirs.clone();
        let base = root.to_path_buf();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if is_excluded(&excluded, &name) {
                    trace!(dir = %name, "Skipping excluded directory");
                    return false;
                }
                trace!(dir = %name, "Visiting directory");
                true
            });

        let iter = walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(move |entry| accept(&entry.file_name().to_string_lossy()))
            .filter_map(move |entry| {
                let path = entry.path();
                match std::fs::read_to_string(path) {
                    Ok(content) => Some(RawDescriptor {
                        name: entry.file_name().to_string_lossy().into_owned(),
                        path: path
                            .strip_prefix(&base)
                            .unwrap_or(path)
                            .to_string_lossy()
                            .into_owned(),
                        content,
                    }),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "Skipping file as it can't be read");
                        None
                    }
                }
            });

        Ok(Box::new(iter))
    }

    fn archive_entries(&self, path: &Path, accept: NameFilter) -> CatalogResult<Descriptors> {
        let file = File::open(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CatalogError::SourceNotFound(path.to_path_buf())
            } else {
                CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let archive = ZipArchive::new(file).map_err(|source| CatalogError::Archive {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Box::new(ArchiveEntries {
            path: path.to_path_buf(),
            archive,
            next: 0,
            excluded_dirs: self.excluded_dirs.clone(),
            accept,
        }))
    }
}

impl Default for SourceReader {
    fn default() -> Self {
        SourceReader::new(crate::config::CatalogConfig::default().excluded_dirs)
    }
}

fn is_excluded(excluded: &[String], dir_name: &str) -> bool {
    excluded.iter().any(|e| e.eq_ignore_ascii_case(dir_name))
}

/// Walks the entries of an open archive one at a time
struct ArchiveEntries {
    path: PathBuf,
    archive: ZipArchive<File>,
    next: usize,
    excluded_dirs: Vec<String>,
    accept: NameFilter,
}

impl Iterator for ArchiveEntries {
    type Item = RawDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.archive.len() {
            let index = self.next;
            self.next += 1;

            let mut entry = match self.archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(archive = %self.path.display(), index, error = %e, "Skipping unreadable archive entry");
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }

            let entry_path = entry.name().to_string();
            let mut segments: Vec<&str> = entry_path.split('/').filter(|s| !s.is_empty()).collect();
            let Some(file_name) = segments.pop() else {
                continue;
            };
            if segments.iter().any(|dir| is_excluded(&self.excluded_dirs, dir)) {
                continue;
            }
            if !(self.accept)(file_name) {
                continue;
            }

            let mut content = String::new();
            if let Err(e) = entry.read_to_string(&mut content) {
                warn!(archive = %self.path.display(), file = %entry_path, error = %e, "Skipping file as it can't be read");
                continue;
            }

            return Some(RawDescriptor {
                name: file_name.to_string(),
                path: entry_path.clone(),
                content,
            });
        }
        None
    }
}
