//! In-memory payload catalogs
//!
//! Declared entry lists served through the same [`ContainerOpener`] seam as
//! real files. Used by tests, benches and fuzz targets to build adversarial
//! link graphs without writing containers to disk.

use super::{Container, ContainerOpener, Entries, PayloadEntry};
use crate::core::header::AppImageFormat;
use crate::error::{AppImageError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemoryEntry {
    File(Vec<u8>),
    Directory,
    Symlink(String),
    Unknown,
}

/// Ordered list of payload entries plus container metadata
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    format: AppImageFormat,
    payload_offset: u64,
    entries: Vec<(String, MemoryEntry)>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Empty type 2 catalog
    pub fn new() -> Self {
        MemoryCatalog {
            format: AppImageFormat::Type2,
            payload_offset: 0,
            entries: Vec::new(),
        }
    }

    pub fn with_format(mut self, format: AppImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_payload_offset(mut self, offset: u64) -> Self {
        self.payload_offset = offset;
        self
    }

    pub fn file(mut self, path: impl Into<String>, content: &[u8]) -> Self {
        self.entries
            .push((path.into(), MemoryEntry::File(content.to_vec())));
        self
    }

    pub fn dir(mut self, path: impl Into<String>) -> Self {
        self.entries.push((path.into(), MemoryEntry::Directory));
        self
    }

    pub fn symlink(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries
            .push((path.into(), MemoryEntry::Symlink(target.into())));
        self
    }

    pub fn unknown(mut self, path: impl Into<String>) -> Self {
        self.entries.push((path.into(), MemoryEntry::Unknown));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct MemoryContainer {
    catalog: Arc<MemoryCatalog>,
    consumed: bool,
}

impl Container for MemoryContainer {
    fn format(&self) -> AppImageFormat {
        self.catalog.format
    }

    fn payload_offset(&self) -> Result<u64> {
        Ok(self.catalog.payload_offset)
    }

    fn entries(&mut self) -> Result<Entries<'_>> {
        if self.consumed {
            return Err(AppImageError::PayloadIterator(
                "catalog already iterated".to_string(),
            ));
        }
        self.consumed = true;

        let iter = self.catalog.entries.iter().map(|(path, entry)| {
            Ok(match entry {
                MemoryEntry::File(content) => {
                    PayloadEntry::regular(path.clone(), Box::new(content.as_slice()))
                }
                MemoryEntry::Directory => PayloadEntry::directory(path.clone()),
                MemoryEntry::Symlink(target) => PayloadEntry::symlink(path.clone(), target.clone()),
                MemoryEntry::Unknown => PayloadEntry::unknown(path.clone()),
            })
        });

        Ok(Box::new(iter))
    }
}

/// Opener over a fixed set of in-memory catalogs keyed by container path
#[derive(Default)]
pub struct MemoryOpener {
    catalogs: HashMap<PathBuf, Arc<MemoryCatalog>>,
    opens: AtomicUsize,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `catalog` under `path`
    pub fn with(mut self, path: impl Into<PathBuf>, catalog: MemoryCatalog) -> Self {
        self.insert(path, catalog);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, catalog: MemoryCatalog) {
        self.catalogs.insert(path.into(), Arc::new(catalog));
    }

    /// Number of successful and failed `open` calls so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ContainerOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let catalog = self
            .catalogs
            .get(path)
            .ok_or_else(|| AppImageError::ContainerOpen {
                path: path.to_path_buf(),
                reason: "No such file or directory".to_string(),
            })?;

        if !catalog.format.is_valid() {
            return Err(AppImageError::container_open(
                path,
                AppImageError::UnknownFormat,
            ));
        }

        Ok(Box::new(MemoryContainer {
            catalog: Arc::clone(catalog),
            consumed: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::EntryType;

    #[test]
    fn test_entries_are_single_pass() {
        let opener = MemoryOpener::new().with("/a.AppImage", MemoryCatalog::new().file("x", b"1"));
        let mut container = opener.open(Path::new("/a.AppImage")).unwrap();

        assert_eq!(container.entries().unwrap().count(), 1);
        assert!(matches!(
            container.entries(),
            Err(AppImageError::PayloadIterator(_))
        ));
    }

    #[test]
    fn test_open_counter_and_fresh_handles() {
        let opener = MemoryOpener::new().with("/a.AppImage", MemoryCatalog::new().file("x", b"1"));

        for _ in 0..3 {
            let mut container = opener.open(Path::new("/a.AppImage")).unwrap();
            let types: Vec<EntryType> = container
                .entries()
                .unwrap()
                .map(|e| e.unwrap().entry_type())
                .collect();
            assert_eq!(types, vec![EntryType::Regular]);
        }
        assert!(opener.open(Path::new("/missing")).is_err());
        assert_eq!(opener.open_count(), 4);
    }

    #[test]
    fn test_invalid_format_fails_to_open() {
        let opener = MemoryOpener::new().with(
            "/bad",
            MemoryCatalog::new().with_format(AppImageFormat::Invalid),
        );
        assert!(matches!(
            opener.open(Path::new("/bad")),
            Err(AppImageError::ContainerOpen { .. })
        ));
    }
}
