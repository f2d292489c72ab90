//! Payload catalog
//!
//! The catalog is the forward-only view of the files embedded in a container.
//! Every operation opens its own container through a [`ContainerOpener`] and
//! walks [`Container::entries`] exactly once; nothing is cached between calls.

pub mod memory;
pub mod archive;

pub use memory::{MemoryCatalog, MemoryOpener};
pub use archive::TarPayload;

use crate::core::header::AppImageFormat;
use crate::error::{AppImageError, Result};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Payload entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file, carries a content stream
    Regular,
    /// Directory
    Directory,
    /// Symbolic link, carries a link target
    Symlink,
    /// Anything else the payload can hold (devices, fifos, hard links)
    Unknown,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Regular => write!(f, "regular"),
            EntryType::Directory => write!(f, "directory"),
            EntryType::Symlink => write!(f, "symlink"),
            EntryType::Unknown => write!(f, "unknown"),
        }
    }
}

/// One record of the payload
///
/// The content stream borrows the container it came from and is only
/// meaningful until the catalog advances to the next entry.
pub struct PayloadEntry<'a> {
    path: String,
    entry_type: EntryType,
    link_target: Option<String>,
    content: Box<dyn Read + 'a>,
}

impl<'a> PayloadEntry<'a> {
    pub fn regular(path: impl Into<String>, content: Box<dyn Read + 'a>) -> Self {
        PayloadEntry {
            path: path.into(),
            entry_type: EntryType::Regular,
            link_target: None,
            content,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self::empty(path, EntryType::Directory)
    }

    pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        let mut entry = Self::empty(path, EntryType::Symlink);
        entry.link_target = Some(target.into());
        entry
    }

    pub fn unknown(path: impl Into<String>) -> Self {
        Self::empty(path, EntryType::Unknown)
    }

    fn empty(path: impl Into<String>, entry_type: EntryType) -> Self {
        PayloadEntry {
            path: path.into(),
            entry_type,
            link_target: None,
            content: Box::new(std::io::empty()),
        }
    }

    /// Virtual path inside the payload (may be empty for the root record)
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Link target for symlinks, `None` otherwise
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    /// Content stream (empty for anything but regular files)
    pub fn reader(&mut self) -> &mut (dyn Read + 'a) {
        &mut *self.content
    }
}

impl fmt::Debug for PayloadEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadEntry")
            .field("path", &self.path)
            .field("entry_type", &self.entry_type)
            .field("link_target", &self.link_target)
            .finish()
    }
}

/// Single-pass entry sequence
pub type Entries<'a> = Box<dyn Iterator<Item = Result<PayloadEntry<'a>>> + 'a>;

/// An opened container
pub trait Container {
    /// Format detected when the container was opened
    fn format(&self) -> AppImageFormat;

    /// Byte offset of the payload inside the container file
    ///
    /// Computed on demand; a container whose payload cannot be located still
    /// classifies.
    fn payload_offset(&self) -> Result<u64>;

    /// Walk the payload
    ///
    /// May be called at most once per handle; later calls fail with
    /// `PayloadIterator`.
    fn entries(&mut self) -> Result<Entries<'_>>;
}

/// Opens containers by path
///
/// Implementations must be reentrant: every call returns an independent
/// handle.
pub trait ContainerOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>>;
}

/// List every non-empty virtual path, in catalog order
pub fn list_paths(opener: &dyn ContainerOpener, container: &Path) -> Result<Vec<String>> {
    let mut handle = opener.open(container)?;
    let mut paths = Vec::new();

    for entry in handle.entries()? {
        let entry = entry?;
        if entry.path().is_empty() {
            continue;
        }
        paths.push(entry.path().to_string());
    }

    debug!("Listed {} payload entries in {:?}", paths.len(), container);
    Ok(paths)
}

/// Open `container` and report its format
pub fn classify(opener: &dyn ContainerOpener, container: &Path) -> Result<AppImageFormat> {
    let handle = opener.open(container)?;
    match handle.format() {
        AppImageFormat::Invalid => Err(AppImageError::UnknownFormat),
        format => Ok(format),
    }
}

/// Open `container` and report where its payload starts
pub fn payload_offset(opener: &dyn ContainerOpener, container: &Path) -> Result<u64> {
    opener.open(container)?.payload_offset()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_paths_filters_empty_and_keeps_order() {
        let opener = MemoryOpener::new().with(
            "/apps/demo.AppImage",
            MemoryCatalog::new()
                .dir("")
                .file("a.txt", b"a")
                .dir("dir/")
                .symlink("link", "a.txt"),
        );

        let paths = list_paths(&opener, Path::new("/apps/demo.AppImage")).unwrap();
        assert_eq!(paths, vec!["a.txt", "dir/", "link"]);
    }

    #[test]
    fn test_list_paths_missing_container() {
        let opener = MemoryOpener::new();
        let result = list_paths(&opener, Path::new("/nowhere.AppImage"));
        assert!(matches!(result, Err(AppImageError::ContainerOpen { .. })));
    }

    #[test]
    fn test_classify_reports_catalog_format() {
        let opener = MemoryOpener::new().with(
            "/apps/one.AppImage",
            MemoryCatalog::new().with_format(AppImageFormat::Type1),
        );
        assert_eq!(
            classify(&opener, Path::new("/apps/one.AppImage")).unwrap(),
            AppImageFormat::Type1
        );
    }

    #[test]
    fn test_entry_accessors() {
        let mut entry = PayloadEntry::regular("usr/bin/app", Box::new(&b"#!"[..]));
        assert_eq!(entry.path(), "usr/bin/app");
        assert_eq!(entry.entry_type(), EntryType::Regular);
        assert_eq!(entry.link_target(), None);

        let mut content = Vec::new();
        entry.reader().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"#!");

        let link = PayloadEntry::symlink("AppRun", "usr/bin/app");
        assert_eq!(link.link_target(), Some("usr/bin/app"));
        assert_eq!(link.entry_type().to_string(), "symlink");
    }
}
