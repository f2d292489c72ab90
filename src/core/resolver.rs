//! Symlink-following payload access
//!
//! A requested virtual path is looked up in the catalog; if it names a
//! symlink, the link target is looked up next, and so on until a regular file
//! is reached. Payloads may be crafted with link loops, so every walk keeps
//! the set of paths it has visited and fails on the first revisit.
//!
//! Each hop opens a fresh catalog. The entry sequence is single-pass, so no
//! iterator state is carried from one hop to the next; the cost is
//! O(hops × entries) for a walk.

use crate::core::catalog::{ContainerOpener, EntryType, PayloadEntry};
use crate::core::validation::resolve_link_target;
use crate::error::{AppImageError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// Resolves virtual paths of one container
pub struct SymlinkResolver<'a> {
    opener: &'a dyn ContainerOpener,
    container: &'a Path,
}

enum Hop<T> {
    Done(T),
    Follow(String),
}

impl<'a> SymlinkResolver<'a> {
    pub fn new(opener: &'a dyn ContainerOpener, container: &'a Path) -> Self {
        SymlinkResolver { opener, container }
    }

    /// Walk `requested` to a regular file and hand its content to `terminal`
    ///
    /// `terminal` receives the resolved path and the content stream. The walk
    /// ends with `NotFound` when the current target has no entry (or names a
    /// directory), and with `CycleDetected` when a target comes up twice.
    pub fn resolve_with<T, F>(&self, requested: &str, terminal: F) -> Result<T>
    where
        F: FnOnce(&str, &mut dyn Read) -> Result<T>,
    {
        let mut terminal = Some(terminal);
        let mut visited: HashSet<String> = HashSet::new();
        let mut target = requested.to_string();

        while !target.is_empty() {
            if !visited.insert(target.clone()) {
                return Err(AppImageError::CycleDetected {
                    requested: requested.to_string(),
                    revisited: target,
                });
            }

            match self.hop(&target, &mut terminal)? {
                Hop::Done(value) => return Ok(value),
                Hop::Follow(next) => {
                    debug!("{} -> {} (hop {})", target, next, visited.len());
                    target = next;
                }
            }
        }

        // Only reachable through a symlink with an empty target
        Err(AppImageError::NotFound(requested.to_string()))
    }

    fn hop<T, F>(&self, target: &str, terminal: &mut Option<F>) -> Result<Hop<T>>
    where
        F: FnOnce(&str, &mut dyn Read) -> Result<T>,
    {
        let mut container = self.opener.open(self.container)?;
        let mut entry = match find_entry(container.entries()?, target)? {
            Some(entry) => entry,
            None => return Err(AppImageError::NotFound(target.to_string())),
        };

        match entry.entry_type() {
            EntryType::Regular => {
                let terminal = terminal.take().ok_or_else(|| {
                    AppImageError::PayloadIterator("terminal action already used".to_string())
                })?;
                Ok(Hop::Done(terminal(target, entry.reader())?))
            }
            EntryType::Symlink => {
                let link = entry.link_target().unwrap_or_default();
                Ok(Hop::Follow(resolve_link_target(entry.path(), link)))
            }
            EntryType::Directory | EntryType::Unknown => {
                debug!("{} is a {}, not a regular file", target, entry.entry_type());
                Err(AppImageError::NotFound(target.to_string()))
            }
        }
    }

    /// Read the file `requested` resolves to into memory
    pub fn read_to_vec(&self, requested: &str) -> Result<Vec<u8>> {
        self.resolve_with(requested, |_, reader| {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            Ok(data)
        })
    }

    /// Stream the file `requested` resolves to into `destination`
    ///
    /// The destination is only created once a regular file has been reached;
    /// if copying fails midway the partial file is removed. Returns the
    /// number of bytes written.
    pub fn extract_to(&self, requested: &str, destination: &Path) -> Result<u64> {
        self.resolve_with(requested, |_, reader| {
            let mut output = File::create(destination)?;
            match io::copy(reader, &mut output) {
                Ok(written) => Ok(written),
                Err(e) => {
                    drop(output);
                    let _ = std::fs::remove_file(destination);
                    Err(e.into())
                }
            }
        })
    }
}

/// First entry whose path equals `target`, in catalog order
fn find_entry<'c>(
    entries: impl Iterator<Item = Result<PayloadEntry<'c>>>,
    target: &str,
) -> Result<Option<PayloadEntry<'c>>> {
    for entry in entries {
        let entry = entry?;
        if entry.path() == target {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

/// Read a regular file without following symlinks
///
/// Returns `NotFound` unless `path` names a regular file.
pub fn read_direct(opener: &dyn ContainerOpener, container: &Path, path: &str) -> Result<Vec<u8>> {
    let mut handle = opener.open(container)?;
    let data = match find_entry(handle.entries()?, path)? {
        Some(mut entry) if entry.entry_type() == EntryType::Regular => {
            let mut data = Vec::new();
            entry.reader().read_to_end(&mut data)?;
            data
        }
        _ => return Err(AppImageError::NotFound(path.to_string())),
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{MemoryCatalog, MemoryOpener};
    use tempfile::TempDir;

    const IMAGE: &str = "/apps/test.AppImage";

    fn opener(catalog: MemoryCatalog) -> MemoryOpener {
        MemoryOpener::new().with(IMAGE, catalog)
    }

    #[test]
    fn test_regular_file_resolves_in_one_hop() {
        let opener = opener(MemoryCatalog::new().file("a.txt", b"alpha"));
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));

        assert_eq!(resolver.read_to_vec("a.txt").unwrap(), b"alpha");
        assert_eq!(opener.open_count(), 1);
    }

    #[test]
    fn test_chain_resolves_and_reopens_per_hop() {
        let opener = opener(
            MemoryCatalog::new()
                .symlink("A", "B")
                .symlink("B", "C")
                .file("C", b"hello"),
        );
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));

        assert_eq!(resolver.read_to_vec("A").unwrap(), b"hello");
        assert_eq!(opener.open_count(), 3);
        assert_eq!(resolver.read_to_vec("B").unwrap(), b"hello");
    }

    #[test]
    fn test_two_node_cycle_is_detected() {
        let opener = opener(MemoryCatalog::new().symlink("A", "B").symlink("B", "A"));
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));

        match resolver.read_to_vec("A") {
            Err(AppImageError::CycleDetected {
                requested,
                revisited,
            }) => {
                assert_eq!(requested, "A");
                assert_eq!(revisited, "A");
            }
            other => panic!("expected cycle, got {:?}", other.map(|v| v.len())),
        }
        // A, B, then the revisit of A is caught before opening again
        assert_eq!(opener.open_count(), 2);
    }

    #[test]
    fn test_self_link_is_a_cycle() {
        let opener = opener(MemoryCatalog::new().symlink("loop", "./loop"));
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));
        assert!(matches!(
            resolver.read_to_vec("loop"),
            Err(AppImageError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_missing_and_dangling_targets() {
        let opener = opener(
            MemoryCatalog::new()
                .symlink("dangling", "nowhere")
                .symlink("empty", "")
                .dir("usr"),
        );
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));

        assert!(matches!(
            resolver.read_to_vec("absent"),
            Err(AppImageError::NotFound(p)) if p == "absent"
        ));
        assert!(matches!(
            resolver.read_to_vec("dangling"),
            Err(AppImageError::NotFound(p)) if p == "nowhere"
        ));
        assert!(matches!(
            resolver.read_to_vec("empty"),
            Err(AppImageError::NotFound(p)) if p == "empty"
        ));
        assert!(matches!(
            resolver.read_to_vec("usr"),
            Err(AppImageError::NotFound(_))
        ));
        assert!(matches!(
            resolver.read_to_vec(""),
            Err(AppImageError::NotFound(_))
        ));
    }

    #[test]
    fn test_first_match_wins() {
        let opener = opener(MemoryCatalog::new().file("dup", b"first").file("dup", b"second"));
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));
        assert_eq!(resolver.read_to_vec("dup").unwrap(), b"first");
    }

    #[test]
    fn test_relative_links_resolve_against_link_directory() {
        let opener = opener(
            MemoryCatalog::new()
                .symlink("usr/lib/libdemo.so", "libdemo.so.1")
                .symlink("usr/lib/libdemo.so.1", "../../opt/libdemo.so.1.2")
                .file("opt/libdemo.so.1.2", b"\x7fELF"),
        );
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));
        assert_eq!(resolver.read_to_vec("usr/lib/libdemo.so").unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_open_failure_propagates() {
        let opener = MemoryOpener::new();
        let resolver = SymlinkResolver::new(&opener, Path::new("/missing.AppImage"));
        assert!(matches!(
            resolver.read_to_vec("a"),
            Err(AppImageError::ContainerOpen { .. })
        ));
    }

    #[test]
    fn test_follow_matches_direct_read_without_symlinks() {
        let catalog = MemoryCatalog::new()
            .dir("usr")
            .file("usr/a", b"one")
            .file("b", b"two")
            .file("c", b"");
        let opener = opener(catalog);
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));

        for path in ["usr/a", "b", "c"] {
            assert_eq!(
                resolver.read_to_vec(path).unwrap(),
                read_direct(&opener, Path::new(IMAGE), path).unwrap()
            );
        }
    }

    #[test]
    fn test_direct_read_does_not_follow_links() {
        let opener = opener(
            MemoryCatalog::new()
                .symlink("AppRun", "usr/bin/demo")
                .dir("usr")
                .file("usr/bin/demo", b"demo"),
        );
        let image = Path::new(IMAGE);

        assert_eq!(read_direct(&opener, image, "usr/bin/demo").unwrap(), b"demo");
        for path in ["AppRun", "usr", "missing"] {
            assert!(matches!(
                read_direct(&opener, image, path),
                Err(AppImageError::NotFound(p)) if p == path
            ));
        }
    }

    #[test]
    fn test_extract_to_writes_only_on_success() {
        let temp = TempDir::new().unwrap();
        let opener = opener(
            MemoryCatalog::new()
                .symlink("AppRun", "usr/bin/demo")
                .file("usr/bin/demo", b"#!/bin/sh\n")
                .symlink("x", "y")
                .symlink("y", "x"),
        );
        let resolver = SymlinkResolver::new(&opener, Path::new(IMAGE));

        let out = temp.path().join("AppRun");
        assert_eq!(resolver.extract_to("AppRun", &out).unwrap(), 10);
        assert_eq!(std::fs::read(&out).unwrap(), b"#!/bin/sh\n");

        let looped = temp.path().join("looped");
        assert!(resolver.extract_to("x", &looped).is_err());
        assert!(!looped.exists());
    }
}
