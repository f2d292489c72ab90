//! Desktop entry documents and the integration flags read from them
//!
//! Parsing is lenient: lines that are neither comments, group headers nor
//! `Key=Value` pairs are skipped, so a damaged document degrades to the
//! flags' defaults instead of failing the call.

use crate::core::catalog::{ContainerOpener, EntryType};
use crate::core::resolver::SymlinkResolver;
use crate::core::validation::{is_top_level, resolve_link_target};
use crate::error::Result;
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

pub const INTEGRATE_KEY: &str = "Desktop Entry/X-AppImage-Integrate";
pub const TERMINAL_KEY: &str = "Desktop Entry/Terminal";

fn entry_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9-]+(?:\[[^\]=]+\])?)\s*=\s*(.*)$").expect("valid entry pattern")
    })
}

/// Parsed desktop entry, keyed by `"Group/Key"`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    values: HashMap<String, String>,
    groups: Vec<String>,
}

impl DesktopEntry {
    /// Parse a document
    ///
    /// Later duplicates of a key override earlier ones.
    pub fn parse(text: &str) -> Self {
        let mut entry = DesktopEntry::default();
        let mut group: Option<String> = None;

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if !entry.groups.iter().any(|g| g == name) {
                    entry.groups.push(name.to_string());
                }
                group = Some(name.to_string());
                continue;
            }

            let Some(current) = group.as_deref() else {
                debug!("desktop entry line {}: key outside of any group", number + 1);
                continue;
            };

            match entry_line().captures(line) {
                Some(caps) => {
                    let key = format!("{}/{}", current, &caps[1]);
                    entry.values.insert(key, unescape(&caps[2]));
                }
                None => debug!("desktop entry line {}: not a key/value pair", number + 1),
            }
        }

        entry
    }

    /// Parse a document from a stream, replacing invalid UTF-8
    pub fn from_reader<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Value at `"Group/Key"`, or `default` when absent
    pub fn get(&self, path: &str, default: &str) -> String {
        self.values
            .get(path)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_opt(&self, path: &str) -> Option<&str> {
        self.values.get(path).map(String::as_str)
    }

    /// Group names in document order
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn normalized(value: &str) -> String {
    value.to_lowercase().trim().to_string()
}

/// Whether `path` is a candidate for the container's main desktop file
pub fn is_desktop_file_candidate(path: &str) -> bool {
    path.contains(".desktop") && is_top_level(path)
}

/// Reads the top-level desktop entry of one container
pub struct DesktopEntryInspector<'a> {
    opener: &'a dyn ContainerOpener,
    container: &'a Path,
}

impl<'a> DesktopEntryInspector<'a> {
    pub fn new(opener: &'a dyn ContainerOpener, container: &'a Path) -> Self {
        DesktopEntryInspector { opener, container }
    }

    /// Load the first top-level `*.desktop*` entry
    ///
    /// A container without one yields an empty document. A symlinked desktop
    /// file is read through the resolver.
    pub fn load(&self) -> Result<DesktopEntry> {
        let mut handle = self.opener.open(self.container)?;

        let mut follow = None;
        for entry in handle.entries()? {
            let mut entry = entry?;
            if !is_desktop_file_candidate(entry.path()) {
                continue;
            }

            debug!("Using desktop entry {}", entry.path());
            if entry.entry_type() == EntryType::Symlink {
                let target = entry.link_target().unwrap_or_default();
                follow = Some(resolve_link_target(entry.path(), target));
                break;
            }
            return DesktopEntry::from_reader(entry.reader());
        }
        drop(handle);

        match follow {
            Some(target) if !target.is_empty() => {
                SymlinkResolver::new(self.opener, self.container)
                    .resolve_with(&target, |_, reader| DesktopEntry::from_reader(reader))
            }
            _ => Ok(DesktopEntry::default()),
        }
    }

    /// `X-AppImage-Integrate` is explicitly `false`
    pub fn shall_not_integrate(&self) -> Result<bool> {
        let entry = self.load()?;
        Ok(normalized(&entry.get(INTEGRATE_KEY, "true")) == "false")
    }

    /// `Terminal` is explicitly `true`
    pub fn is_terminal_app(&self) -> Result<bool> {
        let entry = self.load()?;
        Ok(normalized(&entry.get(TERMINAL_KEY, "")) == "true")
    }
}
