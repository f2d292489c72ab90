//! # libappimage - AppImage inspection and extraction
//!
//! `libappimage-rs` reads AppImage containers: it tells AppImages apart from
//! other files, lists and extracts the files embedded in their payload
//! (following symlinks, with loop detection), answers questions about the
//! bundled desktop entry and computes the identifier desktop environments use
//! for thumbnails.
//!
//! The crate builds both as a Rust library and as a C shared library. The C
//! symbols (`appimage_get_type`, `appimage_list_files`, ...) live in [`ffi`];
//! they never unwind or return errors, only sentinels.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use appimage::{AppImage, Result};
//!
//! # fn main() -> Result<()> {
//! let image = AppImage::open("Demo-x86_64.AppImage")?;
//! println!("type {}", image.format());
//!
//! for path in image.list_files()? {
//!     println!("{}", path);
//! }
//!
//! // AppRun is usually a symlink into usr/bin
//! let launcher = image.read_file("AppRun")?;
//! image.extract_file("demo.desktop", "/tmp/demo.desktop")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom payload readers
//!
//! The built-in opener understands tar-framed payloads. Any other payload
//! encoding is served by implementing [`ContainerOpener`]:
//!
//! ```rust
//! use appimage::core::catalog::{MemoryCatalog, MemoryOpener};
//! use appimage::{AppImage, Result};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let opener = MemoryOpener::new().with(
//!     "/apps/demo.AppImage",
//!     MemoryCatalog::new()
//!         .symlink("AppRun", "usr/bin/demo")
//!         .file("usr/bin/demo", b"#!/bin/sh\n"),
//! );
//!
//! let image = AppImage::open_with(Arc::new(opener), "/apps/demo.AppImage")?;
//! assert_eq!(image.read_file("AppRun")?, b"#!/bin/sh\n");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod facade;
pub mod ffi;
pub mod logging;

pub use crate::config::Config;
pub use crate::core::{
    catalog::{Container, ContainerOpener, EntryType, PayloadEntry},
    desktop_entry::DesktopEntry,
    header::AppImageFormat,
    integration::DesktopIntegration,
    io::AppImageOpener,
};
pub use crate::error::{AppImageError, Result};
pub use crate::facade::Facade;
pub use crate::logging::{LogSink, MemorySink, TracingSink};

use crate::core::catalog;
use crate::core::desktop_entry::DesktopEntryInspector;
use crate::core::hash;
use crate::core::resolver::SymlinkResolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// High-level AppImage API
///
/// Holds the path and the opener only; every method opens the container
/// again, so an `AppImage` stays valid while the file is replaced on disk
/// and can be shared between threads.
///
/// # Examples
///
/// ```rust,no_run
/// use appimage::AppImage;
///
/// let image = AppImage::open("Demo-x86_64.AppImage")?;
/// if image.shall_not_be_integrated()? {
///     println!("author opted out of desktop integration");
/// }
/// # Ok::<(), appimage::AppImageError>(())
/// ```
#[derive(Clone)]
pub struct AppImage {
    path: PathBuf,
    format: AppImageFormat,
    opener: Arc<dyn ContainerOpener>,
}

impl AppImage {
    /// Open an AppImage from the filesystem
    ///
    /// Fails unless the file is a type 1 or type 2 AppImage.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(Arc::new(AppImageOpener::new()), path)
    }

    /// Open an AppImage through a custom opener
    pub fn open_with<P: AsRef<Path>>(opener: Arc<dyn ContainerOpener>, path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening AppImage at {:?}", path);
        let format = catalog::classify(opener.as_ref(), &path)?;
        Ok(AppImage {
            path,
            format,
            opener,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format detected when the AppImage was opened
    pub fn format(&self) -> AppImageFormat {
        self.format
    }

    /// Offset of the payload (size of the ELF runtime)
    pub fn payload_offset(&self) -> Result<u64> {
        catalog::payload_offset(self.opener.as_ref(), &self.path)
    }

    /// Payload paths in catalog order
    pub fn list_files(&self) -> Result<Vec<String>> {
        debug!("Listing {:?}", self.path);
        catalog::list_paths(self.opener.as_ref(), &self.path)
    }

    /// Read a payload file, following symlinks
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use appimage::AppImage;
    /// # let image = AppImage::open("Demo-x86_64.AppImage")?;
    /// let icon = image.read_file(".DirIcon")?;
    /// println!("{} bytes", icon.len());
    /// # Ok::<(), appimage::AppImageError>(())
    /// ```
    pub fn read_file<P: AsRef<str>>(&self, path: P) -> Result<Vec<u8>> {
        let path = path.as_ref();
        debug!("Reading {}", path);
        SymlinkResolver::new(self.opener.as_ref(), &self.path).read_to_vec(path)
    }

    /// Extract a payload file to `destination`, following symlinks
    ///
    /// Returns the number of bytes written. `destination` is not created
    /// when the file cannot be resolved.
    pub fn extract_file<P: AsRef<str>, D: AsRef<Path>>(
        &self,
        path: P,
        destination: D,
    ) -> Result<u64> {
        let path = path.as_ref();
        debug!("Extracting {} to {:?}", path, destination.as_ref());
        SymlinkResolver::new(self.opener.as_ref(), &self.path).extract_to(path, destination.as_ref())
    }

    /// The top-level desktop entry (empty when the payload has none)
    pub fn desktop_entry(&self) -> Result<DesktopEntry> {
        DesktopEntryInspector::new(self.opener.as_ref(), &self.path).load()
    }

    /// Whether the desktop entry sets `X-AppImage-Integrate=false`
    pub fn shall_not_be_integrated(&self) -> Result<bool> {
        DesktopEntryInspector::new(self.opener.as_ref(), &self.path).shall_not_integrate()
    }

    /// Whether the desktop entry sets `Terminal=true`
    pub fn is_terminal_app(&self) -> Result<bool> {
        DesktopEntryInspector::new(self.opener.as_ref(), &self.path).is_terminal_app()
    }

    /// md5 identifier of this AppImage's location
    pub fn identifier_hash(&self) -> Result<Option<String>> {
        hash::identifier_hash(&self.path)
    }
}

impl std::fmt::Debug for AppImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppImage")
            .field("path", &self.path)
            .field("format", &self.format)
            .finish()
    }
}
