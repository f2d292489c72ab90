//! Desktop integration bridge
//!
//! Registering an AppImage (menu entries, icons, MIME types, thumbnails) is
//! the job of a desktop integration manager living outside this crate. The
//! facade only validates the container and forwards to whatever manager the
//! host installed.

use crate::error::Result;
use std::path::Path;

/// Desktop integration manager
///
/// Implementations receive the path of a container that already opened and
/// classified successfully.
pub trait DesktopIntegration: Send + Sync {
    fn register(&self, appimage: &Path) -> Result<()>;

    fn unregister(&self, appimage: &Path) -> Result<()>;

    fn is_registered(&self, appimage: &Path) -> Result<bool>;

    /// Render freedesktop thumbnails for the container
    fn generate_thumbnails(&self, appimage: &Path) -> Result<()>;

    fn remove_thumbnails(&self, appimage: &Path) -> Result<()>;
}
