//! Boundary adapters
//!
//! One method per exported operation. Each runs the core logic, turns any
//! failure (including a panic) into the operation's sentinel and reports the
//! failure text to the log sink. Nothing in here touches raw pointers; the
//! `ffi` module only converts arguments and results.

use crate::config::Config;
use crate::core::catalog::{self, ContainerOpener};
use crate::core::desktop_entry::DesktopEntryInspector;
use crate::core::hash;
use crate::core::header::AppImageFormat;
use crate::core::integration::DesktopIntegration;
use crate::core::io::AppImageOpener;
use crate::core::resolver::SymlinkResolver;
use crate::error::{AppImageError, Result};
use crate::logging::{self, LogSink, TracingSink};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Message logged when a failure carries no description
pub const UNKNOWN_FAILURE: &str = "that's all we know.";

/// Execution context shared by every boundary operation
#[derive(Clone)]
pub struct Facade {
    opener: Arc<dyn ContainerOpener>,
    sink: Arc<dyn LogSink>,
    integration: Option<Arc<dyn DesktopIntegration>>,
}

impl Facade {
    pub fn new(opener: Arc<dyn ContainerOpener>, sink: Arc<dyn LogSink>) -> Self {
        Facade {
            opener,
            sink,
            integration: None,
        }
    }

    /// Filesystem opener, `tracing` sink and a stderr subscriber configured
    /// from the environment
    ///
    /// Installs the global subscriber unless one is already set; see
    /// [`crate::ffi::install_facade`] for hosts that bring their own.
    pub fn from_environment() -> Self {
        let config = Config::load();
        logging::init_subscriber(&config);
        Facade::new(Arc::new(AppImageOpener::new()), Arc::new(TracingSink))
    }

    pub fn with_integration(mut self, integration: Arc<dyn DesktopIntegration>) -> Self {
        self.integration = Some(integration);
        self
    }

    pub fn opener(&self) -> &dyn ContainerOpener {
        self.opener.as_ref()
    }

    /// Send a failure to the sink unless `verbose` is off
    pub fn report(&self, operation: &str, verbose: bool, err: &AppImageError) {
        if verbose {
            self.sink.error(operation, &err.to_string());
        }
    }

    fn guard<T>(
        &self,
        operation: &str,
        verbose: bool,
        fallback: T,
        work: impl FnOnce() -> Result<T>,
    ) -> T {
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                debug!("{} failed: {}", operation, err);
                self.report(operation, verbose, &err);
                fallback
            }
            Err(payload) => {
                if verbose {
                    self.sink.error(operation, &panic_message(payload.as_ref()));
                }
                fallback
            }
        }
    }

    /// Format code of the container, `-1` when it cannot be classified
    pub fn get_type(&self, path: &Path, verbose: bool) -> i32 {
        self.guard(
            "appimage_get_type",
            verbose,
            AppImageFormat::Invalid.code(),
            || Ok(catalog::classify(self.opener(), path)?.code()),
        )
    }

    /// Non-empty payload paths, or an empty list on failure
    pub fn list_files(&self, path: &Path) -> Vec<String> {
        self.guard("appimage_list_files", true, Vec::new(), || {
            catalog::list_paths(self.opener(), path)
        })
    }

    /// Content of the regular file `file` resolves to
    pub fn read_file_following_symlinks(&self, path: &Path, file: &str) -> Option<Vec<u8>> {
        self.guard(
            "appimage_read_file_into_buffer_following_symlinks",
            true,
            None,
            || Ok(Some(SymlinkResolver::new(self.opener(), path).read_to_vec(file)?)),
        )
    }

    /// Write the regular file `file` resolves to into `target`
    ///
    /// `target` is left untouched unless resolution succeeds.
    pub fn extract_file_following_symlinks(&self, path: &Path, file: &str, target: &Path) -> bool {
        self.guard(
            "appimage_extract_file_following_symlinks",
            true,
            false,
            || {
                let written = SymlinkResolver::new(self.opener(), path).extract_to(file, target)?;
                debug!("Extracted {} ({} bytes) to {:?}", file, written, target);
                Ok(true)
            },
        )
    }

    /// `1` when the desktop entry opts out of integration, `0` otherwise,
    /// `-1` on failure
    pub fn shall_not_be_integrated(&self, path: &Path) -> i32 {
        self.guard("appimage_shall_not_be_integrated", true, -1, || {
            let inspector = DesktopEntryInspector::new(self.opener(), path);
            Ok(inspector.shall_not_integrate()? as i32)
        })
    }

    /// `1` when the desktop entry asks for a terminal, `0` otherwise, `-1` on
    /// failure
    pub fn is_terminal_app(&self, path: &Path) -> i32 {
        self.guard("appimage_is_terminal_app", true, -1, || {
            let inspector = DesktopEntryInspector::new(self.opener(), path);
            Ok(inspector.is_terminal_app()? as i32)
        })
    }

    /// Thumbnail identifier of `path`
    pub fn get_md5(&self, path: &Path) -> Option<String> {
        self.guard("appimage_get_md5", true, None, || {
            hash::identifier_hash(path)
        })
    }

    /// Offset of the payload in the container, `0` on failure
    pub fn payload_offset(&self, path: &Path) -> u64 {
        self.guard("appimage_get_payload_offset", true, 0, || {
            catalog::payload_offset(self.opener(), path)
        })
    }

    fn integration(&self) -> Result<&dyn DesktopIntegration> {
        self.integration
            .as_deref()
            .ok_or_else(|| AppImageError::Integration("no desktop integration manager".to_string()))
    }

    /// `0` on success, `1` on failure
    pub fn register_in_system(&self, path: &Path, verbose: bool) -> i32 {
        self.guard("appimage_register_in_system", verbose, 1, || {
            catalog::classify(self.opener(), path)?;
            let manager = self.integration()?;
            manager.register(path)?;
            #[cfg(feature = "thumbnailer")]
            manager.generate_thumbnails(path)?;
            Ok(0)
        })
    }

    /// `0` on success, `1` on failure
    pub fn unregister_in_system(&self, path: &Path, verbose: bool) -> i32 {
        self.guard("appimage_unregister_in_system", verbose, 1, || {
            catalog::classify(self.opener(), path)?;
            let manager = self.integration()?;
            manager.unregister(path)?;
            #[cfg(feature = "thumbnailer")]
            manager.remove_thumbnails(path)?;
            Ok(0)
        })
    }

    pub fn is_registered_in_system(&self, path: &Path) -> bool {
        self.guard("appimage_is_registered_in_system", true, false, || {
            catalog::classify(self.opener(), path)?;
            self.integration()?.is_registered(path)
        })
    }

    pub fn create_thumbnail(&self, path: &Path, verbose: bool) {
        self.guard("appimage_create_thumbnail", verbose, (), || {
            catalog::classify(self.opener(), path)?;
            self.integration()?.generate_thumbnails(path)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        UNKNOWN_FAILURE.to_string()
    }
}
