pub mod catalog;
pub mod desktop_entry;
pub mod hash;
pub mod header;
pub mod integration;
pub mod io;
pub mod resolver;
pub mod validation;

pub use catalog::{Container, ContainerOpener, EntryType, PayloadEntry};
pub use desktop_entry::{DesktopEntry, DesktopEntryInspector};
pub use header::AppImageFormat;
pub use integration::DesktopIntegration;
pub use io::{AppImageFile, AppImageOpener};
pub use resolver::SymlinkResolver;
