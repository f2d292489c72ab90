//! Disk access for AppImage containers

use crate::core::catalog::{Container, ContainerOpener, Entries, TarPayload};
use crate::core::header::{self, AppImageFormat};
use crate::error::{AppImageError, Result};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// An AppImage opened from disk
///
/// Opening only classifies the header. The payload offset is computed the
/// first time it is needed and the payload is only touched when
/// [`Container::entries`] is called, so classification works for any
/// payload encoding and any section table.
pub struct AppImageFile {
    path: PathBuf,
    format: AppImageFormat,
    payload_offset: Option<u64>,
    file: Option<File>,
    payload: Option<TarPayload>,
}

impl AppImageFile {
    /// Open and classify an AppImage
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(&path)?;
        let format = header::classify(&mut file)?;

        debug!("Opened {:?}: {}", path.as_ref(), format);

        Ok(AppImageFile {
            path: path.as_ref().to_path_buf(),
            format,
            payload_offset: None,
            file: Some(file),
            payload: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_payload(&mut self) -> Result<&mut TarPayload> {
        if self.file.is_some() && self.format == AppImageFormat::Type1 {
            return Err(AppImageError::UnsupportedPayload(
                "ISO 9660 payloads need a custom ContainerOpener".to_string(),
            ));
        }

        let payload_offset = self.payload_offset()?;
        self.payload_offset = Some(payload_offset);

        let mut file = self.file.take().ok_or_else(|| {
            AppImageError::PayloadIterator("payload already iterated".to_string())
        })?;
        file.seek(SeekFrom::Start(payload_offset))?;
        let payload = TarPayload::new(self.format, payload_offset, file)?;
        Ok(self.payload.insert(payload))
    }
}

impl Container for AppImageFile {
    fn format(&self) -> AppImageFormat {
        self.format
    }

    fn payload_offset(&self) -> Result<u64> {
        if let Some(offset) = self.payload_offset {
            return Ok(offset);
        }
        let mut file = self.file.as_ref().ok_or_else(|| {
            AppImageError::PayloadIterator("payload already iterated".to_string())
        })?;
        let offset = header::elf_size(&mut file)?;
        debug!("Payload of {:?} starts at {}", self.path, offset);
        Ok(offset)
    }

    fn entries(&mut self) -> Result<Entries<'_>> {
        self.open_payload()?.entries()
    }
}

/// Default opener: AppImage files on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct AppImageOpener;

impl AppImageOpener {
    pub fn new() -> Self {
        AppImageOpener
    }
}

impl ContainerOpener for AppImageOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>> {
        let file = AppImageFile::open(path).map_err(|e| AppImageError::container_open(path, e))?;
        Ok(Box::new(file))
    }
}
