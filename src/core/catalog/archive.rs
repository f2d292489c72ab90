//! Tar-framed payloads
//!
//! The built-in payload driver. The payload region (everything after the ELF
//! runtime) is read as a ustar stream, optionally gzip compressed. SquashFS
//! and ISO 9660 payloads are recognized and rejected with
//! `UnsupportedPayload`; plug a custom `ContainerOpener` to serve those.

use super::{Container, Entries, PayloadEntry};
use crate::core::header::{read_up_to, AppImageFormat};
use crate::error::{AppImageError, Result};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use tar::{Archive, EntryType as TarEntryType};
use tracing::debug;

pub const SQUASHFS_MAGIC: [u8; 4] = *b"hsqs";
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const USTAR_MAGIC: [u8; 5] = *b"ustar";
const USTAR_MAGIC_OFFSET: usize = 257;
const SNIFF_LEN: usize = 512;

/// Payload encodings the built-in driver can walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Tar,
    TarGz,
}

impl PayloadEncoding {
    /// Detect the encoding from the first bytes of the payload
    pub fn sniff(head: &[u8]) -> Result<Self> {
        if head.is_empty() {
            return Err(AppImageError::UnsupportedPayload(
                "payload is empty".to_string(),
            ));
        }

        if head.starts_with(&SQUASHFS_MAGIC) {
            return Err(AppImageError::UnsupportedPayload(
                "SquashFS payloads need a custom ContainerOpener".to_string(),
            ));
        }

        if head.starts_with(&GZIP_MAGIC) {
            return Ok(PayloadEncoding::TarGz);
        }

        if head.len() >= USTAR_MAGIC_OFFSET + USTAR_MAGIC.len()
            && head[USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + USTAR_MAGIC.len()] == USTAR_MAGIC
        {
            return Ok(PayloadEncoding::Tar);
        }

        Err(AppImageError::UnsupportedPayload(
            "unrecognized payload signature".to_string(),
        ))
    }
}

/// Strip the `./` prefix tar writers put in front of member names
///
/// The archive root (`.` or `./`) becomes the empty path.
pub fn strip_current_dir(path: &str) -> &str {
    let mut path = path;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    if path == "." {
        ""
    } else {
        path
    }
}

/// Container whose payload is a tar stream
pub struct TarPayload {
    format: AppImageFormat,
    payload_offset: u64,
    encoding: PayloadEncoding,
    archive: Archive<Box<dyn Read>>,
    consumed: bool,
}

impl TarPayload {
    /// Wrap `reader`, which must be positioned at the start of the payload
    pub fn new<R: Read + 'static>(
        format: AppImageFormat,
        payload_offset: u64,
        mut reader: R,
    ) -> Result<Self> {
        let mut head = vec![0u8; SNIFF_LEN];
        let read = read_up_to(&mut reader, &mut head)?;
        head.truncate(read);

        let encoding = PayloadEncoding::sniff(&head)?;
        debug!(
            "Payload at offset {} is {:?} encoded",
            payload_offset, encoding
        );

        // Put the sniffed bytes back in front of the stream
        let stream: Box<dyn Read> = Box::new(Cursor::new(head).chain(reader));
        let stream: Box<dyn Read> = match encoding {
            PayloadEncoding::Tar => stream,
            PayloadEncoding::TarGz => Box::new(GzDecoder::new(stream)),
        };

        Ok(TarPayload {
            format,
            payload_offset,
            encoding,
            archive: Archive::new(stream),
            consumed: false,
        })
    }

    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }
}

fn convert<'a>(entry: tar::Entry<'a, Box<dyn Read>>) -> PayloadEntry<'a> {
    let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
    let path = strip_current_dir(&raw_path).to_string();
    let entry_type = entry.header().entry_type();

    match entry_type {
        TarEntryType::Regular | TarEntryType::Continuous => {
            PayloadEntry::regular(path, Box::new(entry))
        }
        TarEntryType::Directory => PayloadEntry::directory(path),
        TarEntryType::Symlink => {
            let target = entry
                .link_name_bytes()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            PayloadEntry::symlink(path, target)
        }
        _ => PayloadEntry::unknown(path),
    }
}

impl Container for TarPayload {
    fn format(&self) -> AppImageFormat {
        self.format
    }

    fn payload_offset(&self) -> Result<u64> {
        Ok(self.payload_offset)
    }

    fn entries(&mut self) -> Result<Entries<'_>> {
        if self.consumed {
            return Err(AppImageError::PayloadIterator(
                "payload already iterated".to_string(),
            ));
        }
        self.consumed = true;

        let entries = self
            .archive
            .entries()
            .map_err(|e| AppImageError::PayloadIterator(e.to_string()))?;

        Ok(Box::new(entries.map(|entry| {
            entry
                .map(convert)
                .map_err(|e| AppImageError::PayloadIterator(e.to_string()))
        })))
    }
}
