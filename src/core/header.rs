//! AppImage header classification
//!
//! An AppImage starts with an ELF runtime. Its format is recorded in the
//! ELF identification padding (bytes 8..11), and the payload begins right
//! after the runtime, i.e. at the end of the ELF image.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ ELF runtime                                 │
//! │  - e_ident[0..4]: "\x7fELF"                 │
//! │  - e_ident[8..11]: "AI\x01" | "AI\x02"      │
//! │  - section header table (end = ELF size)    │
//! ├─────────────────────────────────────────────┤
//! │ Payload (starts at ELF size)                │
//! └─────────────────────────────────────────────┘
//! ```

use crate::error::{AppImageError, Result};
use std::fmt;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

pub const ELF_MAGIC: [u8; 4] = *b"\x7fELF";
pub const APPIMAGE_MAGIC_OFFSET: usize = 8;
pub const TYPE1_MAGIC: [u8; 3] = *b"AI\x01";
pub const TYPE2_MAGIC: [u8; 3] = *b"AI\x02";
pub const ISO9660_MAGIC: [u8; 5] = *b"CD001";
pub const ISO9660_MAGIC_OFFSET: u64 = 32769;

const ELF32_HEADER_LEN: usize = 52;
const ELF64_HEADER_LEN: usize = 64;
const SHT_NOBITS: u32 = 8;

/// Container format code
///
/// The discriminants are part of the C ABI (`appimage_get_type`).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppImageFormat {
    /// Not an AppImage (or unreadable)
    Invalid = -1,
    /// ISO 9660 payload
    Type1 = 1,
    /// SquashFS payload
    Type2 = 2,
}

impl AppImageFormat {
    /// Stable integer code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Parse a format code
    ///
    /// Unknown values map to `Invalid`.
    pub fn from_code(value: i32) -> Self {
        match value {
            1 => Self::Type1,
            2 => Self::Type2,
            _ => Self::Invalid,
        }
    }

    pub fn is_valid(self) -> bool {
        self != Self::Invalid
    }
}

impl fmt::Display for AppImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid"),
            Self::Type1 => write!(f, "type 1"),
            Self::Type2 => write!(f, "type 2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Fields of the ELF file header needed to size the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub class: ElfClass,
    pub endianness: Endianness,
    /// Bytes 8..11 of `e_ident`, where the AppImage magic lives
    pub appimage_magic: [u8; 3],
    /// Section header table file offset
    pub shoff: u64,
    /// Size of one section header
    pub shentsize: u16,
    /// Number of section headers
    pub shnum: u16,
}

struct FieldReader<'a> {
    bytes: &'a [u8],
    endianness: Endianness,
}

impl FieldReader<'_> {
    fn u16(&self, offset: usize) -> u16 {
        let raw = [self.bytes[offset], self.bytes[offset + 1]];
        match self.endianness {
            Endianness::Little => u16::from_le_bytes(raw),
            Endianness::Big => u16::from_be_bytes(raw),
        }
    }

    fn u32(&self, offset: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[offset..offset + 4]);
        match self.endianness {
            Endianness::Little => u32::from_le_bytes(raw),
            Endianness::Big => u32::from_be_bytes(raw),
        }
    }

    fn u64(&self, offset: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[offset..offset + 8]);
        match self.endianness {
            Endianness::Little => u64::from_le_bytes(raw),
            Endianness::Big => u64::from_be_bytes(raw),
        }
    }
}

impl ElfHeader {
    /// Parse the ELF file header
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 || bytes[0..4] != ELF_MAGIC {
            return Err(AppImageError::InvalidElf("missing ELF magic".to_string()));
        }

        let class = match bytes[4] {
            1 => ElfClass::Elf32,
            2 => ElfClass::Elf64,
            other => {
                return Err(AppImageError::InvalidElf(format!(
                    "unknown ELF class {}",
                    other
                )))
            }
        };

        let endianness = match bytes[5] {
            1 => Endianness::Little,
            2 => Endianness::Big,
            other => {
                return Err(AppImageError::InvalidElf(format!(
                    "unknown ELF data encoding {}",
                    other
                )))
            }
        };

        let needed = match class {
            ElfClass::Elf32 => ELF32_HEADER_LEN,
            ElfClass::Elf64 => ELF64_HEADER_LEN,
        };
        if bytes.len() < needed {
            return Err(AppImageError::InvalidElf(format!(
                "truncated ELF header: {} of {} bytes",
                bytes.len(),
                needed
            )));
        }

        let fields = FieldReader { bytes, endianness };
        let (shoff, shentsize, shnum) = match class {
            ElfClass::Elf32 => (fields.u32(0x20) as u64, fields.u16(0x2E), fields.u16(0x30)),
            ElfClass::Elf64 => (fields.u64(0x28), fields.u16(0x3A), fields.u16(0x3C)),
        };

        let mut appimage_magic = [0u8; 3];
        appimage_magic.copy_from_slice(&bytes[APPIMAGE_MAGIC_OFFSET..APPIMAGE_MAGIC_OFFSET + 3]);

        Ok(ElfHeader {
            class,
            endianness,
            appimage_magic,
            shoff,
            shentsize,
            shnum,
        })
    }

    /// Format announced by the AppImage magic, if any
    pub fn magic_format(&self) -> Option<AppImageFormat> {
        match self.appimage_magic {
            TYPE1_MAGIC => Some(AppImageFormat::Type1),
            TYPE2_MAGIC => Some(AppImageFormat::Type2),
            _ => None,
        }
    }

    /// End offset of the section header table
    pub fn section_table_end(&self) -> u64 {
        self.shoff
            .saturating_add(self.shentsize as u64 * self.shnum as u64)
    }
}

/// Read into `buf` until it is full or the reader is exhausted
pub(crate) fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read the ELF file header from the start of `reader`
pub fn read_elf_header<R: Read + Seek>(reader: &mut R) -> Result<ElfHeader> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buffer = [0u8; ELF64_HEADER_LEN];
    let read = read_up_to(reader, &mut buffer)?;
    ElfHeader::from_bytes(&buffer[..read])
}

fn has_iso9660_signature<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    reader.seek(SeekFrom::Start(ISO9660_MAGIC_OFFSET))?;
    let mut signature = [0u8; 5];
    let read = read_up_to(reader, &mut signature)?;
    Ok(read == signature.len() && signature == ISO9660_MAGIC)
}

/// Classify the container behind `reader`
///
/// Returns `UnknownFormat` for anything that is not an AppImage.
pub fn classify<R: Read + Seek>(reader: &mut R) -> Result<AppImageFormat> {
    reader.seek(SeekFrom::Start(0))?;
    let mut ident = [0u8; 16];
    let read = read_up_to(reader, &mut ident)?;
    if read < ident.len() || ident[0..4] != ELF_MAGIC {
        return Err(AppImageError::UnknownFormat);
    }

    let magic = &ident[APPIMAGE_MAGIC_OFFSET..APPIMAGE_MAGIC_OFFSET + 3];
    if magic == TYPE1_MAGIC {
        return Ok(AppImageFormat::Type1);
    }
    if magic == TYPE2_MAGIC {
        return Ok(AppImageFormat::Type2);
    }

    // Legacy type 1 images carry no magic, only the ISO 9660 volume descriptor
    if has_iso9660_signature(reader)? {
        return Ok(AppImageFormat::Type1);
    }

    Err(AppImageError::UnknownFormat)
}

/// Size of the ELF runtime, which is where the payload starts
///
/// The larger of the section header table end and the end of the last
/// file-backed section.
pub fn elf_size<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let header = read_elf_header(reader)?;
    let table_len = header.shentsize as u64 * header.shnum as u64;
    let table_end = header
        .shoff
        .checked_add(table_len)
        .ok_or_else(|| out_of_range("section header table"))?;
    if header.shnum == 0 {
        return Ok(table_end);
    }

    // table_end did not overflow, so neither does anything below it
    let last = table_end - header.shentsize as u64;
    reader.seek(SeekFrom::Start(last))?;

    let entry_len = match header.class {
        ElfClass::Elf32 => 0x18,
        ElfClass::Elf64 => 0x28,
    };
    let mut entry = [0u8; 0x28];
    let read = read_up_to(reader, &mut entry[..entry_len])?;
    if read < entry_len {
        return Err(AppImageError::InvalidElf(
            "truncated section header table".to_string(),
        ));
    }

    let fields = FieldReader {
        bytes: &entry,
        endianness: header.endianness,
    };
    let sh_type = fields.u32(0x04);
    if sh_type == SHT_NOBITS {
        return Ok(table_end);
    }

    let section_end = match header.class {
        ElfClass::Elf32 => Some(fields.u32(0x10) as u64 + fields.u32(0x14) as u64),
        ElfClass::Elf64 => fields.u64(0x18).checked_add(fields.u64(0x20)),
    }
    .ok_or_else(|| out_of_range("last section"))?;

    Ok(table_end.max(section_end))
}

fn out_of_range(what: &str) -> AppImageError {
    AppImageError::InvalidElf(format!("{} extends past the addressable range", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn elf64(magic: [u8; 3], shoff: u64, shentsize: u16, shnum: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; ELF64_HEADER_LEN];
        bytes[0..4].copy_from_slice(&ELF_MAGIC);
        bytes[4] = 2;
        bytes[5] = 1;
        bytes[6] = 1;
        bytes[8..11].copy_from_slice(&magic);
        bytes[0x28..0x30].copy_from_slice(&shoff.to_le_bytes());
        bytes[0x3A..0x3C].copy_from_slice(&shentsize.to_le_bytes());
        bytes[0x3C..0x3E].copy_from_slice(&shnum.to_le_bytes());
        bytes
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(AppImageFormat::Invalid.code(), -1);
        assert_eq!(AppImageFormat::Type1.code(), 1);
        assert_eq!(AppImageFormat::Type2.code(), 2);
        assert_eq!(AppImageFormat::from_code(2), AppImageFormat::Type2);
        assert_eq!(AppImageFormat::from_code(0), AppImageFormat::Invalid); // Unknown falls back
        assert!(!AppImageFormat::Invalid.is_valid());
    }

    #[test]
    fn test_classify_type2() {
        let mut cursor = Cursor::new(elf64(TYPE2_MAGIC, 64, 64, 0));
        assert_eq!(classify(&mut cursor).unwrap(), AppImageFormat::Type2);
    }

    #[test]
    fn test_classify_type1_magic() {
        let mut cursor = Cursor::new(elf64(TYPE1_MAGIC, 64, 64, 0));
        assert_eq!(classify(&mut cursor).unwrap(), AppImageFormat::Type1);
    }

    #[test]
    fn test_classify_legacy_iso9660() {
        let mut bytes = elf64([0, 0, 0], 64, 64, 0);
        bytes.resize(ISO9660_MAGIC_OFFSET as usize + 16, 0);
        let at = ISO9660_MAGIC_OFFSET as usize;
        bytes[at..at + 5].copy_from_slice(&ISO9660_MAGIC);

        let mut cursor = Cursor::new(bytes);
        assert_eq!(classify(&mut cursor).unwrap(), AppImageFormat::Type1);
    }

    #[test]
    fn test_classify_rejects_plain_elf_and_garbage() {
        let mut plain = Cursor::new(elf64([0, 0, 0], 64, 64, 0));
        assert!(matches!(
            classify(&mut plain),
            Err(AppImageError::UnknownFormat)
        ));

        let mut garbage = Cursor::new(b"#!/bin/sh\necho hi\n".to_vec());
        assert!(matches!(
            classify(&mut garbage),
            Err(AppImageError::UnknownFormat)
        ));

        let mut empty = Cursor::new(Vec::new());
        assert!(matches!(
            classify(&mut empty),
            Err(AppImageError::UnknownFormat)
        ));
    }

    #[test]
    fn test_elf_size_without_sections() {
        let mut cursor = Cursor::new(elf64(TYPE2_MAGIC, 4096, 64, 0));
        assert_eq!(elf_size(&mut cursor).unwrap(), 4096);
    }

    #[test]
    fn test_elf_size_uses_last_section_end() {
        // One section header at 64, describing a section at [128, 128 + 1000)
        let mut bytes = elf64(TYPE2_MAGIC, 64, 64, 1);
        let mut section = vec![0u8; 64];
        section[0x04..0x08].copy_from_slice(&1u32.to_le_bytes());
        section[0x18..0x20].copy_from_slice(&128u64.to_le_bytes());
        section[0x20..0x28].copy_from_slice(&1000u64.to_le_bytes());
        bytes.extend_from_slice(&section);

        let mut cursor = Cursor::new(bytes);
        assert_eq!(elf_size(&mut cursor).unwrap(), 1128);
    }

    #[test]
    fn test_elf_size_ignores_nobits_section() {
        let mut bytes = elf64(TYPE2_MAGIC, 64, 64, 1);
        let mut section = vec![0u8; 64];
        section[0x04..0x08].copy_from_slice(&SHT_NOBITS.to_le_bytes());
        section[0x18..0x20].copy_from_slice(&128u64.to_le_bytes());
        section[0x20..0x28].copy_from_slice(&1_000_000u64.to_le_bytes());
        bytes.extend_from_slice(&section);

        let mut cursor = Cursor::new(bytes);
        assert_eq!(elf_size(&mut cursor).unwrap(), 128);
    }

    #[test]
    fn test_elf_size_rejects_overflowing_section_table() {
        let mut cursor = Cursor::new(elf64(TYPE2_MAGIC, u64::MAX - 8, 64, 2));
        assert!(matches!(
            elf_size(&mut cursor),
            Err(AppImageError::InvalidElf(_))
        ));

        // Classification only looks at the identification bytes
        assert_eq!(classify(&mut cursor).unwrap(), AppImageFormat::Type2);
    }

    #[test]
    fn test_elf_size_rejects_overflowing_section() {
        let mut bytes = elf64(TYPE2_MAGIC, 64, 64, 1);
        let mut section = vec![0u8; 64];
        section[0x04..0x08].copy_from_slice(&1u32.to_le_bytes());
        section[0x18..0x20].copy_from_slice(&(u64::MAX - 16).to_le_bytes());
        section[0x20..0x28].copy_from_slice(&1000u64.to_le_bytes());
        bytes.extend_from_slice(&section);

        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            elf_size(&mut cursor),
            Err(AppImageError::InvalidElf(_))
        ));
    }

    #[test]
    fn test_elf32_big_endian_header() {
        let mut bytes = vec![0u8; ELF32_HEADER_LEN];
        bytes[0..4].copy_from_slice(&ELF_MAGIC);
        bytes[4] = 1;
        bytes[5] = 2;
        bytes[8..11].copy_from_slice(&TYPE2_MAGIC);
        bytes[0x20..0x24].copy_from_slice(&300u32.to_be_bytes());
        bytes[0x2E..0x30].copy_from_slice(&40u16.to_be_bytes());
        bytes[0x30..0x32].copy_from_slice(&0u16.to_be_bytes());

        let header = ElfHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.class, ElfClass::Elf32);
        assert_eq!(header.endianness, Endianness::Big);
        assert_eq!(header.magic_format(), Some(AppImageFormat::Type2));
        assert_eq!(header.section_table_end(), 300);
    }

    #[test]
    fn test_truncated_elf_header() {
        let bytes = elf64(TYPE2_MAGIC, 64, 64, 0);
        assert!(matches!(
            ElfHeader::from_bytes(&bytes[..20]),
            Err(AppImageError::InvalidElf(_))
        ));
    }
}
