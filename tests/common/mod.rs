//! AppImage fixtures
//!
//! Builds minimal but real AppImages: a 64-byte ELF64 runtime carrying the
//! AppImage magic, followed by a tar payload.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TYPE1_MAGIC: [u8; 3] = *b"AI\x01";
pub const TYPE2_MAGIC: [u8; 3] = *b"AI\x02";
pub const RUNTIME_LEN: u64 = 64;

/// ELF64 header whose section header table ends at byte 64
pub fn runtime(magic: [u8; 3]) -> Vec<u8> {
    let mut bytes = vec![0u8; RUNTIME_LEN as usize];
    bytes[0..4].copy_from_slice(b"\x7fELF");
    bytes[4] = 2; // ELFCLASS64
    bytes[5] = 1; // little endian
    bytes[6] = 1;
    bytes[8..11].copy_from_slice(&magic);
    bytes[0x28..0x30].copy_from_slice(&RUNTIME_LEN.to_le_bytes());
    bytes
}

/// Tar payload builder
pub struct Payload {
    builder: tar::Builder<Vec<u8>>,
}

impl Payload {
    pub fn new() -> Self {
        Payload {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        let mut header = tar::Header::new_ustar();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, content)
            .expect("append file");
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, &b""[..])
            .expect("append dir");
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        self.builder
            .append_link(&mut header, path, target)
            .expect("append symlink");
        self
    }

    pub fn into_tar(self) -> Vec<u8> {
        self.builder.into_inner().expect("finish tar")
    }

    pub fn into_tar_gz(self) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&self.into_tar()).expect("compress");
        encoder.finish().expect("finish gzip")
    }
}

/// Write `runtime ++ payload` to `dir/name`
pub fn write_appimage(dir: &Path, name: &str, magic: [u8; 3], payload: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut bytes = runtime(magic);
    bytes.extend_from_slice(payload);
    std::fs::write(&path, bytes).expect("write appimage");
    path
}

/// The payload most tests use
///
/// ```text
/// .                      (root, empty path once ./ is stripped)
/// demo.desktop
/// AppRun -> usr/bin/demo
/// .DirIcon -> usr/share/icons/demo.png
/// usr/bin/demo
/// usr/share/icons/demo.png
/// usr/lib/libdemo.so -> libdemo.so.1
/// usr/lib/libdemo.so.1
/// loop-a -> loop-b
/// loop-b -> loop-a
/// ```
pub fn demo_payload(desktop: &str) -> Payload {
    Payload::new()
        .dir("./")
        .file("./demo.desktop", desktop.as_bytes())
        .symlink("./AppRun", "usr/bin/demo")
        .symlink("./.DirIcon", "usr/share/icons/demo.png")
        .dir("./usr")
        .file("./usr/bin/demo", b"#!/bin/sh\necho demo\n")
        .file("./usr/share/icons/demo.png", b"\x89PNG\r\n\x1a\n")
        .symlink("./usr/lib/libdemo.so", "libdemo.so.1")
        .file("./usr/lib/libdemo.so.1", b"\x7fELF-lib")
        .symlink("./loop-a", "loop-b")
        .symlink("./loop-b", "loop-a")
}

pub const DEMO_DESKTOP: &str = "[Desktop Entry]\n\
Type=Application\n\
Name=Demo\n\
Exec=demo\n\
Icon=demo\n\
Categories=Utility;\n";

/// Demo AppImage with a plain tar payload
pub fn demo_appimage(dir: &Path) -> PathBuf {
    write_appimage(
        dir,
        "Demo-x86_64.AppImage",
        TYPE2_MAGIC,
        &demo_payload(DEMO_DESKTOP).into_tar(),
    )
}
