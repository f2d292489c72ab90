//! Thumbnail identifiers
//!
//! Desktop environments name cached previews after the md5 of the file's
//! canonical URI. AppImage integration uses the same digest as a stable
//! identifier for the container.

use crate::error::Result;
use md5::{Digest, Md5};
use std::env;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Absolute, lexically clean path with symlinks resolved as far as the
/// path exists on disk
///
/// Unlike [`std::fs::canonicalize`] this does not require the path to exist;
/// the missing tail is appended to the canonical form of the existing prefix.
pub fn weakly_canonical(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    let absolute = normalize(&absolute);

    let mut existing = absolute.clone();
    let mut tail: Vec<PathBuf> = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(PathBuf::from(name));
                existing = parent.to_path_buf();
            }
            _ => return Ok(absolute),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `file://` URI for `path`, each segment percent-encoded
///
/// Works on the raw path bytes, so names that are not valid UTF-8 keep
/// their identity.
pub fn thumbnail_uri(path: &Path) -> Result<String> {
    let canonical = weakly_canonical(path)?;
    let encoded: Vec<String> = canonical
        .as_os_str()
        .as_bytes()
        .split(|byte| *byte == b'/')
        .map(|segment| urlencoding::encode_binary(segment).into_owned())
        .collect();
    Ok(format!("{}{}", FILE_SCHEME, encoded.join("/")))
}

/// Lower-case hex md5 of the thumbnail URI of `path`
///
/// An empty path has no identifier.
pub fn identifier_hash<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Ok(None);
    }

    let uri = thumbnail_uri(path)?;
    let digest = hex::encode(Md5::digest(uri.as_bytes()));
    if digest.is_empty() {
        return Ok(None);
    }
    Ok(Some(digest))
}
