//! On-disk catalog snapshots.
//!
//! Layout: 4 magic bytes, a little-endian `u32` format version, then the bincode-encoded
//! filename → paths map. Names and paths are encoded as platform strings (raw bytes on
//! Unix), so a snapshot is only readable on the platform family that wrote it.
//!
//! Writes go to a temporary file next to the target and are renamed into place, so an
//! interrupted save leaves the previous snapshot intact.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::{IndexError, PathCatalog};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"FSIX";
pub const SNAPSHOT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

#[derive(Serialize)]
struct SnapshotBodyRef<'a> {
    entries: &'a BTreeMap<OsString, BTreeSet<OsString>>,
}

#[derive(Deserialize)]
struct SnapshotBody {
    entries: BTreeMap<OsString, BTreeSet<OsString>>,
}

pub fn save(catalog: &PathCatalog, path: &Path) -> Result<(), IndexError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut out = BufWriter::new(tmp.as_file());
        out.write_all(&SNAPSHOT_MAGIC)?;
        out.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        let body = SnapshotBodyRef {
            entries: catalog.entries(),
        };
        bincode::serialize_into(&mut out, &body)
            .map_err(std::io::Error::other)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;

    tracing::debug!(
        path = %path.display(),
        names = catalog.name_count(),
        paths = catalog.path_count(),
        "wrote catalog snapshot"
    );
    Ok(())
}

/// Reads a snapshot. A missing file is `Ok(None)`; anything unreadable or malformed is
/// [`IndexError::CorruptSnapshot`].
pub fn load(path: &Path) -> Result<Option<PathCatalog>, IndexError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(IndexError::corrupt(path, err)),
    };

    if bytes.len() < HEADER_LEN || bytes[..4] != SNAPSHOT_MAGIC {
        return Err(IndexError::corrupt(path, "missing snapshot header"));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != SNAPSHOT_VERSION {
        return Err(IndexError::corrupt(
            path,
            format!("unsupported snapshot version {version}"),
        ));
    }

    // slice decoding bounds every length prefix by the bytes actually present
    let body: SnapshotBody = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(&bytes[HEADER_LEN..])
        .map_err(|err| IndexError::corrupt(path, err))?;

    let catalog = PathCatalog::from_entries(body.entries);
    tracing::debug!(
        path = %path.display(),
        names = catalog.name_count(),
        paths = catalog.path_count(),
        "loaded catalog snapshot"
    );
    Ok(Some(catalog))
}
