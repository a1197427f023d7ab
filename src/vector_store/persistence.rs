//! Saving and loading a [`VectorStore`] as a directory.
//!
//! Layout:
//! - `index.bin`: magic, format version, dimension, row count, then the
//!   row-major `f32` payload, all little-endian.
//! - `metadata.json`: records as a JSON array in row order.
//! - `manifest.json`: counts and provenance used to cross-check the other two.
//!
//! # Crash safety
//! - Artifacts are written and fsynced into a staging directory next to the
//!   target, then swapped in by rename.
//! - The previous directory is parked under `.<name>.previous` during the swap
//!   and removed afterwards; `load` falls back to it if a crash left the
//!   target missing.

use super::{FlatIndex, MetadataStore, Record, VectorIndex, VectorStore};
use crate::error::{KildeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "metadata.json";
pub const MANIFEST_FILE: &str = "manifest.json";

const INDEX_MAGIC: &[u8; 4] = b"KIDX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Summary written alongside the index and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub dimension: usize,
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Write `store` to `dir`, replacing the store already there.
///
/// A `dir` holding anything other than a saved store is refused with
/// [`KildeError::InvalidInput`]. On error the previous store stays in place
/// and no staging directory is left behind.
#[instrument(skip(store), fields(rows = store.len()))]
pub fn save(store: &VectorStore, dir: &Path) -> Result<()> {
    let (parent, name) = split_store_path(dir)?;
    check_replaceable(dir)?;
    fs::create_dir_all(&parent)?;

    // Removed on drop until the swap succeeds.
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}.staging-", name))
        .tempdir_in(&parent)?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        dimension: store.dimension(),
        rows: store.len(),
        model: store.model().map(str::to_string),
        saved_at: Utc::now(),
    };

    write_synced(&staging.path().join(INDEX_FILE), &encode_index(store.index()))?;
    write_synced(
        &staging.path().join(METADATA_FILE),
        &serde_json::to_vec_pretty(store.records().as_slice())?,
    )?;
    write_synced(
        &staging.path().join(MANIFEST_FILE),
        &serde_json::to_vec_pretty(&manifest)?,
    )?;

    let previous = parent.join(format!(".{}.previous", name));
    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }

    let had_previous = dir.exists();
    if had_previous {
        fs::rename(dir, &previous)?;
    }

    if let Err(e) = fs::rename(staging.path(), dir) {
        if had_previous {
            if let Err(restore) = fs::rename(&previous, dir) {
                warn!("Failed to restore previous store at {:?}: {}", dir, restore);
            }
        }
        return Err(e.into());
    }
    // The staging path no longer exists; nothing left to clean up.
    let _ = staging.keep();

    sync_dir(&parent);

    if had_previous {
        if let Err(e) = fs::remove_dir_all(&previous) {
            warn!("Failed to remove previous store {:?}: {}", previous, e);
        }
    }

    info!("Saved {} rows to {:?}", manifest.rows, dir);
    Ok(())
}

/// `dir` may be replaced if it is missing, an empty directory, or a store.
pub fn check_replaceable(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    if !dir.is_dir() {
        return Err(KildeError::InvalidInput(format!(
            "{:?} is not a directory",
            dir
        )));
    }
    if dir.join(MANIFEST_FILE).is_file() || fs::read_dir(dir)?.next().is_none() {
        return Ok(());
    }
    Err(KildeError::InvalidInput(format!(
        "{:?} is not empty and does not hold a store; refusing to replace it",
        dir
    )))
}

/// Load a store from `dir`.
///
/// Missing or inconsistent artifacts are reported as [`KildeError::CorruptState`].
#[instrument]
pub fn load(dir: &Path) -> Result<VectorStore> {
    let dir = resolve_store_dir(dir)?;

    let manifest = read_manifest(&dir)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(KildeError::CorruptState(format!(
            "unsupported format version {}",
            manifest.format_version
        )));
    }

    let index_bytes = read_artifact(&dir.join(INDEX_FILE))?;
    let index = decode_index(&index_bytes)?;

    let metadata_bytes = read_artifact(&dir.join(METADATA_FILE))?;
    let records: Vec<Record> = serde_json::from_slice(&metadata_bytes)
        .map_err(|e| KildeError::CorruptState(format!("{}: {}", METADATA_FILE, e)))?;

    if index.dimension() != manifest.dimension
        || index.len() != manifest.rows
        || records.len() != manifest.rows
    {
        return Err(KildeError::CorruptState(format!(
            "manifest expects {} rows of dimension {}, found {} vectors of dimension {} and {} records",
            manifest.rows,
            manifest.dimension,
            index.len(),
            index.dimension(),
            records.len()
        )));
    }

    let mut store = VectorStore::from_parts(Box::new(index), MetadataStore::from(records))?;
    if let Some(model) = manifest.model {
        store.set_model(model);
    }

    debug!("Loaded {} rows from {:?}", store.len(), dir);
    Ok(store)
}

/// Read only the manifest of a saved store.
pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let dir = resolve_store_dir(dir)?;
    let bytes = read_artifact(&dir.join(MANIFEST_FILE))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| KildeError::CorruptState(format!("{}: {}", MANIFEST_FILE, e)))
}

/// Whether `dir` holds a saved store.
pub fn exists(dir: &Path) -> bool {
    resolve_store_dir(dir).is_ok_and(|d| d.join(MANIFEST_FILE).is_file())
}

fn resolve_store_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_dir() {
        return Ok(dir.to_path_buf());
    }

    let (parent, name) = split_store_path(dir)?;
    let previous = parent.join(format!(".{}.previous", name));
    if previous.join(MANIFEST_FILE).is_file() {
        warn!(
            "Store {:?} missing, loading interrupted save leftover {:?}",
            dir, previous
        );
        return Ok(previous);
    }

    Err(KildeError::CorruptState(format!("no store at {:?}", dir)))
}

fn split_store_path(dir: &Path) -> Result<(PathBuf, String)> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| KildeError::InvalidInput(format!("invalid store path {:?}", dir)))?;
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name))
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => KildeError::CorruptState(format!("missing {:?}", path)),
        _ => KildeError::Io(e),
    })
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn sync_dir(dir: &Path) {
    // Not supported on every platform; the rename itself already happened.
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

fn encode_index(index: &dyn VectorIndex) -> Vec<u8> {
    let rows = index.len();
    let dimension = index.dimension();

    let mut bytes = Vec::with_capacity(HEADER_LEN + rows * dimension * 4);
    bytes.extend_from_slice(INDEX_MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(dimension as u32).to_le_bytes());
    bytes.extend_from_slice(&(rows as u64).to_le_bytes());

    for row in 0..rows {
        if let Some(vector) = index.vector(row) {
            for value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    bytes
}

fn decode_index(bytes: &[u8]) -> Result<FlatIndex> {
    let corrupt = |msg: String| KildeError::CorruptState(format!("{}: {}", INDEX_FILE, msg));

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    if &bytes[0..4] != INDEX_MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }

    let dimension = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let mut rows_bytes = [0u8; 8];
    rows_bytes.copy_from_slice(&bytes[12..20]);
    let rows = u64::from_le_bytes(rows_bytes) as usize;

    let expected = rows
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("row count overflow".to_string()))?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != expected {
        return Err(corrupt(format!(
            "expected {} payload bytes for {} rows, found {}",
            expected,
            rows,
            payload.len()
        )));
    }

    let data = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    FlatIndex::from_raw(dimension, data)
}

/// Exclusive writer lock for a store directory.
///
/// Held for the duration of an ingestion run. Readers do not take it; they
/// rely on the atomic swap in [`save`].
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    /// Take the lock for `dir`, failing with [`KildeError::StoreLocked`] if held.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let (parent, name) = split_store_path(dir)?;
        fs::create_dir_all(&parent)?;
        let path = parent.join(format!(".{}.lock", name));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(KildeError::StoreLocked(format!(
                    "{:?} exists; remove it if no ingestion is running",
                    path
                )));
            }
            Err(e) => return Err(e.into()),
        };

        writeln!(file, "{} {}", std::process::id(), Utc::now().to_rfc3339())?;
        debug!("Acquired writer lock {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release writer lock {:?}: {}", self.path, e);
        }
    }
}
