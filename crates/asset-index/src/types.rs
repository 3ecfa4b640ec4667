//! Record types held by the repository.
//!
//! Callers always receive owned clones of these records; changes go back
//! through [`crate::Repository`] as patches.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::Metadata;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository-assigned asset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

/// Repository-assigned folder identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tracked 3D file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    /// Base name, e.g. `hero_lowpoly_v2.fbx`.
    pub filename: String,
    /// Absolute path; the natural key.
    pub filepath: PathBuf,
    pub filesize: u64,
    /// Lower-cased extension including the dot.
    pub filetype: String,
    pub thumbnail_path: Option<PathBuf>,
    pub tags: BTreeSet<String>,
    pub metadata: serde_json::Value,
    /// Filesystem modification time of the backing file.
    pub last_modified: DateTime<Utc>,
    /// When this record was created; never changes.
    pub created_at: DateTime<Utc>,
}

/// Fields for a new asset. The repository assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub filename: String,
    pub filepath: PathBuf,
    pub filesize: u64,
    pub filetype: String,
    pub thumbnail_path: Option<PathBuf>,
    pub tags: BTreeSet<String>,
    pub metadata: serde_json::Value,
    pub last_modified: DateTime<Utc>,
}

/// Partial asset update. `None` leaves a field alone.
///
/// `filepath` is the natural key and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetPatch {
    pub filename: Option<String>,
    pub filesize: Option<u64>,
    pub filetype: Option<String>,
    pub thumbnail_path: Option<Option<PathBuf>>,
    pub tags: Option<BTreeSet<String>>,
    pub metadata: Option<serde_json::Value>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One directory node, either a watch root or a discovered descendant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,
    /// Absolute path; the natural key.
    pub path: PathBuf,
    pub name: String,
    pub parent_id: Option<FolderId>,
    pub is_watched: bool,
    pub last_scanned: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFolder {
    pub path: PathBuf,
    pub name: String,
    pub parent_id: Option<FolderId>,
    pub is_watched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub parent_id: Option<Option<FolderId>>,
    pub is_watched: Option<bool>,
    pub last_scanned: Option<Option<DateTime<Utc>>>,
}

/// The subset of filesystem metadata the indexer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Birth time, where the platform reports one.
    pub created: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

impl FileStat {
    pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        Ok(Self {
            size: metadata.len(),
            modified: DateTime::<Utc>::from(metadata.modified()?),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            is_dir: metadata.is_dir(),
        })
    }
}

/// Aggregate counters over the whole library.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub assets: usize,
    pub folders: usize,
    pub watched_folders: usize,
    pub total_bytes: u64,
    /// Asset count per filetype, keyed by extension (`.fbx`).
    pub by_type: std::collections::BTreeMap<String, usize>,
    pub watch_errors: u64,
}
