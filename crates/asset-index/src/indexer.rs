//! Reconciliation of filesystem observations into asset records.
//!
//! Every write to an asset, whether it comes from a scan, a watcher event or
//! a delete, goes through [`AssetIndexer`] and runs under its write lane.
//! That keeps the read-decide-write sequence of an upsert atomic with
//! respect to every other writer.
//!
//! The acceptance rule for updates is the mtime guard: an existing record
//! is only refreshed when the observed modification time is strictly newer
//! than the stored one. Tags and metadata are never touched by an update,
//! since they may have been edited by hand.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use crate::error::Result;
use crate::policy::{filetype_of, is_supported_asset};
use crate::repository::Repository;
use crate::tags::infer_tags;
use crate::thumbnail::ThumbnailGenerator;
use crate::types::{Asset, AssetId, AssetPatch, FileStat, NewAsset};

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(AssetId),
    Updated(AssetId),
    /// The stored record is as new as the observation.
    Unchanged(AssetId),
    /// The path could not be indexed; the reason was logged.
    Skipped,
}

impl UpsertOutcome {
    pub fn asset_id(self) -> Option<AssetId> {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Unchanged(id) => Some(id),
            Self::Skipped => None,
        }
    }
}

pub struct AssetIndexer {
    repository: Arc<dyn Repository>,
    thumbnails: Arc<dyn ThumbnailGenerator>,
    write_lane: Mutex<()>,
}

impl std::fmt::Debug for AssetIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetIndexer")
            .field("repository", &"<repository>")
            .field("thumbnails", &"<thumbnails>")
            .finish()
    }
}

impl AssetIndexer {
    pub fn new(repository: Arc<dyn Repository>, thumbnails: Arc<dyn ThumbnailGenerator>) -> Self {
        Self {
            repository,
            thumbnails,
            write_lane: Mutex::new(()),
        }
    }

    /// Creates or refreshes the asset at `path` from `stat`.
    pub fn upsert(&self, path: &Path, stat: &FileStat) -> UpsertOutcome {
        let _lane = self.write_lane.lock();

        let Some(existing) = self.repository.get_asset_by_path(path) else {
            return self.create(path, stat);
        };

        if stat.modified <= existing.last_modified {
            return UpsertOutcome::Unchanged(existing.id);
        }

        let patch = AssetPatch {
            filesize: Some(stat.size),
            last_modified: Some(stat.modified),
            thumbnail_path: Some(self.thumbnails.generate(path)),
            ..AssetPatch::default()
        };
        match self.repository.update_asset(existing.id, patch) {
            Ok(Some(_)) => {
                log::debug!("asset updated id={} path={}", existing.id, path.display());
                UpsertOutcome::Updated(existing.id)
            }
            Ok(None) => {
                log::debug!("asset vanished during update: {}", path.display());
                UpsertOutcome::Skipped
            }
            Err(error) => {
                log::warn!("asset update failed for {}: {}", path.display(), error);
                UpsertOutcome::Skipped
            }
        }
    }

    /// Stats `path` and upserts it.
    ///
    /// Unsupported paths, directories and stat failures are skipped.
    pub fn upsert_path(&self, path: &Path) -> UpsertOutcome {
        if !is_supported_asset(path) {
            return UpsertOutcome::Skipped;
        }
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(error) => {
                log::warn!("skipping {}: {}", path.display(), error);
                return UpsertOutcome::Skipped;
            }
        };
        if metadata.is_dir() {
            log::debug!("skipping directory with asset extension: {}", path.display());
            return UpsertOutcome::Skipped;
        }
        match FileStat::from_metadata(&metadata) {
            Ok(stat) => self.upsert(path, &stat),
            Err(error) => {
                log::warn!("skipping {}: {}", path.display(), error);
                UpsertOutcome::Skipped
            }
        }
    }

    /// Deletes the asset indexed at `path`, if any.
    pub fn remove_path(&self, path: &Path) -> Option<AssetId> {
        let _lane = self.write_lane.lock();
        let asset = self.repository.get_asset_by_path(path)?;
        if self.repository.delete_asset(asset.id) {
            log::debug!("asset removed id={} path={}", asset.id, path.display());
            Some(asset.id)
        } else {
            None
        }
    }

    /// Applies a caller-supplied patch under the write lane.
    pub fn update(&self, id: AssetId, patch: AssetPatch) -> Result<Option<Asset>> {
        let _lane = self.write_lane.lock();
        self.repository.update_asset(id, patch)
    }

    /// Deletes asset `id` only when nothing exists at `path` any more.
    ///
    /// The path is checked without following symlinks, so a dangling link
    /// still counts as present.
    pub fn remove_if_missing(&self, id: AssetId, path: &Path) -> bool {
        let _lane = self.write_lane.lock();
        match fs::symlink_metadata(path) {
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                self.repository.delete_asset(id)
            }
            Ok(_) => false,
            Err(error) => {
                log::debug!("keeping {} after stat failure: {}", path.display(), error);
                false
            }
        }
    }

    /// Deletes the asset with `id` under the write lane.
    pub fn remove(&self, id: AssetId) -> bool {
        let _lane = self.write_lane.lock();
        self.repository.delete_asset(id)
    }

    fn create(&self, path: &Path, stat: &FileStat) -> UpsertOutcome {
        let Some(filename) = path.file_name().map(|name| name.to_string_lossy().into_owned())
        else {
            return UpsertOutcome::Skipped;
        };
        let filetype = filetype_of(path).unwrap_or_default();
        let metadata = estimated_metadata(path, &filetype);

        let asset = NewAsset {
            filename,
            filepath: path.to_path_buf(),
            filesize: stat.size,
            filetype,
            thumbnail_path: self.thumbnails.generate(path),
            tags: infer_tags(path),
            metadata,
            last_modified: stat.modified,
        };
        match self.repository.create_asset(asset) {
            Ok(created) => {
                log::debug!("asset created id={} path={}", created.id, path.display());
                UpsertOutcome::Created(created.id)
            }
            Err(error) => {
                log::warn!("asset create failed for {}: {}", path.display(), error);
                UpsertOutcome::Skipped
            }
        }
    }
}

/// Metadata inferred from the path alone; file contents are never parsed.
fn estimated_metadata(path: &Path, filetype: &str) -> serde_json::Value {
    let directory = path
        .parent()
        .map(|parent| parent.to_string_lossy().into_owned())
        .unwrap_or_default();
    json!({
        "directory": directory,
        "extension": filetype,
        "format": format_name(filetype),
        "estimated": true,
    })
}

fn format_name(filetype: &str) -> &'static str {
    match filetype {
        ".obj" => "Wavefront OBJ",
        ".fbx" => "Autodesk FBX",
        ".gltf" | ".glb" => "glTF",
        ".usd" | ".usda" | ".usdc" | ".usdz" => "Universal Scene Description",
        ".blend" => "Blender",
        ".ma" | ".mb" => "Autodesk Maya",
        ".hip" | ".hiplc" | ".hipnc" => "Houdini",
        ".uasset" => "Unreal Asset",
        ".max" => "3ds Max",
        ".c4d" => "Cinema 4D",
        ".3ds" => "3D Studio",
        ".dae" => "COLLADA",
        ".abc" => "Alembic",
        ".stl" => "STL",
        ".ply" => "PLY",
        _ => "Unknown",
    }
}
