//! In-memory repository backend.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fnv::FnvHashMap;
use parking_lot::RwLock;

use super::Repository;
use crate::error::{IndexError, Result};
use crate::types::{
    Asset, AssetId, AssetPatch, Folder, FolderId, FolderPatch, NewAsset, NewFolder,
};

#[derive(Debug, Default)]
struct Inner {
    // Ids are handed out in increasing order, so BTreeMap order is insertion order.
    assets: BTreeMap<AssetId, Asset>,
    asset_paths: FnvHashMap<PathBuf, AssetId>,
    folders: BTreeMap<FolderId, Folder>,
    folder_paths: FnvHashMap<PathBuf, FolderId>,
    next_asset_id: u64,
    next_folder_id: u64,
}

/// Reference [`Repository`] backed by maps behind one lock.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_count(&self) -> usize {
        self.inner.read().assets.len()
    }

    pub fn folder_count(&self) -> usize {
        self.inner.read().folders.len()
    }
}

fn normalize_filetype(filetype: &str) -> String {
    let lowered = filetype.trim().to_ascii_lowercase();
    if lowered.is_empty() || lowered.starts_with('.') {
        lowered
    } else {
        format!(".{lowered}")
    }
}

fn asset_matches(asset: &Asset, needle: &str) -> bool {
    if asset.filename.to_lowercase().contains(needle) {
        return true;
    }
    if asset.tags.iter().any(|tag| tag.to_lowercase().contains(needle)) {
        return true;
    }
    asset.metadata.to_string().to_lowercase().contains(needle)
}

impl Repository for MemoryRepository {
    fn get_asset(&self, id: AssetId) -> Option<Asset> {
        self.inner.read().assets.get(&id).cloned()
    }

    fn list_assets(&self) -> Vec<Asset> {
        self.inner.read().assets.values().cloned().collect()
    }

    fn list_assets_in_folder(&self, folder: &Path) -> Vec<Asset> {
        self.inner
            .read()
            .assets
            .values()
            .filter(|asset| asset.filepath.starts_with(folder))
            .cloned()
            .collect()
    }

    fn list_assets_by_type(&self, filetype: &str) -> Vec<Asset> {
        let wanted = normalize_filetype(filetype);
        self.inner
            .read()
            .assets
            .values()
            .filter(|asset| asset.filetype == wanted)
            .cloned()
            .collect()
    }

    fn search_assets(&self, query: &str) -> Vec<Asset> {
        let needle = query.trim().to_lowercase();
        self.inner
            .read()
            .assets
            .values()
            .filter(|asset| needle.is_empty() || asset_matches(asset, &needle))
            .cloned()
            .collect()
    }

    fn get_asset_by_path(&self, path: &Path) -> Option<Asset> {
        let inner = self.inner.read();
        inner
            .asset_paths
            .get(path)
            .and_then(|id| inner.assets.get(id))
            .cloned()
    }

    fn create_asset(&self, asset: NewAsset) -> Result<Asset> {
        let mut inner = self.inner.write();
        if inner.asset_paths.contains_key(&asset.filepath) {
            return Err(IndexError::Conflict(asset.filepath));
        }
        inner.next_asset_id += 1;
        let id = AssetId(inner.next_asset_id);
        let record = Asset {
            id,
            filename: asset.filename,
            filepath: asset.filepath,
            filesize: asset.filesize,
            filetype: normalize_filetype(&asset.filetype),
            thumbnail_path: asset.thumbnail_path,
            tags: asset.tags,
            metadata: asset.metadata,
            last_modified: asset.last_modified,
            created_at: Utc::now(),
        };
        inner.asset_paths.insert(record.filepath.clone(), id);
        inner.assets.insert(id, record.clone());
        Ok(record)
    }

    fn update_asset(&self, id: AssetId, patch: AssetPatch) -> Result<Option<Asset>> {
        let mut inner = self.inner.write();
        let Some(asset) = inner.assets.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(filename) = patch.filename {
            asset.filename = filename;
        }
        if let Some(filesize) = patch.filesize {
            asset.filesize = filesize;
        }
        if let Some(filetype) = patch.filetype {
            asset.filetype = normalize_filetype(&filetype);
        }
        if let Some(thumbnail_path) = patch.thumbnail_path {
            asset.thumbnail_path = thumbnail_path;
        }
        if let Some(tags) = patch.tags {
            asset.tags = tags;
        }
        if let Some(metadata) = patch.metadata {
            asset.metadata = metadata;
        }
        if let Some(last_modified) = patch.last_modified {
            asset.last_modified = last_modified;
        }
        Ok(Some(asset.clone()))
    }

    fn delete_asset(&self, id: AssetId) -> bool {
        let mut inner = self.inner.write();
        match inner.assets.remove(&id) {
            Some(asset) => {
                inner.asset_paths.remove(&asset.filepath);
                true
            }
            None => false,
        }
    }

    fn get_folder(&self, id: FolderId) -> Option<Folder> {
        self.inner.read().folders.get(&id).cloned()
    }

    fn list_folders(&self) -> Vec<Folder> {
        self.inner.read().folders.values().cloned().collect()
    }

    fn get_folder_by_path(&self, path: &Path) -> Option<Folder> {
        let inner = self.inner.read();
        inner
            .folder_paths
            .get(path)
            .and_then(|id| inner.folders.get(id))
            .cloned()
    }

    fn list_child_folders(&self, parent: &Path) -> Vec<Folder> {
        self.inner
            .read()
            .folders
            .values()
            .filter(|folder| folder.path.parent() == Some(parent))
            .cloned()
            .collect()
    }

    fn create_folder(&self, folder: NewFolder) -> Result<Folder> {
        let mut inner = self.inner.write();
        if inner.folder_paths.contains_key(&folder.path) {
            return Err(IndexError::Conflict(folder.path));
        }
        inner.next_folder_id += 1;
        let id = FolderId(inner.next_folder_id);
        let record = Folder {
            id,
            path: folder.path,
            name: folder.name,
            parent_id: folder.parent_id,
            is_watched: folder.is_watched,
            last_scanned: None,
        };
        inner.folder_paths.insert(record.path.clone(), id);
        inner.folders.insert(id, record.clone());
        Ok(record)
    }

    fn update_folder(&self, id: FolderId, patch: FolderPatch) -> Result<Option<Folder>> {
        let mut inner = self.inner.write();
        let Some(folder) = inner.folders.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            folder.name = name;
        }
        if let Some(parent_id) = patch.parent_id {
            folder.parent_id = parent_id;
        }
        if let Some(is_watched) = patch.is_watched {
            folder.is_watched = is_watched;
        }
        if let Some(last_scanned) = patch.last_scanned {
            folder.last_scanned = last_scanned;
        }
        Ok(Some(folder.clone()))
    }

    fn delete_folder(&self, id: FolderId) -> bool {
        let mut inner = self.inner.write();
        match inner.folders.remove(&id) {
            Some(folder) => {
                inner.folder_paths.remove(&folder.path);
                true
            }
            None => false,
        }
    }
}
