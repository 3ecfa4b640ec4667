//! Record storage for assets and folders.
//!
//! The [`Repository`] trait is the only way the rest of the crate reaches
//! records. [`MemoryRepository`] is the reference backend; a durable store
//! can sit behind the same trait as long as it keeps paths unique.

mod memory;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{
    Asset, AssetId, AssetPatch, Folder, FolderId, FolderPatch, NewAsset, NewFolder,
};

pub use memory::MemoryRepository;

/// Asset and folder storage keyed by id, with a unique index on path.
pub trait Repository: Send + Sync {
    fn get_asset(&self, id: AssetId) -> Option<Asset>;
    /// All assets in insertion order.
    fn list_assets(&self) -> Vec<Asset>;
    /// Assets whose path lies under `folder`, compared component-wise.
    fn list_assets_in_folder(&self, folder: &Path) -> Vec<Asset>;
    /// Assets of one filetype; case-insensitive, leading dot optional.
    fn list_assets_by_type(&self, filetype: &str) -> Vec<Asset>;
    /// Case-insensitive substring match on filename, tags or metadata.
    fn search_assets(&self, query: &str) -> Vec<Asset>;
    fn get_asset_by_path(&self, path: &Path) -> Option<Asset>;
    /// Fails with [`crate::IndexError::Conflict`] if the path is already indexed.
    fn create_asset(&self, asset: NewAsset) -> Result<Asset>;
    /// Returns `Ok(None)` when no asset has this id.
    fn update_asset(&self, id: AssetId, patch: AssetPatch) -> Result<Option<Asset>>;
    fn delete_asset(&self, id: AssetId) -> bool;

    fn get_folder(&self, id: FolderId) -> Option<Folder>;
    fn list_folders(&self) -> Vec<Folder>;
    fn get_folder_by_path(&self, path: &Path) -> Option<Folder>;
    /// Folders whose direct parent is `parent`; never grandchildren.
    fn list_child_folders(&self, parent: &Path) -> Vec<Folder>;
    fn create_folder(&self, folder: NewFolder) -> Result<Folder>;
    fn update_folder(&self, id: FolderId, patch: FolderPatch) -> Result<Option<Folder>>;
    fn delete_folder(&self, id: FolderId) -> bool;
}

pub type SharedRepository = Arc<dyn Repository>;
