//! Index of 3D asset files kept in sync with watched directory trees.
//!
//! This crate provides:
//! - Path policy deciding which files are assets and which directories are skipped
//! - A bounded, restartable directory walker
//! - Scan and watch pipelines feeding a single-writer indexer
//! - Tag inference and placeholder thumbnails for new assets
//! - An in-memory repository behind a pluggable trait

pub mod config;
pub mod error;
pub mod indexer;
pub mod library;
pub mod policy;
pub mod repository;
pub mod scanner;
pub mod tags;
pub mod thumbnail;
pub mod types;
pub mod walker;
pub mod watcher;

// Re-export main types
pub use config::{config_path_from_env, LibraryConfig};
pub use error::{IndexError, Result};
pub use indexer::{AssetIndexer, UpsertOutcome};
pub use library::AssetLibrary;
pub use repository::{MemoryRepository, Repository, SharedRepository};
pub use scanner::{RootMode, ScanReport, Scanner};
pub use tags::infer_tags;
pub use thumbnail::{NoThumbnails, PlaceholderThumbnails, ThumbnailGenerator};
pub use types::{
    Asset, AssetId, AssetPatch, FileStat, Folder, FolderId, FolderPatch, LibraryStats, NewAsset,
    NewFolder,
};
pub use walker::{EntryKind, Walk, WalkEntry};
pub use watcher::ChangeEvent;
