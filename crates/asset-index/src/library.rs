//! AssetLibrary: the public entry point tying repository, indexer, scanner
//! and watchers together.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::RecommendedWatcher;
use parking_lot::{Mutex, RwLock};

use crate::config::LibraryConfig;
use crate::error::{normalize_root_path, IndexError, Result};
use crate::indexer::AssetIndexer;
use crate::repository::{MemoryRepository, Repository, SharedRepository};
use crate::scanner::{RootMode, ScanReport, Scanner};
use crate::thumbnail::{NoThumbnails, PlaceholderThumbnails, ThumbnailGenerator};
use crate::types::{Asset, AssetId, AssetPatch, Folder, FolderId, FolderPatch, LibraryStats};
use crate::watcher::{apply_change, create_root_watcher, WatchId, WatchMessage};

/// A live subscription for one root.
struct RootWatch {
    id: WatchId,
    watcher: RecommendedWatcher,
}

/// State shared with the event loop thread.
#[derive(Default)]
struct WatchState {
    /// Ids whose events may still be applied. Retiring an id takes the write
    /// guard, which waits for the event currently being applied.
    active: RwLock<HashSet<WatchId>>,
    watch_errors: AtomicU64,
}

pub struct AssetLibrary {
    repository: SharedRepository,
    indexer: Arc<AssetIndexer>,
    scanner: Scanner,
    watch_lane: Mutex<()>,
    watches: Mutex<HashMap<PathBuf, RootWatch>>,
    state: Arc<WatchState>,
    next_watch_id: AtomicU64,
    event_tx: Sender<WatchMessage>,
    event_loop: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for AssetLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLibrary")
            .field("watched", &self.list_watched_folders())
            .field("indexer", &self.indexer)
            .finish()
    }
}

impl AssetLibrary {
    /// Builds an in-memory library from `config`.
    ///
    /// The thumbnail directory is created on first use; if that fails,
    /// assets are indexed without thumbnails.
    pub fn new(config: &LibraryConfig) -> Result<Self> {
        let thumbnails: Arc<dyn ThumbnailGenerator> = if config.thumbnails_enabled {
            Arc::new(PlaceholderThumbnails::new(config.thumbnail_dir.clone()))
        } else {
            Arc::new(NoThumbnails)
        };
        Ok(Self::with_parts(Arc::new(MemoryRepository::new()), thumbnails))
    }

    pub fn with_parts(
        repository: SharedRepository,
        thumbnails: Arc<dyn ThumbnailGenerator>,
    ) -> Self {
        let indexer = Arc::new(AssetIndexer::new(repository.clone(), thumbnails));
        let scanner = Scanner::new(repository.clone(), indexer.clone());
        let state = Arc::new(WatchState::default());
        let (event_tx, event_rx) = unbounded();

        let loop_indexer = indexer.clone();
        let loop_state = state.clone();
        let event_loop =
            thread::spawn(move || run_event_loop(event_rx, &loop_indexer, &loop_state));

        Self {
            repository,
            indexer,
            scanner,
            watch_lane: Mutex::new(()),
            watches: Mutex::new(HashMap::new()),
            state,
            next_watch_id: AtomicU64::new(1),
            event_tx,
            event_loop: Some(event_loop),
        }
    }

    pub fn repository(&self) -> &SharedRepository {
        &self.repository
    }

    /// Walks `path` once and returns the number of asset files seen.
    ///
    /// Assets under `path` whose files no longer exist are removed.
    pub fn scan_folder(&self, path: &Path) -> Result<usize> {
        self.scan_folder_report(path).map(|report| report.assets_seen)
    }

    pub fn scan_folder_report(&self, path: &Path) -> Result<ScanReport> {
        let root = normalize_root_path(path)?;
        let mut report = self.scanner.scan(&root, RootMode::Scan)?;
        self.scanner.prune_missing(&mut report);
        Ok(report)
    }

    /// Registers `path` as a watch root and brings its assets up to date.
    ///
    /// Watching an already watched root does nothing. A root that does not
    /// exist is still recorded as a folder, but the call fails with
    /// [`IndexError::WatchUnavailable`] and can be retried later.
    pub fn add_watch_folder(&self, path: &Path) -> Result<()> {
        let root = normalize_root_path(path)?;
        let _lane = self.watch_lane.lock();
        if self.watches.lock().contains_key(&root) {
            log::debug!("already watching {}", root.display());
            return Ok(());
        }

        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        // Active before the subscription exists so no early event is dropped.
        self.state.active.write().insert(watch_id);
        let watcher = match create_root_watcher(watch_id, &root, self.event_tx.clone()) {
            Ok(watcher) => watcher,
            Err(error) => {
                self.state.active.write().remove(&watch_id);
                self.record_unwatched_root(&root)?;
                log::warn!("{error}");
                return Err(error);
            }
        };

        let mut report = match self.scanner.scan(&root, RootMode::Watch) {
            Ok(report) => report,
            Err(error) => {
                drop(watcher);
                self.state.active.write().remove(&watch_id);
                return Err(error);
            }
        };
        self.scanner.prune_missing(&mut report);

        self.watches.lock().insert(
            root.clone(),
            RootWatch {
                id: watch_id,
                watcher,
            },
        );
        log::info!(
            "watching {} (watch_id={} assets={})",
            root.display(),
            watch_id,
            report.assets_seen
        );
        Ok(())
    }

    /// Stops watching `path`. Assets and folders are kept.
    ///
    /// Removing a root that is not watched is a no-op.
    pub fn remove_watch_folder(&self, path: &Path) -> Result<()> {
        let root = normalize_root_path(path)?;
        let _lane = self.watch_lane.lock();
        let Some(watch) = self.watches.lock().remove(&root) else {
            return Ok(());
        };

        drop(watch.watcher);
        // Waits for an in-flight event of this watch to finish applying.
        self.state.active.write().remove(&watch.id);

        if let Some(folder) = self.repository.get_folder_by_path(&root) {
            self.repository.update_folder(
                folder.id,
                FolderPatch {
                    is_watched: Some(false),
                    ..FolderPatch::default()
                },
            )?;
        }
        log::info!("stopped watching {} (watch_id={})", root.display(), watch.id);
        Ok(())
    }

    /// Currently watched roots, sorted.
    pub fn list_watched_folders(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.watches.lock().keys().cloned().collect();
        roots.sort();
        roots
    }

    pub fn get_asset(&self, id: AssetId) -> Option<Asset> {
        self.repository.get_asset(id)
    }

    pub fn list_assets(&self) -> Vec<Asset> {
        self.repository.list_assets()
    }

    pub fn list_assets_in_folder(&self, folder: &Path) -> Vec<Asset> {
        self.repository.list_assets_in_folder(folder)
    }

    pub fn list_assets_by_type(&self, filetype: &str) -> Vec<Asset> {
        self.repository.list_assets_by_type(filetype)
    }

    pub fn search_assets(&self, query: &str) -> Vec<Asset> {
        self.repository.search_assets(query)
    }

    pub fn get_asset_by_path(&self, path: &Path) -> Option<Asset> {
        self.repository.get_asset_by_path(path)
    }

    pub fn get_folder(&self, id: FolderId) -> Option<Folder> {
        self.repository.get_folder(id)
    }

    pub fn list_folders(&self) -> Vec<Folder> {
        self.repository.list_folders()
    }

    pub fn get_folder_by_path(&self, path: &Path) -> Option<Folder> {
        self.repository.get_folder_by_path(path)
    }

    pub fn list_child_folders(&self, parent: &Path) -> Vec<Folder> {
        self.repository.list_child_folders(parent)
    }

    pub fn update_asset(&self, id: AssetId, patch: AssetPatch) -> Result<Option<Asset>> {
        self.indexer.update(id, patch)
    }

    pub fn delete_asset(&self, id: AssetId) -> bool {
        self.indexer.remove(id)
    }

    /// Opens the file backing asset `id` for reading.
    pub fn open_asset(&self, id: AssetId) -> Result<File> {
        let asset = self
            .repository
            .get_asset(id)
            .ok_or_else(|| IndexError::NotFound(format!("asset {id}")))?;
        Ok(File::open(&asset.filepath)?)
    }

    pub fn stats(&self) -> LibraryStats {
        let mut stats = LibraryStats {
            watch_errors: self.state.watch_errors.load(Ordering::Relaxed),
            ..LibraryStats::default()
        };
        for asset in self.repository.list_assets() {
            stats.assets += 1;
            stats.total_bytes += asset.filesize;
            *stats.by_type.entry(asset.filetype).or_default() += 1;
        }
        for folder in self.repository.list_folders() {
            stats.folders += 1;
            if folder.is_watched {
                stats.watched_folders += 1;
            }
        }
        stats
    }

    /// Keeps a root that could not be watched as an unwatched folder.
    fn record_unwatched_root(&self, root: &Path) -> Result<()> {
        self.scanner.scan(root, RootMode::Scan)?;
        if let Some(folder) = self
            .repository
            .get_folder_by_path(root)
            .filter(|folder| folder.is_watched)
        {
            self.repository.update_folder(
                folder.id,
                FolderPatch {
                    is_watched: Some(false),
                    ..FolderPatch::default()
                },
            )?;
        }
        Ok(())
    }
}

impl Drop for AssetLibrary {
    fn drop(&mut self) {
        self.watches.lock().clear();
        let _ = self.event_tx.send(WatchMessage::Shutdown);
        if let Some(handle) = self.event_loop.take() {
            if handle.join().is_err() {
                log::warn!("asset event loop panicked");
            }
        }
    }
}

/// Sole consumer of watcher messages; applies changes one at a time.
fn run_event_loop(event_rx: Receiver<WatchMessage>, indexer: &AssetIndexer, state: &WatchState) {
    for message in event_rx.iter() {
        match message {
            WatchMessage::Shutdown => break,
            WatchMessage::Change { watch_id, event } => {
                let active = state.active.read();
                if !active.contains(&watch_id) {
                    log::debug!("dropping event for retired watch {watch_id}: {event:?}");
                    continue;
                }
                apply_change(indexer, &event);
            }
            WatchMessage::Error { watch_id, message } => {
                if !state.active.read().contains(&watch_id) {
                    continue;
                }
                state.watch_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("watch {watch_id} reported an error: {message}");
            }
        }
    }
    log::debug!("asset event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::ChangeEvent;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn library() -> AssetLibrary {
        AssetLibrary::with_parts(Arc::new(MemoryRepository::new()), Arc::new(NoThumbnails))
    }

    fn fixture() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir_all(root.join("Props")).unwrap();
        fs::write(root.join("Props/barrel.obj"), b"v 0 0 0\n").unwrap();
        fs::write(root.join("tree.fbx"), b"fbx").unwrap();
        (temp, root)
    }

    #[test]
    fn scan_folder_counts_assets_and_prunes_within_root() {
        let library = library();
        let (_temp, root) = fixture();

        assert_eq!(library.scan_folder(&root).unwrap(), 2);
        fs::remove_file(root.join("tree.fbx")).unwrap();

        let report = library.scan_folder_report(&root).unwrap();
        assert_eq!(report.assets_seen, 1);
        assert_eq!(report.pruned, 1);
        assert_eq!(library.list_assets().len(), 1);
    }

    #[test]
    fn empty_path_is_rejected_everywhere() {
        let library = library();
        for result in [
            library.scan_folder(Path::new("")).map(|_| ()),
            library.add_watch_folder(Path::new("")),
            library.remove_watch_folder(Path::new("")),
        ] {
            assert!(matches!(result, Err(IndexError::InvalidInput(_))));
        }
        assert!(library.list_folders().is_empty());
    }

    #[test]
    fn watching_a_missing_root_records_an_unwatched_folder() {
        let library = library();
        let temp = TempDir::new().unwrap();
        let missing = fs::canonicalize(temp.path()).unwrap().join("later");

        let error = library.add_watch_folder(&missing).unwrap_err();
        assert!(matches!(error, IndexError::WatchUnavailable { .. }));

        let folder = library.get_folder_by_path(&missing).unwrap();
        assert!(!folder.is_watched);
        assert!(library.list_watched_folders().is_empty());
    }

    #[test]
    fn add_and_remove_watch_toggle_the_flag_only() {
        let library = library();
        let (_temp, root) = fixture();

        library.add_watch_folder(&root).unwrap();
        library.add_watch_folder(&root).unwrap();
        assert_eq!(library.list_watched_folders(), vec![root.clone()]);
        assert!(library.get_folder_by_path(&root).unwrap().is_watched);
        assert_eq!(library.list_assets().len(), 2);

        library.remove_watch_folder(&root).unwrap();
        library.remove_watch_folder(&root).unwrap();
        assert!(library.list_watched_folders().is_empty());
        assert!(!library.get_folder_by_path(&root).unwrap().is_watched);
        assert_eq!(library.list_assets().len(), 2);
        assert!(library.get_folder_by_path(&root.join("Props")).is_some());
    }

    #[test]
    fn events_for_retired_watches_are_dropped() {
        let repo = Arc::new(MemoryRepository::new());
        let indexer = AssetIndexer::new(repo.clone(), Arc::new(NoThumbnails));
        let state = WatchState::default();
        state.active.write().insert(2);
        let (_temp, root) = fixture();
        let (tx, rx) = unbounded();

        for (watch_id, name) in [(1, "tree.fbx"), (2, "Props/barrel.obj")] {
            tx.send(WatchMessage::Change {
                watch_id,
                event: ChangeEvent::CreateOrModify(root.join(name)),
            })
            .unwrap();
        }
        tx.send(WatchMessage::Error {
            watch_id: 1,
            message: "stale".to_string(),
        })
        .unwrap();
        tx.send(WatchMessage::Error {
            watch_id: 2,
            message: "overflow".to_string(),
        })
        .unwrap();
        tx.send(WatchMessage::Shutdown).unwrap();

        run_event_loop(rx, &indexer, &state);

        assert!(repo.get_asset_by_path(&root.join("tree.fbx")).is_none());
        assert!(repo
            .get_asset_by_path(&root.join("Props/barrel.obj"))
            .is_some());
        assert_eq!(state.watch_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn update_delete_and_open_go_through_the_library() {
        let library = library();
        let (_temp, root) = fixture();
        library.scan_folder(&root).unwrap();
        let barrel = library
            .get_asset_by_path(&root.join("Props/barrel.obj"))
            .unwrap();

        let mut contents = String::new();
        library
            .open_asset(barrel.id)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "v 0 0 0\n");

        let patched = library
            .update_asset(
                barrel.id,
                AssetPatch {
                    tags: Some(["hero".to_string()].into()),
                    ..AssetPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert!(patched.tags.contains("hero"));

        assert!(library.delete_asset(barrel.id));
        assert!(!library.delete_asset(barrel.id));
        assert!(matches!(
            library.open_asset(barrel.id),
            Err(IndexError::NotFound(_))
        ));
    }

    #[test]
    fn stats_summarize_the_index() {
        let library = library();
        let (_temp, root) = fixture();
        library.add_watch_folder(&root).unwrap();

        let stats = library.stats();
        assert_eq!(stats.assets, 2);
        assert_eq!(stats.folders, 2);
        assert_eq!(stats.watched_folders, 1);
        assert_eq!(stats.total_bytes, 8 + 3);
        assert_eq!(stats.by_type.get(".obj"), Some(&1));
        assert_eq!(stats.by_type.get(".fbx"), Some(&1));
        assert_eq!(stats.watch_errors, 0);
    }

    #[test]
    fn uncreatable_thumbnail_dir_degrades_to_no_thumbnails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let config = LibraryConfig {
            thumbnail_dir: blocker.join("thumbs"),
            ..LibraryConfig::default()
        };

        let library = AssetLibrary::new(&config).unwrap();
        let (_fixture, root) = fixture();
        assert_eq!(library.scan_folder(&root).unwrap(), 2);
        assert!(library
            .list_assets()
            .iter()
            .all(|asset| asset.thumbnail_path.is_none()));
    }

    #[test]
    fn thumbnails_land_in_the_configured_dir() {
        let temp = TempDir::new().unwrap();
        let config = LibraryConfig {
            thumbnail_dir: temp.path().join("thumbs"),
            ..LibraryConfig::default()
        };

        let library = AssetLibrary::new(&config).unwrap();
        assert!(!config.thumbnail_dir.exists());
        let (_fixture, root) = fixture();
        library.scan_folder(&root).unwrap();

        let tree = library.get_asset_by_path(&root.join("tree.fbx")).unwrap();
        assert_eq!(
            tree.thumbnail_path,
            Some(config.thumbnail_dir.join("tree.fbx.svg"))
        );
    }

    #[test]
    fn new_respects_disabled_thumbnails() {
        let temp = TempDir::new().unwrap();
        let config = LibraryConfig {
            thumbnails_enabled: false,
            thumbnail_dir: temp.path().join("thumbs"),
            ..LibraryConfig::default()
        };
        let library = AssetLibrary::new(&config).unwrap();
        let (_fixture, root) = fixture();
        library.scan_folder(&root).unwrap();

        assert!(library
            .list_assets()
            .iter()
            .all(|asset| asset.thumbnail_path.is_none()));
        assert!(!config.thumbnail_dir.exists());
    }
}
