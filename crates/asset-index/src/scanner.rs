//! One full pass over a root: folders are materialized as they are
//! discovered and every asset file is routed through the indexer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::error::{IndexError, Result};
use crate::indexer::{AssetIndexer, UpsertOutcome};
use crate::repository::Repository;
use crate::types::{Folder, FolderPatch, NewFolder};
use crate::walker::{EntryKind, Walk};

/// How the root folder record is treated by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootMode {
    /// The root is being registered as a watch root.
    Watch,
    /// One-off scan; an existing watch flag is left as it is.
    Scan,
}

/// Counters from one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub root: PathBuf,
    pub folders_created: usize,
    pub assets_seen: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Assets under the root deleted because their file is gone.
    pub pruned: usize,
    /// Every asset path the walk yielded.
    pub seen: HashSet<PathBuf>,
    /// Entries the walk could not read; nothing below them is pruned.
    pub unreadable: Vec<PathBuf>,
}

#[derive(Clone)]
pub struct Scanner {
    repository: Arc<dyn Repository>,
    indexer: Arc<AssetIndexer>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("indexer", &self.indexer)
            .finish()
    }
}

impl Scanner {
    pub fn new(repository: Arc<dyn Repository>, indexer: Arc<AssetIndexer>) -> Self {
        Self {
            repository,
            indexer,
        }
    }

    /// Walks `root` once, creating folders and upserting assets.
    ///
    /// `root` must already be normalized. A missing root still gets its
    /// folder record and yields an empty report.
    pub fn scan(&self, root: &Path, mode: RootMode) -> Result<ScanReport> {
        let started = Instant::now();
        let mut report = ScanReport {
            root: root.to_path_buf(),
            ..ScanReport::default()
        };

        let root_folder = self.ensure_root(root, mode, &mut report)?;

        for item in Walk::new(root) {
            let entry = match item {
                Ok(entry) => entry,
                Err(error) => {
                    report.errors += 1;
                    if let IndexError::Access { path, .. } = &error {
                        report.unreadable.push(path.clone());
                    }
                    log::warn!("scan of {} skipped an entry: {}", root.display(), error);
                    continue;
                }
            };

            match entry.kind {
                EntryKind::Directory => {
                    if let Err(error) = self.ensure_folder(&entry.path, &root_folder, &mut report) {
                        report.errors += 1;
                        log::warn!("folder record failed for {}: {}", entry.path.display(), error);
                    }
                }
                EntryKind::File => {
                    report.assets_seen += 1;
                    match self.indexer.upsert(&entry.path, &entry.stat) {
                        UpsertOutcome::Created(_) => report.created += 1,
                        UpsertOutcome::Updated(_) => report.updated += 1,
                        UpsertOutcome::Unchanged(_) => report.unchanged += 1,
                        UpsertOutcome::Skipped => report.skipped += 1,
                    }
                    report.seen.insert(entry.path);
                }
            }
        }

        self.repository.update_folder(
            root_folder.id,
            FolderPatch {
                last_scanned: Some(Some(Utc::now())),
                ..FolderPatch::default()
            },
        )?;

        log::info!(
            "scan root={} folders_created={} assets={} created={} updated={} unchanged={} errors={} elapsed_ms={}",
            root.display(),
            report.folders_created,
            report.assets_seen,
            report.created,
            report.updated,
            report.unchanged,
            report.errors,
            started.elapsed().as_millis(),
        );
        Ok(report)
    }

    /// Deletes assets under the scanned root whose backing file is gone.
    ///
    /// An asset the walk did not yield may still exist: it can sit in an
    /// ignored directory or below the depth bound and belong to another
    /// root, or the watcher may have indexed it after the walk passed. Only
    /// a path that no longer exists on disk is removed, and nothing below an
    /// unreadable entry is touched. Assets outside the root are never
    /// considered.
    pub fn prune_missing(&self, report: &mut ScanReport) {
        for asset in self.repository.list_assets_in_folder(&report.root) {
            if report.seen.contains(&asset.filepath)
                || report
                    .unreadable
                    .iter()
                    .any(|entry| asset.filepath.starts_with(entry))
            {
                continue;
            }
            if self.indexer.remove_if_missing(asset.id, &asset.filepath) {
                report.pruned += 1;
            }
        }
        if report.pruned > 0 {
            log::info!(
                "pruned {} stale assets under {}",
                report.pruned,
                report.root.display()
            );
        }
    }

    fn ensure_root(&self, root: &Path, mode: RootMode, report: &mut ScanReport) -> Result<Folder> {
        let watched = mode == RootMode::Watch;
        if let Some(existing) = self.repository.get_folder_by_path(root) {
            if watched && !existing.is_watched {
                let patch = FolderPatch {
                    is_watched: Some(true),
                    ..FolderPatch::default()
                };
                if let Some(updated) = self.repository.update_folder(existing.id, patch)? {
                    return Ok(updated);
                }
            }
            return Ok(existing);
        }

        let folder = self.repository.create_folder(NewFolder {
            path: root.to_path_buf(),
            name: folder_name(root),
            parent_id: None,
            is_watched: watched,
        })?;
        report.folders_created += 1;
        Ok(folder)
    }

    /// Ensures a folder row for `path`, creating missing ancestors up to
    /// `root` first so `parent_id` is always the direct parent.
    fn ensure_folder(&self, path: &Path, root: &Folder, report: &mut ScanReport) -> Result<Folder> {
        if let Some(existing) = self.repository.get_folder_by_path(path) {
            return Ok(existing);
        }
        let parent_id = match path.parent() {
            Some(parent) if parent == root.path => root.id,
            Some(parent) if parent.starts_with(&root.path) => {
                self.ensure_folder(parent, root, report)?.id
            }
            _ => {
                log::warn!(
                    "folder {} is outside scan root {}; attaching to the root",
                    path.display(),
                    root.path.display()
                );
                root.id
            }
        };

        let folder = self.repository.create_folder(NewFolder {
            path: path.to_path_buf(),
            name: folder_name(path),
            parent_id: Some(parent_id),
            is_watched: false,
        })?;
        report.folders_created += 1;
        Ok(folder)
    }
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use crate::thumbnail::NoThumbnails;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn scanner() -> (Arc<MemoryRepository>, Scanner) {
        let repo = Arc::new(MemoryRepository::new());
        let indexer = Arc::new(AssetIndexer::new(repo.clone(), Arc::new(NoThumbnails)));
        let scanner = Scanner::new(repo.clone(), indexer);
        (repo, scanner)
    }

    fn fixture() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap().join("lib");
        fs::create_dir_all(root.join("Characters/hero")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        File::create(root.join("Characters/hero_lowpoly_v2.fbx")).unwrap();
        File::create(root.join("Characters/hero/hero.blend")).unwrap();
        File::create(root.join("Characters/readme.md")).unwrap();
        File::create(root.join("crate.obj")).unwrap();
        (temp, root)
    }

    #[test]
    fn scan_creates_folders_with_parent_links() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();

        let report = scanner.scan(&root, RootMode::Scan).unwrap();
        assert_eq!(report.folders_created, 4);

        let root_folder = repo.get_folder_by_path(&root).unwrap();
        assert_eq!(root_folder.parent_id, None);
        assert!(!root_folder.is_watched);
        assert!(root_folder.last_scanned.is_some());

        let characters = repo.get_folder_by_path(&root.join("Characters")).unwrap();
        let hero = repo
            .get_folder_by_path(&root.join("Characters/hero"))
            .unwrap();
        let empty = repo.get_folder_by_path(&root.join("empty")).unwrap();
        assert_eq!(characters.parent_id, Some(root_folder.id));
        assert_eq!(hero.parent_id, Some(characters.id));
        assert_eq!(hero.name, "hero");
        assert_eq!(empty.parent_id, Some(root_folder.id));
    }

    #[test]
    fn scan_indexes_one_asset_per_supported_file() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();

        let report = scanner.scan(&root, RootMode::Scan).unwrap();
        assert_eq!(report.assets_seen, 3);
        assert_eq!(report.created, 3);
        assert_eq!(repo.asset_count(), 3);

        let hero = repo
            .get_asset_by_path(&root.join("Characters/hero_lowpoly_v2.fbx"))
            .unwrap();
        assert_eq!(hero.filetype, ".fbx");
        for tag in ["fbx", "character", "lowpoly", "versioned"] {
            assert!(hero.tags.contains(tag), "missing tag {tag}");
        }
    }

    #[test]
    fn rescan_of_unchanged_tree_is_idempotent() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();

        scanner.scan(&root, RootMode::Scan).unwrap();
        let first = repo.list_assets();
        let folders = repo.list_folders();

        let report = scanner.scan(&root, RootMode::Scan).unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.unchanged, 3);
        assert_eq!(report.folders_created, 0);
        assert_eq!(repo.list_assets(), first);
        assert_eq!(repo.list_folders().len(), folders.len());
    }

    #[test]
    fn watch_mode_marks_root_watched() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();

        scanner.scan(&root, RootMode::Scan).unwrap();
        assert!(!repo.get_folder_by_path(&root).unwrap().is_watched);

        scanner.scan(&root, RootMode::Watch).unwrap();
        assert!(repo.get_folder_by_path(&root).unwrap().is_watched);

        // A plain scan leaves the flag alone.
        scanner.scan(&root, RootMode::Scan).unwrap();
        assert!(repo.get_folder_by_path(&root).unwrap().is_watched);
    }

    #[test]
    fn missing_root_is_tracked_with_no_assets() {
        let (repo, scanner) = scanner();
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("later");

        let report = scanner.scan(&missing, RootMode::Watch).unwrap();
        assert_eq!(report.assets_seen, 0);
        assert_eq!(report.errors, 0);
        assert!(repo.get_folder_by_path(&missing).is_some());
    }

    #[test]
    fn prune_removes_only_deleted_assets_under_root() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();
        let other = root.parent().unwrap().join("other");
        fs::create_dir_all(&other).unwrap();
        File::create(other.join("keep.obj")).unwrap();

        scanner.scan(&root, RootMode::Scan).unwrap();
        scanner.scan(&other, RootMode::Scan).unwrap();
        assert_eq!(repo.asset_count(), 4);

        fs::remove_file(root.join("crate.obj")).unwrap();
        let mut report = scanner.scan(&root, RootMode::Scan).unwrap();
        scanner.prune_missing(&mut report);

        assert_eq!(report.pruned, 1);
        assert!(repo.get_asset_by_path(&root.join("crate.obj")).is_none());
        assert!(repo.get_asset_by_path(&other.join("keep.obj")).is_some());
        assert_eq!(repo.asset_count(), 3);
    }

    #[test]
    fn prune_keeps_assets_of_a_root_inside_a_skipped_directory() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();
        let build = root.join("build");
        fs::create_dir_all(&build).unwrap();
        File::create(build.join("tank.fbx")).unwrap();

        scanner.scan(&build, RootMode::Watch).unwrap();
        assert!(repo.get_asset_by_path(&build.join("tank.fbx")).is_some());

        let mut report = scanner.scan(&root, RootMode::Scan).unwrap();
        assert!(!report.seen.contains(&build.join("tank.fbx")));
        scanner.prune_missing(&mut report);

        assert_eq!(report.pruned, 0);
        assert!(repo.get_asset_by_path(&build.join("tank.fbx")).is_some());
    }

    #[test]
    fn prune_keeps_files_below_the_depth_bound() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();
        let deep_dir = (0..12).fold(root.clone(), |dir, level| dir.join(format!("d{level}")));
        fs::create_dir_all(&deep_dir).unwrap();
        let deep = deep_dir.join("deep.obj");
        File::create(&deep).unwrap();

        // Indexed the way a watcher event would, with no depth bound.
        assert!(scanner.indexer.upsert_path(&deep).asset_id().is_some());

        let mut report = scanner.scan(&root, RootMode::Scan).unwrap();
        assert!(!report.seen.contains(&deep));
        scanner.prune_missing(&mut report);

        assert_eq!(report.pruned, 0);
        assert!(repo.get_asset_by_path(&deep).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_entry_is_counted_and_siblings_still_indexed() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();
        let broken = root.join("broken.obj");
        std::os::unix::fs::symlink(root.join("nowhere.obj"), &broken).unwrap();

        let report = scanner.scan(&root, RootMode::Scan).unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.unreadable, vec![broken.clone()]);
        assert_eq!(report.assets_seen, 3);
        assert!(repo.get_asset_by_path(&root.join("crate.obj")).is_some());
        assert!(repo.get_asset_by_path(&broken).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_entry_is_not_pruned() {
        let (repo, scanner) = scanner();
        let (_temp, root) = fixture();
        let target = root.parent().unwrap().join("target.obj");
        File::create(&target).unwrap();
        let link = root.join("linked.obj");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        scanner.scan(&root, RootMode::Scan).unwrap();
        assert!(repo.get_asset_by_path(&link).is_some());

        fs::remove_file(&target).unwrap();
        let mut report = scanner.scan(&root, RootMode::Scan).unwrap();
        assert_eq!(report.errors, 1);
        scanner.prune_missing(&mut report);

        assert_eq!(report.pruned, 0);
        assert!(repo.get_asset_by_path(&link).is_some());
    }

    #[test]
    fn missing_ancestors_are_created_with_direct_parents() {
        let (repo, scanner) = scanner();
        let root = PathBuf::from("/lib");
        let mut report = ScanReport::default();
        let root_folder = scanner
            .ensure_root(&root, RootMode::Scan, &mut report)
            .unwrap();

        let leaf = scanner
            .ensure_folder(&root.join("a/b/c"), &root_folder, &mut report)
            .unwrap();

        let a = repo.get_folder_by_path(&root.join("a")).unwrap();
        let b = repo.get_folder_by_path(&root.join("a/b")).unwrap();
        assert_eq!(a.parent_id, Some(root_folder.id));
        assert_eq!(b.parent_id, Some(a.id));
        assert_eq!(leaf.parent_id, Some(b.id));
        assert_eq!(report.folders_created, 4);
    }
}
