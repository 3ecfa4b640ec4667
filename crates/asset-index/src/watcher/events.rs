//! notify integration and event application.

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{IndexError, Result};
use crate::indexer::{AssetIndexer, UpsertOutcome};
use crate::policy::{is_ignored_path, is_supported_asset};

/// Identifies one subscription. A root that is unwatched and watched again
/// gets a fresh id, so stale events can be told apart.
pub type WatchId = u64;

/// A filesystem change relevant to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    CreateOrModify(PathBuf),
    Delete(PathBuf),
}

impl ChangeEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::CreateOrModify(path) | Self::Delete(path) => path,
        }
    }
}

/// A message sent from a watcher callback to the event loop.
#[derive(Debug)]
pub enum WatchMessage {
    Change { watch_id: WatchId, event: ChangeEvent },
    /// The notification backend reported an error for this watch.
    Error { watch_id: WatchId, message: String },
    Shutdown,
}

/// Translates one notify event into index changes for a root.
///
/// Access events are dropped, as are paths that are hidden or inside an
/// ignored directory relative to `root`.
pub fn classify_event(root: &Path, event: &Event) -> Vec<ChangeEvent> {
    let resolve = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => Resolve::Upsert,
        EventKind::Remove(_) => Resolve::Delete,
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any | EventKind::Other => {
            Resolve::ByExistence
        }
        EventKind::Modify(_) => Resolve::Upsert,
    };

    event
        .paths
        .iter()
        .filter(|path| !is_ignored_path(root, path))
        .map(|path| match resolve {
            Resolve::Upsert => ChangeEvent::CreateOrModify(path.clone()),
            Resolve::Delete => ChangeEvent::Delete(path.clone()),
            Resolve::ByExistence => by_existence(path),
        })
        .collect()
}

#[derive(Clone, Copy)]
enum Resolve {
    Upsert,
    Delete,
    ByExistence,
}

/// Renames report both ends with the same kind; what is on disk now decides.
fn by_existence(path: &Path) -> ChangeEvent {
    if path.exists() {
        ChangeEvent::CreateOrModify(path.to_path_buf())
    } else {
        ChangeEvent::Delete(path.to_path_buf())
    }
}

/// Subscribes to recursive change notifications for `root`.
///
/// Events are sent through `event_tx` tagged with `watch_id`.
pub fn create_root_watcher(
    watch_id: WatchId,
    root: &Path,
    event_tx: Sender<WatchMessage>,
) -> Result<RecommendedWatcher> {
    if !root.is_dir() {
        return Err(IndexError::WatchUnavailable {
            path: root.to_path_buf(),
            reason: "not an existing directory".to_string(),
        });
    }

    let callback_root = root.to_path_buf();
    let mut watcher =
        recommended_watcher(move |event_result: notify::Result<Event>| match event_result {
            Ok(event) => {
                for change in classify_event(&callback_root, &event) {
                    // The receiver only goes away when the library shuts down.
                    let _ = event_tx.send(WatchMessage::Change {
                        watch_id,
                        event: change,
                    });
                }
            }
            Err(error) => {
                let _ = event_tx.send(WatchMessage::Error {
                    watch_id,
                    message: error.to_string(),
                });
            }
        })
        .map_err(|error| IndexError::WatchUnavailable {
            path: root.to_path_buf(),
            reason: format!("failed to create filesystem watcher: {error}"),
        })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|error| IndexError::WatchUnavailable {
            path: root.to_path_buf(),
            reason: error.to_string(),
        })?;

    Ok(watcher)
}

/// Applies one change through the indexer.
///
/// Non-asset paths and directories are ignored; directory structure is only
/// picked up by a fresh scan.
pub fn apply_change(indexer: &AssetIndexer, event: &ChangeEvent) {
    let path = event.path();
    if !is_supported_asset(path) {
        return;
    }
    match event {
        ChangeEvent::CreateOrModify(path) => match indexer.upsert_path(path) {
            UpsertOutcome::Created(id) => log::info!("indexed {} as {}", path.display(), id),
            UpsertOutcome::Updated(id) => log::info!("refreshed {} ({})", path.display(), id),
            UpsertOutcome::Unchanged(_) | UpsertOutcome::Skipped => {}
        },
        ChangeEvent::Delete(path) => {
            if let Some(id) = indexer.remove_path(path) {
                log::info!("removed {} ({})", path.display(), id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepository, Repository};
    use crate::thumbnail::NoThumbnails;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind, RenameMode};
    use std::fs;
    use std::sync::Arc;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.to_path_buf()))
    }

    #[test]
    fn create_and_modify_map_to_upserts() {
        let root = Path::new("/r");
        let created = event(EventKind::Create(CreateKind::File), &[Path::new("/r/a.obj")]);
        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &[Path::new("/r/a.obj")],
        );

        assert_eq!(
            classify_event(root, &created),
            vec![ChangeEvent::CreateOrModify(PathBuf::from("/r/a.obj"))]
        );
        assert_eq!(
            classify_event(root, &modified),
            vec![ChangeEvent::CreateOrModify(PathBuf::from("/r/a.obj"))]
        );
    }

    #[test]
    fn remove_maps_to_delete_and_access_is_dropped() {
        let root = Path::new("/r");
        let removed = event(EventKind::Remove(RemoveKind::File), &[Path::new("/r/a.obj")]);
        let accessed = event(EventKind::Access(AccessKind::Any), &[Path::new("/r/a.obj")]);

        assert_eq!(
            classify_event(root, &removed),
            vec![ChangeEvent::Delete(PathBuf::from("/r/a.obj"))]
        );
        assert!(classify_event(root, &accessed).is_empty());
    }

    #[test]
    fn dotfiles_and_ignored_directories_are_dropped() {
        let root = Path::new("/r");
        let hidden = event(
            EventKind::Create(CreateKind::File),
            &[
                Path::new("/r/.a.obj"),
                Path::new("/r/.git/b.obj"),
                Path::new("/r/node_modules/c.obj"),
                Path::new("/r/ok.obj"),
            ],
        );
        assert_eq!(
            classify_event(root, &hidden),
            vec![ChangeEvent::CreateOrModify(PathBuf::from("/r/ok.obj"))]
        );
    }

    #[test]
    fn rename_is_resolved_against_disk() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("old.obj");
        let to = temp.path().join("new.obj");
        fs::write(&to, b"o").unwrap();

        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[from.as_path(), to.as_path()],
        );
        assert_eq!(
            classify_event(temp.path(), &renamed),
            vec![ChangeEvent::Delete(from), ChangeEvent::CreateOrModify(to)]
        );
    }

    #[test]
    fn watching_a_missing_root_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let error = create_root_watcher(1, &temp.path().join("missing"), tx).unwrap_err();
        assert!(matches!(error, IndexError::WatchUnavailable { .. }));
    }

    #[test]
    fn create_modify_delete_sequence_leaves_no_asset() {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let indexer = AssetIndexer::new(repo.clone(), Arc::new(NoThumbnails));
        let path = temp.path().join("new.obj");

        fs::write(&path, b"v 0 0 0\n").unwrap();
        apply_change(&indexer, &ChangeEvent::CreateOrModify(path.clone()));
        let created = repo.get_asset_by_path(&path).expect("asset created");

        fs::write(&path, b"v 0 0 0\nv 1 1 1\n").unwrap();
        let later = created.last_modified + chrono::Duration::seconds(5);
        let later: SystemTime = later.into();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
        apply_change(&indexer, &ChangeEvent::CreateOrModify(path.clone()));
        let updated = repo.get_asset_by_path(&path).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.filesize, 16);

        fs::remove_file(&path).unwrap();
        apply_change(&indexer, &ChangeEvent::Delete(path.clone()));
        assert!(repo.get_asset_by_path(&path).is_none());
        assert!(repo.list_assets().is_empty());
    }

    #[test]
    fn delete_of_one_asset_keeps_the_rest() {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let indexer = AssetIndexer::new(repo.clone(), Arc::new(NoThumbnails));
        for name in ["a.obj", "b.obj", "c.obj"] {
            let path = temp.path().join(name);
            fs::write(&path, b"o").unwrap();
            apply_change(&indexer, &ChangeEvent::CreateOrModify(path));
        }

        apply_change(&indexer, &ChangeEvent::Delete(temp.path().join("b.obj")));

        let remaining: Vec<_> = repo
            .list_assets()
            .into_iter()
            .map(|asset| asset.filename)
            .collect();
        assert_eq!(remaining, vec!["a.obj", "c.obj"]);
    }

    #[test]
    fn events_for_non_assets_are_ignored() {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(MemoryRepository::new());
        let indexer = AssetIndexer::new(repo.clone(), Arc::new(NoThumbnails));
        let text = temp.path().join("notes.txt");
        fs::write(&text, b"hi").unwrap();
        let dir = temp.path().join("sub");
        fs::create_dir(&dir).unwrap();

        apply_change(&indexer, &ChangeEvent::CreateOrModify(text));
        apply_change(&indexer, &ChangeEvent::CreateOrModify(dir));
        assert_eq!(repo.asset_count(), 0);
    }
}
