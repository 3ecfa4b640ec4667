//! Bounded-depth directory walking.
//!
//! [`Walk`] is a lazy iterator over the directories and supported asset
//! files below a root. It keeps an explicit stack of `(path, depth)` pairs
//! instead of recursing, so deep trees and symlink loops cannot grow the
//! native stack; a loop simply stops at [`MAX_DEPTH`].
//!
//! Entries of each directory are sorted by name before they are yielded,
//! which makes the traversal order deterministic. A directory entry is
//! always yielded before anything inside it.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::policy::{is_supported_asset, should_ignore_directory, MAX_DEPTH};
use crate::types::FileStat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One discovered directory or asset file.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkEntry {
    pub path: PathBuf,
    /// Depth below the walk root; direct children of the root are at 1.
    pub depth: usize,
    pub kind: EntryKind,
    pub stat: FileStat,
}

impl WalkEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Lazy depth-first traversal of one root.
///
/// Each item is either an entry or the error that made one entry
/// unreadable; errors never end the walk.
#[derive(Debug)]
pub struct Walk {
    stack: Vec<(PathBuf, usize)>,
    pending: VecDeque<Result<WalkEntry>>,
    max_depth: usize,
}

impl Walk {
    /// Starts a fresh traversal of `root` bounded by [`MAX_DEPTH`].
    pub fn new(root: &Path) -> Self {
        Self::with_max_depth(root, MAX_DEPTH)
    }

    pub fn with_max_depth(root: &Path, max_depth: usize) -> Self {
        Self {
            stack: vec![(root.to_path_buf(), 0)],
            pending: VecDeque::new(),
            max_depth,
        }
    }

    /// Lists one directory, queueing its entries and stacking the
    /// subdirectories that are still within the depth bound.
    fn expand(&mut self, dir: PathBuf, depth: usize) {
        let read_dir = match fs::read_dir(&dir) {
            Ok(iter) => iter,
            Err(error) => {
                // A missing root is an empty walk, not a failure.
                if depth == 0 && error.kind() == std::io::ErrorKind::NotFound {
                    return;
                }
                self.pending.push_back(Err(access_error(&dir, error)));
                return;
            }
        };

        let mut children: Vec<PathBuf> = Vec::new();
        for entry in read_dir {
            match entry {
                Ok(entry) => children.push(entry.path()),
                Err(error) => self.pending.push_back(Err(access_error(&dir, error))),
            }
        }
        children.sort_unstable();

        let child_depth = depth + 1;
        let mut subdirs = Vec::new();
        for child in children {
            let Some(name) = child.file_name().map(|name| name.to_string_lossy()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            // Follows symlinks; loops are cut off by the depth bound.
            let metadata = match fs::metadata(&child) {
                Ok(metadata) => metadata,
                Err(error) => {
                    self.pending.push_back(Err(access_error(&child, error)));
                    continue;
                }
            };

            if metadata.is_dir() {
                if should_ignore_directory(&name) {
                    continue;
                }
                match FileStat::from_metadata(&metadata) {
                    Ok(stat) => {
                        if depth < self.max_depth {
                            subdirs.push((child.clone(), child_depth));
                        }
                        self.pending.push_back(Ok(WalkEntry {
                            path: child,
                            depth: child_depth,
                            kind: EntryKind::Directory,
                            stat,
                        }));
                    }
                    Err(error) => self.pending.push_back(Err(access_error(&child, error))),
                }
            } else if metadata.is_file() && is_supported_asset(&child) {
                match FileStat::from_metadata(&metadata) {
                    Ok(stat) => self.pending.push_back(Ok(WalkEntry {
                        path: child,
                        depth: child_depth,
                        kind: EntryKind::File,
                        stat,
                    })),
                    Err(error) => self.pending.push_back(Err(access_error(&child, error))),
                }
            }
        }

        // Reverse so the alphabetically first subdirectory is popped first.
        self.stack.extend(subdirs.into_iter().rev());
    }
}

impl Iterator for Walk {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let (dir, depth) = self.stack.pop()?;
            self.expand(dir, depth);
        }
    }
}

fn access_error(path: &Path, error: std::io::Error) -> IndexError {
    IndexError::Access {
        path: path.to_path_buf(),
        source: error,
    }
}
