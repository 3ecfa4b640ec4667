//! Path policy shared by the walker, scanner and watcher.
//!
//! There is exactly one supported-extension set; every component that
//! decides whether a path is an asset goes through [`is_supported_asset`].

use std::ffi::OsStr;
use std::path::{Component, Path};

/// Maximum recursion depth below a watch root.
pub const MAX_DEPTH: usize = 10;

/// Supported 3D formats, lower-case and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "obj", "fbx", "gltf", "glb", "usd", "usda", "usdc", "usdz", "blend", "ma", "mb", "hip",
    "hiplc", "hipnc", "uasset", "max", "c4d", "3ds", "dae", "abc", "stl", "ply",
];

/// Directory names that are never descended into.
pub const IGNORED_DIRECTORIES: &[&str] = &[
    "node_modules",
    "build",
    "dist",
    "out",
    "target",
    "cache",
    "__pycache__",
    "__MACOSX",
    "temp",
    "tmp",
];

/// Returns the lower-cased extension of `path` including the leading dot.
pub fn filetype_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Returns true if the path's extension is a supported 3D format.
pub fn is_supported_asset(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Returns true for dot-directories and names on the deny list.
pub fn should_ignore_directory(name: &str) -> bool {
    name.starts_with('.') || IGNORED_DIRECTORIES.contains(&name)
}

/// Returns true if any component of `path` below `root` is a dotfile.
///
/// Paths outside `root` are judged on all of their components.
pub fn is_hidden(root: &Path, path: &Path) -> bool {
    relative_names(root, path).any(|name| name.starts_with('.'))
}

/// Returns true if the path is hidden or sits inside an ignored directory.
///
/// The final component is only checked for hiddenness; a file called
/// `build` is not an ignored directory.
pub fn is_ignored_path(root: &Path, path: &Path) -> bool {
    if is_hidden(root, path) {
        return true;
    }
    let names: Vec<&str> = relative_names(root, path).collect();
    match names.split_last() {
        Some((_, parents)) => parents.iter().any(|name| should_ignore_directory(name)),
        None => false,
    }
}

fn relative_names<'a>(root: &Path, path: &'a Path) -> impl Iterator<Item = &'a str> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().filter_map(|component| match component {
        Component::Normal(name) => name.to_str(),
        _ => None,
    })
}
