//! Heuristic tag inference for 3D assets.
//!
//! Tags are derived from three sources:
//!
//! - The file extension (`fbx`) and the tool that usually produces it (`maya`)
//! - Directory segments naming an asset category (`Characters` -> `character`)
//! - Filename tokens describing the asset (`lowpoly`, `v2` -> `versioned`)
//!
//! Inference is pure and deterministic: the same path always yields the
//! same set, and the set is ordered.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Component, Path};

/// Category words and the tag they map to. Matching accepts the plural
/// forms listed here.
const CATEGORY_WORDS: &[(&str, &str)] = &[
    ("character", "character"),
    ("characters", "character"),
    ("char", "character"),
    ("chars", "character"),
    ("prop", "prop"),
    ("props", "prop"),
    ("environment", "environment"),
    ("environments", "environment"),
    ("env", "environment"),
    ("envs", "environment"),
    ("vehicle", "vehicle"),
    ("vehicles", "vehicle"),
    ("weapon", "weapon"),
    ("weapons", "weapon"),
    ("creature", "creature"),
    ("creatures", "creature"),
    ("architecture", "architecture"),
    ("building", "architecture"),
    ("buildings", "architecture"),
    ("animation", "animation"),
    ("animations", "animation"),
    ("rig", "rig"),
    ("rigs", "rig"),
    ("material", "material"),
    ("materials", "material"),
];

/// Infers the tag set for an asset path.
pub fn infer_tags(path: &Path) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();

    if let Some(ext) = path.extension().and_then(OsStr::to_str) {
        let ext = ext.to_ascii_lowercase();
        if let Some(tool) = tool_tag(&ext) {
            tags.insert(tool.to_string());
        }
        if !ext.is_empty() {
            tags.insert(ext);
        }
    }

    if let Some(parent) = path.parent() {
        for segment in parent.components().filter_map(normal_name) {
            if let Some(category) = category_tag(&segment.to_lowercase()) {
                tags.insert(category.to_string());
            }
        }
    }

    if let Some(stem) = path.file_stem().and_then(OsStr::to_str) {
        for token in tokenize(stem) {
            if let Some(tag) = token_tag(&token) {
                tags.insert(tag.to_string());
            }
        }
    }

    tags
}

/// Splits a filename stem into lower-cased tokens on `_`, `-`, `.` and spaces.
pub fn tokenize(stem: &str) -> Vec<String> {
    stem.split(|c: char| matches!(c, '_' | '-' | '.' | ' '))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn normal_name(component: Component<'_>) -> Option<&str> {
    match component {
        Component::Normal(name) => name.to_str(),
        _ => None,
    }
}

fn tool_tag(ext: &str) -> Option<&'static str> {
    match ext {
        "blend" => Some("blender"),
        "ma" | "mb" => Some("maya"),
        "hip" | "hiplc" | "hipnc" => Some("houdini"),
        "uasset" => Some("unreal"),
        "max" => Some("3dsmax"),
        "c4d" => Some("cinema4d"),
        "usd" | "usda" | "usdc" | "usdz" => Some("usd"),
        "gltf" | "glb" => Some("gltf"),
        _ => None,
    }
}

fn category_tag(word: &str) -> Option<&'static str> {
    CATEGORY_WORDS
        .iter()
        .find(|(candidate, _)| *candidate == word)
        .map(|(_, tag)| *tag)
}

fn token_tag(token: &str) -> Option<&'static str> {
    match token {
        "lowpoly" | "low" | "lp" => Some("lowpoly"),
        "highpoly" | "high" | "hipoly" | "hp" => Some("highpoly"),
        "rig" | "rigged" => Some("rigged"),
        "anim" | "animated" => Some("animated"),
        "wip" => Some("wip"),
        "final" => Some("final"),
        _ if is_numbered(token, "v") || is_numbered(token, "ver") => Some("versioned"),
        _ if is_numbered(token, "lod") => Some("lod"),
        _ => category_tag(token),
    }
}

/// Returns true for `prefix` followed by one or more ASCII digits.
fn is_numbered(token: &str, prefix: &str) -> bool {
    token
        .strip_prefix(prefix)
        .map(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}
