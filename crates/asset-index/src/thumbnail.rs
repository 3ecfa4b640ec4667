//! Placeholder thumbnails.
//!
//! Nothing here renders geometry. [`PlaceholderThumbnails`] writes a small
//! SVG card naming the asset's format so clients always have an image to
//! show. Generation never fails outward: errors are logged and the asset is
//! indexed without a thumbnail.

use std::fs;
use std::path::{Path, PathBuf};

use crate::policy::filetype_of;

/// Produces a thumbnail image for an asset file.
pub trait ThumbnailGenerator: Send + Sync {
    /// Returns the path of the generated image, or `None` on failure.
    fn generate(&self, asset_path: &Path) -> Option<PathBuf>;
}

/// Writes `<output_dir>/<basename>.svg` placeholders.
#[derive(Debug, Clone)]
pub struct PlaceholderThumbnails {
    output_dir: PathBuf,
}

impl PlaceholderThumbnails {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_placeholder(&self, asset_path: &Path) -> std::io::Result<PathBuf> {
        let name = asset_path.file_name().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "asset path has no file name")
        })?;
        fs::create_dir_all(&self.output_dir)?;

        let mut file_name = name.to_os_string();
        file_name.push(".svg");
        let target = self.output_dir.join(file_name);

        let label = filetype_of(asset_path)
            .map(|ext| ext.trim_start_matches('.').to_ascii_uppercase())
            .unwrap_or_else(|| "3D".to_string());
        fs::write(&target, placeholder_svg(&label))?;
        Ok(target)
    }
}

impl ThumbnailGenerator for PlaceholderThumbnails {
    fn generate(&self, asset_path: &Path) -> Option<PathBuf> {
        match self.write_placeholder(asset_path) {
            Ok(path) => Some(path),
            Err(error) => {
                log::warn!(
                    "thumbnail placeholder failed for {}: {}",
                    asset_path.display(),
                    error
                );
                None
            }
        }
    }
}

/// Generator used when thumbnails are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThumbnails;

impl ThumbnailGenerator for NoThumbnails {
    fn generate(&self, _asset_path: &Path) -> Option<PathBuf> {
        None
    }
}

fn placeholder_svg(label: &str) -> String {
    format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256" viewBox="0 0 256 256">"##,
            r##"<rect width="256" height="256" fill="#2b2f36"/>"##,
            r##"<path d="M128 48 L200 90 L200 170 L128 212 L56 170 L56 90 Z" fill="none" stroke="#8a93a3" stroke-width="6"/>"##,
            r##"<text x="128" y="140" font-family="sans-serif" font-size="28" fill="#e6e9ef" text-anchor="middle">{}</text>"##,
            "</svg>\n"
        ),
        label
    )
}
