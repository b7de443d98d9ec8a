//! Pixel dimension probing.
//!
//! Only the image header is read, and the format is sniffed from the content
//! rather than the extension. A file that cannot be decoded is not an error
//! for the caller: it simply has no dimensions.

use std::path::Path;

use serde::Serialize;

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Read the dimensions of the image at `path`, returning `None` when the file
/// is missing or not a decodable image.
pub fn probe_dimensions_blocking(path: &Path) -> Option<Dimensions> {
    match read_dimensions(path) {
        Ok((width, height)) => Some(Dimensions { width, height }),
        Err(e) => {
            tracing::warn!("Could not read image dimensions of {:?}: {}", path, e);
            None
        }
    }
}

fn read_dimensions(path: &Path) -> image::ImageResult<(u32, u32)> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}

/// Async wrapper around [`probe_dimensions_blocking`] that runs the decode on
/// the blocking thread pool.
pub async fn probe_dimensions(path: &Path) -> Option<Dimensions> {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || probe_dimensions_blocking(&owned)).await {
        Ok(dims) => dims,
        Err(e) => {
            tracing::warn!("Dimension probe task failed for {:?}: {}", path, e);
            None
        }
    }
}
