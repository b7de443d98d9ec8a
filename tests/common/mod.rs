//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which owns a temporary media directory and an
//! [`AppContext`] wired to a scripted [`FakeBackend`], plus helpers for
//! building image bytes and multipart request bodies.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use tempfile::TempDir;

use upscaler::backend::UpscaleBackend;
use upscaler::config::Config;
use upscaler::error::UpscaleError;
use upscaler::images::{MediaStorage, UpscaleService};
use upscaler::server::AppContext;

/// What the fake backend does when asked to upscale.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Write a PNG of the given size and return it.
    Success { width: u32, height: u32 },
    /// Report a non-"Success" status.
    Status(String),
    /// Claim success but point at a file that does not exist.
    MissingOutput,
}

/// Scripted [`UpscaleBackend`] for exercising the handler.
pub struct FakeBackend {
    outcome: FakeOutcome,
    scratch: TempDir,
    cleanup_on_failure: bool,
    calls: AtomicUsize,
}

impl FakeBackend {
    /// A fake that behaves like the remote backend (deletes input on failure).
    pub fn remote(outcome: FakeOutcome) -> Arc<Self> {
        Arc::new(Self::new(outcome, true))
    }

    /// A fake that behaves like the local backend (keeps input on failure).
    pub fn local(outcome: FakeOutcome) -> Arc<Self> {
        Arc::new(Self::new(outcome, false))
    }

    fn new(outcome: FakeOutcome, cleanup_on_failure: bool) -> Self {
        Self {
            outcome,
            scratch: tempfile::tempdir().expect("failed to create scratch dir"),
            cleanup_on_failure,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpscaleBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn upscale(&self, input: &Path) -> Result<PathBuf, UpscaleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(input.exists(), "input must be stored before the backend runs");

        match &self.outcome {
            FakeOutcome::Success { width, height } => {
                let out = self.scratch.path().join("result.png");
                write_png(&out, *width, *height);
                Ok(out)
            }
            FakeOutcome::Status(message) => Err(UpscaleError::Status(message.clone())),
            FakeOutcome::MissingOutput => Ok(self.scratch.path().join("never-written.png")),
        }
    }

    async fn check(&self) -> Result<(), UpscaleError> {
        Ok(())
    }

    fn cleans_up_input_on_failure(&self) -> bool {
        self.cleanup_on_failure
    }
}

/// Test harness wrapping a temporary media directory and an [`AppContext`].
pub struct TestHarness {
    pub dir: TempDir,
    pub ctx: AppContext,
}

impl TestHarness {
    /// Create a harness whose media root lives in a fresh temp dir.
    pub fn new(backend: Arc<dyn UpscaleBackend>) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.media.root = dir.path().join("media");
        let ctx = AppContext::new(config, backend);
        Self { dir, ctx }
    }

    pub fn service(&self) -> &UpscaleService {
        &self.ctx.service
    }

    pub fn media_root(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    /// Sorted filenames currently in the media directory.
    pub fn media_files(&self) -> Vec<String> {
        list_files(&self.media_root())
    }
}

/// Build a service directly, without the HTTP layer.
pub fn service_in(root: &Path, backend: Arc<dyn UpscaleBackend>) -> UpscaleService {
    UpscaleService::new(MediaStorage::new(root, "/media/"), backend)
}

/// Sorted filenames in `dir`, empty if it does not exist.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut img = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = image::Rgb([(x * 16) as u8, (y * 16) as u8, 128]);
    }
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .expect("failed to encode test image");
    buf.into_inner()
}

/// PNG bytes of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// JPEG bytes of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::write(path, png_bytes(width, height)).expect("failed to write png");
}

pub const BOUNDARY: &str = "----upscaler-test-boundary";

/// A `multipart/form-data` body with a single file field.
///
/// Returns the `Content-Type` header value and the body bytes.
pub fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
