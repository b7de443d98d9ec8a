//! Upscaling backends.
//!
//! The request handler only sees [`UpscaleBackend`]. Two implementations
//! exist: [`RemoteBackend`] drives a hosted Gradio Space over HTTP and
//! [`LocalBackend`] runs a Real-ESRGAN style executable.

mod local;
mod remote;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BackendConfig;
use crate::error::UpscaleError;

pub use local::LocalBackend;
pub use remote::{space_base_url, RemoteBackend};

/// Status string the remote service returns on success.
pub const SUCCESS_STATUS: &str = "Success";

/// A service that turns an image on disk into an upscaled image on disk.
#[async_trait]
pub trait UpscaleBackend: Send + Sync {
    /// Short, lowercase identifier (e.g. `"remote"`).
    fn name(&self) -> &'static str;

    /// Upscale the image at `input` and return the path of the result.
    ///
    /// The returned file is owned by the caller, who is expected to move it
    /// into permanent storage.
    async fn upscale(&self, input: &Path) -> Result<PathBuf, UpscaleError>;

    /// Verify that everything the backend needs is in place.
    async fn check(&self) -> Result<(), UpscaleError>;

    /// Whether the handler should delete the stored input when this backend
    /// fails.
    fn cleans_up_input_on_failure(&self) -> bool {
        false
    }
}

/// Build the backend selected in the configuration.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn UpscaleBackend>, UpscaleError> {
    let backend: Arc<dyn UpscaleBackend> = match config {
        BackendConfig::Remote(remote) => Arc::new(RemoteBackend::new(remote.clone())?),
        BackendConfig::Local(local) => Arc::new(LocalBackend::new(local.clone())),
    };
    tracing::info!("Using {} upscaling backend", backend.name());
    Ok(backend)
}
