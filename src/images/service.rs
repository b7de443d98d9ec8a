//! Upload-process-render pipeline.
//!
//! [`UpscaleService::process`] is the whole request handler: store the
//! upload, probe it, hand it to the backend, adopt the result and probe that.
//! Every failure ends up in [`ProcessingResult::error`]; the caller always
//! gets a result to render.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::probe::{probe_dimensions, Dimensions};
use super::storage::{MediaStorage, StoredFile, UploadedImage};
use crate::backend::UpscaleBackend;
use crate::error::StorageError;

/// Outcome of one upload, as rendered to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    /// Public URL of the stored upload.
    pub original: Option<String>,
    /// Public URL of the upscaled image.
    pub upscaled: Option<String>,
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    pub upscaled_width: Option<u32>,
    pub upscaled_height: Option<u32>,
    /// Human-readable failure description.
    pub error: Option<String>,
}

impl ProcessingResult {
    fn success(
        original: &StoredFile,
        original_dims: Option<Dimensions>,
        upscaled: &StoredFile,
        upscaled_dims: Option<Dimensions>,
    ) -> Self {
        Self {
            original: Some(original.url.clone()),
            upscaled: Some(upscaled.url.clone()),
            original_width: original_dims.map(|d| d.width),
            original_height: original_dims.map(|d| d.height),
            upscaled_width: upscaled_dims.map(|d| d.width),
            upscaled_height: upscaled_dims.map(|d| d.height),
            error: None,
        }
    }

    /// A failed result. URLs are never exposed; original dimensions are kept
    /// when they were probed before the failure.
    fn failure(message: String, original_dims: Option<Dimensions>) -> Self {
        Self {
            original_width: original_dims.map(|d| d.width),
            original_height: original_dims.map(|d| d.height),
            error: Some(message),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.upscaled.is_some()
    }

    pub fn original_dimensions(&self) -> Option<Dimensions> {
        Some(Dimensions {
            width: self.original_width?,
            height: self.original_height?,
        })
    }

    pub fn upscaled_dimensions(&self) -> Option<Dimensions> {
        Some(Dimensions {
            width: self.upscaled_width?,
            height: self.upscaled_height?,
        })
    }
}

/// The upload handler, wired to a storage directory and a backend.
#[derive(Clone)]
pub struct UpscaleService {
    storage: MediaStorage,
    backend: Arc<dyn UpscaleBackend>,
}

impl UpscaleService {
    /// Create a new `UpscaleService`.
    ///
    /// # Arguments
    ///
    /// * `storage` - Media directory uploads and results are written to
    /// * `backend` - The upscaler to invoke for each upload
    pub fn new(storage: MediaStorage, backend: Arc<dyn UpscaleBackend>) -> Self {
        Self { storage, backend }
    }

    pub fn storage(&self) -> &MediaStorage {
        &self.storage
    }

    pub fn backend(&self) -> &Arc<dyn UpscaleBackend> {
        &self.backend
    }

    /// Run one in-memory upload through the pipeline.
    ///
    /// Never fails: storage and backend errors become the `error` field and
    /// decode errors become missing dimensions.
    pub async fn process(&self, upload: UploadedImage) -> ProcessingResult {
        let stored = self.storage.save_upload(&upload).await;
        if let Ok(ref input) = stored {
            info!(
                "Stored upload {:?} as {}",
                upload.file_name.as_deref().unwrap_or("<unnamed>"),
                input.filename
            );
        }
        self.process_stored(stored).await
    }

    /// Continue the pipeline for an upload that was already written to the
    /// media directory, or failed to be.
    pub async fn process_stored(
        &self,
        stored: Result<StoredFile, StorageError>,
    ) -> ProcessingResult {
        let input = match stored {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to store upload: {}", e);
                return ProcessingResult::failure(
                    format!("Failed to save uploaded image: {e}"),
                    None,
                );
            }
        };

        let original_dims = probe_dimensions(&input.path).await;

        let output = match self.backend.upscale(&input.path).await {
            Ok(output) => output,
            Err(e) => {
                let message = format!(
                    "Failed to process image with the {} backend: {}",
                    self.backend.name(),
                    e
                );
                error!("{}", message);
                self.cleanup_input(&input).await;
                return ProcessingResult::failure(message, original_dims);
            }
        };

        let upscaled = match self.storage.adopt(&output, &input.filename).await {
            Ok(stored) => stored,
            Err(e) => {
                let message = format!("Failed to store upscaled image: {e}");
                error!("{}", message);
                self.storage.remove(&output).await;
                self.cleanup_input(&input).await;
                return ProcessingResult::failure(message, original_dims);
            }
        };

        let upscaled_dims = probe_dimensions(&upscaled.path).await;

        info!(
            "Upscaled {} -> {} ({} -> {})",
            input.filename,
            upscaled.filename,
            describe(original_dims),
            describe(upscaled_dims)
        );

        ProcessingResult::success(&input, original_dims, &upscaled, upscaled_dims)
    }

    async fn cleanup_input(&self, input: &StoredFile) {
        if self.backend.cleans_up_input_on_failure() {
            self.storage.remove(&input.path).await;
        }
    }
}

fn describe(dims: Option<Dimensions>) -> String {
    dims.map(|d| d.to_string())
        .unwrap_or_else(|| "unknown size".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_hides_urls() {
        let result = ProcessingResult::failure(
            "boom".into(),
            Some(Dimensions {
                width: 4,
                height: 2,
            }),
        );
        assert!(!result.is_success());
        assert_eq!(result.original, None);
        assert_eq!(result.upscaled, None);
        assert_eq!(result.original_width, Some(4));
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_dimension_accessors() {
        let result = ProcessingResult {
            upscaled_width: Some(8),
            upscaled_height: Some(4),
            original_width: Some(2),
            ..ProcessingResult::default()
        };
        assert_eq!(result.original_dimensions(), None);
        assert_eq!(
            result.upscaled_dimensions(),
            Some(Dimensions {
                width: 8,
                height: 4
            })
        );
    }

    #[test]
    fn test_serializes_nulls() {
        let json = serde_json::to_value(ProcessingResult::default()).unwrap();
        assert!(json["original"].is_null());
        assert!(json["upscaled_width"].is_null());
        assert!(json["error"].is_null());
    }
}
