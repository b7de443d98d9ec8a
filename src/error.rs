//! Error types for the upload/upscale pipeline.
//!
//! Every failure the handler can observe is one of these enums. None of them
//! reach the client as an HTTP status: the handler folds them into the
//! `error` field of a [`ProcessingResult`](crate::images::ProcessingResult).

use std::path::PathBuf;
use std::time::Duration;

/// Failures talking to, or reported by, an upscaling backend.
#[derive(Debug, thiserror::Error)]
pub enum UpscaleError {
    /// The backend answered but did not report `"Success"`.
    #[error("API returned an error: {0}")]
    Status(String),

    /// The local executable exited unsuccessfully.
    #[error("Upscaler exited with {code}: {stderr}")]
    ExitStatus {
        /// Exit code, or "signal" when the process was killed.
        code: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// A file the backend needs before it can run is missing.
    #[error("Required {what} not found at {}", path.display())]
    MissingPrerequisite {
        /// What kind of file is missing ("executable", "model file").
        what: &'static str,
        path: PathBuf,
    },

    /// The backend claimed success but produced no output file.
    #[error("Upscaled output not found at {}", .0.display())]
    MissingOutput(PathBuf),

    /// The backend did not finish within the configured limit.
    #[error("Upscaler did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    /// HTTP transport failure reaching the remote service.
    #[error("Request to upscaling service failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote service raised an error while running the prediction.
    #[error("Upscaling service reported an error: {0}")]
    Remote(String),

    /// The remote service answered with something we cannot interpret.
    #[error("Unexpected response from upscaling service: {0}")]
    Protocol(String),

    /// Local I/O while preparing or collecting backend files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpscaleError {
    pub fn protocol(message: impl Into<String>) -> Self {
        UpscaleError::Protocol(message.into())
    }
}

/// Failures persisting files into the media directory.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create media directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// The backend handed back a path without a usable filename.
    #[error("Invalid file path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Rejections from the form layer, raised before the handler runs.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("No image was uploaded")]
    MissingImage,

    #[error("The uploaded image is empty")]
    EmptyImage,

    #[error("The uploaded image exceeds the size limit")]
    TooLarge,

    #[error("Malformed upload: {0}")]
    Multipart(String),
}

impl FormError {
    /// Map this rejection to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            FormError::TooLarge => 413,
            FormError::MissingImage | FormError::EmptyImage | FormError::Multipart(_) => 400,
        }
    }
}
