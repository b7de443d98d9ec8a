//! Image storage, probing and the upscale request pipeline.
//!
//! This module owns everything that touches the media directory: storing
//! uploads under generated names, reading pixel dimensions, and coordinating
//! the backend call in [`UpscaleService`].

mod probe;
mod service;
mod storage;

pub use probe::{probe_dimensions, probe_dimensions_blocking, Dimensions};
pub use service::{ProcessingResult, UpscaleService};
pub(crate) use storage::PartialFile;
pub use storage::{
    extension_of, input_filename, output_filename, MediaStorage, PendingUpload, StoredFile,
    UploadedImage, FALLBACK_EXTENSION, UPSCALED_PREFIX,
};
