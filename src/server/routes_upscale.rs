//! Upload routes.
//!
//! `GET /` renders the empty form, `POST /` processes an upload and renders
//! the result page, `POST /api/upscale` does the same with a JSON body.
//! Every outcome of the handler is a 200; only form-layer rejections get an
//! error status.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{page, AppContext};
use crate::error::{FormError, StorageError};
use crate::images::{extension_of, MediaStorage, StoredFile};

/// Name of the multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Create the HTML page routes.
pub fn page_routes() -> Router<AppContext> {
    Router::new().route("/", get(upload_form).post(upload_page))
}

/// Create the JSON API routes.
pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/upscale", post(upscale_json))
}

async fn upload_form() -> Html<String> {
    Html(page::render(None, None))
}

async fn upload_page(
    State(ctx): State<AppContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match receive_upload(ctx.service.storage(), multipart).await {
        Ok(stored) => {
            let result = ctx.service.process_stored(stored).await;
            Html(page::render(Some(&result), None)).into_response()
        }
        Err(e) => {
            tracing::debug!("Rejected upload form: {}", e);
            (
                status_of(&e),
                Html(page::render(None, Some(&e.to_string()))),
            )
                .into_response()
        }
    }
}

async fn upscale_json(
    State(ctx): State<AppContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match receive_upload(ctx.service.storage(), multipart).await {
        Ok(stored) => Json(ctx.service.process_stored(stored).await).into_response(),
        Err(e) => (
            status_of(&e),
            Json(serde_json::json!({
                "error": e.to_string(),
                "code": "validation_error",
            })),
        )
            .into_response(),
    }
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": ctx.service.backend().name(),
    }))
}

// ============================================================================
// Form layer
// ============================================================================

/// Stream the `image` field of the multipart body into the media directory.
///
/// The outer error is a form rejection and the handler never runs. The
/// inner result is handed to the handler, which reports storage failures
/// like any other processing error.
async fn receive_upload(
    storage: &MediaStorage,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Result<StoredFile, StorageError>, FormError> {
    let mut multipart = multipart.map_err(|e| FormError::Multipart(e.body_text()))?;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(FormError::MissingImage),
            Err(e) => return Err(multipart_error(e)),
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let mut pending = match storage.create_upload(&extension_of(file_name.as_deref())).await {
            Ok(pending) => pending,
            Err(e) => return Ok(Err(e)),
        };

        // Dropping `pending` on any early return removes the partial file
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = pending.write(&chunk).await {
                        return Ok(Err(e));
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(multipart_error(e)),
            }
        }

        if pending.is_empty() {
            return Err(FormError::EmptyImage);
        }

        let stored = pending.finish().await;
        if let Ok(ref input) = stored {
            tracing::info!(
                "Stored upload {:?} as {}",
                file_name.as_deref().unwrap_or("<unnamed>"),
                input.filename
            );
        }
        return Ok(stored);
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> FormError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        FormError::TooLarge
    } else {
        FormError::Multipart(e.body_text())
    }
}

fn status_of(e: &FormError) -> StatusCode {
    StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST)
}
