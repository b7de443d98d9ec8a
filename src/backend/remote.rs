//! Remote Gradio Space backend.
//!
//! Speaks the Gradio HTTP API used by `gradio_client`:
//! - upload the input with `POST {prefix}/upload`
//! - start the prediction with `POST {prefix}/call/{api}`
//! - read the server-sent event stream at `GET {prefix}/call/{api}/{event_id}`
//! - download the produced file into a scratch directory
//!
//! The prediction returns `[<file>, <status message>]`; only the status
//! `"Success"` counts as a successful upscale.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{UpscaleBackend, SUCCESS_STATUS};
use crate::config::RemoteBackendConfig;
use crate::error::UpscaleError;
use crate::images::{input_filename, PartialFile};

/// Derive the `*.hf.space` host of a Space from its `owner/name` identifier.
///
/// ```
/// use upscaler::backend::space_base_url;
///
/// assert_eq!(
///     space_base_url("inevitable-gs/image-upscaler"),
///     "https://inevitable-gs-image-upscaler.hf.space"
/// );
/// ```
pub fn space_base_url(space: &str) -> String {
    let host: String = space
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '_' | '.' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    format!("https://{host}.hf.space")
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

/// One event read from a `text/event-stream` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Split a complete server-sent event body into events.
pub(crate) fn parse_event_stream(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !event.is_empty() || !data.is_empty() {
                events.push(SseEvent {
                    event: if event.is_empty() {
                        "message".to_string()
                    } else {
                        std::mem::take(&mut event)
                    },
                    data: data.join("\n"),
                });
                data.clear();
            }
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    events
}

/// The result file reference returned by the Space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemoteFile {
    pub path: String,
    pub url: Option<String>,
}

/// Interpret the `complete` payload: `[<file>, <status>]`.
pub(crate) fn parse_prediction(data: &str) -> Result<(RemoteFile, String), UpscaleError> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| UpscaleError::protocol(format!("invalid prediction payload: {e}")))?;

    let items = value
        .as_array()
        .ok_or_else(|| UpscaleError::protocol("prediction payload is not an array"))?;

    let [file, status] = items.as_slice() else {
        return Err(UpscaleError::protocol(format!(
            "expected 2 outputs, got {}",
            items.len()
        )));
    };

    let status = status
        .as_str()
        .ok_or_else(|| UpscaleError::protocol("status message is not a string"))?
        .to_string();

    let file = match file {
        Value::String(path) => Some(RemoteFile {
            path: path.clone(),
            url: None,
        }),
        Value::Object(map) => map.get("path").and_then(Value::as_str).map(|path| RemoteFile {
            path: path.to_string(),
            url: map.get("url").and_then(Value::as_str).map(str::to_string),
        }),
        _ => None,
    };

    match file {
        Some(file) => Ok((file, status)),
        // A failed prediction usually returns no file at all; keep the status
        None if status != SUCCESS_STATUS => Err(UpscaleError::Status(status)),
        None => Err(UpscaleError::protocol("prediction returned no output file")),
    }
}

/// Backend that calls a hosted Gradio Space.
pub struct RemoteBackend {
    client: reqwest::Client,
    config: RemoteBackendConfig,
    base_url: String,
}

impl RemoteBackend {
    /// Create a backend for the configured Space.
    pub fn new(config: RemoteBackendConfig) -> Result<Self, UpscaleError> {
        // The overall deadline is enforced around the whole prediction
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| space_base_url(&config.space))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url,
            self.config.api_prefix.trim_end_matches('/'),
            path
        )
    }

    fn call_url(&self) -> String {
        self.api_url(&format!(
            "/call/{}",
            self.config.api_name.trim_start_matches('/')
        ))
    }

    /// Build a request; the token is only sent to the Space itself.
    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match self.config.hf_token.as_deref() {
            Some(token) if self.is_own_url(url) => builder.bearer_auth(token),
            _ => builder,
        }
    }

    fn is_own_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    fn download_dir(&self) -> PathBuf {
        self.config
            .download_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("upscaler"))
    }

    /// Upload the input file and return its server-side path.
    async fn upload(&self, input: &Path) -> Result<String, UpscaleError> {
        let data = tokio::fs::read(input).await?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let form = reqwest::multipart::Form::new()
            .part("files", reqwest::multipart::Part::bytes(data).file_name(file_name));

        let url = self.api_url("/upload");
        debug!(url = %url, "Uploading input to Space");

        let paths: Vec<String> = self
            .request(reqwest::Method::POST, &url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        paths
            .into_iter()
            .next()
            .ok_or_else(|| UpscaleError::protocol("upload returned no file path"))
    }

    /// Start the prediction and return its event id.
    async fn call(&self, remote_path: &str) -> Result<String, UpscaleError> {
        let url = self.call_url();
        let body = json!({
            "data": [{
                "path": remote_path,
                "meta": { "_type": "gradio.FileData" },
            }]
        });
        debug!(url = %url, "Starting prediction");

        let response: CallResponse = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.event_id)
    }

    /// Wait for the prediction to finish and return the `complete` payload.
    async fn result(&self, event_id: &str) -> Result<String, UpscaleError> {
        let url = format!("{}/{}", self.call_url(), event_id);
        debug!(url = %url, "Waiting for prediction result");

        let body = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        for event in parse_event_stream(&body) {
            match event.event.as_str() {
                "complete" => return Ok(event.data),
                "error" => {
                    let message = match serde_json::from_str::<Value>(&event.data) {
                        Ok(Value::String(s)) => s,
                        Ok(Value::Null) => "prediction failed without a message".to_string(),
                        _ => event.data.clone(),
                    };
                    return Err(UpscaleError::Remote(message));
                }
                other => debug!(event = other, "Ignoring event"),
            }
        }

        Err(UpscaleError::protocol(
            "event stream ended without a result",
        ))
    }

    /// Stream the produced file into the scratch directory.
    async fn download(&self, file: &RemoteFile) -> Result<PathBuf, UpscaleError> {
        let url = file
            .url
            .clone()
            .unwrap_or_else(|| self.api_url(&format!("/file={}", file.path)));

        let dir = self.download_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let extension = Path::new(&file.path)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("png")
            .to_ascii_lowercase();
        let target = PartialFile::new(dir.join(input_filename(&extension)));

        debug!(url = %url, target = ?target.path(), "Downloading result");

        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await?
            .error_for_status()?;

        // `target` removes the file on any exit before commit, including a timeout
        let mut out = tokio::fs::File::create(target.path()).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            out.write_all(&chunk?).await?;
        }
        out.flush().await?;
        drop(out);

        Ok(target.commit())
    }

    async fn predict(&self, input: &Path) -> Result<PathBuf, UpscaleError> {
        let remote_path = self.upload(input).await?;
        let event_id = self.call(&remote_path).await?;
        let payload = self.result(&event_id).await?;

        let (file, status) = parse_prediction(&payload)?;
        if status != SUCCESS_STATUS {
            return Err(UpscaleError::Status(status));
        }

        self.download(&file).await
    }
}

#[async_trait]
impl UpscaleBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn upscale(&self, input: &Path) -> Result<PathBuf, UpscaleError> {
        info!(space = %self.config.space, base_url = %self.base_url, "Sending image to Space");

        let limit = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(limit, self.predict(input)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Space did not answer within {}s", limit.as_secs());
                Err(UpscaleError::Timeout(limit))
            }
        }
    }

    async fn check(&self) -> Result<(), UpscaleError> {
        let url = self.api_url("/info");
        let limit = Duration::from_secs(self.config.timeout_secs);
        let response = tokio::time::timeout(limit, self.request(reqwest::Method::GET, &url).send())
            .await
            .map_err(|_| UpscaleError::Timeout(limit))??;
        response.error_for_status()?;
        Ok(())
    }

    fn cleans_up_input_on_failure(&self) -> bool {
        true
    }
}
