//! Local executable backend.
//!
//! Runs a Real-ESRGAN ncnn-vulkan compatible binary:
//! `<exe> -i <input> -o <output> -n <model> -m <model_dir> -g <gpu>`.
//! A GPU index of `-1` selects CPU execution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::UpscaleBackend;
use crate::config::LocalBackendConfig;
use crate::error::UpscaleError;
use crate::images::output_filename;

/// Backend that shells out to a local upscaler executable.
pub struct LocalBackend {
    config: LocalBackendConfig,
}

impl LocalBackend {
    pub fn new(config: LocalBackendConfig) -> Self {
        Self { config }
    }

    /// The `.param` and `.bin` files the selected model needs.
    pub fn model_files(&self) -> [PathBuf; 2] {
        let dir = &self.config.model_dir;
        let name = &self.config.model_name;
        [
            dir.join(format!("{name}.param")),
            dir.join(format!("{name}.bin")),
        ]
    }

    /// Where the executable is asked to write the result for `input`.
    pub fn output_path(input: &Path) -> Result<PathBuf, UpscaleError> {
        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UpscaleError::protocol(format!("invalid input path {:?}", input)))?;
        Ok(input.with_file_name(output_filename(name)))
    }

    /// Full argument list for one invocation.
    pub fn command_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-o".into(),
            output.as_os_str().to_owned(),
            "-n".into(),
            self.config.model_name.clone().into(),
            "-m".into(),
            self.config.model_dir.as_os_str().to_owned(),
            "-g".into(),
            self.config.gpu_index.to_string().into(),
        ]
    }

    /// Locate the executable, either at its configured path or on `PATH`.
    fn resolve_executable(config: &LocalBackendConfig) -> Result<PathBuf, UpscaleError> {
        let exe = &config.executable;
        let missing = || UpscaleError::MissingPrerequisite {
            what: "executable",
            path: exe.clone(),
        };

        // A bare program name is looked up on PATH
        if exe.components().count() == 1 && !exe.is_absolute() && !exe.exists() {
            return which::which(exe).map_err(|_| missing());
        }

        if exe.is_file() {
            Ok(exe.clone())
        } else {
            Err(missing())
        }
    }

    /// Verify the executable and model files, returning the executable path.
    ///
    /// The filesystem and `PATH` lookups run on the blocking pool.
    async fn prepare(&self) -> Result<PathBuf, UpscaleError> {
        let config = self.config.clone();
        let model_files = self.model_files();
        tokio::task::spawn_blocking(move || {
            let exe = Self::resolve_executable(&config)?;
            for file in model_files {
                if !file.is_file() {
                    return Err(UpscaleError::MissingPrerequisite {
                        what: "model file",
                        path: file,
                    });
                }
            }
            Ok(exe)
        })
        .await
        .map_err(|e| UpscaleError::Io(std::io::Error::other(e)))?
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

#[async_trait]
impl UpscaleBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn check(&self) -> Result<(), UpscaleError> {
        self.prepare().await.map(|_| ())
    }

    async fn upscale(&self, input: &Path) -> Result<PathBuf, UpscaleError> {
        let exe = self.prepare().await?;
        let output = Self::output_path(input)?;
        let args = self.command_args(input, &output);

        info!("Running upscaler: {:?} {:?}", exe, args);

        let mut command = Command::new(&exe);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limit = self.timeout();
        let result = match tokio::time::timeout(limit, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                remove_partial(&output).await;
                return Err(UpscaleError::Timeout(limit));
            }
        };

        debug!(
            "Upscaler output: {}",
            String::from_utf8_lossy(&result.stdout).trim()
        );

        if !result.status.success() {
            remove_partial(&output).await;
            return Err(UpscaleError::ExitStatus {
                code: result
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.is_file() {
            return Err(UpscaleError::MissingOutput(output));
        }

        Ok(output)
    }
}

async fn remove_partial(path: &Path) {
    if tokio::fs::remove_file(path).await.is_ok() {
        debug!("Removed partial upscaler output {:?}", path);
    }
}
