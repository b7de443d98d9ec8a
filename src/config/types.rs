use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on request bodies accepted by the upload form
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Directory where uploads and upscaled results are stored
    #[serde(default = "default_media_root")]
    pub root: PathBuf,

    /// Public base URL prepended to generated filenames
    #[serde(default = "default_media_url")]
    pub url: String,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_media_url() -> String {
    "/media/".to_string()
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            url: default_media_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Hosted Gradio Space reached over HTTP
    Remote(RemoteBackendConfig),
    /// Real-ESRGAN style executable on the local machine
    Local(LocalBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Remote(RemoteBackendConfig::default())
    }
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Remote(_) => "remote",
            BackendConfig::Local(_) => "local",
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        match self {
            BackendConfig::Remote(remote) => remote.timeout_secs,
            BackendConfig::Local(local) => local.timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RemoteBackendConfig {
    /// Space identifier in `owner/name` form
    #[serde(default = "default_space")]
    pub space: String,

    #[serde(default = "default_api_name")]
    pub api_name: String,

    /// Overrides the `*.hf.space` host derived from `space`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Route prefix of the Gradio HTTP API (`/gradio_api` on Gradio 4+)
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Bearer token for private Spaces
    #[serde(default)]
    pub hf_token: Option<String>,

    /// Scratch directory for downloaded results (system temp dir if unset)
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_space() -> String {
    "inevitable-gs/image-upscaler".to_string()
}

fn default_api_name() -> String {
    "/predict".to_string()
}

fn default_api_prefix() -> String {
    "/gradio_api".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for RemoteBackendConfig {
    fn default() -> Self {
        Self {
            space: default_space(),
            api_name: default_api_name(),
            base_url: None,
            api_prefix: default_api_prefix(),
            hf_token: None,
            download_dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LocalBackendConfig {
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// GPU device index; -1 runs on the CPU
    #[serde(default = "default_gpu_index")]
    pub gpu_index: i32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_executable() -> PathBuf {
    PathBuf::from("realesrgan-ncnn-vulkan")
}

fn default_model_name() -> String {
    "realesrgan-x4plus".to_string()
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_gpu_index() -> i32 {
    -1
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            model_name: default_model_name(),
            model_dir: default_model_dir(),
            gpu_index: default_gpu_index(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
