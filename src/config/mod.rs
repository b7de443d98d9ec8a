mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Invalid TOML")?;

    validate_config(&config)?;

    expand_paths(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./upscaler.toml",
        "~/.config/upscaler/config.toml",
        "/etc/upscaler/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

fn expand_paths(config: &mut Config) {
    config.media.root = expand(&config.media.root);

    match &mut config.backend {
        BackendConfig::Remote(remote) => {
            if let Some(dir) = remote.download_dir.as_mut() {
                *dir = expand(dir);
            }
        }
        BackendConfig::Local(local) => {
            local.executable = expand(&local.executable);
            local.model_dir = expand(&local.model_dir);
        }
    }
}

fn expand(path: &Path) -> std::path::PathBuf {
    let raw = path.to_string_lossy();
    std::path::PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    // Validate server config
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be greater than 0");
    }

    if config.media.url.trim().is_empty() {
        anyhow::bail!("media.url cannot be empty");
    }

    if config.backend.timeout_secs() == 0 {
        anyhow::bail!("backend.timeout_secs must be greater than 0");
    }

    match &config.backend {
        BackendConfig::Remote(remote) => {
            if remote.base_url.is_none() {
                let valid_space = remote
                    .space
                    .split_once('/')
                    .is_some_and(|(owner, name)| {
                        !owner.is_empty() && !name.is_empty() && !name.contains('/')
                    });
                if !valid_space {
                    anyhow::bail!(
                        "backend.space must look like 'owner/name', got '{}'",
                        remote.space
                    );
                }
            }
            if !remote.api_name.starts_with('/') {
                anyhow::bail!(
                    "backend.api_name must start with '/', got '{}'",
                    remote.api_name
                );
            }
        }
        BackendConfig::Local(local) => {
            if local.model_name.trim().is_empty() {
                anyhow::bail!("backend.model_name cannot be empty");
            }
            if local.gpu_index < -1 {
                anyhow::bail!(
                    "backend.gpu_index must be -1 (CPU) or a device index, got {}",
                    local.gpu_index
                );
            }
            if !local.executable.exists() && which::which(&local.executable).is_err() {
                tracing::warn!("Upscaler executable does not exist: {:?}", local.executable);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.media.url, "/media/");
        assert_eq!(config.backend.kind(), "remote");
        assert_eq!(config.backend.timeout_secs(), 300);
    }

    #[test]
    fn test_local_backend_section() {
        let config = parse_config(
            r#"
            [backend]
            kind = "local"
            executable = "/opt/esrgan/realesrgan-ncnn-vulkan"
            model_dir = "/opt/esrgan/models"
            gpu_index = 0
            "#,
        )
        .unwrap();

        match config.backend {
            BackendConfig::Local(local) => {
                assert_eq!(local.model_name, "realesrgan-x4plus");
                assert_eq!(local.gpu_index, 0);
                assert_eq!(local.model_dir, Path::new("/opt/esrgan/models"));
            }
            other => panic!("expected local backend, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_zero_port() {
        let err = parse_config("[server]\nport = 0\n").unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_rejects_malformed_space() {
        let err = parse_config("[backend]\nkind = \"remote\"\nspace = \"no-slash\"\n").unwrap_err();
        assert!(err.to_string().contains("backend.space"));
    }

    #[test]
    fn test_base_url_makes_space_optional() {
        let config = parse_config(
            "[backend]\nkind = \"remote\"\nspace = \"\"\nbase_url = \"http://127.0.0.1:7860\"\n",
        )
        .unwrap();
        assert_eq!(config.backend.kind(), "remote");
    }

    #[test]
    fn test_rejects_api_name_without_slash() {
        let err =
            parse_config("[backend]\nkind = \"remote\"\napi_name = \"predict\"\n").unwrap_err();
        assert!(err.to_string().contains("api_name"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = parse_config("[backend]\nkind = \"local\"\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let rendered = toml::to_string(&Config::default()).unwrap();
        let parsed = parse_config(&rendered).unwrap();
        assert_eq!(parsed.backend, BackendConfig::default());
        assert_eq!(parsed.media.root, Path::new("media"));
    }
}
