//! Integration tests for loading configuration files.

use std::fs;
use std::path::PathBuf;

use upscaler::config::{load_config, load_config_or_default, BackendConfig};

fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn loads_remote_backend_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[server]
host = "127.0.0.1"
port = 9000

[media]
root = "/srv/upscaler/media"
url = "/files/"

[backend]
kind = "remote"
space = "someone/esrgan"
hf_token = "hf_abc"
timeout_secs = 60
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.media.root, PathBuf::from("/srv/upscaler/media"));
    assert_eq!(config.media.url, "/files/");

    match config.backend {
        BackendConfig::Remote(remote) => {
            assert_eq!(remote.space, "someone/esrgan");
            assert_eq!(remote.hf_token.as_deref(), Some("hf_abc"));
            assert_eq!(remote.api_name, "/predict");
            assert_eq!(remote.timeout_secs, 60);
        }
        other => panic!("expected remote backend, got {other:?}"),
    }
}

#[test]
fn loads_local_backend_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[backend]
kind = "local"
executable = "/opt/esrgan/realesrgan-ncnn-vulkan"
model_dir = "/opt/esrgan/models"
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.server.port, 8000);
    match config.backend {
        BackendConfig::Local(local) => {
            assert_eq!(
                local.executable,
                PathBuf::from("/opt/esrgan/realesrgan-ncnn-vulkan")
            );
            assert_eq!(local.model_name, "realesrgan-x4plus");
            assert_eq!(local.gpu_index, -1);
            assert_eq!(local.timeout_secs, 300);
        }
        other => panic!("expected local backend, got {other:?}"),
    }
}

#[test]
fn explicit_path_takes_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server]\nport = 8123\n");

    let config = load_config_or_default(Some(&path)).unwrap();
    assert_eq!(config.server.port, 8123);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config_or_default(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read config file"));
}

#[test]
fn invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[backend]
kind = "remote"
space = "not-a-space-id"
"#,
    );

    let err = load_config(&path).unwrap_err();
    assert!(format!("{err:#}").contains("owner/name"));
}

#[test]
fn unknown_backend_kind_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[backend]\nkind = \"cloud\"\n");

    assert!(load_config(&path).is_err());
}
