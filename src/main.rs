mod cli;

use upscaler::{
    backend::build_backend,
    config,
    images::{MediaStorage, UploadedImage, UpscaleService},
    server,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting upscaler server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!(
        "Media stored in {:?}, published at {}",
        config.media.root,
        config.media.url
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "upscaler=trace,tower_http=debug".to_string()
        } else {
            "upscaler=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Upscale { input, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(upscale_file(&input, cli.config.as_deref(), json))
        }
        Commands::CheckBackend => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_backend(cli.config.as_deref()))
        }
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("upscaler {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn upscale_file(
    input: &std::path::Path,
    config_path: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {:?}", input))?;
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let backend = build_backend(&config.backend)?;
    let storage = MediaStorage::new(config.media.root.clone(), config.media.url.clone());
    let service = UpscaleService::new(storage, backend);

    tracing::info!("Upscaling {:?}", input);
    let result = service.process(UploadedImage::new(file_name, data)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if let Some(ref url) = result.original {
            print!("Original: {}", url);
            if let Some(dims) = result.original_dimensions() {
                print!(" ({})", dims);
            }
            println!();
        }
        if let Some(ref url) = result.upscaled {
            print!("Upscaled: {}", url);
            if let Some(dims) = result.upscaled_dimensions() {
                print!(" ({})", dims);
            }
            println!();
        }
    }

    if let Some(error) = result.error {
        anyhow::bail!(error);
    }

    Ok(())
}

async fn check_backend(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let backend = build_backend(&config.backend)?;

    println!("Checking {} backend...\n", backend.name());

    match backend.check().await {
        Ok(()) => {
            println!("✓ {} backend is ready", backend.name());
            Ok(())
        }
        Err(e) => {
            println!("✗ {}", e);
            anyhow::bail!("{} backend is not usable", backend.name())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Media root: {:?}", config.media.root);
    println!("  Media URL: {}", config.media.url);
    println!("  Backend: {}", config.backend.kind());
    println!("  Timeout: {}s", config.backend.timeout_secs());

    Ok(())
}
