//! Homestead - refreshable static content server
//!
//! Serves a periodically refreshed, key-addressed view of either a local
//! directory tree or a remote blob manifest, behind a plain HTTP port and
//! an optional TLS port.

mod error;
mod server;
mod types;

use crate::error::{Result, ServerError};
use crate::server::{create_router, HttpListener};
use crate::types::{ServerConfig, LANDING_PAGE};
use blob_manifest::ManifestSource;
use refreshable_cache::{Dispatcher, FilesystemSource, Handler, RefreshableCache};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter =
        EnvFilter::from_default_env().add_directive("homestead_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Homestead content server...");

    // Load configuration from environment
    let config = load_config()?;
    info!("Address: {}", config.address);
    info!("Plain port: {}", config.port);
    info!("TLS port: {}", config.ssl_port);
    info!("Refresh interval: {:?}", config.refresh_interval);

    let mut dispatcher = Dispatcher::new(LANDING_PAGE);

    if config.use_fs {
        let cwd = std::env::current_dir()
            .map_err(|e| ServerError::Config(format!("unable to resolve working directory: {}", e)))?;
        let root = cwd.join(&config.static_root);
        info!("Static root: {:?}", root);
        let source = FilesystemSource::new(root, cwd);
        let cache = RefreshableCache::new(
            "/api/static",
            Box::new(source),
            config.refresh_interval,
        );
        cache.start();
        dispatcher = dispatcher.with_handler(cache as Arc<dyn Handler>);
    }

    if let Some(manifest_url) = &config.manifest_url {
        info!("Manifest: {}", manifest_url);
        let source = ManifestSource::new(manifest_url.clone())?;
        let cache = RefreshableCache::new(
            "/api/blob",
            Box::new(source),
            config.refresh_interval,
        );
        cache.start();
        dispatcher = dispatcher.with_handler(cache as Arc<dyn Handler>);
    }

    let router = create_router(Arc::new(dispatcher));
    let listener = Arc::new(HttpListener::new(router, &config));
    listener.start().await?;
    info!("Serving; send SIGINT to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ServerError::Config(format!("signal handler failed: {}", e)))?;
    info!("Shutdown signal received");
    listener.stop().await;

    Ok(())
}

fn load_config() -> Result<ServerConfig> {
    let address = std::env::var("ADDRESS")
        .ok()
        .and_then(|s| s.parse::<IpAddr>().ok())
        .unwrap_or_else(|| IpAddr::from([0, 0, 0, 0]));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(80);

    let ssl_port = std::env::var("SSL_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(443);

    let use_fs = std::env::var("USE_FS")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    let static_root = std::env::var("STATIC_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("http_files"));

    let manifest_url = std::env::var("MANIFEST_URL")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let refresh_interval = std::env::var("REFRESH_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(5 * 60));

    let tls_key = std::env::var("TLS_KEY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("privkey.pem"));

    let tls_cert = std::env::var("TLS_CERT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("fullchain.pem"));

    Ok(ServerConfig {
        address,
        port,
        ssl_port,
        use_fs,
        static_root,
        manifest_url,
        refresh_interval,
        tls_key,
        tls_cert,
    })
}
