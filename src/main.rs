//! Canopy - S3-compatible HTTP gateway over a hierarchical object store

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use canopy::api::handlers::{
    bucket_get_handler, create_bucket, delete_bucket, delete_object, head_bucket, head_object,
    list_buckets, object_get_handler, object_post_handler, put_object_or_copy, AppState,
    GatewayOptions,
};
use canopy::config::{BackendConfig, Config};
use canopy::store::{FsStore, TreeStore};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Canopy - S3 front end for a tree-shaped object store
#[derive(Parser, Debug)]
#[command(name = "canopy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from file if specified, otherwise use default loading
    let mut config = if let Some(ref path) = cli.config {
        Config::from_file(path)?
    } else {
        Config::load()
    };

    // Initialize tracing
    let log_level = if cli.verbose {
        "canopy=trace,tower_http=debug".to_string()
    } else {
        config.log_level.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // CLI overrides
    if let Some(ref addr) = cli.listen {
        config.listen_addr = addr.parse()?;
    }

    info!("Starting Canopy S3 gateway");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Bucket path: {}", config.bucket_path);
    info!("  Default durability: {}", config.default_durability);
    info!("  Max path length: {}", config.max_filename_length);

    let store: Arc<dyn TreeStore> = match &config.backend {
        BackendConfig::Filesystem { path } => {
            info!("  Backend: Filesystem");
            info!("  Data directory: {:?}", path);
            Arc::new(FsStore::new(path.clone(), config.store_user.clone()).await?)
        }
    };

    let options = GatewayOptions::from_config(&config);

    // The bucket root must exist before the first listing.
    store.mkdirp(&options.bucket_root).await?;

    let state = Arc::new(AppState { store, options });

    // Build router with S3-style paths
    // S3 API paths:
    //   GET / - list buckets
    //   PUT /{bucket} - create bucket
    //   DELETE /{bucket} - delete bucket
    //   HEAD /{bucket} - head bucket
    //   GET /{bucket}?uploads - list multipart uploads (fixed)
    //   GET /{bucket}?prefix=&max-keys= - list objects
    //   PUT /{bucket}/{key...} - upload object (or copy with x-amz-copy-source)
    //   GET /{bucket}/{key...} - download object (?acl for fixed policy)
    //   HEAD /{bucket}/{key...} - get object metadata
    //   DELETE /{bucket}/{key...} - delete object
    let app = Router::new()
        // Root: list buckets
        .route("/", get(list_buckets))
        // Object operations (wildcard routes first - more specific)
        .route(
            "/:bucket/*key",
            get(object_get_handler)
                .put(put_object_or_copy)
                .delete(delete_object)
                .head(head_object)
                .post(object_post_handler),
        )
        // Bucket operations (without trailing slash)
        .route(
            "/:bucket",
            get(bucket_get_handler)
                .put(create_bucket)
                .delete(delete_bucket)
                .head(head_bucket),
        )
        // Bucket operations (with trailing slash)
        .route(
            "/:bucket/",
            get(bucket_get_handler)
                .put(create_bucket)
                .delete(delete_bucket)
                .head(head_bucket),
        )
        .layer(TraceLayer::new_for_http())
        // Uploads stream straight to the store; no body size cap applies.
        .layer(DefaultBodyLimit::disable())
        .with_state(state);

    // Start server with graceful shutdown
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Canopy listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle shutdown signals (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
