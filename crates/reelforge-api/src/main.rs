//! Axum API server binary.
//!
//! Hosts the HTTP API and an in-process worker executor over the shared
//! job store.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelforge_api::{create_router, ApiConfig, AppState};
use reelforge_worker::{
    register_default_processors, JobContext, JobExecutor, MemoryStorage, ProcessorRegistry,
    StaticProvider, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reelforge=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting reelforge-api");

    // Load configuration
    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    // Create application state
    let state = AppState::new(config.clone());

    // Initialize metrics
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(reelforge_api::metrics::init_metrics())
    } else {
        None
    };

    // Start the in-process worker executor over the shared store.
    let mut registry = ProcessorRegistry::new();
    register_default_processors(&mut registry);
    let ctx = JobContext::new(
        state.store.clone(),
        Arc::new(StaticProvider),
        Arc::new(MemoryStorage::new()),
    );
    let executor = Arc::new(JobExecutor::new(WorkerConfig::from_env(), ctx, registry));
    let executor_task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            if let Err(e) = executor.run().await {
                error!("Worker executor stopped with error: {}", e);
            }
        })
    };

    // Create router
    let app = create_router(state, metrics_handle);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Drain in-flight jobs before exiting.
    executor.shutdown();
    let _ = executor_task.await;

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
