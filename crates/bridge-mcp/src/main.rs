//! bridge-mcp-server: serve the host bridge over SSE and WebSocket.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_core::{executor, HostState, Settings};
use bridge_mcp::transport::{self, AppState};
use bridge_mcp::{tools, Dispatcher, SessionRegistry, ToolRegistry};
use bridge_retrieval::{DocumentIndex, HashingEmbedder};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bridge-mcp-server", about = "MCP bridge for the host application")]
struct Args {
    /// Configuration file (TOML); BRIDGE_* env vars override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listening port, overriding configuration.
    #[arg(long)]
    port: Option<u16>,

    /// Embedding index file produced by the offline documentation job.
    #[arg(long)]
    index: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut settings =
        Settings::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(index) = args.index {
        settings.index_path = Some(index.to_string_lossy().into_owned());
    }

    let embedder = Arc::new(HashingEmbedder::new(settings.embedding_dimension));
    let index = match &settings.index_path {
        Some(path) => DocumentIndex::load(Path::new(path), embedder)
            .with_context(|| format!("failed to load index from {}", path))?,
        None => {
            warn!("no index configured, search_documents will return nothing");
            DocumentIndex::empty(embedder)
        }
    };

    let mut registry = ToolRegistry::new();
    tools::register_builtin(&mut registry, Arc::new(index))?;

    let (handle, runtime) = executor::queue(&settings);
    let heartbeat = runtime.heartbeat();
    let sessions = Arc::new(SessionRegistry::new(handle.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        handle,
        Arc::clone(&sessions),
        settings.task_timeout(),
    ));

    // The host tick loop is the only context allowed to touch host
    // state; here the bridge drives it on a dedicated thread.
    let shutdown = Arc::new(AtomicBool::new(false));
    let tick_interval = settings.tick_interval();
    let tick_shutdown = Arc::clone(&shutdown);
    let host_thread = std::thread::Builder::new()
        .name("host-tick".into())
        .spawn(move || runtime.run(HostState::new(), tick_interval, tick_shutdown))
        .context("failed to start host tick thread")?;

    let state = Arc::new(AppState {
        dispatcher,
        sessions,
        heartbeat,
        liveness_threshold: (tick_interval * 20).max(Duration::from_secs(1)),
    });
    let app = transport::router(state);

    // If the configured port is taken, fall back to an ephemeral one
    // rather than refusing to start.
    let listener = match tokio::net::TcpListener::bind(("127.0.0.1", settings.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(port = settings.port, error = %e, "port unavailable, binding an ephemeral port");
            tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?
        }
    };
    info!(addr = %listener.local_addr()?, "bridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    shutdown.store(true, Ordering::Relaxed);
    if host_thread.join().is_err() {
        warn!("host tick thread panicked during shutdown");
    }
    Ok(())
}
