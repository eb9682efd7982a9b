//! # Cajal Server
//!
//! Headless scene server: a WebSocket JSON-RPC control surface over a shared
//! 3D scene, driven by a fixed-rate control loop on the main thread.
//!
//! ## Usage
//!
//! ```bash
//! # Start with default settings
//! cajal-server
//!
//! # Custom port and a faster control loop
//! cajal-server --port 8300 --tick-rate 120
//!
//! # Config file plus a preloaded scene cache
//! cajal-server --config cajal.toml --load brain.cjc
//! ```
//!
//! ## Configuration (cajal.toml)
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8200
//! tick_rate = 60
//!
//! [network]
//! max_message_bytes = 67108864
//!
//! [scene]
//! preload_cache = "brain.cjc"
//! ```

mod config;
mod engine;
mod entrypoints;
mod loaders;
mod ws;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use cajal_common::{AnimationParameters, AnimationParametersRef, RenderBackend, RenderBackendRef, Scene};
use cajal_networking::messages::{self, MessageFactory};
use cajal_networking::ConnectionManager;
use clap::Parser;
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;
use crate::engine::HeadlessBackend;
use crate::entrypoints::{scene_summary, Dispatcher, EntrypointContext, EntrypointRegistry};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cajal-server")]
#[command(about = "Cajal scene server")]
#[command(version)]
struct Args {
    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Control loop rate (Hz)
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scene cache file to preload
    #[arg(short, long)]
    load: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,tower_http=info,hyper=info")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║                     Cajal Scene Server                     ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    // Config file first, then environment, CLI flags win
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path),
        None => ServerConfig::default(),
    };
    config.apply_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.server.tick_rate = tick_rate;
    }
    if let Some(load) = args.load {
        config.scene.preload_cache = Some(load);
    }

    info!("Server configuration:");
    info!("  Bind: {}:{}", config.server.host, config.server.port);
    info!("  Tick rate: {} Hz", config.server.tick_rate);
    info!("  Max message: {} bytes", config.network.max_message_bytes);

    run(config)
}

// ============================================================================
// Engine Assembly
// ============================================================================

fn run(config: ServerConfig) -> anyhow::Result<()> {
    let backend = Arc::new(HeadlessBackend::new());
    let scene = Arc::new(Scene::new(backend.clone() as RenderBackendRef));
    loaders::register_builtin(scene.loaders());

    let animation: AnimationParametersRef = Arc::new(Mutex::new(AnimationParameters::new()));
    let manager = Arc::new(ConnectionManager::new());
    let running = Arc::new(AtomicBool::new(true));

    if let Some(path) = &config.scene.preload_cache {
        match scene.load_from_cache_file(path) {
            Ok(ids) => {
                info!(models = ids.len(), path = %path.display(), "preloaded scene cache");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "could not preload scene cache"),
        }
    }
    scene.compute_bounds();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the async runtime")?;

    let bind = config.bind_addr()?;
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind(bind))
        .with_context(|| format!("binding {bind}"))?;
    info!("Listening on ws://{bind}/ws");

    let app = ws::router(manager.clone(), config.network.max_message_bytes);
    runtime.spawn(async move {
        if let Err(e) = ws::serve(listener, app).await {
            error!(error = %e, "websocket server stopped");
        }
    });

    {
        let running = running.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    let context = EntrypointContext::new(
        scene.clone(),
        animation.clone(),
        manager.clone(),
        backend.clone(),
        running.clone(),
    );
    let mut dispatcher = Dispatcher::new(EntrypointRegistry::with_defaults(), context);

    info!("Server ready, waiting for clients");
    control_loop(config.server.tick_rate, &mut dispatcher);

    info!(
        frames = backend.frames_rendered(),
        clients = manager.connection_count(),
        "shutting down"
    );
    runtime.shutdown_timeout(Duration::from_secs(2));
    Ok(())
}

// ============================================================================
// Control Loop
// ============================================================================

/// One tick: drain buffered client traffic into the entrypoints, commit
/// dirty scene state to the backend, render, and tell every client when the
/// scene they are looking at changed.
fn control_loop(tick_rate: u32, dispatcher: &mut Dispatcher) {
    let scene = dispatcher.context().scene.clone();
    let animation = dispatcher.context().animation.clone();
    let manager = dispatcher.context().manager.clone();
    let backend = dispatcher.context().backend.clone();
    let running = dispatcher.context().running.clone();

    let tick = Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)));
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        manager.update(dispatcher);
        if let Err(e) = scene.commit(&animation) {
            error!(error = %e, "scene commit failed");
        }
        if let Err(e) = backend.render() {
            error!(error = %e, "render failed");
        }
        if scene.take_modified() {
            scene.compute_bounds();
            let notification = MessageFactory::notification("scene", scene_summary(&scene));
            match messages::to_packet(&notification) {
                Ok(packet) => manager.broadcast(packet),
                Err(e) => error!(error = %e, "could not encode scene notification"),
            }
        }

        if let Some(rest) = tick.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
