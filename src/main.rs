// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! `eufd`: energy-utility feedback controller daemon.
//!
//! Connects to a task-processing engine, takes over its hardware tuning
//! (the engine's own energy management is disabled first), generates the
//! per-benchmark configuration spaces, and then hands everything to the
//! tick-driven control loop. An HTTP control surface for operators runs on
//! a dedicated thread next to it.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use miette::{IntoDiagnostic as _, WrapErr as _, miette};
use tracing::info;
use url::Url;

use euf_controller::Controller;
use euf_engine_client::http::HttpEngineClient;
use euf_engine_client::EngineClient;
use euf_model::{ConfigurationCache, HardwareModel as _, ModelFile};
use euf_state::ControllerHandle;
use euf_telemetry::{RaplReader, TelemetryPuller};

/// One controller tick per second of wall clock.
const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Telemetry sampling cadence.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);
/// Telemetry retention.
const HISTORY_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Parser)]
#[command(name = "eufd", version, about = "Energy-utility feedback controller")]
struct Cli {
    /// Engine management endpoint.
    #[arg(long, default_value = "http://localhost:8421/")]
    url: Url,

    /// Port override for the engine endpoint.
    #[arg(long)]
    port: Option<u16>,

    /// User name for engine authentication.
    #[arg(long)]
    user: Option<String>,

    /// Password for engine authentication.
    #[arg(long)]
    passwd: Option<String>,

    /// Run headless. Accepted for compatibility; this build always runs
    /// headless.
    #[arg(long)]
    nocurses: bool,

    /// Name of the engine session to manage.
    #[arg(long, default_value = "default")]
    session: String,

    /// Path to the calibrated model file.
    #[arg(long, default_value = "models/default.json")]
    model: PathBuf,

    /// Bind address of the HTTP control surface.
    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: String,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    if cli.nocurses {
        info!("running headless");
    }

    let url = engine_url(cli.url, cli.port)?;
    let model = ModelFile::load(&cli.model)
        .into_diagnostic()
        .wrap_err("hardware/workload model unavailable")?;
    let (hardware, workload) = model.into_models();

    let engine: Arc<dyn EngineClient> = Arc::new(
        HttpEngineClient::connect(url, credentials(cli.user, cli.passwd))
            .into_diagnostic()
            .wrap_err("engine unavailable")?,
    );

    // Exactly one party issues hardware commands from here on.
    engine
        .energy_management(false, false)
        .into_diagnostic()
        .wrap_err("failed to disable engine-side energy management")?;

    let snapshot = engine
        .session(&cli.session)
        .into_diagnostic()
        .wrap_err_with(|| format!("session '{}' unavailable", cli.session))?;
    let cache = ConfigurationCache::build(&hardware, &workload, snapshot.benchmarks.keys());
    info!(
        session = cli.session,
        benchmarks = cache.len(),
        "configuration spaces generated"
    );

    let axes = hardware.axes();
    let handle = ControllerHandle::new(cli.session, axes.min_freq_khz(), axes.max_freq_khz());

    let admin = euf_controller::spawn_admin_server(cli.bind, handle.clone(), engine.clone())?;

    let puller = TelemetryPuller::new(REFRESH_INTERVAL, HISTORY_WINDOW, RaplReader::probe());
    let controller = Controller::new(engine, handle, cache, axes, puller, TICK_INTERVAL);

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let control_thread = thread::Builder::new()
        .name("control-loop".to_owned())
        .spawn(move || controller.run(&shutdown_rx))
        .into_diagnostic()?;

    wait_for_interrupt()?;
    info!("interrupt received, shutting down");

    // Stop the control thread first; the admin socket closes only after
    // the loop has fully wound down.
    let _ = shutdown_tx.send(());
    control_thread
        .join()
        .map_err(|panic| miette!("control loop panicked: {panic:?}"))?;
    admin.shutdown_and_join()?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Applies the `--port` override to the engine endpoint.
fn engine_url(mut url: Url, port: Option<u16>) -> miette::Result<Url> {
    if let Some(port) = port {
        url.set_port(Some(port))
            .map_err(|()| miette!("'{url}' does not take a port"))?;
    }
    Ok(url)
}

/// Basic-auth credentials; a user without a password gets an empty one.
fn credentials(user: Option<String>, passwd: Option<String>) -> Option<(String, String)> {
    user.map(|user| (user, passwd.unwrap_or_default()))
}

fn wait_for_interrupt() -> miette::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    rt.block_on(tokio::signal::ctrl_c()).into_diagnostic()
}
