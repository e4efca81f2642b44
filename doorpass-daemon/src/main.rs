use anyhow::{Context, Result};
use clap::Parser;
use doorpass_core::push::{run_notice_feed, PushChannel};
use doorpass_core::state::{dispatch, lock};
use doorpass_core::timestamp::{format_timestamp, now};
use doorpass_core::{Dashboard, DashboardConfig, DashboardEvent, HttpRemote, Method, SyncCoordinator};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "doorpass-daemon", about = "DoorPass dashboard service")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "doorpass.toml")]
    config: PathBuf,

    /// Lock controller host override
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut cfg = if cli.config.exists() {
        DashboardConfig::load(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    } else {
        info!("No config file found, using defaults");
        DashboardConfig::default()
    };
    if let Some(host) = cli.host {
        cfg.device_host = host;
    }

    info!("Starting DoorPass daemon v{} for {}", VERSION, cfg.device_host);
    info!("Camera stream available at {}", cfg.stream_url());

    let state = Dashboard::from_config(&cfg)?.into_shared();
    let coordinator = SyncCoordinator::new(HttpRemote::from_config(&cfg)?, state.clone());

    // 1. Initial population; an unreachable lock is not fatal
    if let Err(e) = coordinator.load_all().await {
        warn!("Initial load incomplete: {}", e);
    }

    // 2. Action push channel feeding the notice log
    let (event_tx, event_rx) = mpsc::channel(32);
    let mut channel = PushChannel::new(cfg.push_url(), event_tx);
    channel.start();
    let feed_state = state.clone();
    let feed = tokio::spawn(async move {
        if let Err(e) = run_notice_feed(event_rx, feed_state).await {
            error!("Notice feed stopped: {}", e);
        }
    });

    // 3. Periodic expiry sweep until shutdown
    let mut sweep = tokio::time::interval(Duration::from_secs(cfg.expiry_sweep_secs.max(1)));
    info!("Daemon ready. Press Ctrl+C to exit.");
    loop {
        tokio::select! {
            _ = sweep.tick() => {
                dispatch(&state, DashboardEvent::ExpirySwept { now: now() })?;
                let dashboard = lock(&state)?;
                for method in Method::ALL {
                    if let Some(pass) = dashboard.nearest_expiring(method) {
                        info!(
                            "{}: {} active, next to expire {} at {}",
                            method.display_name(),
                            dashboard.store(method).active().len(),
                            pass.name,
                            format_timestamp(pass.expiry_time)
                        );
                    }
                }
            }
            result = signal::ctrl_c() => {
                result?;
                info!("Received shutdown signal");
                break;
            }
        }
    }

    channel.stop().await;
    if let Err(e) = feed.await {
        warn!("Notice feed task failed: {}", e);
    }

    Ok(())
}
