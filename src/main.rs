//! Price Sync - demand-driven shop pricing daemon
//!
//! Prices purchases scanned on stdin, decays unsold items once per period and
//! keeps the catalog reconciled with a peer store. Runs until ctrl-c.

use chrono::NaiveDateTime;
use clap::Parser;
use price_sync::baseline::{self, StatisticsClient};
use price_sync::catalog::local_now;
use price_sync::config::{
    default_catalog_path, NodeConfig, DEFAULT_DECAY_INTERVAL_SECS, DEFAULT_PUSH_INTERVAL_SECS,
};
use price_sync::error::{CatalogError, SyncError};
use price_sync::{
    CatalogStore, PricingEngine, PushOutcome, RecentScans, Role, ScanSession, SyncAgent,
    SyncConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};

/// Shop pricing daemon - demand pricing with peer store sync
#[derive(Parser, Debug)]
#[command(name = "price_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the catalog JSON file
    #[arg(short, long, default_value_t = default_catalog_path().to_string_lossy().to_string())]
    catalog: String,

    /// Baseline seed file (JSON array) imported into the catalog at startup
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Refresh baseline prices from the statistics API before import
    #[arg(long, default_value_t = false)]
    fetch_baseline: bool,

    /// Role of this node; decides which sync port it listens on
    #[arg(long, value_enum, default_value_t = Role::Server)]
    role: Role,

    /// Host name or IP of the peer store
    #[arg(long, default_value = "127.0.0.1")]
    peer: String,

    /// Seconds between price pushes to the peer
    #[arg(long, default_value_t = DEFAULT_PUSH_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    push_interval_secs: u64,

    /// Seconds without a purchase before an item decays
    #[arg(long, default_value_t = DEFAULT_DECAY_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    decay_interval_secs: u64,

    /// Enable dashboard API on specified port (default: disabled)
    #[arg(long)]
    web_port: Option<u16>,

    /// Run without a peer
    #[arg(long, default_value_t = false)]
    no_sync: bool,

    /// Read scanned barcodes from stdin, one per line
    #[arg(long, default_value_t = false)]
    stdin_scans: bool,
}

impl Args {
    fn into_config(self) -> NodeConfig {
        NodeConfig {
            catalog_path: PathBuf::from(self.catalog),
            baseline_path: self.baseline,
            fetch_baseline: self.fetch_baseline,
            sync: (!self.no_sync).then(|| SyncConfig::for_role(self.role, self.peer)),
            push_interval: Duration::from_secs(self.push_interval_secs),
            decay_interval: Duration::from_secs(self.decay_interval_secs),
            web_port: self.web_port,
            stdin_scans: self.stdin_scans,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();

    log::info!("Starting price_sync...");
    log::info!("Catalog path: {}", config.catalog_path.display());

    let store = match open_catalog(&config).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to prepare catalog: {}", e);
            std::process::exit(1);
        }
    };
    if store.is_empty() {
        log::warn!("Catalog is empty, every scan will be reported as unknown");
    }

    let recent = Arc::new(RecentScans::new());

    // Spawn web server if --web-port specified
    if let Some(port) = config.web_port {
        let web_store = Arc::clone(&store);
        let web_recent = Arc::clone(&recent);
        tokio::spawn(async move {
            if let Err(e) = price_sync::web::serve(web_store, web_recent, port).await {
                log::error!("Web server error: {}", e);
            }
        });
    }

    let agent = match config.sync.clone() {
        Some(sync_config) => match SyncAgent::start(sync_config, Arc::clone(&store)).await {
            Ok(agent) => Some(Arc::new(agent)),
            Err(e) => {
                log::error!("Sync disabled: {}", e);
                None
            }
        },
        None => {
            log::info!("Sync disabled by --no-sync");
            None
        }
    };

    let engine = PricingEngine::new(Arc::clone(&store));
    run_daemon(&config, engine, recent, agent.clone()).await;

    if let Some(agent) = &agent {
        agent.shutdown().await;
    }
    if let Err(e) = store.save() {
        log::error!("Failed to save catalog on shutdown: {}", e);
    }
    log::info!("price_sync stopped.");
}

/// Load the catalog and import the baseline seed file, if one was given
async fn open_catalog(config: &NodeConfig) -> price_sync::Result<Arc<CatalogStore>> {
    // Ensure parent directory exists
    if let Some(parent) = config.catalog_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(CatalogError::from)?;
            log::info!("Created directory: {}", parent.display());
        }
    }

    let store = Arc::new(CatalogStore::load(&config.catalog_path));
    log::info!("Catalog holds {} items", store.len());

    if let Some(seed) = &config.baseline_path {
        let client = StatisticsClient::new();
        baseline::import(&store, seed, config.fetch_baseline, &client).await?;
    }
    Ok(store)
}

/// Run the scheduler loop until ctrl-c
async fn run_daemon(
    config: &NodeConfig,
    engine: PricingEngine,
    recent: Arc<RecentScans>,
    agent: Option<Arc<SyncAgent>>,
) {
    let mut push_ticker = interval(config.push_interval);
    push_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut decay_ticker = interval(config.decay_interval);
    decay_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Interval ticks complete immediately the first time
    push_ticker.tick().await;
    decay_ticker.tick().await;

    // Bring the peer up to date with everything we have
    let mut last_push = local_now();
    if let Some(agent) = &agent {
        if let Err(e) = agent.push_all().await {
            log::warn!("Initial price push failed: {}", e);
        }
    }

    let mut in_flight: Option<PendingPush> = None;
    let mut session = ScanSession::new(engine.clone(), recent);
    let mut scans = config
        .stdin_scans
        .then(|| BufReader::new(tokio::io::stdin()).lines());
    if scans.is_some() {
        log::info!("Reading scans from stdin (empty line or 'done' finishes a transaction)");
    }

    log::info!(
        "Running in daemon mode, pushing every {}s, decay period {}s",
        config.push_interval.as_secs(),
        config.decay_interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = push_ticker.tick() => {
                if let Some(agent) = &agent {
                    if in_flight.is_some() {
                        log::debug!("Previous push still in flight, skipping tick");
                    } else {
                        in_flight = Some((local_now(), agent.spawn_push(last_push)));
                    }
                }
            }
            result = finish_push(&mut in_flight) => {
                if let Some((started, _)) = in_flight.take() {
                    match result {
                        Ok(Ok(PushOutcome::Sent(_))) | Ok(Ok(PushOutcome::NothingToSend)) => {
                            last_push = started
                        }
                        Ok(Ok(PushOutcome::NotRunning)) => {}
                        // Delta is resent on the next tick
                        Ok(Err(e)) => log::warn!("Price push failed: {}", e),
                        Err(e) => log::warn!("Price push task failed: {}", e),
                    }
                }
            }
            _ = decay_ticker.tick() => {
                log::info!("Scheduled decay triggered");
                engine.decay(local_now() - config.decay_period());
            }
            line = next_scan(&mut scans) => match line {
                Ok(Some(line)) => handle_scan_line(&mut session, &engine, &line),
                Ok(None) => {
                    log::info!("Scan input closed");
                    session.finish();
                    scans = None;
                }
                Err(e) => {
                    log::warn!("Error reading scan input, no longer reading stdin: {}", e);
                    scans = None;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received shutdown signal");
                break;
            }
        }
    }

    if let Some((_, handle)) = in_flight {
        handle.abort();
    }
    session.finish();
}

/// Push task started at the given time
type PendingPush = (NaiveDateTime, JoinHandle<Result<PushOutcome, SyncError>>);

/// Wait for the in-flight push, or never when none is running
async fn finish_push(
    in_flight: &mut Option<PendingPush>,
) -> Result<Result<PushOutcome, SyncError>, JoinError> {
    match in_flight {
        Some((_, handle)) => handle.await,
        None => std::future::pending().await,
    }
}

/// Next line from stdin, or never when scans are not read
async fn next_scan(scans: &mut Option<Lines<BufReader<Stdin>>>) -> std::io::Result<Option<String>> {
    match scans {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

fn handle_scan_line(session: &mut ScanSession, engine: &PricingEngine, line: &str) {
    match line.trim() {
        "" | "done" => {
            session.finish();
        }
        "cancel" => session.cancel(),
        "reset" => {
            session.cancel();
            engine.store().reset();
        }
        barcode => {
            session.scan(barcode);
        }
    }
}
