// Draftdesk server entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database, run configured CSV imports
// 4. Build the trade desk and seed cap settings
// 5. Spawn WebSocket server and session hub tasks
// 6. Wait for Ctrl+C

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use draftdesk_core::config::{self, Config};
use draftdesk_core::db::Database;
use draftdesk_core::hub::{self, SessionHub};
use draftdesk_core::import;
use draftdesk_core::session::SessionRegistry;
use draftdesk_core::trade::desk::TradeDesk;
use draftdesk_core::ws_server;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Draftdesk starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, sport={}, {} cap season(s)",
        config.league.name,
        config.league.sport,
        config.cap_seasons.len()
    );

    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);
    run_imports(&db, &config);

    let rules = config.cap_rule_table().context("invalid cap seasons")?;
    let desk = Arc::new(TradeDesk::new(db, rules, config.roster_bounds()));
    match desk.seed_cap_settings(&config.league.sport) {
        Ok(0) => {}
        Ok(n) => info!("Seeded {} cap setting(s) for {}", n, config.league.sport),
        Err(e) => warn!("Cap setting seed failed: {}", e),
    }

    let (ws_tx, ws_rx) = mpsc::channel(256);

    let listener = ws_server::bind(&config.ws_host, config.ws_port)
        .await
        .with_context(|| format!("failed to bind {}:{}", config.ws_host, config.ws_port))?;
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, ws_tx).await {
            error!("WebSocket server error: {}", e);
        }
    });

    let hub = SessionHub::new(SessionRegistry::new(config.league.sport.clone()))
        .with_trade_desk(desk);
    let hub_handle = tokio::spawn(async move {
        if let Err(e) = hub::run(ws_rx, hub).await {
            error!("Session hub error: {}", e);
        }
    });

    info!(
        "Draftdesk ready on ws://{}:{}",
        config.ws_host, config.ws_port
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutdown requested");

    // Open connections keep their event senders alive; bound the wait.
    ws_handle.abort();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), hub_handle).await;

    info!("Draftdesk shut down cleanly");
    Ok(())
}

/// Load the roster and pick snapshots named in `[import]`. Failures are
/// logged and startup continues with whatever the ledger already holds.
fn run_imports(db: &Database, config: &Config) {
    let sport = &config.league.sport;

    if let Some(path) = &config.import.rosters_csv {
        match import::import_roster_file(db, Path::new(path), sport) {
            Ok(report) => info!(
                "Imported {} roster row(s) from {} ({} skipped)",
                report.imported, path, report.skipped
            ),
            Err(e) => error!("Roster import from {} failed: {}", path, e),
        }
    }

    if let Some(path) = &config.import.picks_csv {
        match import::import_pick_file(db, Path::new(path), sport) {
            Ok(report) => info!(
                "Imported {} pick asset(s) from {} ({} skipped)",
                report.imported, path, report.skipped
            ),
            Err(e) => error!("Pick import from {} failed: {}", path, e),
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("draftdesk.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draftdesk_core=info,draftdesk=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
