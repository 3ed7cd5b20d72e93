//! Command-line interface for the swap event sync engine.
//!
//! # Commands
//!
//! - `history`: one backfill pass over the lookback window, print one page
//! - `watch`: backfill plus live tail, print swaps as they are merged
//! - `serve`: run the engine behind the HTTP API
//! - `window`: print the wallet's trading window status
//!
//! # Example
//!
//! ```bash
//! swap-event-sync history --wallet 0x... --page 2
//! swap-event-sync watch --mode subscribe
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::server::run_server;
use crate::app_state::AppState;
use crate::config::{Config, LiveMode};
use crate::error::{SyncError, SyncResult};
use crate::events::{wall_clock_seconds, EventRecord, SwapFilter};
use crate::rpc::{check_connection, create_provider, get_chain_id, Provider};
use crate::sync::{
    BackfillDriver, Page, RetryPolicy, RetryingFetcher, Session, SessionChange, SessionIdentity,
    SessionKey, SyncEngine,
};
use crate::window::trading_window;

/// Swap event sync engine
#[derive(Parser, Debug)]
#[command(name = "swap-event-sync")]
#[command(about = "Backfill and live-sync a wallet's on-chain swap events", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Backfill the lookback window once and print a page
    History {
        /// Wallet to scan (default: WALLET_ADDRESS)
        #[arg(short, long, value_parser = parse_wallet)]
        wallet: Option<Address>,

        /// Blocks behind the head to scan (default: LOOKBACK_BLOCKS)
        #[arg(short, long)]
        lookback: Option<u64>,

        /// Page to print
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Backfill, then follow new blocks
    Watch {
        /// Wallet to follow (default: WALLET_ADDRESS)
        #[arg(short, long, value_parser = parse_wallet)]
        wallet: Option<Address>,

        /// Live strategy: poll or subscribe (default: LIVE_MODE)
        #[arg(short, long)]
        mode: Option<String>,

        /// Poll interval in milliseconds (default: POLL_INTERVAL_MS)
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Seconds between network checks
        #[arg(long, default_value = "30")]
        probe_secs: u64,
    },

    /// Run the engine and serve the HTTP API
    Serve {
        /// Wallet to follow (default: WALLET_ADDRESS)
        #[arg(short, long, value_parser = parse_wallet)]
        wallet: Option<Address>,

        /// Port to listen on (default: API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the trading window status
    Window {
        /// Wallet to check (default: WALLET_ADDRESS)
        #[arg(short, long, value_parser = parse_wallet)]
        wallet: Option<Address>,
    },
}

fn parse_wallet(value: &str) -> Result<Address, String> {
    value
        .parse::<Address>()
        .map_err(|e| format!("invalid address {value}: {e}"))
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if configuration is invalid, no wallet is known, or
/// the RPC endpoint cannot be reached.
pub async fn run() -> SyncResult<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::History {
            wallet,
            lookback,
            page,
            json,
        } => {
            if let Some(lookback) = lookback {
                config.sync_mut().lookback_blocks = lookback;
            }
            let wallet = resolve_wallet(wallet, &config)?;
            run_history_command(&config, wallet, page, json).await
        }
        Commands::Watch {
            wallet,
            mode,
            interval_ms,
            probe_secs,
        } => {
            if let Some(mode) = mode {
                config.sync_mut().live_mode = mode.parse::<LiveMode>()?;
            }
            if let Some(ms) = interval_ms {
                config.sync_mut().poll_interval = Duration::from_millis(ms.max(1));
            }
            let wallet = resolve_wallet(wallet, &config)?;
            run_watch_command(&config, wallet, Duration::from_secs(probe_secs.max(1))).await
        }
        Commands::Serve { wallet, port } => {
            let wallet = resolve_wallet(wallet, &config)?;
            let port = port.unwrap_or_else(|| config.api_port());
            run_serve_command(&config, wallet, port).await
        }
        Commands::Window { wallet } => {
            let wallet = resolve_wallet(wallet, &config)?;
            run_window_command(&config, wallet).await
        }
    }
}

async fn connect(config: &Config) -> SyncResult<Arc<Provider>> {
    let provider = create_provider(config.rpc_url()).await?;
    check_connection(&provider).await?;
    Ok(Arc::new(provider))
}

fn resolve_wallet(flag: Option<Address>, config: &Config) -> SyncResult<Address> {
    flag.or_else(|| config.wallet_address())
        .ok_or_else(|| SyncError::session_not_ready("wallet address (set --wallet or WALLET_ADDRESS)"))
}

/// One backfill pass, then print a page.
async fn run_history_command(config: &Config, wallet: Address, page: usize, json: bool) -> SyncResult<()> {
    let settings = config.sync();
    let provider = connect(config).await?;
    let chain_id = get_chain_id(&provider).await?;

    let session = Session::new(1, SessionKey {
        address: wallet,
        chain_id,
    });
    let fetcher = RetryingFetcher::new(
        provider,
        SwapFilter::new(settings.swap_contract, wallet),
        RetryPolicy::new(settings.max_attempts, settings.retry_base_delay),
    );
    let height = fetcher.block_height().await?;

    info!(%wallet, chain_id, height, "Running history backfill");
    let report = BackfillDriver::new(fetcher, session.clone(), settings.lookback_blocks, settings.batch_size)
        .run(height)
        .await;

    if !report.abandoned.is_empty() {
        warn!(abandoned = report.abandoned.len(), "Some block ranges could not be fetched");
    }

    let page = session.page(settings.page_size, page).await;
    if json {
        let out = serde_json::to_string_pretty(&page)
            .map_err(|e| SyncError::config("Failed to serialize page", Some(Box::new(e))))?;
        println!("{out}");
    } else {
        print_page(&page);
        if !report.abandoned.is_empty() {
            println!(
                "{} {} block range(s) could not be fetched; history may be incomplete",
                "⚠️".yellow(),
                report.abandoned.len()
            );
        }
    }

    Ok(())
}

/// Backfill plus live tail until Ctrl-C.
async fn run_watch_command(config: &Config, wallet: Address, probe_every: Duration) -> SyncResult<()> {
    println!("{}", "🔍 Watching for swaps...".cyan().bold());

    let provider = connect(config).await?;
    let mut engine = SyncEngine::new(config.sync().clone());
    let mut sessions = engine.subscribe();

    let chain_id = get_chain_id(&provider).await.ok();
    apply(&mut engine, wallet, chain_id, &provider);

    let mut probe = tokio::time::interval(probe_every);
    probe.tick().await;

    let mut current: Option<Session> = sessions.borrow_and_update().clone();
    let mut revisions = current.as_ref().map(Session::subscribe);
    let mut printed: HashSet<B256> = HashSet::new();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                println!();
                println!("{}", "🛑 Shutting down...".yellow().bold());
                engine.shutdown();
                break;
            }

            _ = probe.tick() => {
                match get_chain_id(&provider).await {
                    Ok(id) => apply(&mut engine, wallet, Some(id), &provider),
                    Err(e) => warn!(error = %e, "Network probe failed"),
                }
            }

            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                current = sessions.borrow_and_update().clone();
                revisions = current.as_ref().map(Session::subscribe);
                printed.clear();
                if let Some(session) = &current {
                    let key = session.key();
                    println!(
                        "{} Session {} on chain {}",
                        "🔄".cyan(),
                        key.address.to_string().yellow(),
                        key.chain_id.to_string().yellow()
                    );
                }
            }

            Some(()) = next_revision(revisions.as_mut()) => {
                if let Some(session) = &current {
                    print_new_records(&session.snapshot().await, &mut printed);
                }
            }
        }
    }

    println!("{}", "👋 Shutdown complete".green().bold());
    Ok(())
}

async fn next_revision(revisions: Option<&mut watch::Receiver<u64>>) -> Option<()> {
    match revisions {
        Some(rx) => rx.changed().await.ok(),
        None => std::future::pending().await,
    }
}

fn apply(engine: &mut SyncEngine<Provider>, wallet: Address, chain_id: Option<u64>, provider: &Arc<Provider>) {
    let identity = SessionIdentity::new(Some(wallet), chain_id, Some(Arc::clone(provider)));
    match engine.apply_identity(identity) {
        SessionChange::Started(session) => info!(session = session.id(), "Session started"),
        SessionChange::Idle { reason } => warn!(%reason, "Waiting for network"),
        SessionChange::Unchanged => {}
    }
}

/// Engine behind the HTTP API until Ctrl-C.
async fn run_serve_command(config: &Config, wallet: Address, port: u16) -> SyncResult<()> {
    let provider = connect(config).await?;
    let chain_id = get_chain_id(&provider).await.ok();

    let mut engine = SyncEngine::new(config.sync().clone());
    apply(&mut engine, wallet, chain_id, &provider);

    let state = AppState::new(engine.subscribe(), config.sync().page_size);
    println!("{} Serving on port {}", "🚀".green(), port.to_string().yellow());

    tokio::select! {
        result = run_server(state, port) => {
            result.map_err(|e| SyncError::config("API server failed", Some(e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    engine.shutdown();
    Ok(())
}

/// Print the trading window status.
async fn run_window_command(config: &Config, wallet: Address) -> SyncResult<()> {
    let provider = connect(config).await?;
    let window = trading_window(&provider, config.window_contract(), wallet, wall_clock_seconds()).await?;

    let status = if window.is_active() {
        window.to_string().green().bold()
    } else {
        window.to_string().red().bold()
    };
    println!("{} {} {}", "⏱️".cyan(), wallet.to_string().yellow(), status);
    Ok(())
}

fn print_new_records(records: &[EventRecord], printed: &mut HashSet<B256>) {
    // Store is newest first; print oldest first so output reads chronologically.
    for record in records.iter().rev() {
        if printed.insert(record.transaction_hash) {
            print_record(record);
        }
    }
}

fn print_page(page: &Page) {
    if page.records.is_empty() {
        println!("{}", "No swaps found in the lookback window.".yellow().bold());
        return;
    }
    for record in &page.records {
        print_record(record);
    }
    println!(
        "{}",
        format!(
            "Page {}/{} ({} swaps)",
            page.page,
            page.total_pages.max(1),
            page.total_records
        )
        .dimmed()
    );
}

fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map_or_else(|| timestamp.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn print_record(record: &EventRecord) {
    println!(
        "{} {} Block: {} | {} → {} | Fee: {} | Tx: {}",
        "💱".cyan(),
        format_timestamp(record.timestamp).dimmed(),
        record.block_number.to_string().yellow(),
        record.from_token.to_string().blue(),
        record.to_token.to_string().magenta(),
        record.fee.green(),
        record.transaction_hash.to_string().dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        for args in [
            vec!["swap-event-sync", "history"],
            vec!["swap-event-sync", "watch"],
            vec!["swap-event-sync", "serve"],
            vec!["swap-event-sync", "window"],
        ] {
            assert!(Cli::try_parse_from(args).is_ok());
        }
    }

    #[test]
    fn test_history_flags() {
        let cli = Cli::try_parse_from([
            "swap-event-sync",
            "history",
            "--wallet",
            "0x1111111111111111111111111111111111111111",
            "--page",
            "3",
            "--json",
        ]);
        assert!(cli.is_ok());

        if let Ok(Cli {
            command: Commands::History {
                wallet, page, json, ..
            },
        }) = cli
        {
            assert_eq!(wallet, Some(Address::repeat_byte(0x11)));
            assert_eq!(page, 3);
            assert!(json);
        }
    }

    #[test]
    fn test_invalid_wallet_rejected() {
        assert!(Cli::try_parse_from(["swap-event-sync", "window", "--wallet", "0xnope"]).is_err());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
    }
}
