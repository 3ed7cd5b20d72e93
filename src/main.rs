//! CLI entry point for the swap event sync engine.
//!
//! ```text
//! main.rs (runtime + tracing)
//!     ↓
//! cli::run
//!     ├── history → BackfillDriver (one pass)
//!     ├── watch   → SyncEngine (backfill + live poller)
//!     ├── serve   → SyncEngine + axum API
//!     └── window  → trading window read
//! ```

use swap_event_sync::{cli, observability};
use tracing::error;

/// Initializes logging from `RUST_LOG`, `LOG_JSON` and `LOG_FILE`, then runs the CLI.
#[tokio::main]
async fn main() {
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    // Held until exit so the file writer flushes.
    let _guard = match observability::init_tracing(None, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
