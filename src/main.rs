//! Store manager queue replay CLI
//!
//! Replays a recorded transaction queue through the store manager and prints
//! the resulting notifications and finish calls as CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- queue.csv > journal.csv
//! cargo run -- --verify queue.csv > journal.csv
//! RUST_LOG=debug cargo run -- --keep-orphans queue.csv > journal.csv
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, output not writable, etc.)

use std::process;

use storekit_manager::{cli, replay};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = replay::replay_file(
        &args.input_file,
        args.to_store_config(),
        args.to_replay_options(),
        &mut output,
    ) {
        tracing::error!(error = %e, "replay failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
