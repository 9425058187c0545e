//! examgate operator tool
//!
//! Inspects and drives license and session-lease documents in a local
//! document store directory.
//!
//! Usage:
//!   examgate --store ./data license uid-123
//!   examgate --store ./data lease show uid-123

use anyhow::Result;
use clap::Parser;
use examgate_cli::{Cli, execute};
use examgate_types::{Clock, SystemClock};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    execute(&cli, clock, &mut std::io::stdout()).await
}
