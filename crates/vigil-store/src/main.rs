// SPDX-License-Identifier: MIT OR Apache-2.0
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vigil_store::daemon::Daemon;

#[derive(Parser, Debug)]
#[command(name = "vigil-stored", version, about = "vigil scan job store daemon")]
struct Args {
    /// Path of the UNIX-domain listening socket.
    #[arg(long, default_value = "vigil-stored.sock")]
    socket: PathBuf,

    /// Directory the store tree is created under.
    #[arg(long, default_value = ".")]
    base: PathBuf,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("vigil_store=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil_store=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build runtime")?;
    let local = tokio::task::LocalSet::new();

    runtime.block_on(local.run_until(async move {
        let daemon = Daemon::bind(&args.socket, &args.base)
            .with_context(|| format!("bind {}", args.socket.display()))?;
        daemon.run(shutdown_signal()).await.context("serve")
    }))
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => return std::future::pending().await,
    };
    let mut int = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(_) => return std::future::pending().await,
    };

    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
}
