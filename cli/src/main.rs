//! Print every change under a directory tree until interrupted.
//!
//! Usage: rwatch [-d DIR] [--json] [--follow-symlinks] [-v]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rwatch::{Message, RecursiveWatcher, WatcherConfig};
use tokio::signal;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rwatch", version, about = "Recursively watch a directory and print every change")]
struct Cli {
    /// Directory to watch recursively.
    #[arg(short = 'd', long = "dir", default_value = ".")]
    dir: PathBuf,

    /// Print messages as JSON lines.
    #[arg(long)]
    json: bool,

    /// Descend into symlinked directories when seeding watches.
    #[arg(long)]
    follow_symlinks: bool,

    /// Increase log verbosity (-v, -vv, -vvv). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn watcher_config(&self) -> WatcherConfig {
        let config = WatcherConfig::new(&self.dir);
        if self.follow_symlinks {
            config.follow_symlinks()
        } else {
            config
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut watcher = RecursiveWatcher::with_config(cli.watcher_config())
        .with_context(|| format!("failed to watch {}", cli.dir.display()))?;
    println!("watching {}", cli.dir.display());

    let mut messages = watcher
        .take_messages()
        .context("message stream already taken")?;
    let json = cli.json;
    let printer = tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            match render(&message, json) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Failed to render {message}: {e}"),
            }
        }
    });

    let signalled = shutdown_signal().await;
    watcher.close().await;
    printer.await.context("printer task failed")?;

    signalled
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn render(message: &Message, json: bool) -> serde_json::Result<String> {
    if json {
        serde_json::to_string(message)
    } else {
        Ok(message.to_string())
    }
}

/// Wait for Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;

        tokio::select! {
            res = signal::ctrl_c() => res.context("failed to listen for Ctrl-C")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    Ok(())
}
