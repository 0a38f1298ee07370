#![forbid(unsafe_code)]

use clap::Parser;
use std::path::PathBuf;
use taf_lib::gazer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "TAF remote producer: tails files, speaks the event protocol on stdio")]
struct Cli {
    /// Gaze at DIR instead of the current directory
    #[arg(long, value_name = "DIR")]
    cd: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Some(dir) = &cli.cd {
        if let Err(err) = std::env::set_current_dir(dir) {
            error!(dir = %dir.display(), %err, "cannot change into gaze directory");
            std::process::exit(1);
        }
    }

    match gazer::run().await {
        Ok(()) => {
            info!("terminating");
            std::process::exit(0);
        }
        Err(err) => {
            error!(%err, "producer exited with error");
            std::process::exit(1);
        }
    }
}

// stdout carries the protocol, so diagnostics go to stderr.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
