#![forbid(unsafe_code)]

use clap::Parser;
use taf_lib::client::session::{self, Command};
use taf_lib::config::{self, expand_tilde};
use taf_lib::notifier::LogNotifier;
use taf_lib::pidfile::PidFile;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "TAF local consumer: raises attention flags for remote log lines")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = "~/.taf/config")]
    config: String,

    /// Log filter directive, overriding the configuration (RUST_LOG beats both)
    #[arg(short = 'L', long, value_name = "LOGLEVEL")]
    loglevel: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let cfg = match config::load_from_path(expand_tilde(&cli.config)) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };
    let filter = cli.loglevel.as_deref().unwrap_or(&cfg.logging.level);
    init_tracing(filter, cfg.logging.show_target);

    if let Some(icons) = &cfg.icons {
        // only graphical notifiers use these; the built-in one logs instead
        debug!(inactive = %icons.inactive, active = %icons.active, "indicator icons configured");
    }

    let _pid_file = match cfg
        .pid_file
        .as_deref()
        .map(|p| PidFile::acquire(&expand_tilde(p)))
        .transpose()
    {
        Ok(held) => held,
        Err(err) => {
            error!(%err, "another instance appears to be running");
            std::process::exit(1);
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    if let Err(err) = install_signal_handlers(cmd_tx) {
        error!(%err, "failed to install signal handlers");
        std::process::exit(1);
    }

    info!(
        patterns = cfg.patterns.len(),
        watchsets = cfg.watchsets.len(),
        autoreset = cfg.autoreset,
        "starting operation"
    );
    let mut notifier = LogNotifier;
    match session::run(&cfg, &mut notifier, cmd_rx).await {
        Ok(()) => info!("terminating"),
        Err(err) => {
            error!(%err, "session failed");
            std::process::exit(1);
        }
    }
}

/// SIGTERM / SIGINT quit the session, SIGUSR1 resets the flags, all routed
/// through the session's command channel.
fn install_signal_handlers(cmd_tx: mpsc::Sender<Command>) -> std::io::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;
    tokio::spawn(async move {
        loop {
            let command = tokio::select! {
                _ = term.recv() => Command::Quit,
                _ = int.recv() => Command::Quit,
                _ = usr1.recv() => Command::Reset,
            };
            if cmd_tx.send(command).await.is_err() {
                break;
            }
        }
    });
    Ok(())
}

fn init_tracing(default_filter: &str, show_target: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(show_target)
        .init();
}
