//! Spawns the remote producer and exposes its stdio as the duplex byte
//! stream. Canonically the command is `ssh <host> <program> --cd <dir>`, but
//! anything that speaks the protocol on its stdin/stdout will do.

use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::info;

use crate::error::{Result, TafError};

pub struct RemoteProducer {
    /// Kept for its lifetime: dropping it kills the subprocess.
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

pub fn spawn(argv: &[String]) -> Result<RemoteProducer> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TafError::Config("empty forward command".into()))?;
    info!(command = ?argv, "spawning remote producer");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| TafError::Transport(format!("failed to spawn {program}: {err}")))?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| TafError::Transport("child stdin not piped".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TafError::Transport("child stdout not piped".into()))?;
    Ok(RemoteProducer { child, stdin, stdout })
}
