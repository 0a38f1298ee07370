//! Consumer event loop: owns the transport subprocess and the client state
//! machine, reacts to inbound frames and user commands.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::client::{ClientEvent, EventClient, WatchSet};
use crate::codec::FrameCodec;
use crate::config::Config;
use crate::error::{Result, TafError};
use crate::notifier::Notifier;
use crate::proto::{dispatch, Message};
use crate::transport;

/// User-initiated actions, fed from signal handlers or the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    SelectWatchSet(usize),
    Quit,
}

/// Run a consumer session until the user quits or the session fails.
///
/// Spawns the remote producer, registers every configured pattern, selects
/// watch set 0, then serves frames and commands. Remote EOF is a transport
/// failure; a protocol violation in either direction aborts the session.
pub async fn run<N: Notifier>(
    config: &Config,
    notifier: &mut N,
    mut commands: mpsc::Receiver<Command>,
) -> Result<()> {
    let producer = transport::spawn(&config.forward.argv())?;
    let mut incoming = FramedRead::new(producer.stdout, FrameCodec);
    let mut outgoing = FramedWrite::new(producer.stdin, FrameCodec);

    let watch_sets: Vec<WatchSet> = config
        .watchsets
        .iter()
        .map(|ws| WatchSet::new(&ws.description, &ws.patterns))
        .collect();

    let mut client = EventClient::new();
    let mut out = Vec::new();
    for (position, pattern) in config.patterns.iter().enumerate() {
        let handle = client.add_watch(
            pattern.file.clone().into_bytes(),
            pattern.line.clone().into_bytes(),
            &mut out,
        );
        if handle.index as usize != position {
            return Err(TafError::Protocol(format!(
                "watch setup index mismatch: {} != {position}",
                handle.index
            )));
        }
    }
    if let Some(first) = watch_sets.first() {
        info!(set = %first.description, "selecting initial watch set");
        client.watch_set(first.mask.clone(), &mut out);
        client.reset(&mut out);
    }
    flush(&mut outgoing, &mut out).await?;
    info!(watches = client.watch_count(), "session established");

    loop {
        tokio::select! {
            frame = incoming.next() => {
                let Some(frame) = frame else {
                    return Err(TafError::Transport("remote producer closed the stream".into()));
                };
                dispatch(&mut client, frame?, &mut out)?;
                for event in client.take_events() {
                    let ClientEvent::Notified(watch) = event;
                    debug!(watch, "notify received");
                    if config.autoreset {
                        client.reset(&mut out);
                    }
                    notifier.notify(watch);
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    None | Some(Command::Quit) => {
                        info!("shutting down");
                        return Ok(());
                    }
                    Some(Command::Reset) => {
                        client.reset(&mut out);
                        notifier.reset();
                    }
                    Some(Command::SelectWatchSet(idx)) => match watch_sets.get(idx) {
                        Some(set) => {
                            info!(set = %set.description, "selecting watch set");
                            client.watch_set(set.mask.clone(), &mut out);
                            client.reset(&mut out);
                        }
                        None => warn!(idx, "no such watch set"),
                    },
                }
            }
        }
        flush(&mut outgoing, &mut out).await?;
    }
}

async fn flush<S>(outgoing: &mut S, out: &mut Vec<Message>) -> Result<()>
where
    S: futures::Sink<Message, Error = TafError> + Unpin,
{
    for msg in out.drain(..) {
        outgoing.send(msg).await?;
    }
    Ok(())
}
