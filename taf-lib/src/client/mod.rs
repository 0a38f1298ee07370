//! Consumer-side state machine: watch registration, active-set selection and
//! NOTIFY surfacing.

pub mod session;

use tracing::debug;

use crate::error::{Result, TafError};
use crate::proto::{Endpoint, Message};

/// Client-side view of a registered watch: the dense index plus the opaque
/// patterns. Patterns are never compiled here; only the server interprets
/// them.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    pub index: u32,
    pub file_pattern: Vec<u8>,
    pub line_pattern: Vec<u8>,
}

/// A named, user-visible selection of watches, carried on the wire as a
/// little-endian minimum-length bitmask over watch indices.
#[derive(Debug, Clone)]
pub struct WatchSet {
    pub description: String,
    pub mask: Vec<u8>,
}

impl WatchSet {
    pub fn new(description: impl Into<String>, indices: &[u32]) -> Self {
        Self { description: description.into(), mask: encode_mask(indices) }
    }
}

/// Encode a set of watch indices as a little-endian minimum-length bitmask.
/// An empty set encodes as an empty string, which disarms every watch.
pub fn encode_mask(indices: &[u32]) -> Vec<u8> {
    let mut mask = Vec::new();
    for &index in indices {
        let byte = (index / 8) as usize;
        if mask.len() <= byte {
            mask.resize(byte + 1, 0);
        }
        mask[byte] |= 1 << (index % 8);
    }
    mask
}

/// Something the session loop must surface to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Notified(u32),
}

/// Client half of the event stream.
#[derive(Default)]
pub struct EventClient {
    watches: Vec<WatchHandle>,
    acked: usize,
    events: Vec<ClientEvent>,
}

impl EventClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Allocate the next index and queue the WATCH_SETUP. The server echoes
    /// one ACK per setup, positionally.
    pub fn add_watch(
        &mut self,
        file_pattern: Vec<u8>,
        line_pattern: Vec<u8>,
        out: &mut Vec<Message>,
    ) -> WatchHandle {
        let index = self.watches.len() as u32;
        out.push(Message::WatchSetup {
            file_pattern: file_pattern.clone(),
            line_pattern: line_pattern.clone(),
        });
        let handle = WatchHandle { index, file_pattern, line_pattern };
        self.watches.push(handle.clone());
        handle
    }

    /// Send the caller-encoded little-endian bitmask verbatim.
    pub fn watch_set(&mut self, mask: Vec<u8>, out: &mut Vec<Message>) {
        out.push(Message::WatchSet { mask });
    }

    pub fn reset(&mut self, out: &mut Vec<Message>) {
        out.push(Message::Reset);
    }

    /// Events surfaced since the last call, in arrival order.
    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Endpoint for EventClient {
    fn handle(&mut self, msg: Message, _out: &mut Vec<Message>) -> Result<()> {
        match msg {
            Message::Notify { watch } => {
                self.events.push(ClientEvent::Notified(watch));
                Ok(())
            }
            Message::Ack => {
                self.acked += 1;
                if self.acked > self.watches.len() {
                    return Err(TafError::Protocol(format!(
                        "ACK {} without a matching WATCH_SETUP",
                        self.acked
                    )));
                }
                Ok(())
            }
            Message::Pong(_) => {
                debug!("pong received");
                Ok(())
            }
            other => Err(TafError::Protocol(format!(
                "message code {} is not valid towards the client",
                other.code()
            ))),
        }
    }
}
