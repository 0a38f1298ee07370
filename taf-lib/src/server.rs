//! Producer-side state machine: watch registration, armed/fired tracking and
//! line matching.

use std::collections::HashMap;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::error::{Result, TafError};
use crate::proto::{Endpoint, Message};

/// A registered watch. `armed` says whether the watch participates in
/// matching at all (toggled en masse by WATCH_SET); `fired` says whether it
/// already produced a NOTIFY since the last RESET.
struct Watch {
    index: u32,
    file_pattern: Regex,
    line_pattern: Regex,
    armed: bool,
    fired: bool,
}

/// Server half of the event stream.
///
/// The file gazer seeds the file map through [`add_file`](Self::add_file) and
/// feeds modifications through [`notify`](Self::notify); the protocol peer
/// drives everything else. Watch indices are dense and assigned in
/// registration order.
#[derive(Default)]
pub struct EventServer {
    watches: Vec<Watch>,
    files: HashMap<PathBuf, Vec<usize>>,
    pending_watch_paths: Vec<PathBuf>,
}

impl EventServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Make a file known to the server. Safe to call before or after watch
    /// registration; watches that already exist are matched right away.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.files.contains_key(&path) {
            return;
        }
        let matched = matching_watches(&self.watches, &path);
        self.files.insert(path, matched);
    }

    /// Paths that new watches matched since the last call. The host loop
    /// drains these into the gazer's filesystem-watch registration.
    pub fn take_watch_requests(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.pending_watch_paths)
    }

    /// A file changed: `produce` yields the appended lines when first needed.
    ///
    /// The producer is invoked at most once per call, however many watches
    /// match the path. Every armed, unfired watch whose line pattern matches
    /// one of the new lines fires exactly one NOTIFY, in index order. A
    /// failure to read the lines is logged and isolated to this event.
    pub fn notify<F>(&mut self, path: &Path, produce: F, out: &mut Vec<Message>)
    where
        F: FnOnce() -> std::io::Result<Vec<Vec<u8>>>,
    {
        let candidates: Vec<usize> = self
            .watches_for(path)
            .into_iter()
            .filter(|&i| self.watches[i].armed && !self.watches[i].fired)
            .collect();
        if candidates.is_empty() {
            return;
        }
        let lines = match produce() {
            Ok(lines) => lines,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read appended lines");
                return;
            }
        };
        for i in candidates {
            let watch = &mut self.watches[i];
            if lines.iter().any(|line| watch.line_pattern.is_match(line)) {
                watch.fired = true;
                out.push(Message::Notify { watch: watch.index });
            }
        }
    }

    /// Watch indices matching `path`, memoized per path.
    ///
    /// The gazer pre-seeds every scanned file via [`add_file`](Self::add_file),
    /// so the rebuild only runs for paths the server has never seen.
    fn watches_for(&mut self, path: &Path) -> Vec<usize> {
        if let Some(indices) = self.files.get(path) {
            return indices.clone();
        }
        let matched = matching_watches(&self.watches, path);
        self.files.insert(path.to_path_buf(), matched.clone());
        matched
    }

    fn watch_setup(
        &mut self,
        file_pattern: Vec<u8>,
        line_pattern: Vec<u8>,
        out: &mut Vec<Message>,
    ) -> Result<()> {
        let file_pattern = compile(&file_pattern)?;
        let line_pattern = compile(&line_pattern)?;
        let index = self.watches.len();
        let watch = Watch {
            index: index as u32,
            file_pattern,
            line_pattern,
            armed: false,
            fired: false,
        };
        for (path, indices) in &mut self.files {
            if watch.file_pattern.is_match(path.as_os_str().as_bytes()) {
                indices.push(index);
                self.pending_watch_paths.push(path.clone());
            }
        }
        debug!(index, "watch registered");
        self.watches.push(watch);
        out.push(Message::Ack);
        Ok(())
    }

    /// Arm exactly the watches whose bit is set in the little-endian mask.
    /// Bits past the registered watch count are ignored; `fired` is left
    /// untouched.
    fn watch_set(&mut self, mask: &[u8]) {
        for (i, watch) in self.watches.iter_mut().enumerate() {
            watch.armed = mask.get(i / 8).is_some_and(|&byte| (byte >> (i % 8)) & 1 == 1);
        }
    }

    fn reset(&mut self) {
        for watch in &mut self.watches {
            watch.fired = false;
        }
    }
}

impl Endpoint for EventServer {
    fn handle(&mut self, msg: Message, out: &mut Vec<Message>) -> Result<()> {
        match msg {
            Message::WatchSetup { file_pattern, line_pattern } => {
                self.watch_setup(file_pattern, line_pattern, out)
            }
            Message::WatchSet { mask } => {
                self.watch_set(&mask);
                Ok(())
            }
            Message::Reset => {
                self.reset();
                Ok(())
            }
            Message::Pong(_) => {
                debug!("pong received");
                Ok(())
            }
            other => Err(TafError::Protocol(format!(
                "message code {} is not valid towards the server",
                other.code()
            ))),
        }
    }
}

fn matching_watches(watches: &[Watch], path: &Path) -> Vec<usize> {
    let bytes = path.as_os_str().as_bytes();
    watches
        .iter()
        .enumerate()
        .filter(|(_, w)| w.file_pattern.is_match(bytes))
        .map(|(i, _)| i)
        .collect()
}

/// Compile a pattern received on the wire. The server cannot honor a watch
/// whose pattern does not compile, so failures rank as protocol errors.
fn compile(pattern: &[u8]) -> Result<Regex> {
    let text = std::str::from_utf8(pattern)
        .map_err(|_| TafError::Protocol(format!("pattern is not valid UTF-8: {pattern:?}")))?;
    Regex::new(text)
        .map_err(|err| TafError::Protocol(format!("cannot compile pattern {text:?}: {err}")))
}
