//! The file gazer: watches files below a root directory and converts
//! filesystem modifications into `(path, lazy lines)` calls into the server,
//! plus the producer event loop that binds the gazer to stdio.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use futures::{SinkExt, StreamExt};
use inotify::{Event, EventMask, Inotify, WatchDescriptor, WatchMask, Watches};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::FrameCodec;
use crate::error::{Result, TafError};
use crate::proto::{dispatch, Message};
use crate::server::EventServer;

/// Tracks inotify registrations and last observed sizes for gazed files.
///
/// A file counts as changed when its size differs from the recorded one;
/// truncation is a change like any other, the line producer just finds
/// nothing past the old offset.
pub struct FileGazer {
    watches: Watches,
    descriptors: HashMap<WatchDescriptor, PathBuf>,
    sizes: HashMap<PathBuf, u64>,
}

impl FileGazer {
    pub fn new(watches: Watches) -> Self {
        Self { watches, descriptors: HashMap::new(), sizes: HashMap::new() }
    }

    pub fn known_files(&self) -> usize {
        self.sizes.len()
    }

    /// Walk `root` recursively, announce every regular file to the server and
    /// record its current size. A leading `./` is stripped so that patterns
    /// written without it match. Unreadable directories or files are logged
    /// and skipped.
    pub fn scan_dir(&mut self, root: &Path, server: &mut EventServer) -> Result<()> {
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        for path in files {
            let path = match path.strip_prefix(".") {
                Ok(stripped) => stripped.to_path_buf(),
                Err(_) => path,
            };
            let size = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to stat, skipping");
                    continue;
                }
            };
            self.sizes.insert(path.clone(), size);
            server.add_file(path);
        }
        Ok(())
    }

    /// Put `path` under a MODIFY watch. Re-registering an already watched
    /// path is harmless; the kernel hands back the same descriptor.
    pub fn watch_file(&mut self, path: &Path) {
        match self.watches.add(path, WatchMask::MODIFY) {
            Ok(descriptor) => {
                debug!(path = %path.display(), "watching");
                self.descriptors.insert(descriptor, path.to_path_buf());
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to add inotify watch");
            }
        }
    }

    /// React to one inotify event: detect a size delta and hand the server a
    /// lazy producer for the appended lines.
    pub fn handle_event(
        &mut self,
        event: &Event<OsString>,
        server: &mut EventServer,
        out: &mut Vec<Message>,
    ) {
        if !event.mask.contains(EventMask::MODIFY) {
            return;
        }
        let Some(path) = self.descriptors.get(&event.wd) else {
            debug!("modify event for an unknown descriptor");
            return;
        };
        let path = path.clone();
        let size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to stat changed file");
                return;
            }
        };
        let previous = self.sizes.get(&path).copied().unwrap_or(0);
        if size == previous {
            return;
        }
        self.sizes.insert(path.clone(), size);
        let source = path.clone();
        server.notify(&path, move || read_appended(&source, previous), out);
    }
}

/// Read everything past `from` and split it into lines. A single trailing
/// empty element (the file ended with a newline) is dropped; seeking past EOF
/// yields no lines at all.
pub fn read_appended(path: &Path, from: u64) -> std::io::Result<Vec<Vec<u8>>> {
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(from))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    let mut lines: Vec<Vec<u8>> = data.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect();
    if lines.last().is_some_and(Vec::is_empty) {
        lines.pop();
    }
    Ok(lines)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)?;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to read directory entry");
                continue;
            }
        };
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "failed to stat entry");
                continue;
            }
        };
        if file_type.is_dir() {
            if let Err(err) = collect_files(&entry.path(), files) {
                warn!(dir = %entry.path().display(), error = %err, "failed to scan subdirectory");
            }
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}

/// Producer event loop: protocol frames on stdin/stdout, inotify events from
/// the gazed directory. Returns cleanly when the consumer closes stdin.
pub async fn run() -> Result<()> {
    let inotify = Inotify::init()?;
    let mut gazer = FileGazer::new(inotify.watches());
    let mut server = EventServer::new();
    gazer.scan_dir(Path::new("."), &mut server)?;
    info!(files = gazer.known_files(), "directory scanned");

    let mut events = inotify.into_event_stream(vec![0u8; 4096])?;
    let mut incoming = FramedRead::new(tokio::io::stdin(), FrameCodec);
    let mut outgoing = FramedWrite::new(tokio::io::stdout(), FrameCodec);
    let mut out = Vec::new();

    loop {
        tokio::select! {
            frame = incoming.next() => {
                let Some(frame) = frame else {
                    info!("stdin closed, shutting down");
                    return Ok(());
                };
                dispatch(&mut server, frame?, &mut out)?;
                for path in server.take_watch_requests() {
                    gazer.watch_file(&path);
                }
            }
            event = events.next() => {
                let Some(event) = event else {
                    return Err(TafError::Transport("inotify event stream ended".into()));
                };
                gazer.handle_event(&event?, &mut server, &mut out);
            }
        }
        for msg in out.drain(..) {
            outgoing.send(msg).await?;
        }
    }
}
