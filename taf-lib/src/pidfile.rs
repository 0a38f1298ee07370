//! Singleton enforcement for the consumer: an exclusively flocked PID file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::error::{Result, TafError};

/// Holds the lock for the life of the value; the file is removed on drop.
pub struct PidFile {
    lock: Flock<File>,
    path: PathBuf,
}

impl PidFile {
    pub fn acquire(path: &Path) -> Result<PidFile> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|err| {
                TafError::PidFile(format!("cannot open {}: {err}", path.display()))
            })?;
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            TafError::PidFile(format!(
                "{} is held by another instance ({errno})",
                path.display()
            ))
        })?;
        let mut pid_file = PidFile { lock, path: path.to_path_buf() };
        pid_file.write_pid()?;
        debug!(path = %path.display(), "PID file acquired");
        Ok(pid_file)
    }

    fn write_pid(&mut self) -> Result<()> {
        let written = self
            .lock
            .set_len(0)
            .and_then(|()| writeln!(&mut *self.lock, "{}", std::process::id()));
        written.map_err(|err| {
            TafError::PidFile(format!("cannot write {}: {err}", self.path.display()))
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
