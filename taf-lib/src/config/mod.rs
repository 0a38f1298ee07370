mod loader;
mod types;

pub use loader::load_from_path;
pub use types::{Config, ForwardConfig, IconConfig, LoggingConfig, PatternConfig, WatchSetConfig};

use std::path::PathBuf;

/// Expand a leading `~/` against `$HOME`. Paths without the prefix (or when
/// `$HOME` is unset) come back verbatim.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
