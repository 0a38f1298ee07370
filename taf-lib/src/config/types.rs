use serde::Deserialize;

/// Consumer configuration, loaded from `~/.taf/config` by default.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// How to reach the remote producer.
    pub forward: ForwardConfig,
    /// Watched patterns, registered in order; positions become watch indices.
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
    /// Named selections over the patterns, offered to the user. The first
    /// one is picked on startup.
    #[serde(default)]
    pub watchsets: Vec<WatchSetConfig>,
    /// Optional PID file path for singleton enforcement, `~` expanded.
    #[serde(default)]
    pub pid_file: Option<String>,
    /// Immediately re-arm after every notification.
    #[serde(default)]
    pub autoreset: bool,
    #[serde(default)]
    pub icons: Option<IconConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport selection. Either give `host` and `dir` for the canonical ssh
/// invocation, or override the whole argument vector with `command`.
#[derive(Debug, Deserialize, Clone)]
pub struct ForwardConfig {
    #[serde(default)]
    pub host: Option<String>,
    /// Directory the remote producer gazes at.
    #[serde(default)]
    pub dir: Option<String>,
    /// Remote producer executable (default: `~/.local/bin/logs2stdout`).
    #[serde(default = "default_program")]
    pub program: String,
    /// Full argument vector override, e.g. for a local producer.
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

fn default_program() -> String {
    "~/.local/bin/logs2stdout".to_string()
}

impl ForwardConfig {
    /// Argument vector for the transport subprocess.
    pub fn argv(&self) -> Vec<String> {
        if let Some(command) = &self.command {
            return command.clone();
        }
        let host = self.host.clone().unwrap_or_default();
        let dir = self.dir.clone().unwrap_or_default();
        vec!["ssh".to_string(), host, self.program.clone(), "--cd".to_string(), dir]
    }
}

/// One watched pattern: a filename regex and a line regex, both interpreted
/// server-side with substring-search semantics.
#[derive(Debug, Deserialize, Clone)]
pub struct PatternConfig {
    pub file: String,
    pub line: String,
}

/// A named watch set referencing patterns by their position.
#[derive(Debug, Deserialize, Clone)]
pub struct WatchSetConfig {
    pub description: String,
    pub patterns: Vec<u32>,
}

/// Idle/active indicator images, handed to notifier implementations that can
/// use them.
#[derive(Debug, Deserialize, Clone)]
pub struct IconConfig {
    pub inactive: String,
    pub active: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level(), show_target: false }
    }
}

fn default_level() -> String {
    "info".to_string()
}
