use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{Result, TafError};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| TafError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| TafError::Config(format!("failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.patterns.is_empty() {
        return Err(TafError::Config("no patterns configured".to_string()));
    }
    if cfg.watchsets.is_empty() {
        return Err(TafError::Config("no watch sets configured".to_string()));
    }

    let forward = &cfg.forward;
    if forward.command.is_none() && (forward.host.is_none() || forward.dir.is_none()) {
        return Err(TafError::Config(
            "forward needs either host and dir, or a full command".to_string(),
        ));
    }

    for (i, set) in cfg.watchsets.iter().enumerate() {
        for &idx in &set.patterns {
            if idx as usize >= cfg.patterns.len() {
                return Err(TafError::Config(format!(
                    "watch set {i} ({:?}) references unknown pattern {idx}",
                    set.description
                )));
            }
        }
    }

    Ok(())
}
