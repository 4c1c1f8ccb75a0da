use std::{env, path::PathBuf};

use crate::store::atomic_write;

use super::schema::Settings;

/// Settings loading and write-back helpers.
///
/// `Settings::load` tries environment variables first (prefix `SEGUE__`),
/// then an optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("SEGUE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if !self.audio.volume.is_finite() || !(0.0..=1.0).contains(&self.audio.volume) {
            return Err("audio.volume must be within 0.0..=1.0".to_string());
        }
        if !(50..=1000).contains(&self.engine.progress_interval_ms) {
            return Err("engine.progress_interval_ms must be within 50..=1000".to_string());
        }
        if self.engine.state_save_secs == 0 {
            return Err("engine.state_save_secs must be >= 1".to_string());
        }
        Ok(())
    }

    /// Persist the current settings back to the config file. Commands
    /// that change volume, mute or the sequence policy call this so the
    /// change survives a restart.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = resolve_config_path() else {
            // No resolvable home; the settings only live for this run.
            return Ok(());
        };
        let rendered = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        atomic_write(&path, &rendered)
    }
}

/// Resolve the config path from `SEGUE_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("SEGUE_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/segue/config.toml`
/// or `~/.config/segue/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else if let Some(home) = env::var_os("HOME") {
        Some(PathBuf::from(home).join(".config"))
    } else {
        None
    };

    config_home.map(|d| d.join("segue").join("config.toml"))
}
