use serde::{Deserialize, Serialize};

use crate::playlist::SequencePolicy;

/// Top-level settings, loaded at startup and written back whenever a
/// command changes one of them.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/segue/config.toml` or
/// `~/.config/segue/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `SEGUE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
    pub engine: EngineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio: AudioSettings::default(),
            playback: PlaybackSettings::default(),
            library: LibrarySettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Linear gain, 0.0-1.0.
    pub volume: f32,
    /// Whether output is muted. The pre-mute volume stays in `volume`
    /// so unmuting restores it exactly.
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Track-advance rule.
    pub sequence: SequencePolicy,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            sequence: SequencePolicy::RepeatAll,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions treated as audio when walking directories
    /// (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks while walking.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec![
                "mp3".into(),
                "flac".into(),
                "wav".into(),
                "aiff".into(),
                "ogg".into(),
                "opus".into(),
                "m4a".into(),
                "mp4".into(),
                "aac".into(),
                "wma".into(),
            ],
            follow_links: true,
            include_hidden: true,
            recursive: true,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Cadence of `play-state` emission while playing (milliseconds).
    pub progress_interval_ms: u64,
    /// How often the play-state snapshot is persisted while playing
    /// (seconds). It is always persisted on pause/stop/switch/quit.
    pub state_save_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: 200,
            state_save_secs: 5,
        }
    }
}
