//! Event payloads crossing the UI boundary, and the timestamp format
//! shared by `play-state` progress strings and the persisted snapshot.
//!
//! Wire names are fixed here once; the engine never serializes anything
//! itself.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::playlist::{SequencePolicy, Track, TrackId};

/// Everything the engine pushes to its host, tagged with the event name.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum PlayerEvent {
    PlayState(PlayState),
    MusicInfo(MusicInfo),
    MusicMeta(MusicMeta),
    MusicImage(MusicImage),
    Finished { id: TrackId },
    Error(ErrorEvent),
    Playlist { tracks: Vec<Track> },
    PlaylistAdded { tracks: Vec<Track> },
    Settings(SettingsSnapshot),
    ResumeState { state: Option<PlayState> },
}

/// Periodic progress snapshot; also the shape persisted for restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayState {
    pub id: TrackId,
    pub name: String,
    pub path: String,
    pub progress: String,
    pub left_duration: String,
}

impl Default for PlayState {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            path: String::new(),
            progress: String::new(),
            left_duration: String::new(),
        }
    }
}

/// Static codec facts, emitted once per successful open.
#[derive(Debug, Clone, Serialize)]
pub struct MusicInfo {
    pub id: TrackId,
    pub codec: String,
    pub codec_short: String,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u8>,
    pub channels: Option<u8>,
    /// Average audio bitrate in kbps, when the container reports one.
    pub bit_rate: Option<u32>,
    pub duration: String,
}

/// Tag data; fields fall back to empty strings when absent.
#[derive(Debug, Clone, Serialize)]
pub struct MusicMeta {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MusicImage {
    pub id: TrackId,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub id: Option<TrackId>,
    /// Stable kind label (`unsupported-format`, `decode-error`, ...).
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsSnapshot {
    pub volume: f32,
    pub muted: bool,
    pub sequence_type: SequencePolicy,
}

/// Render a duration as `H:MM:SS.mmm`, e.g. `0:03:24.500`.
pub fn format_timestamp(t: Duration) -> String {
    let total = t.as_millis() as u64;
    let hours = total / 3_600_000;
    let mins = (total % 3_600_000) / 60_000;
    let secs = (total % 60_000) / 1_000;
    let millis = total % 1_000;
    format!("{hours}:{mins:02}:{secs:02}.{millis:03}")
}

/// Parse `H:MM:SS[.frac]`; the fractional part is optional and may carry
/// any number of digits. Inverse of [`format_timestamp`] at millisecond
/// granularity.
pub fn parse_timestamp(s: &str) -> Option<Duration> {
    let mut parts = s.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let mins: u64 = parts.next()?.trim().parse().ok()?;
    let secs_part = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }
    let (secs_str, frac_str) = match secs_part.split_once('.') {
        Some((s, f)) => (s, f),
        None => (secs_part, ""),
    };
    let secs: u64 = secs_str.parse().ok()?;
    if mins >= 60 || secs >= 60 {
        return None;
    }
    let millis = parse_fraction_millis(frac_str)?;
    Some(Duration::from_millis(
        hours * 3_600_000 + mins * 60_000 + secs * 1_000 + millis,
    ))
}

fn parse_fraction_millis(frac: &str) -> Option<u64> {
    if frac.is_empty() {
        return Some(0);
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Interpret as a decimal fraction of a second, truncated to millis.
    let frac = &frac[..frac.len().min(9)];
    let value: u64 = frac.parse().ok()?;
    Some(match frac.len() {
        1 => value * 100,
        2 => value * 10,
        3 => value,
        n => value / 10u64.pow(n as u32 - 3),
    })
}
