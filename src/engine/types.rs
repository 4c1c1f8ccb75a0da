//! Engine-facing small types and handles.
//!
//! This module defines the command enum consumed by the worker thread,
//! the shared playback snapshot and the volume/mute bookkeeping.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::playlist::{SequencePolicy, TrackId};

#[derive(Debug)]
pub enum Command {
    /// Start or resume playback. Without an id this resumes the paused
    /// track, or starts the selected/restored one; `at` plays from an
    /// offset (the play-with-offset form of seeking).
    Play {
        id: Option<TrackId>,
        at: Option<Duration>,
    },
    /// Pause playback, freezing reported progress. Idempotent.
    Pause,
    /// Stop playback and clear the active track.
    Stop,
    /// Reposition within the current track (clamped to its duration).
    Seek { to: Duration },
    /// Skip to whatever the sequence policy says comes next.
    Next,
    /// Go back to the prior playlist entry.
    Previous,
    /// Jump directly to a playlist entry.
    Switch { id: TrackId },
    /// Add files (or directories, which are walked) to the playlist.
    AddTracks { paths: Vec<PathBuf> },
    /// Remove one entry; stops playback first if it is active.
    RemoveTrack { id: TrackId },
    /// Empty the playlist.
    ClearPlaylist,
    /// Apply and persist a new volume (0.0-1.0).
    SetVolume { volume: f32 },
    /// Toggle mute; unmuting restores the exact pre-mute volume.
    ToggleMute,
    /// Change and persist the sequence policy.
    SetSequence { policy: SequencePolicy },
    /// Emit the current settings (`load_settings`).
    EmitSettings,
    /// Emit the full playlist (`load_playlist`).
    EmitPlaylist,
    /// Emit the persisted play-state snapshot and arm the one-shot
    /// resume position (`load_play_state`).
    EmitResumeState,
    /// Persist final state and shut the worker down.
    Quit,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// What the engine is currently playing, for snapshot readers.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub id: TrackId,
    pub title: String,
    pub display: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub path: PathBuf,
    pub duration: Duration,
}

/// Runtime playback information shared with the MPRIS surface (and any
/// other reader that must not wait on the command queue).
#[derive(Debug, Clone)]
pub struct PlaybackInfo {
    pub state: PlaybackState,
    pub track: Option<NowPlaying>,
    /// Elapsed playback time for the current track.
    pub elapsed: Duration,
    pub volume: f32,
    pub muted: bool,
}

impl Default for PlaybackInfo {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            track: None,
            elapsed: Duration::ZERO,
            volume: 1.0,
            muted: false,
        }
    }
}

pub type PlaybackHandle = Arc<Mutex<PlaybackInfo>>;

/// Volume and mute bookkeeping. Muting only changes the effective gain;
/// the stored volume survives verbatim for unmute.
#[derive(Debug, Copy, Clone)]
pub struct VolumeCtl {
    volume: f32,
    muted: bool,
}

impl VolumeCtl {
    pub fn new(volume: f32, muted: bool) -> Self {
        Self {
            volume: sanitize(volume),
            muted,
        }
    }

    /// Set the stored volume, returning the clamped value.
    pub fn set(&mut self, volume: f32) -> f32 {
        self.volume = sanitize(volume);
        self.volume
    }

    /// Flip mute, returning the new muted flag.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// The gain actually applied at the sink.
    pub fn effective(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }
}

fn sanitize(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Collapse a drained command batch so that rapid repeats of the same
/// effect class (seek, volume, sequence) only apply once: the latest
/// occurrence supersedes the earlier ones; unrelated commands keep their
/// relative order.
pub(crate) fn coalesce_commands(batch: Vec<Command>) -> Vec<Command> {
    fn supersede_class(cmd: &Command) -> Option<usize> {
        match cmd {
            Command::Seek { .. } => Some(0),
            Command::SetVolume { .. } => Some(1),
            Command::SetSequence { .. } => Some(2),
            _ => None,
        }
    }

    let mut seen = [false; 3];
    let mut keep: Vec<bool> = vec![true; batch.len()];
    for (i, cmd) in batch.iter().enumerate().rev() {
        if let Some(class) = supersede_class(cmd) {
            if seen[class] {
                keep[i] = false;
            } else {
                seen[class] = true;
            }
        }
    }

    batch
        .into_iter()
        .zip(keep)
        .filter_map(|(cmd, keep)| keep.then_some(cmd))
        .collect()
}
