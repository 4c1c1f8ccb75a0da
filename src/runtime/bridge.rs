//! The JSON wire protocol: command names the host UI sends and their
//! mapping onto engine commands.
//!
//! This is a versioned boundary: the engine's own types stay canonical
//! and only this module knows the historical command vocabulary.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::Command;
use crate::playlist::{SequencePolicy, TrackId};

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Play {
        #[serde(default)]
        id: Option<TrackId>,
        /// Optional start offset in seconds (the play-with-offset form
        /// of seeking some hosts use).
        #[serde(default)]
        time: Option<f64>,
    },
    Pause,
    Stop,
    Seek {
        time: f64,
    },
    PlayNext,
    PlayPrevious,
    Switch {
        id: TrackId,
    },
    PlaylistAdd {
        paths: Vec<PathBuf>,
    },
    DeleteFromPlaylist {
        id: TrackId,
    },
    ClearPlaylist,
    SetVolume {
        volume: f32,
    },
    ToggleMute,
    ChangeSequenceType {
        sequence_type: SequencePolicy,
    },
    LoadSettings,
    LoadPlaylist,
    LoadPlayState,
    Quit,
}

pub fn parse_line(line: &str) -> Result<Request, serde_json::Error> {
    serde_json::from_str(line)
}

pub fn to_command(request: Request) -> Command {
    match request {
        Request::Play { id, time } => Command::Play {
            id,
            at: time.map(secs_to_duration),
        },
        Request::Pause => Command::Pause,
        Request::Stop => Command::Stop,
        Request::Seek { time } => Command::Seek {
            to: secs_to_duration(time),
        },
        Request::PlayNext => Command::Next,
        Request::PlayPrevious => Command::Previous,
        Request::Switch { id } => Command::Switch { id },
        Request::PlaylistAdd { paths } => Command::AddTracks { paths },
        Request::DeleteFromPlaylist { id } => Command::RemoveTrack { id },
        Request::ClearPlaylist => Command::ClearPlaylist,
        Request::SetVolume { volume } => Command::SetVolume { volume },
        Request::ToggleMute => Command::ToggleMute,
        Request::ChangeSequenceType { sequence_type } => Command::SetSequence {
            policy: sequence_type,
        },
        Request::LoadSettings => Command::EmitSettings,
        Request::LoadPlaylist => Command::EmitPlaylist,
        Request::LoadPlayState => Command::EmitResumeState,
        Request::Quit => Command::Quit,
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    // Negative or non-finite offsets clamp to zero instead of panicking.
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or_default()
}
