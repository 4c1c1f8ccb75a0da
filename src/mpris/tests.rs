use super::*;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{NowPlaying, PlaybackInfo};

fn handle_with(state: PlaybackState, track: Option<NowPlaying>) -> PlaybackHandle {
    Arc::new(Mutex::new(PlaybackInfo {
        state,
        track,
        elapsed: Duration::from_micros(1_500_000),
        volume: 0.8,
        muted: false,
    }))
}

fn now_playing() -> NowPlaying {
    NowPlaying {
        id: 7,
        title: "Test Title".to_string(),
        display: "Test Artist - Test Title".to_string(),
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        path: PathBuf::from("/tmp/music/test.mp3"),
        duration: Duration::from_micros(1_234_567),
    }
}

#[test]
fn playback_status_maps_state_to_spec_strings() {
    let (tx, _rx) = mpsc::channel::<ControlCmd>();

    for (state, expected) in [
        (PlaybackState::Idle, "Stopped"),
        (PlaybackState::Loading, "Stopped"),
        (PlaybackState::Playing, "Playing"),
        (PlaybackState::Paused, "Paused"),
    ] {
        let iface = PlayerIface {
            tx: tx.clone(),
            playback: handle_with(state, None),
        };
        assert_eq!(iface.playback_status(), expected);
    }
}

#[test]
fn metadata_includes_expected_keys_when_present() {
    let (tx, _rx) = mpsc::channel::<ControlCmd>();
    let iface = PlayerIface {
        tx,
        playback: handle_with(PlaybackState::Playing, Some(now_playing())),
    };

    let map = iface.metadata();
    for k in [
        "mpris:trackid",
        "xesam:title",
        "xesam:artist",
        "xesam:album",
        "xesam:url",
        "mpris:length",
    ] {
        assert!(map.contains_key(k), "missing key: {k}");
    }
}

#[test]
fn metadata_is_empty_when_nothing_is_active() {
    let (tx, _rx) = mpsc::channel::<ControlCmd>();
    let iface = PlayerIface {
        tx,
        playback: handle_with(PlaybackState::Idle, None),
    };
    assert!(iface.metadata().is_empty());
}

#[test]
fn position_reports_elapsed_micros() {
    let (tx, _rx) = mpsc::channel::<ControlCmd>();
    let iface = PlayerIface {
        tx,
        playback: handle_with(PlaybackState::Playing, Some(now_playing())),
    };
    assert_eq!(iface.position(), 1_500_000);
}
