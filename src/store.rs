//! Durable state: the playlist, the last play-state snapshot and the
//! artwork cache, all under one data directory.
//!
//! Every save goes through a temp-file + rename so a crash mid-write can
//! never truncate previously persisted state.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::events::PlayState;
use crate::playlist::Playlist;

const PLAYLIST_FILE: &str = "playlist.json";
const PLAY_STATE_FILE: &str = "play_state.json";
const ARTWORK_DIR: &str = "artwork";

#[derive(Debug)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open the store at the default data directory, creating it if
    /// needed.
    pub fn open() -> io::Result<Self> {
        let root = resolve_data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "no data directory (HOME and XDG_DATA_HOME are both unset)",
            )
        })?;
        Self::at(root)
    }

    /// Open the store rooted at an explicit directory.
    pub fn at(root: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.root.join(ARTWORK_DIR)
    }

    fn playlist_path(&self) -> PathBuf {
        self.root.join(PLAYLIST_FILE)
    }

    fn play_state_path(&self) -> PathBuf {
        self.root.join(PLAY_STATE_FILE)
    }

    /// Load the persisted playlist; a missing or unreadable file yields
    /// an empty list rather than a startup failure.
    pub fn load_playlist(&self) -> Playlist {
        match fs::read_to_string(self.playlist_path()) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(playlist) => playlist,
                Err(err) => {
                    log::warn!("discarding unreadable playlist store: {err}");
                    Playlist::default()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Playlist::default(),
            Err(err) => {
                log::warn!("failed to read playlist store: {err}");
                Playlist::default()
            }
        }
    }

    pub fn save_playlist(&self, playlist: &Playlist) -> io::Result<()> {
        let json = serde_json::to_string_pretty(playlist).map_err(io::Error::other)?;
        atomic_write(&self.playlist_path(), &json)
    }

    pub fn load_play_state(&self) -> Option<PlayState> {
        let json = fs::read_to_string(self.play_state_path()).ok()?;
        match serde_json::from_str::<Option<PlayState>>(&json) {
            Ok(state) => state,
            Err(err) => {
                log::warn!("discarding unreadable play-state store: {err}");
                None
            }
        }
    }

    /// Persist the last known snapshot; `None` is stored as JSON null so
    /// a restart after stop/clear restores nothing.
    pub fn save_play_state(&self, state: Option<&PlayState>) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&state).map_err(io::Error::other)?;
        atomic_write(&self.play_state_path(), &json)
    }
}

/// Resolve the data directory from `SEGUE_DATA_PATH` or XDG defaults.
pub fn resolve_data_dir() -> Option<PathBuf> {
    if let Some(p) = env::var_os("SEGUE_DATA_PATH") {
        return Some(PathBuf::from(p));
    }
    let data_home = if let Some(xdg) = env::var_os("XDG_DATA_HOME") {
        Some(PathBuf::from(xdg))
    } else if let Some(home) = env::var_os("HOME") {
        Some(PathBuf::from(home).join(".local").join("share"))
    } else {
        None
    };
    data_home.map(|d| d.join("segue"))
}

pub(crate) fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::NewTrack;
    use tempfile::tempdir;

    fn sample_playlist() -> Playlist {
        let mut p = Playlist::default();
        for name in ["a", "b"] {
            p.add(NewTrack {
                path: PathBuf::from(format!("/music/{name}.flac")),
                title: name.to_string(),
                artist: Some("someone".into()),
                album: None,
                duration: Some(std::time::Duration::from_secs(60)),
            });
        }
        p
    }

    #[test]
    fn playlist_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let store = Store::at(dir.path().to_path_buf()).unwrap();

        let playlist = sample_playlist();
        store.save_playlist(&playlist).unwrap();

        let back = store.load_playlist();
        assert_eq!(back.len(), 2);
        assert_eq!(back.tracks()[0].title, "a");
        assert_eq!(back.tracks()[0].id, playlist.tracks()[0].id);
    }

    #[test]
    fn missing_stores_load_as_empty() {
        let dir = tempdir().unwrap();
        let store = Store::at(dir.path().to_path_buf()).unwrap();
        assert!(store.load_playlist().is_empty());
        assert!(store.load_play_state().is_none());
    }

    #[test]
    fn corrupt_playlist_store_is_discarded_not_fatal() {
        let dir = tempdir().unwrap();
        let store = Store::at(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join(PLAYLIST_FILE), "{ not json").unwrap();
        assert!(store.load_playlist().is_empty());
    }

    #[test]
    fn playlist_store_ignores_unknown_fields() {
        // Forward readability: additive schema changes must not break
        // older data, and newer data must load in older shapes.
        let dir = tempdir().unwrap();
        let store = Store::at(dir.path().to_path_buf()).unwrap();
        fs::write(
            dir.path().join(PLAYLIST_FILE),
            r#"{"version":2,"next_id":9,"tracks":[{"id":5,"path":"/m/x.mp3","title":"x","display":"x","some_future_field":true}],"some_future_section":{}}"#,
        )
        .unwrap();
        let playlist = store.load_playlist();
        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.first_id(), Some(5));
    }

    #[test]
    fn play_state_none_round_trips_as_null() {
        let dir = tempdir().unwrap();
        let store = Store::at(dir.path().to_path_buf()).unwrap();

        store.save_play_state(None).unwrap();
        assert!(store.load_play_state().is_none());

        let state = PlayState {
            id: 3,
            name: "x".into(),
            path: "/m/x.mp3".into(),
            progress: "0:00:10.000".into(),
            left_duration: "0:01:00.000".into(),
        };
        store.save_play_state(Some(&state)).unwrap();
        let back = store.load_play_state().unwrap();
        assert_eq!(back.id, 3);
        assert_eq!(back.progress, "0:00:10.000");

        store.save_play_state(None).unwrap();
        assert!(store.load_play_state().is_none());
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");
        atomic_write(&path, "one").unwrap();
        atomic_write(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!path.with_extension("tmp").exists());
    }
}
