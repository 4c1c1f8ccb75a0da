//! MPRIS (org.mpris.MediaPlayer2) control surface.
//!
//! Desktop shells and `playerctl` drive the engine through this service;
//! every method just forwards a [`ControlCmd`] that the runtime maps onto
//! the engine's command queue, and every property reads the shared
//! playback snapshot.

use std::collections::HashMap;
use std::sync::mpsc::Sender;

use async_io::{Timer, block_on};
use log::warn;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedValue, Value};

use crate::engine::{PlaybackHandle, PlaybackState};

#[derive(Clone, Debug)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative seek, in microseconds (MPRIS convention).
    SeekBy(i64),
    SetVolume(f64),
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // Headless engine; nothing to raise.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "segue"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    playback: PlaybackHandle,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::SeekBy(offset));
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(info) = self.playback.lock() else {
            return "Stopped";
        };
        match info.state {
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Idle | PlaybackState::Loading => "Stopped",
        }
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.playback
            .lock()
            .map(|info| info.elapsed.as_micros() as i64)
            .unwrap_or(0)
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        // Reported as effective gain, so a muted engine shows 0.
        self.playback
            .lock()
            .map(|info| {
                if info.muted {
                    0.0
                } else {
                    f64::from(info.volume)
                }
            })
            .unwrap_or(1.0)
    }

    #[zbus(property)]
    fn set_volume(&mut self, volume: f64) {
        let _ = self.tx.send(ControlCmd::SetVolume(volume));
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(info) = self.playback.lock() else {
            return map;
        };
        let Some(track) = info.track.as_ref() else {
            return map;
        };

        if let Ok(path) =
            ObjectPath::try_from(format!("/org/mpris/MediaPlayer2/track/{}", track.id))
        {
            insert_value(&mut map, "mpris:trackid", Value::from(path));
        }
        insert_value(&mut map, "xesam:title", Value::from(track.title.clone()));
        if let Some(artist) = &track.artist {
            insert_value(&mut map, "xesam:artist", Value::from(vec![artist.clone()]));
        }
        if let Some(album) = &track.album {
            insert_value(&mut map, "xesam:album", Value::from(album.clone()));
        }
        insert_value(
            &mut map,
            "xesam:url",
            Value::from(format!("file://{}", track.path.display())),
        );
        insert_value(
            &mut map,
            "mpris:length",
            Value::from(track.duration.as_micros() as i64),
        );
        map
    }
}

fn insert_value(map: &mut HashMap<String, OwnedValue>, key: &str, value: Value<'_>) {
    if let Ok(v) = OwnedValue::try_from(value) {
        map.insert(key.to_string(), v);
    }
}

pub fn spawn_mpris(tx: Sender<ControlCmd>, playback: PlaybackHandle) {
    std::thread::spawn(move || {
        block_on(async move {
            let path = "/org/mpris/MediaPlayer2";

            let connection = match Connection::session().await {
                Ok(c) => c,
                Err(e) => {
                    warn!("MPRIS: failed to connect to session bus: {e}");
                    return;
                }
            };

            if let Err(e) = connection
                .request_name("org.mpris.MediaPlayer2.segue")
                .await
            {
                warn!("MPRIS: failed to acquire name: {e}");
                return;
            }

            let object_server = connection.object_server();

            if let Err(e) = object_server.at(path, RootIface { tx: tx.clone() }).await {
                warn!("MPRIS: failed to register root iface: {e}");
                return;
            }

            if let Err(e) = object_server
                .at(path, PlayerIface { tx, playback })
                .await
            {
                warn!("MPRIS: failed to register player iface: {e}");
                return;
            }

            // Keep the service alive.
            loop {
                Timer::after(std::time::Duration::from_secs(3600)).await;
            }
        });
    });
}

#[cfg(test)]
mod tests;
