use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::Settings;
use crate::events::PlayerEvent;
use crate::store::Store;

use super::thread::spawn_engine_thread;
use super::types::{Command, PlaybackHandle, PlaybackInfo, PlaybackState};

/// Handle to the engine worker thread.
pub struct Engine {
    tx: Sender<Command>,
    playback: PlaybackHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Spawn the worker. It restores the persisted playlist and play
    /// state before accepting commands, so a restart never starts blank.
    pub fn spawn(settings: Settings, store: Store, events: Sender<PlayerEvent>) -> Self {
        let (tx, rx) = mpsc::channel::<Command>();
        let playback: PlaybackHandle = Arc::new(Mutex::new(PlaybackInfo {
            state: PlaybackState::Idle,
            track: None,
            elapsed: std::time::Duration::ZERO,
            volume: settings.audio.volume.clamp(0.0, 1.0),
            muted: settings.audio.muted,
        }));

        let join = spawn_engine_thread(rx, events, playback.clone(), settings, store);

        Self {
            tx,
            playback,
            join: Mutex::new(Some(join)),
        }
    }

    pub fn playback_handle(&self) -> PlaybackHandle {
        self.playback.clone()
    }

    /// A cloneable sender for threads feeding the command queue.
    pub fn sender(&self) -> Sender<Command> {
        self.tx.clone()
    }

    pub fn send(&self, cmd: Command) -> Result<(), mpsc::SendError<Command>> {
        self.tx.send(cmd)
    }

    /// Whether the worker has exited (after `Quit` or a fatal setup
    /// failure such as a missing audio device).
    pub fn is_finished(&self) -> bool {
        self.join
            .lock()
            .ok()
            .and_then(|j| j.as_ref().map(|h| h.is_finished()))
            .unwrap_or(true)
    }

    /// Ask the worker to persist final state and stop, then join it.
    pub fn quit(&self) {
        let _ = self.send(Command::Quit);

        if let Ok(mut j) = self.join.lock() {
            if let Some(h) = j.take() {
                let _ = h.join();
            }
        }
    }
}
