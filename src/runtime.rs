//! Process wiring: settings, durable stores, the engine worker, MPRIS
//! and the stdio bridge.
//!
//! Events go to stdout as JSON lines; logs go to stderr; commands come
//! in as JSON lines on stdin. Closing stdin shuts the engine down.

mod bridge;

use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::config::Settings;
use crate::engine::{Command, Engine, PlaybackState};
use crate::events::PlayerEvent;
use crate::mpris::{self, ControlCmd};
use crate::store::Store;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings();
    let store = Store::open()?;

    let (events_tx, events_rx) = mpsc::channel::<PlayerEvent>();
    let engine = Engine::spawn(settings, store, events_tx);

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    mpris::spawn_mpris(control_tx, engine.playback_handle());

    spawn_stdin_reader(engine.sender());

    let stdout = io::stdout();
    loop {
        match events_rx.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => emit_event(&stdout, &event)?,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        while let Ok(cmd) = control_rx.try_recv() {
            forward_control(&engine, cmd);
        }

        if engine.is_finished() {
            // Drain whatever the worker emitted on its way out.
            while let Ok(event) = events_rx.try_recv() {
                emit_event(&stdout, &event)?;
            }
            break;
        }
    }

    engine.quit();
    Ok(())
}

fn load_settings() -> Settings {
    match Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                warn!("invalid config, using defaults: {msg}");
                Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            // Config is optional; failures should not prevent startup.
            warn!("failed to load config, using defaults: {e}");
            Settings::default()
        }
    }
}

fn emit_event(stdout: &io::Stdout, event: &PlayerEvent) -> io::Result<()> {
    let line = serde_json::to_string(event).map_err(io::Error::other)?;
    let mut out = stdout.lock();
    writeln!(out, "{line}")?;
    out.flush()
}

/// Commands arrive as JSON lines on stdin; EOF shuts the engine down.
fn spawn_stdin_reader(tx: mpsc::Sender<Command>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(err) => {
                    warn!("stdin read failed: {err}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match bridge::parse_line(&line) {
                Ok(request) => {
                    if tx.send(bridge::to_command(request)).is_err() {
                        // Engine is gone; nothing left to feed.
                        break;
                    }
                }
                Err(err) => warn!("unparseable command line: {err}"),
            }
        }
        info!("command stream closed");
        let _ = tx.send(Command::Quit);
    });
}

/// Map an MPRIS control onto the engine's command queue. PlayPause and
/// relative seeks consult the playback snapshot to pick the command.
fn forward_control(engine: &Engine, cmd: ControlCmd) {
    let command = match cmd {
        ControlCmd::Play => Command::Play { id: None, at: None },
        ControlCmd::Pause => Command::Pause,
        ControlCmd::PlayPause => {
            let playing = engine
                .playback_handle()
                .lock()
                .map(|info| info.state == PlaybackState::Playing)
                .unwrap_or(false);
            if playing {
                Command::Pause
            } else {
                Command::Play { id: None, at: None }
            }
        }
        ControlCmd::Stop => Command::Stop,
        ControlCmd::Next => Command::Next,
        ControlCmd::Prev => Command::Previous,
        ControlCmd::Quit => Command::Quit,
        ControlCmd::SeekBy(offset_micros) => {
            let elapsed = engine
                .playback_handle()
                .lock()
                .map(|info| info.elapsed)
                .unwrap_or_default();
            let target = if offset_micros >= 0 {
                elapsed.saturating_add(Duration::from_micros(offset_micros as u64))
            } else {
                elapsed.saturating_sub(Duration::from_micros(offset_micros.unsigned_abs()))
            };
            Command::Seek { to: target }
        }
        ControlCmd::SetVolume(v) => Command::SetVolume {
            volume: v.clamp(0.0, 1.0) as f32,
        },
    };
    let _ = engine.send(command);
}
