//! The engine worker: a single-threaded command loop that owns the
//! audio output, the playlist and the active sink.
//!
//! Sample decode and delivery happen inside rodio's mixer thread; this
//! loop only issues cheap sink operations, so pause/seek/stop stay
//! responsive while a track is decoding. Every playlist or active-track
//! mutation goes through the one command queue, which is what rules out
//! races between e.g. a delete command and a finished track.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::config::Settings;
use crate::events::{
    ErrorEvent, MusicImage, MusicInfo, MusicMeta, PlayState, PlayerEvent, SettingsSnapshot,
    format_timestamp, parse_timestamp,
};
use crate::media::{self, MediaError};
use crate::playlist::{Playlist, SequencePolicy, Track, TrackId};
use crate::store::Store;

use super::types::{
    Command, NowPlaying, PlaybackHandle, PlaybackState, VolumeCtl, coalesce_commands,
};

pub(super) fn spawn_engine_thread(
    rx: Receiver<Command>,
    events: Sender<PlayerEvent>,
    playback: PlaybackHandle,
    settings: Settings,
    store: Store,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut stream = match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => stream,
            Err(err) => {
                error!("no audio output device: {err}");
                let _ = events.send(PlayerEvent::Error(ErrorEvent {
                    id: None,
                    name: "audio-output".to_string(),
                    message: err.to_string(),
                }));
                return;
            }
        };
        // rodio logs to stderr when OutputStream is dropped. Useful in
        // debugging, noisy for a long-running engine.
        stream.log_on_drop(false);

        let mut core = EngineCore::new(stream, events, playback, settings, store);
        core.restore();

        let tick = Duration::from_millis(core.settings.engine.progress_interval_ms.max(50));
        loop {
            match rx.recv_timeout(tick) {
                Ok(first) => {
                    let mut batch = vec![first];
                    while let Ok(more) = rx.try_recv() {
                        batch.push(more);
                    }
                    for cmd in coalesce_commands(batch) {
                        if !core.handle(cmd) {
                            core.shutdown();
                            return;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => core.tick(),
                Err(RecvTimeoutError::Disconnected) => {
                    core.shutdown();
                    return;
                }
            }
        }
    })
}

struct ActiveTrack {
    id: TrackId,
    sink: Sink,
    duration: Duration,
    /// Offset the sink's position is measured from: non-zero after an
    /// offset start, where the source was skipped rather than seeked.
    base: Duration,
}

impl ActiveTrack {
    fn elapsed(&self) -> Duration {
        self.base + self.sink.get_pos()
    }
}

struct EngineCore {
    stream: OutputStream,
    events: Sender<PlayerEvent>,
    playback: PlaybackHandle,
    store: Store,
    settings: Settings,
    playlist: Playlist,
    volume: VolumeCtl,
    policy: SequencePolicy,
    active: Option<ActiveTrack>,
    /// Last active (or restored) track id; the target of an id-less play.
    selected: Option<TrackId>,
    /// One-shot start offset restored by `load_play_state`.
    resume_at: Option<Duration>,
    last_play_state: Option<PlayState>,
    last_state_save: Instant,
}

impl EngineCore {
    fn new(
        stream: OutputStream,
        events: Sender<PlayerEvent>,
        playback: PlaybackHandle,
        settings: Settings,
        store: Store,
    ) -> Self {
        let volume = VolumeCtl::new(settings.audio.volume, settings.audio.muted);
        let policy = settings.playback.sequence;
        Self {
            stream,
            events,
            playback,
            store,
            settings,
            playlist: Playlist::default(),
            volume,
            policy,
            active: None,
            selected: None,
            resume_at: None,
            last_play_state: None,
            last_state_save: Instant::now(),
        }
    }

    /// Bring back the persisted playlist and the last play position.
    fn restore(&mut self) {
        self.playlist = self.store.load_playlist();
        if !self.playlist.is_empty() {
            info!("restored playlist with {} track(s)", self.playlist.len());
        }
        if let Some(state) = self.store.load_play_state() {
            if self.playlist.contains(state.id) {
                self.selected = Some(state.id);
                self.resume_at = parse_timestamp(&state.progress);
            }
        }
    }

    fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Play { id, at } => self.cmd_play(id, at),
            Command::Pause => self.cmd_pause(),
            Command::Stop => self.stop_playback(true),
            Command::Seek { to } => self.cmd_seek(to),
            Command::Next => self.cmd_next(),
            Command::Previous => self.cmd_previous(),
            Command::Switch { id } => self.cmd_switch(id),
            Command::AddTracks { paths } => self.cmd_add(paths),
            Command::RemoveTrack { id } => self.cmd_remove(id),
            Command::ClearPlaylist => self.cmd_clear(),
            Command::SetVolume { volume } => self.cmd_set_volume(volume),
            Command::ToggleMute => self.cmd_toggle_mute(),
            Command::SetSequence { policy } => self.cmd_set_sequence(policy),
            Command::EmitSettings => self.cmd_emit_settings(),
            Command::EmitPlaylist => self.cmd_emit_playlist(),
            Command::EmitResumeState => self.cmd_emit_resume_state(),
            Command::Quit => return false,
        }
        true
    }

    /// Timeout path of the loop: progress emission and end-of-stream
    /// detection.
    fn tick(&mut self) {
        let finished = self
            .active
            .as_ref()
            .filter(|a| !a.sink.is_paused() && a.sink.empty())
            .map(|a| a.id);
        if let Some(id) = finished {
            self.active = None;
            self.emit(PlayerEvent::Finished { id });
            info!("track {id} finished");

            if !self.playlist.contains(id) {
                // Deleted mid-playback: nothing sensible to advance from.
                self.stop_playback(true);
            } else if let Some(next) = self.playlist.resolve_next(id, self.policy) {
                self.start_chain(next, Duration::ZERO);
            } else {
                self.stop_playback(true);
            }
            return;
        }

        if self.state() == PlaybackState::Playing {
            self.publish_snapshot();
            self.emit_play_state();
            let save_every = Duration::from_secs(self.settings.engine.state_save_secs);
            if self.last_state_save.elapsed() >= save_every {
                self.save_play_state_now();
            }
        }
    }

    fn cmd_play(&mut self, id: Option<TrackId>, at: Option<Duration>) {
        // The id-less, offset-less form resumes a paused track.
        if id.is_none() && at.is_none() {
            if let Some(active) = &self.active {
                if active.sink.is_paused() {
                    active.sink.play();
                    self.publish_snapshot();
                    self.emit_play_state();
                } // else: already playing, nothing to do
                return;
            }
        }

        if let Some(id) = id {
            if !self.playlist.contains(id) {
                self.emit_stale_id(id, "play");
                return;
            }
            self.resume_at = None;
            self.start_chain(id, at.unwrap_or(Duration::ZERO));
            return;
        }

        // No id: start the selected/restored track, or the first entry.
        let selected = self.selected.filter(|&s| self.playlist.contains(s));
        let Some(target) = selected.or_else(|| self.playlist.first_id()) else {
            debug!("play ignored; playlist is empty");
            return;
        };
        let at = at.or_else(|| self.resume_at.take()).unwrap_or(Duration::ZERO);
        self.start_chain(target, at);
    }

    fn cmd_pause(&mut self) {
        let Some(active) = &self.active else { return };
        if active.sink.is_paused() {
            return;
        }
        active.sink.pause();
        self.publish_snapshot();
        // One frozen snapshot; the UI keeps showing it while paused.
        self.emit_play_state();
        self.save_play_state_now();
    }

    fn cmd_seek(&mut self, to: Duration) {
        let Some((id, duration, base, paused)) = self
            .active
            .as_ref()
            .map(|a| (a.id, a.duration, a.base, a.sink.is_paused()))
        else {
            debug!("seek ignored; nothing is active");
            return;
        };
        let to = if duration.is_zero() { to } else { to.min(duration) };

        let mut rebuild = !base.is_zero();
        if !rebuild {
            if let Some(active) = &self.active {
                if let Err(err) = active.sink.try_seek(to) {
                    debug!("native seek unavailable ({err:?}); rebuilding at offset");
                    rebuild = true;
                }
            }
        }

        if rebuild {
            // Formats without native seek get a fresh sink skipped to the
            // target. Done synchronously, so the drained old sink can
            // never be mistaken for a natural end of stream.
            let Some(path) = self.playlist.get(id).map(|t| t.path.clone()) else {
                self.emit_stale_id(id, "seek");
                self.stop_playback(true);
                return;
            };
            if let Some(active) = self.active.take() {
                active.sink.stop();
            }
            match media::create_sink_at(&self.stream, &path, to, self.volume.effective()) {
                Ok(sink) => {
                    if !paused {
                        sink.play();
                    }
                    self.active = Some(ActiveTrack {
                        id,
                        sink,
                        duration,
                        base: to,
                    });
                }
                Err(err) => {
                    self.emit_error(Some(id), &err);
                    self.stop_playback(true);
                    return;
                }
            }
        }

        self.publish_snapshot();
        self.emit_play_state();
        self.save_play_state_now();
    }

    fn cmd_next(&mut self) {
        let current = self.active.as_ref().map(|a| a.id).or(self.selected);
        let Some(next) = self.playlist.resolve_manual_next(current, self.policy) else {
            debug!("next ignored; playlist is empty");
            return;
        };
        self.resume_at = None;
        self.start_chain(next, Duration::ZERO);
    }

    fn cmd_previous(&mut self) {
        let current = self.active.as_ref().map(|a| a.id).or(self.selected);
        let Some(prev) = self.playlist.resolve_previous(current) else {
            debug!("previous ignored; playlist is empty");
            return;
        };
        self.resume_at = None;
        self.start_chain(prev, Duration::ZERO);
    }

    fn cmd_switch(&mut self, id: TrackId) {
        if !self.playlist.contains(id) {
            self.emit_stale_id(id, "switch");
            return;
        }
        let already_playing = self
            .active
            .as_ref()
            .is_some_and(|a| a.id == id && !a.sink.is_paused());
        if already_playing {
            return;
        }
        self.resume_at = None;
        self.start_chain(id, Duration::ZERO);
    }

    fn cmd_add(&mut self, paths: Vec<PathBuf>) {
        let files = media::expand_paths(&paths, &self.settings.library);
        let mut created = Vec::with_capacity(files.len());
        for path in files {
            let entry = media::entry_for(&path);
            created.push(self.playlist.add(entry).clone());
        }
        if !created.is_empty() {
            self.persist_playlist();
            info!("added {} track(s)", created.len());
        }
        // The reply always goes out so the caller learns what was
        // created, possibly nothing.
        self.emit(PlayerEvent::PlaylistAdded { tracks: created });
    }

    fn cmd_remove(&mut self, id: TrackId) {
        if self.active.as_ref().is_some_and(|a| a.id == id) {
            self.stop_playback(true);
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.playlist.remove(id).is_none() {
            debug!("delete for unknown track {id}");
        }
        self.persist_playlist();
        self.cmd_emit_playlist();
    }

    fn cmd_clear(&mut self) {
        self.stop_playback(true);
        self.selected = None;
        self.resume_at = None;
        self.playlist.clear();
        self.persist_playlist();
        self.cmd_emit_playlist();
    }

    fn cmd_set_volume(&mut self, volume: f32) {
        let v = self.volume.set(volume);
        if !self.volume.muted() {
            if let Some(active) = &self.active {
                active.sink.set_volume(v);
            }
        }
        self.settings.audio.volume = v;
        self.persist_settings();
        self.publish_snapshot();
    }

    fn cmd_toggle_mute(&mut self) {
        let muted = self.volume.toggle_mute();
        if let Some(active) = &self.active {
            active.sink.set_volume(self.volume.effective());
        }
        self.settings.audio.muted = muted;
        self.persist_settings();
        self.publish_snapshot();
        debug!("mute {}", if muted { "on" } else { "off" });
    }

    fn cmd_set_sequence(&mut self, policy: SequencePolicy) {
        self.policy = policy;
        self.settings.playback.sequence = policy;
        self.persist_settings();
    }

    fn cmd_emit_settings(&self) {
        self.emit(PlayerEvent::Settings(SettingsSnapshot {
            volume: self.volume.volume(),
            muted: self.volume.muted(),
            sequence_type: self.policy,
        }));
    }

    fn cmd_emit_playlist(&self) {
        self.emit(PlayerEvent::Playlist {
            tracks: self.playlist.tracks().to_vec(),
        });
    }

    fn cmd_emit_resume_state(&mut self) {
        let state = self.store.load_play_state();
        if let Some(s) = &state {
            if self.playlist.contains(s.id) {
                self.selected = Some(s.id);
                self.resume_at = parse_timestamp(&s.progress);
            }
        }
        self.emit(PlayerEvent::ResumeState { state });
    }

    /// Start `id`, falling over to the policy-ordered candidates when it
    /// cannot be opened.
    fn start_chain(&mut self, id: TrackId, at: Duration) {
        let Some(track) = self.playlist.get(id).cloned() else {
            self.emit_stale_id(id, "start");
            return;
        };
        if let Err(err) = self.start_track(&track, at) {
            self.emit_error(Some(id), &err);
            self.publish_snapshot(); // Loading -> Idle
            self.advance_after_failure(id);
        }
    }

    /// One bounded pass over the rest of the playlist; an all-failing
    /// playlist ends Idle with every error surfaced.
    fn advance_after_failure(&mut self, failed: TrackId) {
        for candidate in self.playlist.advance_candidates(failed, self.policy) {
            let Some(track) = self.playlist.get(candidate).cloned() else {
                continue;
            };
            match self.start_track(&track, Duration::ZERO) {
                Ok(()) => return,
                Err(err) => self.emit_error(Some(candidate), &err),
            }
        }
        info!("no playable track; stopping");
        self.stop_playback(true);
    }

    fn start_track(&mut self, track: &Track, at: Duration) -> Result<(), MediaError> {
        self.resume_at = None;

        // Exactly one stream at a time; tear the old one down first.
        if let Some(active) = self.active.take() {
            active.sink.stop();
        }
        self.set_loading(track);

        let inspection = media::inspect(&track.path)?;
        let duration = inspection.info.duration;
        let at = if duration.is_zero() { at } else { at.min(duration) };

        let sink = media::create_sink_at(&self.stream, &track.path, at, self.volume.effective())?;
        sink.play();

        self.active = Some(ActiveTrack {
            id: track.id,
            sink,
            duration,
            base: at,
        });
        self.selected = Some(track.id);
        info!("playing track {} ({:?})", track.id, track.path);

        self.emit(PlayerEvent::MusicInfo(music_info(track.id, &inspection.info)));
        self.emit(PlayerEvent::MusicMeta(MusicMeta {
            id: track.id,
            title: inspection.meta.title.unwrap_or_else(|| track.title.clone()),
            artist: inspection.meta.artist.unwrap_or_default(),
            album: inspection.meta.album.unwrap_or_default(),
        }));
        self.resolve_artwork(track);

        self.publish_snapshot();
        self.emit_play_state();
        self.save_play_state_now();
        Ok(())
    }

    /// Surface cached or embedded artwork for the track, updating the
    /// playlist entry the first time it is extracted. Best-effort.
    fn resolve_artwork(&mut self, track: &Track) {
        if let Some(path) = &track.artwork {
            if path.exists() {
                self.emit(PlayerEvent::MusicImage(MusicImage {
                    id: track.id,
                    path: path.clone(),
                }));
                return;
            }
        }
        let Some(path) = media::extract_artwork(&track.path, &self.store.artwork_dir(), track.id)
        else {
            return;
        };
        if self.playlist.set_artwork(track.id, path.clone()) {
            self.persist_playlist();
        }
        self.emit(PlayerEvent::MusicImage(MusicImage {
            id: track.id,
            path,
        }));
    }

    fn stop_playback(&mut self, persist: bool) {
        if let Some(active) = self.active.take() {
            active.sink.stop();
            debug!("stopped track {}", active.id);
        }
        self.last_play_state = None;
        self.publish_snapshot();
        if persist {
            self.save_play_state_now();
        }
    }

    fn state(&self) -> PlaybackState {
        match &self.active {
            None => PlaybackState::Idle,
            Some(a) if a.sink.is_paused() => PlaybackState::Paused,
            Some(_) => PlaybackState::Playing,
        }
    }

    fn set_loading(&mut self, track: &Track) {
        if let Ok(mut info) = self.playback.lock() {
            info.state = PlaybackState::Loading;
            info.elapsed = Duration::ZERO;
            info.track = Some(NowPlaying {
                id: track.id,
                title: track.title.clone(),
                display: track.display.clone(),
                artist: track.artist.clone(),
                album: track.album.clone(),
                path: track.path.clone(),
                duration: track.duration.unwrap_or_default(),
            });
        }
    }

    /// Refresh the shared snapshot. Readers (MPRIS) only ever take this
    /// one short-lived lock, never anything the mixer needs.
    fn publish_snapshot(&self) {
        let state = self.state();
        let mut now = None;
        if let Some(a) = &self.active {
            if let Some(t) = self.playlist.get(a.id) {
                now = Some(NowPlaying {
                    id: t.id,
                    title: t.title.clone(),
                    display: t.display.clone(),
                    artist: t.artist.clone(),
                    album: t.album.clone(),
                    path: t.path.clone(),
                    duration: a.duration,
                });
            }
        }
        let elapsed = self.active.as_ref().map(|a| a.elapsed()).unwrap_or_default();

        if let Ok(mut info) = self.playback.lock() {
            info.state = state;
            info.track = now;
            info.elapsed = elapsed;
            info.volume = self.volume.volume();
            info.muted = self.volume.muted();
        }
    }

    fn build_play_state(&self) -> Option<PlayState> {
        let active = self.active.as_ref()?;
        let track = self.playlist.get(active.id)?;
        let elapsed = active.elapsed();
        let shown = if active.duration.is_zero() {
            elapsed
        } else {
            elapsed.min(active.duration)
        };
        Some(PlayState {
            id: active.id,
            name: track.display.clone(),
            path: track.path.display().to_string(),
            progress: format_timestamp(shown),
            left_duration: format_timestamp(active.duration.saturating_sub(elapsed)),
        })
    }

    fn emit_play_state(&mut self) {
        let Some(state) = self.build_play_state() else {
            return;
        };
        self.last_play_state = Some(state.clone());
        self.emit(PlayerEvent::PlayState(state));
    }

    fn save_play_state_now(&mut self) {
        if let Err(err) = self.store.save_play_state(self.last_play_state.as_ref()) {
            warn!("failed to persist play state: {err}");
        }
        self.last_state_save = Instant::now();
    }

    fn persist_playlist(&self) {
        if let Err(err) = self.store.save_playlist(&self.playlist) {
            error!("failed to persist playlist: {err}");
        }
    }

    fn persist_settings(&self) {
        if let Err(err) = self.settings.save() {
            warn!("failed to persist settings: {err}");
        }
    }

    fn emit(&self, event: PlayerEvent) {
        // A gone receiver just means nobody is listening anymore.
        let _ = self.events.send(event);
    }

    fn emit_error(&self, id: Option<TrackId>, err: &MediaError) {
        warn!("playback error on {id:?}: {err}");
        self.emit(PlayerEvent::Error(ErrorEvent {
            id,
            name: err.kind_label().to_string(),
            message: err.to_string(),
        }));
    }

    /// A command referenced an id that is no longer in the playlist
    /// (stale UI state); report it without touching playback.
    fn emit_stale_id(&self, id: TrackId, what: &str) {
        warn!("{what} requested for unknown track {id}");
        self.emit(PlayerEvent::Error(ErrorEvent {
            id: Some(id),
            name: "playlist-invariant".to_string(),
            message: format!("track {id} is not in the playlist"),
        }));
    }

    fn shutdown(&mut self) {
        if self.active.is_some() {
            self.emit_play_state();
            self.save_play_state_now();
        }
        if let Some(active) = self.active.take() {
            active.sink.stop();
        }
        info!("engine stopped");
    }
}

fn music_info(id: TrackId, info: &media::CodecInfo) -> MusicInfo {
    MusicInfo {
        id,
        codec: info.codec.clone(),
        codec_short: info.codec_short.clone(),
        sample_rate: info.sample_rate,
        bits_per_sample: info.bits_per_sample,
        channels: info.channels,
        bit_rate: info.bit_rate,
        duration: format_timestamp(info.duration),
    }
}
