//! Playback engine: one worker thread owns the audio output stream, the
//! playlist and the sequencing state, and serializes every command
//! through a single queue.

mod handle;
mod thread;
mod types;

pub use handle::Engine;
pub use types::{Command, NowPlaying, PlaybackHandle, PlaybackInfo, PlaybackState};

#[cfg(test)]
mod tests;
