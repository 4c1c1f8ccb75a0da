//! Media probing and sink construction: the seam between files on disk
//! and the playback engine.
//!
//! Everything here returns `Result`/`Option`; a damaged or unrecognized
//! file must surface as a tagged error the engine can report per track,
//! never as a panic.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::error::{ErrorKind, LoftyError};
use lofty::file::{FileType, TaggedFileExt};
use lofty::picture::MimeType;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use rodio::{Decoder, OutputStream, Sink, Source};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::playlist::{NewTrack, TrackId};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Stable kind label used in `error` event payloads.
    pub fn kind_label(&self) -> &'static str {
        match self {
            MediaError::UnsupportedFormat(_) => "unsupported-format",
            MediaError::Decode(_) => "decode-error",
            MediaError::Io(_) => "io-error",
        }
    }
}

/// Static facts about an opened file.
#[derive(Debug, Clone)]
pub struct CodecInfo {
    pub codec: String,
    pub codec_short: String,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u8>,
    pub channels: Option<u8>,
    pub bit_rate: Option<u32>,
    pub duration: Duration,
}

/// Tag data; absence of any field is normal, not an error.
#[derive(Debug, Clone, Default)]
pub struct TrackMeta {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Inspection {
    pub info: CodecInfo,
    pub meta: TrackMeta,
}

/// Probe a file for codec facts and tags in one pass.
pub fn inspect(path: &Path) -> Result<Inspection, MediaError> {
    // Surface missing/unreadable files as I/O errors before the format
    // probe turns them into something less specific.
    File::open(path)?;

    let tagged = Probe::open(path)
        .map_err(|e| map_lofty_error(path, e))?
        .read()
        .map_err(|e| map_lofty_error(path, e))?;

    let props = tagged.properties();
    let (codec, codec_short) = codec_names(tagged.file_type(), path);
    let info = CodecInfo {
        codec,
        codec_short,
        sample_rate: props.sample_rate(),
        bits_per_sample: props.bit_depth(),
        channels: props.channels(),
        bit_rate: props.audio_bitrate(),
        duration: props.duration(),
    };

    let mut meta = TrackMeta::default();
    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        meta.title = non_empty(tag.get_string(&ItemKey::TrackTitle));
        meta.artist = non_empty(tag.get_string(&ItemKey::TrackArtist));
        meta.album = non_empty(tag.get_string(&ItemKey::AlbumTitle));
    }

    Ok(Inspection { info, meta })
}

/// Build the `NewTrack` record for a file being added to the playlist.
/// Probe failures degrade to a filename-only entry; the error will
/// resurface, tagged, when the track is actually played.
pub fn entry_for(path: &Path) -> NewTrack {
    let fallback = file_stem_title(path);
    match inspect(path) {
        Ok(inspection) => NewTrack {
            path: path.to_path_buf(),
            title: inspection.meta.title.unwrap_or(fallback),
            artist: inspection.meta.artist,
            album: inspection.meta.album,
            duration: Some(inspection.info.duration),
        },
        Err(err) => {
            log::warn!("probe failed for {path:?}: {err}");
            NewTrack {
                path: path.to_path_buf(),
                title: fallback,
                artist: None,
                album: None,
                duration: None,
            }
        }
    }
}

pub fn file_stem_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string()
}

/// Write the first embedded picture to the artwork cache and return its
/// path. Best-effort: any failure just means no artwork.
pub fn extract_artwork(path: &Path, cache_dir: &Path, id: TrackId) -> Option<PathBuf> {
    let tagged = Probe::open(path).ok()?.read().ok()?;
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
    let picture = tag.pictures().first()?;

    let ext = match picture.mime_type() {
        Some(MimeType::Png) => "png",
        Some(MimeType::Gif) => "gif",
        Some(MimeType::Bmp) => "bmp",
        _ => "jpg",
    };

    fs::create_dir_all(cache_dir).ok()?;
    let file = cache_dir.join(format!("{id}.{ext}"));
    fs::write(&file, picture.data()).ok()?;
    Some(file)
}

/// Create a paused `Sink` for `path` that starts playback at `start`,
/// with the given gain already applied.
pub fn create_sink_at(
    stream: &OutputStream,
    path: &Path,
    start: Duration,
    volume: f32,
) -> Result<Sink, MediaError> {
    let file = File::open(path)?;

    let source = Decoder::new(BufReader::new(file)).map_err(|e| match e {
        rodio::decoder::DecoderError::UnrecognizedFormat => {
            MediaError::UnsupportedFormat(path.display().to_string())
        }
        other => MediaError::Decode(other.to_string()),
    })?;

    let sink = Sink::connect_new(stream.mixer());
    sink.set_volume(volume);
    if start.is_zero() {
        sink.append(source);
    } else {
        // `skip_duration` is the offset primitive; the wrapper cannot
        // seek natively afterwards, which the engine accounts for.
        sink.append(source.skip_duration(start));
    }
    sink.pause();
    Ok(sink)
}

pub fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Expand the paths given to `playlist_add`: files are taken as-is,
/// directories are walked under the library rules and filtered by
/// extension, sorted for a stable insertion order.
pub fn expand_paths(paths: &[PathBuf], settings: &LibrarySettings) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut walker = WalkDir::new(path).follow_links(settings.follow_links);

            // Non-recursive = only the root directory.
            let depth_cap = if settings.recursive {
                settings.max_depth
            } else {
                Some(1)
            };
            if let Some(d) = depth_cap {
                walker = walker.max_depth(d);
            }

            let mut found: Vec<PathBuf> = walker
                .into_iter()
                .filter_entry(|e| {
                    settings.include_hidden || e.depth() == 0 || !is_hidden(e.path())
                })
                .filter_map(Result::ok)
                .map(|e| e.into_path())
                .filter(|p| {
                    p.is_file()
                        && (settings.include_hidden || !is_hidden(p))
                        && is_audio_file(p, settings)
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            // An explicitly named file is kept even with an odd
            // extension; the decoder has the final say at play time.
            files.push(path.clone());
        }
    }

    files
}

fn codec_names(file_type: FileType, path: &Path) -> (String, String) {
    let (long, short) = match file_type {
        FileType::Flac => ("Free Lossless Audio Codec", "flac"),
        FileType::Mpeg => ("MPEG Audio Layer III", "mp3"),
        FileType::Wav => ("Waveform Audio", "wav"),
        FileType::Aiff => ("Audio Interchange File Format", "aiff"),
        FileType::Vorbis => ("Ogg Vorbis", "vorbis"),
        FileType::Opus => ("Ogg Opus", "opus"),
        FileType::Speex => ("Ogg Speex", "speex"),
        FileType::Mp4 => ("MPEG-4 Audio", "mp4"),
        FileType::Aac => ("Advanced Audio Coding", "aac"),
        FileType::Ape => ("Monkey's Audio", "ape"),
        FileType::WavPack => ("WavPack", "wv"),
        FileType::Mpc => ("Musepack", "mpc"),
        _ => {
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown");
            return (format!("Unknown ({ext})"), ext.to_ascii_lowercase());
        }
    };
    (long.to_string(), short.to_string())
}

fn map_lofty_error(path: &Path, err: LoftyError) -> MediaError {
    if matches!(err.kind(), ErrorKind::UnknownFormat) {
        MediaError::UnsupportedFormat(path.display().to_string())
    } else {
        MediaError::Decode(err.to_string())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() { None } else { Some(v.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn is_audio_file_matches_configured_extensions_case_insensitive() {
        let settings = LibrarySettings::default();
        assert!(is_audio_file(Path::new("/tmp/a.mp3"), &settings));
        assert!(is_audio_file(Path::new("/tmp/a.MP3"), &settings));
        assert!(is_audio_file(Path::new("/tmp/a.flac"), &settings));
        assert!(is_audio_file(Path::new("/tmp/a.ogg"), &settings));
        assert!(is_audio_file(Path::new("/tmp/a.m4a"), &settings));
        assert!(!is_audio_file(Path::new("/tmp/a.txt"), &settings));
        assert!(!is_audio_file(Path::new("/tmp/a"), &settings));
    }

    #[test]
    fn expand_keeps_explicit_files_and_walks_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.MP3"), b"not a real mp3").unwrap();
        fs::write(dir.path().join("a.ogg"), b"not a real ogg").unwrap();
        fs::write(dir.path().join("c.txt"), b"ignore me").unwrap();
        let loose = dir.path().join("loose.weird");
        fs::write(&loose, b"explicitly given").unwrap();

        let settings = LibrarySettings::default();
        let files = expand_paths(
            &[dir.path().to_path_buf(), loose.clone()],
            &settings,
        );

        assert_eq!(files.len(), 3);
        // Directory contents come sorted, explicit files in input order.
        assert_eq!(files[0], dir.path().join("a.ogg"));
        assert_eq!(files[1], dir.path().join("b.MP3"));
        assert_eq!(files[2], loose);
    }

    #[test]
    fn expand_respects_recursive_false() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("root.mp3"), b"not real").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("child.mp3"), b"not real").unwrap();

        let settings = LibrarySettings {
            recursive: false,
            ..LibrarySettings::default()
        };
        let files = expand_paths(&[dir.path().to_path_buf()], &settings);
        assert_eq!(files, vec![dir.path().join("root.mp3")]);
    }

    #[test]
    fn expand_respects_include_hidden_false() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".hidden.mp3"), b"not real").unwrap();
        fs::write(dir.path().join("visible.mp3"), b"not real").unwrap();

        let settings = LibrarySettings {
            include_hidden: false,
            ..LibrarySettings::default()
        };
        let files = expand_paths(&[dir.path().to_path_buf()], &settings);
        assert_eq!(files, vec![dir.path().join("visible.mp3")]);
    }

    #[test]
    fn inspect_missing_file_is_an_io_error() {
        let err = inspect(Path::new("/definitely/not/here.flac")).unwrap_err();
        assert_eq!(err.kind_label(), "io-error");
    }

    #[test]
    fn inspect_garbage_is_not_a_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.xyz");
        fs::write(&path, b"this is not audio at all").unwrap();
        let err = inspect(&path).unwrap_err();
        assert!(matches!(
            err,
            MediaError::UnsupportedFormat(_) | MediaError::Decode(_)
        ));
    }

    #[test]
    fn entry_for_degrades_to_filename_title() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("My Song.mp3");
        fs::write(&path, b"not a real mp3").unwrap();
        let entry = entry_for(&path);
        assert_eq!(entry.title, "My Song");
        assert_eq!(entry.path, path);
        assert!(entry.artist.is_none());
    }
}
