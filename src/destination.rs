//! Destination planning — output directories, file naming, collision handling.
//!
//! A playlist's output directory carries a hidden identity marker recording the
//! source playlist ID. Re-running against the same ID resumes into the same
//! directory; a different playlist with the same display name gets a numbered
//! " (2)", " (3)", ... sibling instead of merging. Directory claiming uses
//! atomic create-exclusive so two racing processes converge on distinct
//! directories without locks.

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use crate::types::{PlaylistId, TrackDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Hidden sidecar file recording which playlist owns a directory
const MARKER_FILE: &str = ".playlist-dl.json";

/// Fallback stem when sanitization leaves nothing usable
const FALLBACK_NAME: &str = "untitled";

/// Artist placeholder for descriptors without credits
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Identity marker contents, serialized as JSON into [`MARKER_FILE`]
#[derive(Debug, Serialize, Deserialize)]
struct DirectoryMarker {
    playlist_id: PlaylistId,
}

/// Sanitize a display name into a safe file name component.
///
/// Replaces path separators, reserved characters, and control characters with
/// underscores, trims trailing dots and whitespace, and truncates to
/// `max_len` characters.
pub fn sanitize_file_name(name: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    cleaned = cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string();

    if cleaned.chars().count() > max_len {
        cleaned = cleaned.chars().take(max_len).collect();
        // The cut can land right after an interior dot or space, which would
        // leave a trailing dot the first trim already removed
        cleaned = cleaned
            .trim_end_matches(|c: char| c.is_whitespace() || c == '.')
            .to_string();
    }

    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Build the deterministic file name for one track.
///
/// Playlist tracks get `"NN - Artist - Title.mp3"` with the 1-based playlist
/// index zero-padded to two digits; single-track downloads (no index) get
/// `"Artist - Title.mp3"`.
pub fn track_file_name(
    descriptor: &TrackDescriptor,
    playlist_index: Option<usize>,
    max_len: usize,
) -> String {
    let artist = descriptor.primary_artist().unwrap_or(UNKNOWN_ARTIST);
    let stem = match playlist_index {
        Some(index) => format!("{index:02} - {artist} - {}", descriptor.title),
        None => format!("{artist} - {}", descriptor.title),
    };
    // Reserve room for the extension within the configured cap
    let max_stem = max_len.saturating_sub(".mp3".len()).max(1);
    format!("{}.mp3", sanitize_file_name(&stem, max_stem))
}

/// Assign file names for every track of a playlist run.
///
/// Duplicate names within the run get " (2)", " (3)", ... suffixes in playlist
/// order, so re-runs regenerate identical names and the already-downloaded
/// check stays meaningful.
pub fn assign_track_names(tracks: &[TrackDescriptor], max_len: usize) -> Vec<String> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let name = track_file_name(track, Some(i + 1), max_len);
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                match name.rsplit_once('.') {
                    Some((stem, ext)) => format!("{stem} ({}).{ext}", *count),
                    None => format!("{name} ({})", *count),
                }
            }
        })
        .collect()
}

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For `Rename`, appends " (1)", " (2)", ... to the stem until an unused name
/// is found. For `Skip`, fails if the file exists. For `Overwrite`, returns
/// the original path unchanged.
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::Destination {
                    path: path.to_path_buf(),
                    reason: "file already exists and collision action is Skip".to_string(),
                });
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| Error::Destination {
                    path: path.to_path_buf(),
                    reason: "cannot extract file stem".to_string(),
                })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().ok_or_else(|| Error::Destination {
                path: path.to_path_buf(),
                reason: "cannot extract parent directory".to_string(),
            })?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::Destination {
                path: path.to_path_buf(),
                reason: format!("could not find unique filename after {MAX_RENAME_ATTEMPTS} attempts"),
            })
        }
    }
}

/// Create (or resume into) the output directory for a playlist.
///
/// Candidate names are tried in order: `"Name"`, `"Name (2)"`, `"Name (3)"`, ...
/// Each candidate is claimed with an atomic `create_dir`; on `AlreadyExists`
/// the identity marker decides between resuming (same playlist ID) and moving
/// to the next suffix (different or missing marker).
pub fn plan_playlist_dir(
    base_dir: &Path,
    name: &str,
    id: &PlaylistId,
    max_len: usize,
) -> Result<PathBuf> {
    std::fs::create_dir_all(base_dir)?;
    let clean_name = sanitize_file_name(name, max_len);

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate_name = if i == 1 {
            clean_name.clone()
        } else {
            format!("{clean_name} ({i})")
        };
        let candidate = base_dir.join(&candidate_name);

        match std::fs::create_dir(&candidate) {
            Ok(()) => {
                write_marker(&candidate, id)?;
                tracing::debug!(dir = %candidate.display(), "Claimed playlist directory");
                return Ok(candidate);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if read_marker(&candidate)?.as_ref() == Some(id) {
                    tracing::debug!(dir = %candidate.display(), "Resuming into existing playlist directory");
                    return Ok(candidate);
                }
                // Owned by a different playlist (or not ours at all): try the next suffix
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }

    Err(Error::Destination {
        path: base_dir.join(clean_name),
        reason: format!("could not find unique directory name after {MAX_RENAME_ATTEMPTS} attempts"),
    })
}

fn write_marker(dir: &Path, id: &PlaylistId) -> Result<()> {
    let marker = DirectoryMarker {
        playlist_id: id.clone(),
    };
    let json = serde_json::to_vec_pretty(&marker)?;
    std::fs::write(dir.join(MARKER_FILE), json)?;
    Ok(())
}

fn read_marker(dir: &Path) -> Result<Option<PlaylistId>> {
    let path = dir.join(MARKER_FILE);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    // A corrupt marker is treated as "not ours" rather than a hard failure
    match serde_json::from_slice::<DirectoryMarker>(&bytes) {
        Ok(marker) => Ok(Some(marker.playlist_id)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable directory marker, treating as foreign");
            Ok(None)
        }
    }
}
