//! Identifier resolution — turns user input into a typed playlist or track reference.
//!
//! Accepts both URI form (`spotify:playlist:<id>`, `spotify:track:<id>`) and the
//! share-URL form (`https://open.spotify.com/playlist/<id>`), including URLs with
//! query strings and `/intl-xx/` path prefixes. Resolution is pure: no I/O.

use crate::error::{Error, Result};
use crate::types::{ItemRef, PlaylistId, TrackId};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Host that share URLs must use
const SHARE_URL_HOST: &str = "open.spotify.com";

/// Matches `spotify:playlist:<id>` and `spotify:track:<id>` (IDs are 22 base62 chars)
fn uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Panic-free: the pattern is a compile-time constant
        #[allow(clippy::expect_used)]
        Regex::new(r"^spotify:(playlist|track):([A-Za-z0-9]{22})$").expect("valid regex")
    })
}

/// True if `s` has the shape of a service identifier (22 base62 characters)
fn is_id(s: &str) -> bool {
    s.len() == 22 && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Resolve a user-supplied URI or URL into a typed reference.
///
/// Returns [`Error::InvalidIdentifier`] when the input matches neither a
/// playlist nor a track shape in either form.
///
/// # Examples
///
/// ```
/// use playlist_dl::resolver::resolve;
/// use playlist_dl::types::ItemRef;
///
/// let by_uri = resolve("spotify:track:4uLU6hMCjMI75M1A2tKUQC").unwrap();
/// let by_url = resolve("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC").unwrap();
/// assert_eq!(by_uri, by_url);
/// assert!(matches!(by_uri, ItemRef::Track(_)));
/// ```
pub fn resolve(input: &str) -> Result<ItemRef> {
    let trimmed = input.trim();

    if let Some(caps) = uri_regex().captures(trimmed) {
        let id = &caps[2];
        return Ok(match &caps[1] {
            "playlist" => ItemRef::Playlist(PlaylistId::new(id)),
            _ => ItemRef::Track(TrackId::new(id)),
        });
    }

    if let Some(item) = resolve_url(trimmed) {
        return Ok(item);
    }

    Err(Error::InvalidIdentifier(input.to_string()))
}

/// Try the share-URL form; None if the input isn't a recognized URL shape.
fn resolve_url(input: &str) -> Option<ItemRef> {
    let url = Url::parse(input).ok()?;
    if url.domain() != Some(SHARE_URL_HOST) {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.collect();
    // Localized share URLs insert an "intl-xx" segment before the type
    let segments = match segments.first() {
        Some(first) if first.starts_with("intl-") => &segments[1..],
        _ => &segments[..],
    };

    match segments {
        ["playlist", id, ..] if is_id(id) => Some(ItemRef::Playlist(PlaylistId::new(*id))),
        ["track", id, ..] if is_id(id) => Some(ItemRef::Track(TrackId::new(*id))),
        _ => None,
    }
}
