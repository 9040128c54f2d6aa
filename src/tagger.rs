//! Metadata tagging — writes ID3v2.4 tags and embedded cover art.
//!
//! The tag is rebuilt from the descriptor on every invocation and written as a
//! whole, replacing any pre-existing frames of the same kind, so tagging the
//! same file twice never accumulates duplicates. Absent descriptor fields omit
//! the corresponding frame rather than failing.

use crate::error::TagError;
use crate::types::{TrackDescriptor, TrackId};
use id3::{Content, Frame, Tag, TagLike, Version, frame};
use std::path::Path;

/// Separator used to join multiple credited artists into TPE1
const ARTIST_SEPARATOR: &str = "/";

/// TXXX description under which the canonical source URI is stored
const SOURCE_URI_DESCRIPTION: &str = "SOURCE_URI";

/// Fetched cover art bytes with their MIME type.
#[derive(Clone, Debug)]
pub struct CoverArt {
    /// MIME type as reported by the art server (e.g. "image/jpeg")
    pub mime_type: String,
    /// Raw image bytes
    pub data: Vec<u8>,
}

/// Write tags for one track into `path`.
///
/// Fails with [`TagError::InvalidContainer`] when the file is missing or
/// empty, and [`TagError::WriteFailed`] when the tag cannot be written.
/// `cover_art` is optional; a track without art is still a valid deliverable.
pub fn tag_file(
    path: &Path,
    descriptor: &TrackDescriptor,
    cover_art: Option<&CoverArt>,
) -> Result<(), TagError> {
    let len = std::fs::metadata(path)
        .map_err(|_| TagError::InvalidContainer {
            path: path.to_path_buf(),
        })?
        .len();
    if len == 0 {
        return Err(TagError::InvalidContainer {
            path: path.to_path_buf(),
        });
    }

    let tag = build_tag(descriptor, cover_art);
    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| TagError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    tracing::debug!(track_id = %descriptor.id, path = %path.display(), "Tags written");
    Ok(())
}

/// Build the full frame set from a descriptor.
fn build_tag(descriptor: &TrackDescriptor, cover_art: Option<&CoverArt>) -> Tag {
    let mut tag = Tag::new();

    tag.set_title(&descriptor.title);
    if !descriptor.artists.is_empty() {
        tag.set_artist(descriptor.artists.join(ARTIST_SEPARATOR));
    }
    tag.set_album(&descriptor.album);
    if let Some(album_artist) = &descriptor.album_artist {
        tag.set_album_artist(album_artist);
    }

    // TRCK renders as "N/total" when the total is known, else "N"
    if let Some(track_number) = descriptor.track_number {
        tag.set_track(track_number);
        if let Some(total) = descriptor.total_tracks {
            tag.set_total_tracks(total);
        }
    }
    if let Some(disc_number) = descriptor.disc_number {
        tag.set_disc(disc_number);
    }
    if let Some(year) = descriptor.release_year {
        tag.set_year(year);
    }
    if let Some(isrc) = &descriptor.isrc {
        tag.add_frame(Frame::with_content("TSRC", Content::Text(isrc.clone())));
    }

    tag.add_frame(frame::ExtendedText {
        description: SOURCE_URI_DESCRIPTION.to_string(),
        value: source_uri(&descriptor.id),
    });

    if let Some(art) = cover_art {
        tag.add_frame(frame::Picture {
            mime_type: art.mime_type.clone(),
            picture_type: frame::PictureType::CoverFront,
            description: "Cover".to_string(),
            data: art.data.clone(),
        });
    }

    tag
}

/// Canonical source URI stored in the TXXX frame
fn source_uri(id: &TrackId) -> String {
    format!("spotify:track:{id}")
}
