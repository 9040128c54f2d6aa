//! Catalog seam — resolves playlist and track IDs to ordered track descriptors.

use crate::error::Result;
use crate::source::Session;
use crate::types::{PlaylistId, TrackDescriptor, TrackId};
use async_trait::async_trait;

/// A playlist with its tracks in catalog order.
#[derive(Clone, Debug)]
pub struct Playlist {
    /// Playlist identifier
    pub id: PlaylistId,
    /// Display name, used for the output directory
    pub name: String,
    /// Tracks in stable catalog order (1-based indexing is derived from position)
    pub tracks: Vec<TrackDescriptor>,
}

/// Capability interface for playlist and track metadata lookups.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch a playlist and all of its track descriptors, following paging
    /// until exhaustion and preserving order.
    async fn playlist(&self, session: &Session, id: &PlaylistId) -> Result<Playlist>;

    /// Fetch a single track's descriptor.
    async fn track(&self, session: &Session, id: &TrackId) -> Result<TrackDescriptor>;
}
