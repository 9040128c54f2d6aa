//! Stream source seam — the capability boundary to the streaming service.
//!
//! The wire protocol behind this trait is opaque to the rest of the crate.
//! The pipeline only needs two operations: establish a session once, and open
//! a finite encoded-audio byte stream for a track's audio handle.

use crate::error::{Result, SourceError};
use crate::types::AudioHandle;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Authenticated handle permitting streaming requests.
///
/// Shared read-only across all concurrent track pipelines; passed explicitly
/// into each pipeline invocation rather than held as ambient global state.
#[derive(Clone, Debug)]
pub struct Session {
    token: String,
}

impl Session {
    /// Wrap a bearer token (or other service-defined session secret)
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The session secret, for adapters that need to attach it to requests
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// A lazy, single-pass, non-seekable encoded audio byte stream.
///
/// Created per download attempt and fully consumed or discarded by the end of
/// that attempt; never retained across retries.
pub type EncodedAudio = Pin<Box<dyn AsyncRead + Send>>;

/// Capability interface for authenticating and fetching encoded audio.
///
/// Implementations must make `authenticate` idempotent: reuse cached
/// credentials when valid, and perform the interactive device flow at most
/// once per process. Concurrent callers must be serialized internally (see
/// [`crate::credentials::CredentialCache::lock`]).
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Establish (or reuse) an authenticated session.
    ///
    /// Fails with [`crate::error::Error::AuthenticationFailed`] when no
    /// session can be established; this is fatal for the whole run.
    async fn authenticate(&self) -> Result<Session>;

    /// Open the encoded audio stream for one track.
    async fn open_stream(
        &self,
        session: &Session,
        handle: &AudioHandle,
    ) -> std::result::Result<EncodedAudio, SourceError>;
}
