//! Bundled HTTP adapter for the streaming service gateway.
//!
//! [`HttpService`] implements both [`CatalogClient`] and [`StreamSource`]
//! against a configured gateway base URL using JSON over HTTP. Authentication
//! uses a device flow: the user is shown a verification URL and code (via the
//! event channel), and the token endpoint is polled until the grant arrives.
//! Granted credentials are persisted through the [`CredentialCache`] and
//! validated with one cheap request on subsequent runs.

use crate::catalog::{CatalogClient, Playlist};
use crate::config::ServiceConfig;
use crate::credentials::CredentialCache;
use crate::error::{Error, Result, SourceError};
use crate::source::{EncodedAudio, Session, StreamSource};
use crate::tagger::CoverArt;
use crate::types::{AudioHandle, Event, PlaylistId, TrackDescriptor, TrackId};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Fallback polling interval when the gateway doesn't suggest one
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on token polls before the device flow is abandoned
const MAX_POLL_ATTEMPTS: u32 = 120;

/// Persisted credential blob (opaque to everything but this adapter)
#[derive(Debug, Serialize, Deserialize)]
struct CredentialBlob {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_url: String,
    #[serde(default)]
    interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    id: PlaylistId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracksPage {
    items: Vec<TrackDescriptor>,
    next: Option<String>,
}

/// HTTP implementation of the catalog and stream source seams.
pub struct HttpService {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialCache>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl HttpService {
    /// Create an adapter from configuration.
    ///
    /// Fails with [`Error::Config`] when `api_base_url` is not set.
    pub fn new(
        config: &ServiceConfig,
        credentials: Arc<CredentialCache>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Result<Self> {
        let base_url = config
            .api_base_url
            .as_deref()
            .ok_or_else(|| Error::Config {
                message: "the bundled HTTP adapter needs a gateway base URL".to_string(),
                key: Some("api_base_url".to_string()),
            })?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            credentials,
            event_tx,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// One cheap authenticated request to check a cached session.
    async fn validate_session(&self, session: &Session) -> Result<bool> {
        let response = self
            .client
            .get(self.url("me"))
            .bearer_auth(session.token())
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Ok(false),
            s => Err(Error::AuthenticationFailed(format!(
                "session validation returned {s}"
            ))),
        }
    }

    /// Interactive device authentication: surface the verification URL and
    /// user code, then poll the token endpoint until granted.
    async fn device_authenticate(&self) -> Result<Session> {
        let device: DeviceCodeResponse = self
            .client
            .post(self.url("auth/device"))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::AuthenticationFailed(format!("device code request failed: {e}")))?
            .json()
            .await?;

        tracing::info!(
            url = %device.verification_url,
            code = %device.user_code,
            "Visit the verification URL and enter the code to authenticate"
        );
        self.event_tx
            .send(Event::AuthenticationRequired {
                verification_url: device.verification_url.clone(),
                user_code: device.user_code.clone(),
            })
            .ok();

        let interval = device
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        for _ in 0..MAX_POLL_ATTEMPTS {
            let response = self
                .client
                .post(self.url("auth/token"))
                .json(&serde_json::json!({ "device_code": device.device_code }))
                .send()
                .await?;

            match response.status() {
                // Grant not yet approved by the user; keep polling. 202 counts
                // as a success status, so this arm must come before the grant arm.
                reqwest::StatusCode::ACCEPTED => {
                    tokio::time::sleep(interval).await;
                }
                s if s.is_success() => {
                    let token: TokenResponse = response.json().await?;
                    tracing::info!("Device authentication granted");
                    return Ok(Session::new(token.access_token));
                }
                s => {
                    return Err(Error::AuthenticationFailed(format!(
                        "token endpoint returned {s}"
                    )));
                }
            }
        }

        Err(Error::AuthenticationFailed(
            "device authentication was not approved in time".to_string(),
        ))
    }

    /// Authenticated JSON GET against the gateway.
    async fn api_get<T: for<'de> Deserialize<'de>>(
        &self,
        session: &Session,
        url: &str,
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(session.token())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Source(map_status(status, url)));
        }
        Ok(response.json().await?)
    }
}

/// Map an HTTP status to the track-level error taxonomy.
fn map_status(status: reqwest::StatusCode, context: &str) -> SourceError {
    match status.as_u16() {
        404 | 410 => SourceError::Unavailable(format!("{status} for {context}")),
        401 | 403 => SourceError::Unauthorized(format!("{status} for {context}")),
        408 | 429 => SourceError::Transient(format!("{status} for {context}")),
        s if s >= 500 => SourceError::Transient(format!("{status} for {context}")),
        _ => SourceError::Unavailable(format!("unexpected {status} for {context}")),
    }
}

/// Map a request-level reqwest failure (no response) to the taxonomy.
fn map_request_error(e: &reqwest::Error) -> SourceError {
    SourceError::Transient(e.to_string())
}

#[async_trait]
impl StreamSource for HttpService {
    async fn authenticate(&self) -> Result<Session> {
        // Serializes concurrent callers so the device flow runs at most once
        let _guard = self.credentials.lock().await;

        if let Some(blob) = self.credentials.read().await? {
            match serde_json::from_slice::<CredentialBlob>(&blob) {
                Ok(creds) => {
                    let session = Session::new(creds.access_token);
                    if self.validate_session(&session).await? {
                        tracing::debug!("Reusing cached credentials");
                        return Ok(session);
                    }
                    tracing::info!("Cached credentials rejected, re-authenticating");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable credential cache, re-authenticating");
                }
            }
        }

        let session = self.device_authenticate().await?;
        let blob = serde_json::to_vec(&CredentialBlob {
            access_token: session.token().to_string(),
        })?;
        self.credentials.write(&blob).await?;
        Ok(session)
    }

    async fn open_stream(
        &self,
        session: &Session,
        handle: &AudioHandle,
    ) -> std::result::Result<EncodedAudio, SourceError> {
        let url = self.url(&format!("audio/{handle}"));
        let response = self
            .client
            .get(&url)
            .bearer_auth(session.token())
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, &url));
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(tokio_util::io::StreamReader::new(stream)))
    }
}

#[async_trait]
impl CatalogClient for HttpService {
    async fn playlist(&self, session: &Session, id: &PlaylistId) -> Result<Playlist> {
        let meta: PlaylistResponse = self
            .api_get(session, &self.url(&format!("playlists/{id}")))
            .await?;

        let mut tracks = Vec::new();
        let mut next_url = Some(self.url(&format!("playlists/{id}/tracks")));
        while let Some(url) = next_url {
            let page: PlaylistTracksPage = self.api_get(session, &url).await?;
            tracks.extend(page.items);
            next_url = page.next;
        }

        tracing::debug!(playlist_id = %id, tracks = tracks.len(), "Fetched playlist");
        Ok(Playlist {
            id: meta.id,
            name: meta.name,
            tracks,
        })
    }

    async fn track(&self, session: &Session, id: &TrackId) -> Result<TrackDescriptor> {
        self.api_get(session, &self.url(&format!("tracks/{id}")))
            .await
    }
}

/// Fetch cover art bytes for a descriptor's art URL.
///
/// The MIME type is taken from the response's Content-Type header, defaulting
/// to "image/jpeg" when absent.
pub async fn fetch_cover_art(client: &reqwest::Client, url: &str) -> Result<CoverArt> {
    let response = client.get(url).send().await?.error_for_status()?;
    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let data = response.bytes().await?.to_vec();
    Ok(CoverArt { mime_type, data })
}
