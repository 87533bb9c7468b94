//! # contract: seams between the pipeline and the outside world
//!
//! This module defines the traits the pipeline talks through and the plain data
//! types that cross them:
//! - [`ContentApi`]: the video platform's list/insert endpoints (subscriptions,
//!   channels, playlists, playlist items, videos, captions).
//! - [`StreamProbe`]: an unauthenticated per-video lookup of available
//!   resolutions and framerates.
//! - [`AuthProvider`]: yields a bearer [`Credential`] and refreshes it.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, and the mocks are exported behind the
//!   `test-export-mocks` feature so integration tests in other crates can use them.
//!
//! ## Errors
//! - Remote failures are reported as [`ApiError`] (numeric status + reason). The
//!   retry layer in [`crate::retry`] is the only place that interprets them.

#![allow(unused)]

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::SyncError;
use crate::targets;

/// A channel by display name and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub name: String,
    pub id: String,
}

impl ChannelRef {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// One item of a playlist: which video, and when it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub video_id: String,
    pub published_at: DateTime<Utc>,
}

/// What the pipeline needs to know about the target playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: String,
    pub title: String,
    pub owner_channel_id: String,
    pub item_count: u64,
}

/// One page of a paginated list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Metadata of a single video as returned by the details endpoint.
///
/// Values are kept in their wire form (ISO-8601 duration string, lowercase enum
/// strings); decoding happens during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub default_audio_language: Option<String>,
    pub default_language: Option<String>,
    /// `live`, `upcoming` or `none`.
    pub live_broadcast_content: String,
    pub duration: Option<String>,
    /// `hd` or `sd`.
    pub definition: String,
    /// `2d` or `3d`.
    pub dimension: String,
    /// `rectangular` or `360`.
    pub projection: String,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub made_for_kids: bool,
    pub has_paid_product_placement: bool,
}

/// Metadata of one caption track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub id: String,
    pub track_kind: String,
    pub language: String,
    pub audio_track_type: String,
    pub status: String,
    pub is_cc: bool,
    pub is_large: bool,
    pub is_easy_reader: bool,
    pub is_auto_synced: bool,
}

/// Stream variants available for a video, in p-values and frames per second.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub resolutions: BTreeSet<u32>,
    pub framerates: BTreeSet<u32>,
}

/// A failed remote call: HTTP-like status, machine reason, human message.
///
/// Transport failures (no response at all) use status `0`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error {status} ({reason}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub reason: String,
    pub message: String,
}

const QUOTA_REASONS: [&str; 4] = [
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

impl ApiError {
    pub fn new(status: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, "transport", message)
    }

    /// Rejected or unrenewable credentials.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, "authError", message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Credential failures. Like quota exhaustion, these are never retried.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Quota or rate-limit exhaustion. These are never retried.
    pub fn is_quota_exceeded(&self) -> bool {
        if self.status != 403 {
            return false;
        }
        if QUOTA_REASONS.contains(&self.reason.as_str()) {
            return true;
        }
        let message = self.message.to_lowercase();
        ["request", "cannot", "exceeded", "quota"]
            .iter()
            .all(|word| message.contains(word))
    }
}

/// Remote content API used by every stage of the pipeline.
///
/// Batched methods accept at most [`crate::batch::MAX_BATCH_SIZE`] keys per call.
/// Implementations must not retry on their own; retries belong to
/// [`crate::retry::ResilientApi`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Channel id of the authenticated user.
    async fn my_channel_id(&self) -> Result<String, ApiError>;

    /// Title, owner and size of a playlist, or `None` when it does not exist.
    async fn playlist_info(&self, playlist_id: &str) -> Result<Option<PlaylistInfo>, ApiError>;

    /// One page of the authenticated user's subscriptions.
    async fn subscriptions_page(
        &self,
        page_token: Option<String>,
    ) -> Result<Page<ChannelRef>, ApiError>;

    /// Resolves a channel handle (e.g. `@somechannel`), or `None` when unknown.
    async fn channel_by_handle(&self, handle: &str) -> Result<Option<ChannelRef>, ApiError>;

    /// Uploads playlist ids as `(channel_id, uploads_playlist_id)` pairs.
    async fn upload_playlists(
        &self,
        channel_ids: &[String],
    ) -> Result<Vec<(String, String)>, ApiError>;

    /// The most recent items of a playlist, newest first.
    async fn recent_uploads(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<PlaylistEntry>, ApiError>;

    /// One page of the video ids in a playlist, including private and deleted
    /// entries.
    async fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>, ApiError>;

    /// Details (snippet, content details, statistics, status) of up to 50 videos.
    async fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoDetails>, ApiError>;

    /// Caption tracks of one video.
    async fn captions(&self, video_id: &str) -> Result<Vec<CaptionTrack>, ApiError>;

    /// Appends a video to a playlist.
    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str)
        -> Result<(), ApiError>;
}

/// Per-video stream lookup against an unauthenticated source.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StreamProbe: Send + Sync {
    async fn probe(&self, video_id: &str) -> Result<StreamInfo, ApiError>;
}

/// A bearer credential plus what is needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expiry| expiry <= now)
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().map_or(false, |token| !token.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AuthError(pub String);

/// Source of credentials. Caching and interactive consent are the implementor's
/// business; the pipeline only needs a valid handle.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn obtain(&self) -> Result<Credential, AuthError>;

    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;
}

/// Obtains a credential and refreshes it when it has expired.
pub async fn ensure_valid_credential<P>(provider: &P, now: DateTime<Utc>) -> Result<Credential, SyncError>
where
    P: AuthProvider + ?Sized,
{
    let credential = provider
        .obtain()
        .await
        .map_err(|e| SyncError::Credentials(e.to_string()))?;
    if credential.is_valid(now) {
        info!(target: targets::CREDENTIALS, "Credentials loaded");
        return Ok(credential);
    }
    if !credential.can_refresh() {
        return Err(SyncError::Credentials(
            "the cached access token has expired and cannot be refreshed".to_string(),
        ));
    }

    info!(target: targets::CREDENTIALS, "Refreshing access token...");
    let refreshed = provider
        .refresh(&credential)
        .await
        .map_err(|e| SyncError::Credentials(e.to_string()))?;
    if !refreshed.is_valid(now) {
        return Err(SyncError::Credentials(
            "the refreshed access token is already expired".to_string(),
        ));
    }
    info!(target: targets::CREDENTIALS, "Access token refreshed");
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn quota_errors_are_recognised_by_reason_or_message() {
        assert!(ApiError::new(403, "quotaExceeded", "").is_quota_exceeded());
        assert!(ApiError::new(
            403,
            "forbidden",
            "The request cannot be completed because you have exceeded your quota."
        )
        .is_quota_exceeded());
        assert!(!ApiError::new(403, "forbidden", "Access denied").is_quota_exceeded());
        assert!(!ApiError::new(500, "quotaExceeded", "").is_quota_exceeded());
    }

    #[test]
    fn unauthorized_is_its_own_class() {
        let err = ApiError::unauthorized("invalid_grant");
        assert!(err.is_unauthorized());
        assert!(!err.is_quota_exceeded());
        assert!(!ApiError::new(403, "forbidden", "no").is_unauthorized());
    }

    #[test]
    fn credential_expiry_is_inclusive() {
        let now = Utc::now();
        let credential = Credential {
            access_token: "token".into(),
            refresh_token: None,
            expires_at: Some(now),
        };
        assert!(credential.is_expired(now));
        assert!(!credential.is_valid(now));
        assert!(credential.is_valid(now - Duration::seconds(1)));
    }

    #[tokio::test]
    async fn expired_credential_is_refreshed() {
        let now = Utc::now();
        let mut provider = MockAuthProvider::new();
        provider.expect_obtain().return_once(move || {
            Ok(Credential {
                access_token: "old".into(),
                refresh_token: Some("refresh".into()),
                expires_at: Some(now - Duration::minutes(5)),
            })
        });
        provider.expect_refresh().times(1).returning(move |old| {
            Ok(Credential {
                access_token: "new".into(),
                refresh_token: old.refresh_token.clone(),
                expires_at: Some(now + Duration::hours(1)),
            })
        });

        let credential = ensure_valid_credential(&provider, now).await.unwrap();
        assert_eq!(credential.access_token, "new");
    }

    #[tokio::test]
    async fn expired_credential_without_refresh_token_fails() {
        let now = Utc::now();
        let mut provider = MockAuthProvider::new();
        provider.expect_obtain().return_once(move || {
            Ok(Credential {
                access_token: "old".into(),
                refresh_token: None,
                expires_at: Some(now - Duration::minutes(5)),
            })
        });
        provider.expect_refresh().never();

        let err = ensure_valid_credential(&provider, now).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
