//! # retry: the only path to the remote API
//!
//! [`RetryPolicy::run`] executes one remote operation with a fixed backoff
//! schedule (5, 10, 30, 180, 300 seconds, the delay following each failed
//! attempt). Quota exhaustion and refused credentials abort at once; everything
//! else is retried until the schedule runs out.
//!
//! [`ResilientApi`] wraps a [`ContentApi`] so that every call the pipeline makes
//! goes through the policy. It also owns the single special case of the wrapper:
//! a "not found" on the recent-uploads operation comes back as `Ok(None)` so the
//! collector can skip that channel.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::contract::{
    ApiError, CaptionTrack, ChannelRef, ContentApi, Page, PlaylistEntry, PlaylistInfo,
    StreamInfo, StreamProbe, VideoDetails,
};
use crate::error::SyncError;
use crate::targets;

pub const DEFAULT_RETRY_DELAYS_SECS: [u64; 5] = [5, 10, 30, 180, 300];

/// Remote operations, named for logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MyChannel,
    PlaylistInfo,
    Subscriptions,
    ChannelByHandle,
    UploadPlaylists,
    RecentUploads,
    PlaylistItems,
    VideoDetails,
    Captions,
    InsertPlaylistItem,
    ProbeStreams,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::MyChannel => "my_channel_id",
            Operation::PlaylistInfo => "playlist_info",
            Operation::Subscriptions => "subscriptions",
            Operation::ChannelByHandle => "channel_by_handle",
            Operation::UploadPlaylists => "upload_playlists",
            Operation::RecentUploads => "recent_uploads",
            Operation::PlaylistItems => "playlist_items",
            Operation::VideoDetails => "video_details",
            Operation::Captions => "captions",
            Operation::InsertPlaylistItem => "insert_playlist_item",
            Operation::ProbeStreams => "probe_streams",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-delay retry schedule. One attempt per delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        )
    }
}

impl RetryPolicy {
    /// An empty schedule still makes one attempt.
    pub fn new(delays: Vec<Duration>) -> Self {
        if delays.is_empty() {
            return Self {
                delays: vec![Duration::ZERO],
            };
        }
        Self { delays }
    }

    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub async fn run<T, F, Fut>(&self, operation: Operation, mut call: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.attempts();
        let mut last = ApiError::transport("no attempt was made");

        for (index, delay) in self.delays.iter().enumerate() {
            match call().await {
                Ok(value) => {
                    info!(target: targets::FUNC, operation = %operation, attempt = index + 1, "{operation} successfully executed");
                    return Ok(value);
                }
                Err(err) if err.is_quota_exceeded() => {
                    error!(operation = %operation, status = err.status, reason = %err.reason, "API quota reached");
                    return Err(SyncError::QuotaExceeded {
                        operation,
                        source: err,
                    });
                }
                Err(err) if err.is_unauthorized() => {
                    error!(operation = %operation, reason = %err.reason, "Credentials were refused");
                    return Err(SyncError::Credentials(format!("{operation} was refused: {err}")));
                }
                Err(err) => {
                    warn!(
                        operation = %operation,
                        status = err.status,
                        reason = %err.reason,
                        "During {operation}, error {} occurred: {}. Retrying in {}s (attempt {} of {attempts})",
                        err.status,
                        err.message,
                        delay.as_secs(),
                        index + 1,
                    );
                    last = err;
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        error!(operation = %operation, attempts, "Giving up after exhausting the retry schedule");
        Err(SyncError::RetriesExhausted {
            operation,
            attempts,
            last,
        })
    }
}

/// A [`ContentApi`] whose every method is run under a [`RetryPolicy`].
pub struct ResilientApi<'a, A> {
    api: &'a A,
    retry: RetryPolicy,
}

impl<'a, A: ContentApi> ResilientApi<'a, A> {
    pub fn new(api: &'a A, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn my_channel_id(&self) -> Result<String, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::MyChannel, || api.my_channel_id())
            .await
    }

    pub async fn playlist_info(&self, playlist_id: &str) -> Result<Option<PlaylistInfo>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::PlaylistInfo, || api.playlist_info(playlist_id))
            .await
    }

    pub async fn subscriptions_page(
        &self,
        page_token: Option<String>,
    ) -> Result<Page<ChannelRef>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::Subscriptions, move || {
                api.subscriptions_page(page_token.clone())
            })
            .await
    }

    pub async fn channel_by_handle(&self, handle: &str) -> Result<Option<ChannelRef>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::ChannelByHandle, || api.channel_by_handle(handle))
            .await
    }

    pub async fn upload_playlists(
        &self,
        channel_ids: &[String],
    ) -> Result<Vec<(String, String)>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::UploadPlaylists, || api.upload_playlists(channel_ids))
            .await
    }

    /// `Ok(None)` when the playlist does not exist (a channel without public uploads).
    pub async fn recent_uploads(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> Result<Option<Vec<PlaylistEntry>>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::RecentUploads, || async move {
                match api.recent_uploads(playlist_id, max_results).await {
                    Ok(entries) => Ok(Some(entries)),
                    Err(err) if err.is_not_found() => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .await
    }

    pub async fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::PlaylistItems, move || {
                api.playlist_items_page(playlist_id, page_token.clone())
            })
            .await
    }

    pub async fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoDetails>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::VideoDetails, || api.video_details(video_ids))
            .await
    }

    pub async fn captions(&self, video_id: &str) -> Result<Vec<CaptionTrack>, SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::Captions, || api.captions(video_id))
            .await
    }

    pub async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<(), SyncError> {
        let api = self.api;
        self.retry
            .run(Operation::InsertPlaylistItem, || {
                api.insert_playlist_item(playlist_id, video_id)
            })
            .await
    }

    pub async fn probe_streams<P: StreamProbe>(
        &self,
        probe: &P,
        video_id: &str,
    ) -> Result<StreamInfo, SyncError> {
        self.retry
            .run(Operation::ProbeStreams, || probe.probe(video_id))
            .await
    }
}
