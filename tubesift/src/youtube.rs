#![doc = "YouTube Data API v3 implementation of the core `ContentApi` seam."]
//
//! # YouTube client
//!
//! [`YouTubeClient`] speaks to `https://www.googleapis.com/youtube/v3` with
//! `reqwest`, authenticating every request with the bearer token of a
//! [`Credential`]. When the token expires mid-run it is refreshed through the
//! [`AuthProvider`] it was built with.
//!
//! - Every method maps exactly one endpoint call (one page, one batch).
//!   Retrying, batching and pagination are the core's job.
//! - Non-2xx responses become [`ApiError`]s carrying the HTTP status and the
//!   first `reason` of the API error body, which is what the core uses to tell
//!   quota exhaustion from transient failures.
//! - Response bodies are decoded into private wire structs and converted into the
//!   core's plain types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use tubesift_core::contract::{
    ApiError, AuthProvider, CaptionTrack, ChannelRef, ContentApi, Credential, Page,
    PlaylistEntry, PlaylistInfo, VideoDetails,
};
use tubesift_core::targets;

pub const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

pub struct YouTubeClient<P> {
    http: Client,
    base_url: String,
    auth: P,
    credential: Mutex<Credential>,
}

impl<P: AuthProvider> YouTubeClient<P> {
    pub fn new(auth: P, credential: Credential) -> Self {
        Self::with_base_url(auth, credential, API_BASE_URL)
    }

    pub fn with_base_url(auth: P, credential: Credential, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            credential: Mutex::new(credential),
        }
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        let mut credential = self.credential.lock().await;
        if credential.is_expired(Utc::now()) && credential.can_refresh() {
            info!(target: targets::CREDENTIALS, "Access token expired, refreshing it");
            let refreshed = self
                .auth
                .refresh(&credential)
                .await
                .map_err(|e| ApiError::unauthorized(e.to_string()))?;
            *credential = refreshed;
        }
        Ok(credential.access_token.clone())
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let token = self.access_token().await?;
        debug!(resource, "GET");
        let response = self
            .http
            .get(format!("{}/{resource}", self.base_url))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::transport(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport)?;
    if !(200..300).contains(&status) {
        return Err(parse_error(status, &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| ApiError::new(status, "invalidResponse", format!("could not decode response: {e}")))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Builds an [`ApiError`] from a non-2xx body, tolerating bodies that are not
/// the usual error envelope.
pub fn parse_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .errors
                .into_iter()
                .map(|detail| detail.reason)
                .find(|reason| !reason.is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            ApiError::new(status, reason, envelope.error.message)
        }
        Err(_) => ApiError::new(status, "unknown", body.chars().take(200).collect::<String>()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    id: String,
    snippet: PlaylistSnippet,
    #[serde(default)]
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    #[serde(default)]
    item_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionItem {
    snippet: SubscriptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionSnippet {
    title: String,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelUploads {
    id: String,
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    #[serde(default)]
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemEntry {
    content_details: EntryDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryDetails {
    video_id: String,
    #[serde(default)]
    video_published_at: Option<DateTime<Utc>>,
}

impl PlaylistItemEntry {
    /// Private and deleted videos carry no publication date and are skipped
    /// as uploads.
    fn into_entry(self) -> Option<PlaylistEntry> {
        let published_at = self.content_details.video_published_at?;
        Some(PlaylistEntry {
            video_id: self.content_details.video_id,
            published_at,
        })
    }

    fn into_video_id(self) -> String {
        self.content_details.video_id
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    content_details: VideoContentDetails,
    statistics: VideoStatistics,
    status: VideoStatus,
    paid_product_placement_details: PaidPlacement,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    description: Option<String>,
    tags: Option<Vec<String>>,
    default_audio_language: Option<String>,
    default_language: Option<String>,
    live_broadcast_content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VideoContentDetails {
    duration: Option<String>,
    dimension: String,
    definition: String,
    projection: String,
}

/// Counts are transmitted as decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VideoStatus {
    made_for_kids: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PaidPlacement {
    has_paid_product_placement: bool,
}

fn count(raw: Option<String>) -> Option<u64> {
    raw.and_then(|value| value.parse().ok())
}

impl From<VideoItem> for VideoDetails {
    fn from(item: VideoItem) -> Self {
        VideoDetails {
            id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            tags: item.snippet.tags,
            default_audio_language: item.snippet.default_audio_language,
            default_language: item.snippet.default_language,
            live_broadcast_content: item.snippet.live_broadcast_content,
            duration: item.content_details.duration,
            definition: item.content_details.definition,
            dimension: item.content_details.dimension,
            projection: item.content_details.projection,
            view_count: count(item.statistics.view_count),
            like_count: count(item.statistics.like_count),
            comment_count: count(item.statistics.comment_count),
            made_for_kids: item.status.made_for_kids,
            has_paid_product_placement: item.paid_product_placement_details.has_paid_product_placement,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    id: String,
    snippet: CaptionSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CaptionSnippet {
    track_kind: String,
    language: String,
    audio_track_type: String,
    status: String,
    #[serde(rename = "isCC")]
    is_cc: bool,
    is_large: bool,
    is_easy_reader: bool,
    is_auto_synced: bool,
}

impl From<CaptionItem> for CaptionTrack {
    fn from(item: CaptionItem) -> Self {
        CaptionTrack {
            id: item.id,
            track_kind: item.snippet.track_kind.to_lowercase(),
            language: item.snippet.language,
            audio_track_type: item.snippet.audio_track_type.to_lowercase(),
            status: item.snippet.status.to_lowercase(),
            is_cc: item.snippet.is_cc,
            is_large: item.snippet.is_large,
            is_easy_reader: item.snippet.is_easy_reader,
            is_auto_synced: item.snippet.is_auto_synced,
        }
    }
}

fn page_query(query: &mut Vec<(&'static str, String)>, page_token: Option<String>) {
    if let Some(token) = page_token {
        query.push(("pageToken", token));
    }
}

#[async_trait]
impl<P: AuthProvider> ContentApi for YouTubeClient<P> {
    async fn my_channel_id(&self) -> Result<String, ApiError> {
        let response: ListResponse<IdOnly> = self
            .get("channels", &[("part", "id".into()), ("mine", "true".into())])
            .await?;
        response
            .items
            .into_iter()
            .next()
            .map(|item| item.id)
            .ok_or_else(|| ApiError::new(404, "channelNotFound", "the authenticated account has no channel"))
    }

    async fn playlist_info(&self, playlist_id: &str) -> Result<Option<PlaylistInfo>, ApiError> {
        let response: ListResponse<PlaylistItem> = self
            .get(
                "playlists",
                &[
                    ("part", "snippet,contentDetails".into()),
                    ("id", playlist_id.to_string()),
                ],
            )
            .await?;
        Ok(response.items.into_iter().next().map(|item| PlaylistInfo {
            id: item.id,
            title: item.snippet.title,
            owner_channel_id: item.snippet.channel_id,
            item_count: item.content_details.map_or(0, |d| d.item_count),
        }))
    }

    async fn subscriptions_page(&self, page_token: Option<String>) -> Result<Page<ChannelRef>, ApiError> {
        let mut query = vec![
            ("part", "snippet".to_string()),
            ("mine", "true".to_string()),
            ("maxResults", "50".to_string()),
            ("order", "alphabetical".to_string()),
        ];
        page_query(&mut query, page_token);
        let response: ListResponse<SubscriptionItem> = self.get("subscriptions", &query).await?;
        Ok(Page {
            items: response
                .items
                .into_iter()
                .map(|item| ChannelRef::new(item.snippet.title, item.snippet.resource_id.channel_id))
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn channel_by_handle(&self, handle: &str) -> Result<Option<ChannelRef>, ApiError> {
        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[("part", "snippet".into()), ("forHandle", handle.to_string())],
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .next()
            .map(|item| ChannelRef::new(item.snippet.title, item.id)))
    }

    async fn upload_playlists(&self, channel_ids: &[String]) -> Result<Vec<(String, String)>, ApiError> {
        let response: ListResponse<ChannelUploads> = self
            .get(
                "channels",
                &[
                    ("part", "contentDetails".into()),
                    ("id", channel_ids.join(",")),
                    ("maxResults", "50".into()),
                ],
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let uploads = item.content_details.related_playlists.uploads?;
                Some((item.id, uploads))
            })
            .collect())
    }

    async fn recent_uploads(&self, playlist_id: &str, max_results: u32) -> Result<Vec<PlaylistEntry>, ApiError> {
        let response: ListResponse<PlaylistItemEntry> = self
            .get(
                "playlistItems",
                &[
                    ("part", "contentDetails".into()),
                    ("playlistId", playlist_id.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(PlaylistItemEntry::into_entry)
            .collect())
    }

    async fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<String>, ApiError> {
        let mut query = vec![
            ("part", "contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", "50".to_string()),
        ];
        page_query(&mut query, page_token);
        let response: ListResponse<PlaylistItemEntry> = self.get("playlistItems", &query).await?;
        Ok(Page {
            items: response
                .items
                .into_iter()
                .map(PlaylistItemEntry::into_video_id)
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoDetails>, ApiError> {
        let response: ListResponse<VideoItem> = self
            .get(
                "videos",
                &[
                    (
                        "part",
                        "snippet,contentDetails,statistics,status,paidProductPlacementDetails".into(),
                    ),
                    ("id", video_ids.join(",")),
                    ("maxResults", "50".into()),
                ],
            )
            .await?;
        Ok(response.items.into_iter().map(VideoDetails::from).collect())
    }

    async fn captions(&self, video_id: &str) -> Result<Vec<CaptionTrack>, ApiError> {
        let response: ListResponse<CaptionItem> = self
            .get(
                "captions",
                &[("part", "snippet".into()), ("videoId", video_id.to_string())],
            )
            .await?;
        Ok(response.items.into_iter().map(CaptionTrack::from).collect())
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<(), ApiError> {
        let token = self.access_token().await?;
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id }
            }
        });
        let response = self
            .http
            .post(format!("{}/playlistItems", self.base_url))
            .bearer_auth(token)
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let _: serde_json::Value = decode(response).await?;
        debug!(playlist_id, video_id, "Playlist item inserted");
        Ok(())
    }
}
