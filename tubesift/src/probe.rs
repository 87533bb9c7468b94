//! Unauthenticated stream probe: reads the public watch page of a video and
//! extracts the resolutions and framerates listed in its player response.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use tubesift_core::contract::{ApiError, StreamInfo, StreamProbe};

pub const WATCH_URL: &str = "https://www.youtube.com/watch";

fn player_response_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"ytInitialPlayerResponse\s*=\s*").expect("player response marker is valid")
    })
}

fn quality_label_height(label: &str) -> Option<u32> {
    label.split('p').next().and_then(|digits| digits.parse().ok())
}

/// Pulls stream variants out of a watch page. A page without a readable player
/// response yields an empty [`StreamInfo`].
pub fn parse_stream_info(page: &str) -> StreamInfo {
    let mut info = StreamInfo::default();
    let Some(marker) = player_response_marker().find(page) else {
        return info;
    };

    // Only the first JSON value after the marker is read; the script text that
    // follows is ignored.
    let mut values = serde_json::Deserializer::from_str(&page[marker.end()..]).into_iter::<Value>();
    let Some(Ok(player)) = values.next() else {
        return info;
    };

    let streaming = &player["streamingData"];
    let formats = ["formats", "adaptiveFormats"]
        .iter()
        .filter_map(|key| streaming[*key].as_array())
        .flatten();

    for format in formats {
        let is_video = format["mimeType"]
            .as_str()
            .map_or(false, |mime| mime.starts_with("video/"));
        if !is_video {
            continue;
        }
        let height = format["qualityLabel"]
            .as_str()
            .and_then(quality_label_height)
            .or_else(|| format["height"].as_u64().and_then(|h| u32::try_from(h).ok()));
        if let Some(height) = height {
            info.resolutions.insert(height);
        }
        if let Some(fps) = format["fps"].as_u64().and_then(|f| u32::try_from(f).ok()) {
            info.framerates.insert(fps);
        }
    }
    info
}

pub struct WatchPageProbe {
    http: Client,
    watch_url: String,
}

impl Default for WatchPageProbe {
    fn default() -> Self {
        Self::with_watch_url(WATCH_URL)
    }
}

impl WatchPageProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watch_url(watch_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            watch_url: watch_url.into(),
        }
    }
}

#[async_trait]
impl StreamProbe for WatchPageProbe {
    async fn probe(&self, video_id: &str) -> Result<StreamInfo, ApiError> {
        let response = self
            .http
            .get(&self.watch_url)
            .query(&[("v", video_id)])
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ApiError::new(status, "watchPage", format!("watch page for {video_id} answered {status}")));
        }
        let page = response
            .text()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        let info = parse_stream_info(&page);
        if info.resolutions.is_empty() && info.framerates.is_empty() {
            warn!(video_id, "No stream information found on the watch page");
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_are_collected_from_player_response() {
        let page = r#"<script>var ytInitialPlayerResponse = {"streamingData":{
            "formats":[{"mimeType":"video/mp4; codecs=\"avc1\"","qualityLabel":"360p","fps":30}],
            "adaptiveFormats":[
                {"mimeType":"video/webm","qualityLabel":"1080p60","fps":60,"height":1080},
                {"mimeType":"video/webm","height":720,"fps":30},
                {"mimeType":"audio/webm","bitrate":128000}
            ]}};var meta = {};</script>"#;
        let info = parse_stream_info(page);
        assert_eq!(info.resolutions.into_iter().collect::<Vec<_>>(), vec![360, 720, 1080]);
        assert_eq!(info.framerates.into_iter().collect::<Vec<_>>(), vec![30, 60]);
    }

    #[test]
    fn page_without_player_response_is_empty() {
        assert_eq!(parse_stream_info("<html></html>"), StreamInfo::default());
        assert_eq!(
            parse_stream_info("ytInitialPlayerResponse = not json"),
            StreamInfo::default()
        );
    }
}
