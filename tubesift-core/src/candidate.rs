use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::contract::CaptionTrack;

/// Broadcast state of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveStatus {
    Live,
    Upcoming,
    #[default]
    None,
}

impl LiveStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "live" => LiveStatus::Live,
            "upcoming" => LiveStatus::Upcoming,
            _ => LiveStatus::None,
        }
    }
}

/// A video under consideration for the current run.
///
/// Starts included. [`VideoCandidate::reject`] is the only way to change that, and
/// it never goes back.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCandidate {
    pub id: String,
    pub channel_name: String,
    pub source_playlist_id: String,
    pub published_at: DateTime<Utc>,
    /// Possibly normalised; compared against the title word lists.
    pub title: String,
    /// As published, for display.
    pub original_title: String,
    /// Seconds. `None` when the duration could not be decoded.
    pub duration: Option<f64>,
    pub is_short: bool,
    /// ISO 639-1 code or `unknown`.
    pub language: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub definition: String,
    pub dimension: String,
    pub projection: String,
    pub live_status: LiveStatus,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub likes_to_views: Option<f64>,
    pub comments_to_views: Option<f64>,
    pub has_paid_promotion: bool,
    pub made_for_kids: bool,
    pub resolutions: Option<BTreeSet<u32>>,
    pub framerates: Option<BTreeSet<u32>>,
    pub captions: Option<BTreeMap<String, CaptionTrack>>,
    rejected_by: Option<&'static str>,
}

impl VideoCandidate {
    pub fn new(
        id: impl Into<String>,
        channel_name: impl Into<String>,
        source_playlist_id: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_name: channel_name.into(),
            source_playlist_id: source_playlist_id.into(),
            published_at,
            title: String::new(),
            original_title: String::new(),
            duration: None,
            is_short: false,
            language: "unknown".to_string(),
            description: None,
            tags: None,
            definition: "sd".to_string(),
            dimension: "2d".to_string(),
            projection: "rectangular".to_string(),
            live_status: LiveStatus::None,
            views: 0,
            likes: 0,
            comments: 0,
            likes_to_views: None,
            comments_to_views: None,
            has_paid_promotion: false,
            made_for_kids: false,
            resolutions: None,
            framerates: None,
            captions: None,
            rejected_by: None,
        }
    }

    pub fn is_included(&self) -> bool {
        self.rejected_by.is_none()
    }

    /// Name of the first stage that rejected this candidate.
    pub fn rejected_by(&self) -> Option<&'static str> {
        self.rejected_by
    }

    /// Marks the candidate as rejected. A candidate keeps its first rejection.
    pub fn reject(&mut self, stage: &'static str) {
        if self.rejected_by.is_none() {
            self.rejected_by = Some(stage);
        }
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// `numerator / views`, undefined without views.
pub fn ratio(numerator: u64, views: u64) -> Option<f64> {
    if views == 0 {
        return None;
    }
    Some(numerator as f64 / views as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_sticky_and_keeps_first_stage() {
        let mut candidate = VideoCandidate::new("v1", "Channel", "UU1", Utc::now());
        assert!(candidate.is_included());
        candidate.reject("title");
        candidate.reject("views");
        assert!(!candidate.is_included());
        assert_eq!(candidate.rejected_by(), Some("title"));
    }

    #[test]
    fn ratio_needs_views() {
        assert_eq!(ratio(5, 0), None);
        assert_eq!(ratio(5, 10), Some(0.5));
    }
}
