//! Appends the surviving candidates to the target playlist, all or nothing with
//! respect to the playlist size cap.

use tracing::{info, warn};

use crate::candidate::VideoCandidate;
use crate::contract::ContentApi;
use crate::error::SyncError;
use crate::retry::ResilientApi;
use crate::targets;

/// Hard limit on the number of items in a playlist.
pub const PLAYLIST_CAPACITY: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub video_id: String,
    pub channel_name: String,
    pub title: String,
}

impl From<&VideoCandidate> for PublishedVideo {
    fn from(candidate: &VideoCandidate) -> Self {
        Self {
            video_id: candidate.id.clone(),
            channel_name: candidate.channel_name.clone(),
            title: candidate.original_title.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub playlist_title: String,
    pub size_before: u64,
    pub added: Vec<PublishedVideo>,
    /// Survivors not added because the playlist would overflow.
    pub withheld: Vec<PublishedVideo>,
    /// Videos to remove from the playlist before the withheld ones fit.
    pub shortfall: usize,
}

pub fn exceeds_capacity(current: u64, incoming: usize) -> bool {
    current.saturating_add(incoming as u64) > PLAYLIST_CAPACITY
}

pub async fn publish<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
    playlist_id: &str,
    survivors: &[&VideoCandidate],
) -> Result<PublishReport, SyncError> {
    let playlist = remote
        .playlist_info(playlist_id)
        .await?
        .ok_or_else(|| SyncError::PlaylistNotFound {
            playlist_id: playlist_id.to_string(),
        })?;

    let mut report = PublishReport {
        playlist_title: playlist.title.clone(),
        size_before: playlist.item_count,
        ..PublishReport::default()
    };

    if survivors.is_empty() {
        info!(target: targets::VIDEOS, playlist = %playlist.title, "No new videos to add");
        return Ok(report);
    }

    if exceeds_capacity(playlist.item_count, survivors.len()) {
        report.withheld = survivors.iter().map(|c| PublishedVideo::from(*c)).collect();
        report.shortfall = survivors.len();
        for video in &report.withheld {
            warn!(
                target: targets::VIDEOS,
                channel = %video.channel_name,
                video_id = %video.video_id,
                "From {}, the video named: {} would have been added",
                video.channel_name,
                video.title
            );
        }
        warn!(
            target: targets::VIDEOS,
            playlist = %playlist.title,
            size = playlist.item_count,
            capacity = PLAYLIST_CAPACITY,
            "Playlist is full or would overflow: remove at least {} videos and add the ones listed above manually",
            report.shortfall
        );
        return Ok(report);
    }

    for candidate in survivors {
        remote.insert_playlist_item(playlist_id, &candidate.id).await?;
        info!(
            target: targets::VIDEOS,
            channel = %candidate.channel_name,
            video_id = %candidate.id,
            "From {}, the video named: {} has been added",
            candidate.channel_name,
            candidate.original_title
        );
        report.added.push(PublishedVideo::from(*candidate));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_inclusive_of_the_cap() {
        assert!(!exceeds_capacity(4990, 10));
        assert!(exceeds_capacity(4990, 11));
        assert!(exceeds_capacity(u64::MAX, 1));
    }
}
