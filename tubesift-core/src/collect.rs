//! # collect: from subscriptions to a set of recent candidates
//!
//! Steps, run one after the other:
//! 1. the target playlist must exist and belong to the authenticated channel;
//! 2. subscriptions are read page by page;
//! 3. extra channel handles are resolved (unknown handles are skipped);
//! 4. both sources are merged by display name, the later source winning;
//! 5. channel names go through the required/banned filter;
//! 6. uploads playlists are resolved in batches;
//! 7. the few most recent uploads of each channel become candidates;
//! 8. candidates outside the recency window are rejected.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::batch::{fetch_all_pages, fetch_batched};
use crate::candidate::VideoCandidate;
use crate::config::{RunFrequency, Settings};
use crate::contract::{ChannelRef, ContentApi, PlaylistInfo};
use crate::error::SyncError;
use crate::retry::ResilientApi;
use crate::targets;
use crate::text::WordFilter;

/// How many of a channel's newest uploads are considered.
pub const RECENT_UPLOADS_PER_CHANNEL: u32 = 5;

/// Rejection reason for candidates outside the recency window.
pub const RECENCY_STAGE: &str = "recency";

/// Result of the collection phase.
#[derive(Debug, Clone)]
pub struct Collection {
    pub channels: Vec<ChannelRef>,
    pub candidates: Vec<VideoCandidate>,
}

impl Collection {
    pub fn in_window(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_included()).count()
    }
}

pub async fn verify_target_playlist<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
    playlist_id: &str,
) -> Result<PlaylistInfo, SyncError> {
    let user = remote.my_channel_id().await?;
    let playlist = remote
        .playlist_info(playlist_id)
        .await?
        .ok_or_else(|| SyncError::PlaylistNotFound {
            playlist_id: playlist_id.to_string(),
        })?;

    if playlist.owner_channel_id != user {
        return Err(SyncError::PlaylistNotOwned {
            playlist_id: playlist_id.to_string(),
            owner: playlist.owner_channel_id,
            user,
        });
    }

    debug!(playlist = %playlist.id, title = %playlist.title, "Target playlist verified");
    Ok(playlist)
}

pub async fn subscribed_channels<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
) -> Result<Vec<ChannelRef>, SyncError> {
    fetch_all_pages(|token| remote.subscriptions_page(token)).await
}

/// Resolves handles one by one. Unknown handles are logged and left out.
pub async fn resolve_handles<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
    handles: &[String],
) -> Result<Vec<ChannelRef>, SyncError> {
    let mut channels = Vec::with_capacity(handles.len());
    for handle in handles {
        match remote.channel_by_handle(handle).await? {
            Some(channel) => channels.push(channel),
            None => warn!(handle = %handle, "Channel handle could not be resolved, skipping it"),
        }
    }
    Ok(channels)
}

/// Merges channel lists keyed by display name. A later entry replaces an earlier
/// one with the same name, in place.
pub fn merge_channels<I>(sources: I) -> Vec<ChannelRef>
where
    I: IntoIterator<Item = Vec<ChannelRef>>,
{
    let mut merged: Vec<ChannelRef> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for channel in sources.into_iter().flatten() {
        match position.get(&channel.name) {
            Some(&index) => merged[index] = channel,
            None => {
                position.insert(channel.name.clone(), merged.len());
                merged.push(channel);
            }
        }
    }
    merged
}

pub fn filter_channels(channels: Vec<ChannelRef>, filter: &WordFilter) -> Vec<ChannelRef> {
    channels
        .into_iter()
        .filter(|channel| {
            let keep = filter.accepts_text(&channel.name);
            if !keep {
                debug!(channel = %channel.name, "Channel excluded by name");
            }
            keep
        })
        .collect()
}

/// Pairs each channel with its uploads playlist, keeping channel order.
pub async fn upload_playlists<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
    channels: &[ChannelRef],
) -> Result<Vec<(ChannelRef, String)>, SyncError> {
    let ids: Vec<String> = channels.iter().map(|c| c.id.clone()).collect();
    let mut uploads: HashMap<String, String> = fetch_batched(&ids, |batch| async move {
        remote.upload_playlists(&batch).await
    })
    .await?
    .into_iter()
    .collect();

    let mut paired = Vec::with_capacity(channels.len());
    for channel in channels {
        match uploads.remove(&channel.id) {
            Some(playlist) => paired.push((channel.clone(), playlist)),
            None => warn!(channel = %channel.name, "No uploads playlist found for channel"),
        }
    }
    Ok(paired)
}

/// Turns the newest uploads of each playlist into candidates.
pub async fn recent_candidates<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
    uploads: &[(ChannelRef, String)],
) -> Result<Vec<VideoCandidate>, SyncError> {
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    for (channel, playlist_id) in uploads {
        let Some(entries) = remote
            .recent_uploads(playlist_id, RECENT_UPLOADS_PER_CHANNEL)
            .await?
        else {
            warn!(channel = %channel.name, "Channel has no public videos, skipping it");
            continue;
        };

        for entry in entries {
            if !seen.insert(entry.video_id.clone()) {
                debug!(video_id = %entry.video_id, "Video already collected");
                continue;
            }
            candidates.push(VideoCandidate::new(
                entry.video_id,
                channel.name.clone(),
                playlist_id.clone(),
                entry.published_at,
            ));
        }
    }
    Ok(candidates)
}

pub fn within_window(published_at: DateTime<Utc>, frequency: RunFrequency, now: DateTime<Utc>) -> bool {
    let start = now - Duration::days(frequency.days());
    start <= published_at && published_at <= now
}

/// Rejects candidates published outside `[now - window, now]`. Returns how many
/// were rejected.
pub fn apply_recency_window(
    candidates: &mut [VideoCandidate],
    frequency: RunFrequency,
    now: DateTime<Utc>,
) -> usize {
    let mut rejected = 0;
    for candidate in candidates.iter_mut().filter(|c| c.is_included()) {
        if !within_window(candidate.published_at, frequency, now) {
            candidate.reject(RECENCY_STAGE);
            rejected += 1;
        }
    }
    rejected
}

/// Runs the whole collection phase.
pub async fn collect_candidates<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<Collection, SyncError> {
    let subscribed = subscribed_channels(remote).await?;
    let extra = resolve_handles(remote, settings.extra_handles()).await?;
    info!(target: targets::RUN, subscriptions = subscribed.len(), extra = extra.len(), "Channels retrieved");

    let merged = merge_channels([subscribed, extra]);
    let name_filter = WordFilter::new(
        settings.required_in_channel_name.clone(),
        settings.banned_in_channel_name.clone(),
    );
    let channels = filter_channels(merged, &name_filter);

    let uploads = upload_playlists(remote, &channels).await?;
    let mut candidates = recent_candidates(remote, &uploads).await?;
    let too_old = apply_recency_window(&mut candidates, settings.run_frequency, now);

    info!(
        target: targets::RUN,
        channels = channels.len(),
        collected = candidates.len(),
        outside_window = too_old,
        "Recent uploads collected"
    );
    Ok(Collection {
        channels,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_window_is_inclusive_at_seven_days() {
        let now = Utc::now();
        let weekly = RunFrequency::Weekly;
        assert!(within_window(now - Duration::days(6), weekly, now));
        assert!(within_window(now - Duration::days(7), weekly, now));
        assert!(!within_window(now - Duration::days(8), weekly, now));
        assert!(!within_window(now + Duration::seconds(1), weekly, now));
    }

    #[test]
    fn later_source_wins_on_name_collision() {
        let merged = merge_channels([
            vec![ChannelRef::new("A", "sub-a"), ChannelRef::new("B", "sub-b")],
            vec![ChannelRef::new("A", "extra-a"), ChannelRef::new("C", "extra-c")],
        ]);
        assert_eq!(
            merged,
            vec![
                ChannelRef::new("A", "extra-a"),
                ChannelRef::new("B", "sub-b"),
                ChannelRef::new("C", "extra-c"),
            ]
        );
    }

    #[test]
    fn channel_names_use_substring_semantics() {
        let filter = WordFilter::new(Some(vec!["Tech".into()]), Some(vec!["Drama".into()]));
        let kept = filter_channels(
            vec![
                ChannelRef::new("TechLinked", "1"),
                ChannelRef::new("Tech Drama", "2"),
                ChannelRef::new("Cooking", "3"),
            ],
            &filter,
        );
        assert_eq!(kept, vec![ChannelRef::new("TechLinked", "1")]);
    }

    #[test]
    fn recency_rejections_are_counted() {
        let now = Utc::now();
        let mut candidates = vec![
            VideoCandidate::new("new", "C", "UU", now - Duration::hours(3)),
            VideoCandidate::new("old", "C", "UU", now - Duration::days(2)),
        ];
        assert_eq!(apply_recency_window(&mut candidates, RunFrequency::Daily, now), 1);
        assert!(candidates[0].is_included());
        assert_eq!(candidates[1].rejected_by(), Some(RECENCY_STAGE));
    }
}
