//! # synchronise: one complete run
//!
//! Orchestrates a run from verified playlist to published videos:
//! 1. validate the settings (before any remote call);
//! 2. verify the target playlist belongs to the authenticated channel;
//! 3. collect candidates from subscriptions and extra channels;
//! 4. enrich included candidates with details, streams and captions as needed;
//! 5. read the playlist's current content when duplicates are not kept;
//! 6. run the filter pipeline;
//! 7. publish the survivors.
//!
//! The run is wrapped in a `sync` span carrying a fresh run id. Every remote call
//! goes through a [`ResilientApi`] built from the given [`RetryPolicy`].

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::batch::fetch_all_pages;
use crate::candidate::VideoCandidate;
use crate::collect;
use crate::config::Settings;
use crate::contract::{ContentApi, StreamProbe};
use crate::enrich;
use crate::error::SyncError;
use crate::filter::FilterPipeline;
use crate::publish::{self, PublishReport};
use crate::retry::{ResilientApi, RetryPolicy};
use crate::targets;

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct SynchroniseReport {
    pub run_id: Uuid,
    pub playlist_id: String,
    pub channels: usize,
    pub collected: usize,
    pub in_window: usize,
    pub survivors: usize,
    /// Rejections per stage, including `recency` and `metadata`.
    pub rejections: BTreeMap<&'static str, usize>,
    pub publish: PublishReport,
}

/// Ids currently in the playlist.
pub async fn playlist_content<A: ContentApi>(
    remote: &ResilientApi<'_, A>,
    playlist_id: &str,
) -> Result<HashSet<String>, SyncError> {
    let ids = fetch_all_pages(|token| remote.playlist_items_page(playlist_id, token)).await?;
    Ok(ids.into_iter().collect())
}

fn tally_rejections(candidates: &[VideoCandidate]) -> BTreeMap<&'static str, usize> {
    let mut tally = BTreeMap::new();
    for stage in candidates.iter().filter_map(VideoCandidate::rejected_by) {
        *tally.entry(stage).or_insert(0) += 1;
    }
    tally
}

pub async fn synchronise<A, P>(
    settings: &Settings,
    api: &A,
    probe: &P,
    retry: RetryPolicy,
    now: DateTime<Utc>,
) -> Result<SynchroniseReport, SyncError>
where
    A: ContentApi,
    P: StreamProbe,
{
    settings.validate()?;

    let run_id = Uuid::new_v4();
    let span = info_span!("sync", %run_id, playlist = %settings.upload_playlist_id);

    async move {
        info!(target: targets::RUN, "[SYNC] Starting run");
        let remote = ResilientApi::new(api, retry);

        collect::verify_target_playlist(&remote, &settings.upload_playlist_id).await?;

        let collection = collect::collect_candidates(&remote, settings, now).await?;
        let channels = collection.channels.len();
        let in_window = collection.in_window();
        let mut candidates = collection.candidates;

        if in_window > 0 {
            enrich::enrich(&mut candidates, &remote, probe, settings).await?;
        }

        let has_included = candidates.iter().any(VideoCandidate::is_included);
        let existing = if !settings.keep_duplicates && has_included {
            Some(playlist_content(&remote, &settings.upload_playlist_id).await?)
        } else {
            None
        };

        let pipeline = FilterPipeline::from_settings(settings, existing);
        let filtered = pipeline.apply(&mut candidates);
        info!(target: targets::RUN, stages = ?pipeline.names(), rejected = ?filtered, "[SYNC] Filters applied");

        let survivors: Vec<&VideoCandidate> =
            candidates.iter().filter(|c| c.is_included()).collect();
        let published =
            publish::publish(&remote, &settings.upload_playlist_id, &survivors).await?;

        let report = SynchroniseReport {
            run_id,
            playlist_id: settings.upload_playlist_id.clone(),
            channels,
            collected: candidates.len(),
            in_window,
            survivors: survivors.len(),
            rejections: tally_rejections(&candidates),
            publish: published,
        };
        info!(
            target: targets::RUN,
            collected = report.collected,
            survivors = report.survivors,
            added = report.publish.added.len(),
            "[SYNC] Run complete"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}
