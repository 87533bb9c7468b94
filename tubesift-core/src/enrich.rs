//! # enrich: attach video metadata to the collected candidates
//!
//! Details are fetched in batches of fifty and matched back to candidates by video
//! id, never by response position. A candidate the details endpoint says nothing
//! about (deleted, private) is rejected here under the `metadata` stage.
//!
//! Two optional lookups follow, each only when a stage needs it:
//! - stream probes (resolutions, framerates), one request per video with bounded
//!   concurrency;
//! - caption tracks, one request per video.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use tracing::{debug, info};

use crate::batch::fetch_batched;
use crate::candidate::{ratio, LiveStatus, VideoCandidate};
use crate::config::Settings;
use crate::contract::{ContentApi, StreamInfo, StreamProbe, VideoDetails};
use crate::error::SyncError;
use crate::retry::ResilientApi;
use crate::targets;
use crate::text::TitleNormalisation;

/// Upper bound (inclusive) on the duration of a short, in seconds.
pub const SHORT_MAX_SECONDS: f64 = 65.0;

/// Stream probes in flight at once.
pub const PROBE_CONCURRENCY: usize = 4;

pub const METADATA_STAGE: &str = "metadata";

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
        )
        .expect("duration pattern is valid")
    })
}

/// Decodes an ISO-8601 duration such as `PT1H2M3S` or `P1DT5M` into seconds.
pub fn parse_iso8601_duration(raw: &str) -> Option<f64> {
    let captures = duration_pattern().captures(raw.trim())?;
    // A bare "P" or "PT" carries no value.
    if captures.iter().skip(1).all(|group| group.is_none()) {
        return None;
    }

    let units = [7.0 * 86_400.0, 86_400.0, 3_600.0, 60.0, 1.0];
    let mut total = 0.0;
    for (index, unit) in units.iter().enumerate() {
        if let Some(value) = captures.get(index + 1) {
            total += value.as_str().parse::<f64>().ok()? * unit;
        }
    }
    Some(total)
}

/// Audio language, else metadata language, else `unknown`, without the region.
pub fn primary_language(details: &VideoDetails) -> String {
    details
        .default_audio_language
        .as_deref()
        .or(details.default_language.as_deref())
        .and_then(|lang| lang.split('-').next())
        .filter(|lang| !lang.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn apply_details(
    candidate: &mut VideoCandidate,
    details: VideoDetails,
    normalisation: &TitleNormalisation,
) {
    candidate.title = normalisation.apply(&details.title);
    candidate.language = primary_language(&details);
    candidate.duration = details.duration.as_deref().and_then(parse_iso8601_duration);
    candidate.is_short = candidate
        .duration
        .map_or(false, |seconds| seconds <= SHORT_MAX_SECONDS);
    candidate.original_title = details.title;
    candidate.description = details.description;
    candidate.tags = details.tags;
    candidate.definition = details.definition.to_lowercase();
    candidate.dimension = details.dimension.to_lowercase();
    candidate.projection = details.projection.to_lowercase();
    candidate.live_status = LiveStatus::from_wire(&details.live_broadcast_content);
    candidate.views = details.view_count.unwrap_or(0);
    candidate.likes = details.like_count.unwrap_or(0);
    candidate.comments = details.comment_count.unwrap_or(0);
    candidate.likes_to_views = ratio(candidate.likes, candidate.views);
    candidate.comments_to_views = ratio(candidate.comments, candidate.views);
    candidate.made_for_kids = details.made_for_kids;
    candidate.has_paid_promotion = details.has_paid_product_placement;
}

fn included_ids(candidates: &[VideoCandidate]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| c.is_included())
        .map(|c| c.id.clone())
        .collect()
}

/// Fetches and applies details for every included candidate.
pub async fn enrich_details<A: ContentApi>(
    candidates: &mut [VideoCandidate],
    remote: &ResilientApi<'_, A>,
    normalisation: &TitleNormalisation,
) -> Result<usize, SyncError> {
    let ids = included_ids(candidates);
    let mut details: HashMap<String, VideoDetails> = fetch_batched(&ids, |batch| async move {
        let items = remote.video_details(&batch).await?;
        Ok::<_, SyncError>(items.into_iter().map(|d| (d.id.clone(), d)).collect::<Vec<_>>())
    })
    .await?
    .into_iter()
    .collect();

    let mut missing = 0;
    for candidate in candidates.iter_mut().filter(|c| c.is_included()) {
        match details.remove(&candidate.id) {
            Some(found) => apply_details(candidate, found, normalisation),
            None => {
                debug!(video_id = %candidate.id, "No details returned for video");
                candidate.reject(METADATA_STAGE);
                missing += 1;
            }
        }
    }
    Ok(missing)
}

/// Probes available streams for every included candidate.
pub async fn enrich_streams<A: ContentApi, P: StreamProbe>(
    candidates: &mut [VideoCandidate],
    remote: &ResilientApi<'_, A>,
    probe: &P,
    settings: &Settings,
) -> Result<(), SyncError> {
    let ids = included_ids(candidates);
    let mut probed: HashMap<String, StreamInfo> = stream::iter(ids)
        .map(|id| async move {
            let info = remote.probe_streams(probe, &id).await?;
            Ok::<_, SyncError>((id, info))
        })
        .buffered(PROBE_CONCURRENCY)
        .try_collect()
        .await?;

    for candidate in candidates.iter_mut().filter(|c| c.is_included()) {
        let info = probed.remove(&candidate.id).unwrap_or_default();
        if settings.lowest_resolution.is_some() {
            candidate.resolutions = Some(info.resolutions);
        }
        if settings.lowest_framerate.is_some() {
            candidate.framerates = Some(info.framerates);
        }
    }
    Ok(())
}

/// Fetches caption tracks for every included candidate, keyed by track id.
pub async fn enrich_captions<A: ContentApi>(
    candidates: &mut [VideoCandidate],
    remote: &ResilientApi<'_, A>,
) -> Result<(), SyncError> {
    for candidate in candidates.iter_mut().filter(|c| c.is_included()) {
        let tracks = remote.captions(&candidate.id).await?;
        candidate.captions = Some(
            tracks
                .into_iter()
                .map(|track| (track.id.clone(), track))
                .collect::<BTreeMap<_, _>>(),
        );
    }
    Ok(())
}

/// Runs every lookup the settings call for.
pub async fn enrich<A: ContentApi, P: StreamProbe>(
    candidates: &mut [VideoCandidate],
    remote: &ResilientApi<'_, A>,
    probe: &P,
    settings: &Settings,
) -> Result<(), SyncError> {
    let normalisation = TitleNormalisation::from_settings(settings);
    let missing = enrich_details(candidates, remote, &normalisation).await?;

    if settings.needs_stream_probe() {
        enrich_streams(candidates, remote, probe, settings).await?;
    }
    if settings.require_captions {
        enrich_captions(candidates, remote).await?;
    }

    info!(
        target: targets::RUN,
        enriched = candidates.iter().filter(|c| c.is_included()).count(),
        missing,
        "Video details retrieved"
    );
    Ok(())
}
