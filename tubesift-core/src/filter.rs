//! # filter: the ordered predicate pipeline
//!
//! [`FilterPipeline::from_settings`] turns the settings into an immutable list of
//! [`Stage`]s, one per configured option; an absent option contributes no stage.
//! [`FilterPipeline::apply`] then folds each included candidate through the list
//! and rejects it at the first stage that does not keep it. Already rejected
//! candidates are skipped, so a rejection is never undone.
//!
//! Stage order:
//! duration, title, shorts, duplicates, paid promotion, made for kids, language,
//! definition, dimension, projection, resolution, framerate, description, tags,
//! captions, views, likes, comments, likes/views ratio, comments/views ratio.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::candidate::{LiveStatus, VideoCandidate};
use crate::config::{CaptionOptions, Definition, Settings};
use crate::contract::CaptionTrack;
use crate::text::{TitleNormalisation, WordFilter};

/// Rejections per stage name.
pub type RejectionTally = BTreeMap<&'static str, usize>;

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Duration {
        min_seconds: f64,
        max_seconds: f64,
        keep_live: bool,
        keep_premieres: bool,
    },
    Title(WordFilter),
    Shorts,
    Duplicates(HashSet<String>),
    PaidPromotion,
    MadeForKids,
    Language(HashSet<String>),
    Definition,
    Dimension(Vec<&'static str>),
    Projection(Vec<&'static str>),
    Resolution(u32),
    Framerate(u32),
    Description(WordFilter),
    Tags(WordFilter),
    Captions(CaptionOptions),
    Views(u64),
    Likes(u64),
    Comments(u64),
    LikesRatio(f64),
    CommentsRatio(f64),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Duration { .. } => "duration",
            Stage::Title(_) => "title",
            Stage::Shorts => "shorts",
            Stage::Duplicates(_) => "duplicates",
            Stage::PaidPromotion => "paid_promotion",
            Stage::MadeForKids => "made_for_kids",
            Stage::Language(_) => "language",
            Stage::Definition => "definition",
            Stage::Dimension(_) => "dimension",
            Stage::Projection(_) => "projection",
            Stage::Resolution(_) => "resolution",
            Stage::Framerate(_) => "framerate",
            Stage::Description(_) => "description",
            Stage::Tags(_) => "tags",
            Stage::Captions(_) => "captions",
            Stage::Views(_) => "views",
            Stage::Likes(_) => "likes",
            Stage::Comments(_) => "comments",
            Stage::LikesRatio(_) => "likes_to_views",
            Stage::CommentsRatio(_) => "comments_to_views",
        }
    }

    /// Whether `candidate` survives this stage.
    pub fn keeps(&self, candidate: &VideoCandidate) -> bool {
        match self {
            Stage::Duration {
                min_seconds,
                max_seconds,
                keep_live,
                keep_premieres,
            } => match candidate.live_status {
                LiveStatus::Live if *keep_live => true,
                LiveStatus::Upcoming if *keep_premieres => true,
                _ => candidate
                    .duration
                    .map_or(false, |d| *min_seconds <= d && d <= *max_seconds),
            },
            Stage::Title(filter) => filter.accepts_text(&candidate.title),
            Stage::Shorts => !candidate.is_short,
            Stage::Duplicates(existing) => !existing.contains(&candidate.id),
            Stage::PaidPromotion => !candidate.has_paid_promotion,
            Stage::MadeForKids => candidate.made_for_kids,
            Stage::Language(accepted) => accepted.contains(&candidate.language),
            Stage::Definition => candidate.definition == "hd",
            Stage::Dimension(accepted) => accepted.iter().any(|d| *d == candidate.dimension),
            Stage::Projection(accepted) => accepted.iter().any(|p| *p == candidate.projection),
            Stage::Resolution(floor) => best(&candidate.resolutions).map_or(false, |r| r >= *floor),
            Stage::Framerate(floor) => best(&candidate.framerates).map_or(false, |f| f >= *floor),
            Stage::Description(filter) => candidate
                .description
                .as_deref()
                .map_or(true, |text| filter.accepts_text(text)),
            Stage::Tags(filter) => candidate
                .tags
                .as_deref()
                .map_or(true, |tags| filter.accepts_members(tags)),
            Stage::Captions(options) => candidate
                .captions
                .as_ref()
                .map_or(false, |tracks| tracks.values().any(|t| caption_matches(options, t))),
            Stage::Views(threshold) => candidate.views >= *threshold,
            Stage::Likes(threshold) => candidate.likes >= *threshold,
            Stage::Comments(threshold) => candidate.comments >= *threshold,
            Stage::LikesRatio(threshold) => candidate.likes_to_views.map_or(false, |r| r >= *threshold),
            Stage::CommentsRatio(threshold) => {
                candidate.comments_to_views.map_or(false, |r| r >= *threshold)
            }
        }
    }
}

fn best(values: &Option<BTreeSet<u32>>) -> Option<u32> {
    values.as_ref().and_then(|set| set.iter().next_back().copied())
}

/// A track passes when all eight conditions hold at once.
pub fn caption_matches(options: &CaptionOptions, track: &CaptionTrack) -> bool {
    options.track_kind.contains(&track.track_kind)
        && options.languages.contains(&track.language)
        && options.audio_track_type.contains(&track.audio_track_type)
        && options.status.contains(&track.status)
        && track.is_cc == options.is_cc
        && track.is_large == options.is_large
        && track.is_easy_reader == options.is_easy_reader
        && track.is_auto_synced == options.is_auto_synced
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPipeline {
    stages: Vec<Stage>,
}

impl FilterPipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// `existing_playlist_ids` is the current content of the target playlist, used
    /// when duplicates are not kept.
    pub fn from_settings(settings: &Settings, existing_playlist_ids: Option<HashSet<String>>) -> Self {
        let mut stages = Vec::new();

        if let Some((min_seconds, max_seconds)) = settings.duration_bounds() {
            stages.push(Stage::Duration {
                min_seconds,
                max_seconds,
                keep_live: !settings.ignore_livestreams,
                keep_premieres: !settings.ignore_premieres,
            });
        }

        let normalisation = TitleNormalisation::from_settings(settings);
        let title = WordFilter::new(settings.required_in_title.clone(), settings.banned_in_title.clone())
            .normalised(&normalisation);
        if title.is_active() {
            stages.push(Stage::Title(title));
        }

        if !settings.keep_shorts {
            stages.push(Stage::Shorts);
        }
        if !settings.keep_duplicates {
            stages.push(Stage::Duplicates(existing_playlist_ids.unwrap_or_default()));
        }
        if !settings.allow_paid_promotions {
            stages.push(Stage::PaidPromotion);
        }
        if settings.only_made_for_kids {
            stages.push(Stage::MadeForKids);
        }

        if let Some(languages) = &settings.preferred_languages {
            let mut accepted: HashSet<String> = languages.iter().map(|l| l.to_lowercase()).collect();
            accepted.insert("unknown".to_string());
            stages.push(Stage::Language(accepted));
        }

        // An SD floor admits everything.
        if settings.lowest_definition == Some(Definition::Hd) {
            stages.push(Stage::Definition);
        }

        if let Some(dimensions) = &settings.preferred_dimensions {
            stages.push(Stage::Dimension(dimensions.iter().map(|d| d.wire()).collect()));
        }
        if let Some(projections) = &settings.preferred_projections {
            stages.push(Stage::Projection(projections.iter().map(|p| p.wire()).collect()));
        }
        if let Some(resolution) = settings.lowest_resolution {
            stages.push(Stage::Resolution(resolution.pixels()));
        }
        if let Some(framerate) = settings.lowest_framerate {
            stages.push(Stage::Framerate(framerate));
        }

        let description = WordFilter::new(
            settings.required_in_description.clone(),
            settings.banned_in_description.clone(),
        );
        if description.is_active() {
            stages.push(Stage::Description(description));
        }
        let tags = WordFilter::new(settings.required_tags.clone(), settings.banned_tags.clone());
        if tags.is_active() {
            stages.push(Stage::Tags(tags));
        }

        if settings.require_captions {
            if let Some(options) = &settings.caption_options {
                stages.push(Stage::Captions(options.clone()));
            }
        }

        if settings.views_threshold > 0 {
            stages.push(Stage::Views(settings.views_threshold));
        }
        if settings.likes_threshold > 0 {
            stages.push(Stage::Likes(settings.likes_threshold));
        }
        if settings.comments_threshold > 0 {
            stages.push(Stage::Comments(settings.comments_threshold));
        }
        if settings.likes_to_views_ratio > 0.0 {
            stages.push(Stage::LikesRatio(settings.likes_to_views_ratio));
        }
        if settings.comments_to_views_ratio > 0.0 {
            stages.push(Stage::CommentsRatio(settings.comments_to_views_ratio));
        }

        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// First stage that would reject `candidate`, if any.
    pub fn verdict(&self, candidate: &VideoCandidate) -> Option<&'static str> {
        self.stages
            .iter()
            .find(|stage| !stage.keeps(candidate))
            .map(Stage::name)
    }

    /// Rejects every included candidate that fails a stage.
    pub fn apply(&self, candidates: &mut [VideoCandidate]) -> RejectionTally {
        let mut tally = RejectionTally::new();
        for candidate in candidates.iter_mut().filter(|c| c.is_included()) {
            if let Some(stage) = self.verdict(candidate) {
                debug!(video_id = %candidate.id, stage, "Video filtered out");
                candidate.reject(stage);
                *tally.entry(stage).or_insert(0) += 1;
            }
        }
        tally
    }
}
