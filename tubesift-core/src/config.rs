//! # config: the validated run settings
//!
//! [`Settings`] holds every option of a run: the target playlist, the channel and
//! recency selection, and one optional predicate per filter stage. Absence of an
//! option means "no constraint". Serde rejects unknown keys and out-of-set enum
//! values; [`Settings::validate`] covers what serde cannot (language codes, the
//! duration pair, caption options when captions are required, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}

/// ISO 639-1 codes accepted in `preferred_languages`.
pub const LANGUAGE_CODES: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg", "bh",
    "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv", "cy", "da",
    "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi", "fj", "fo", "fr",
    "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr", "ht", "hu", "hy", "hz",
    "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja", "jv", "ka", "kg", "ki", "kj",
    "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw", "ky", "la", "lb", "lg", "li", "ln",
    "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "na", "nb",
    "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv", "ny", "oc", "oj", "om", "or", "os", "pa", "pi",
    "pl", "ps", "pt", "qu", "rm", "rn", "ro", "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk",
    "sl", "sm", "sn", "so", "sq", "sr", "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti",
    "tk", "tl", "tn", "to", "tr", "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo",
    "wa", "wo", "xh", "yi", "yo", "za", "zh", "zu",
];

const TRACK_KINDS: &[&str] = &["standard", "asr", "forced"];
const AUDIO_TRACK_TYPES: &[&str] = &["unknown", "primary", "commentary", "descriptive"];
const CAPTION_STATUSES: &[&str] = &["serving", "syncing", "failed"];

/// How far back the recency window reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    /// A custom window in whole days, always positive.
    Days(u32),
}

impl RunFrequency {
    pub fn days(self) -> i64 {
        match self {
            RunFrequency::Daily => 1,
            RunFrequency::Weekly => 7,
            RunFrequency::Monthly => 30,
            RunFrequency::Days(n) => i64::from(n),
        }
    }
}

impl fmt::Display for RunFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFrequency::Daily => f.write_str("daily"),
            RunFrequency::Weekly => f.write_str("weekly"),
            RunFrequency::Monthly => f.write_str("monthly"),
            RunFrequency::Days(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for RunFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "daily" => Ok(RunFrequency::Daily),
            "weekly" => Ok(RunFrequency::Weekly),
            "monthly" => Ok(RunFrequency::Monthly),
            other => match other.parse::<i64>() {
                Ok(days) => RunFrequency::try_from(days),
                Err(_) => Err(format!(
                    "expected daily, weekly, monthly or a positive number of days, got `{other}`"
                )),
            },
        }
    }
}

impl TryFrom<i64> for RunFrequency {
    type Error = String;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        u32::try_from(days)
            .ok()
            .filter(|d| *d > 0)
            .map(RunFrequency::Days)
            .ok_or_else(|| format!("the number of days must be positive, got {days}"))
    }
}

impl<'de> Deserialize<'de> for RunFrequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Days(i64),
            Named(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Days(days) => RunFrequency::try_from(days).map_err(serde::de::Error::custom),
            Raw::Named(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for RunFrequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RunFrequency::Days(n) => serializer.serialize_u32(*n),
            named => serializer.serialize_str(&named.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Definition {
    #[serde(rename = "HD", alias = "hd")]
    Hd,
    #[serde(rename = "SD", alias = "sd")]
    Sd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "2D", alias = "2d")]
    TwoD,
    #[serde(rename = "3D", alias = "3d")]
    ThreeD,
}

impl Dimension {
    /// Value as reported by the details endpoint.
    pub fn wire(self) -> &'static str {
        match self {
            Dimension::TwoD => "2d",
            Dimension::ThreeD => "3d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    #[serde(rename = "rectangular")]
    Rectangular,
    #[serde(rename = "360")]
    Spherical,
}

impl Projection {
    pub fn wire(self) -> &'static str {
        match self {
            Projection::Rectangular => "rectangular",
            Projection::Spherical => "360",
        }
    }
}

/// A vertical resolution from the fixed ladder, written as e.g. `"720p"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution(u32);

impl Resolution {
    pub const LADDER: [u32; 9] = [144, 240, 360, 480, 720, 1080, 1440, 2160, 4320];

    pub fn pixels(self) -> u32 {
        self.0
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .strip_suffix('p')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| Self::LADDER.contains(n))
            .map(Resolution)
            .ok_or_else(|| format!("`{trimmed}` is not one of 144p, 240p, 360p, 480p, 720p, 1080p, 1440p, 2160p, 4320p"))
    }
}

impl TryFrom<String> for Resolution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        format!("{}p", value.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    All,
    Videos,
    Credentials,
    Func,
    None,
}

/// Conditions a single caption track must meet, all at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptionOptions {
    #[serde(rename = "trackKind")]
    pub track_kind: Vec<String>,
    pub languages: Vec<String>,
    #[serde(rename = "audioTrackType")]
    pub audio_track_type: Vec<String>,
    pub status: Vec<String>,
    #[serde(rename = "isCC")]
    pub is_cc: bool,
    #[serde(rename = "isLarge")]
    pub is_large: bool,
    #[serde(rename = "isEasyReader")]
    pub is_easy_reader: bool,
    #[serde(rename = "isAutoSynced")]
    pub is_auto_synced: bool,
}

impl CaptionOptions {
    fn validate(&self) -> Result<(), ConfigError> {
        check_members("caption_options.trackKind", &self.track_kind, TRACK_KINDS)?;
        check_members(
            "caption_options.audioTrackType",
            &self.audio_track_type,
            AUDIO_TRACK_TYPES,
        )?;
        check_members("caption_options.status", &self.status, CAPTION_STATUSES)?;
        if self.languages.iter().any(|l| l.trim().is_empty()) {
            return Err(invalid(
                "caption_options.languages",
                "language codes must not be empty",
            ));
        }
        Ok(())
    }
}

fn check_members(key: &'static str, values: &[String], allowed: &[&str]) -> Result<(), ConfigError> {
    match values.iter().find(|v| !allowed.contains(&v.as_str())) {
        Some(bad) => Err(invalid(
            key,
            format!("`{bad}` is not one of {}", allowed.join(", ")),
        )),
        None => Ok(()),
    }
}

/// All options of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    #[serde(alias = "upload_playlist_ID")]
    pub upload_playlist_id: String,
    pub run_frequency: RunFrequency,

    pub required_in_channel_name: Option<Vec<String>>,
    pub banned_in_channel_name: Option<Vec<String>>,
    pub include_extra_channels: bool,
    pub extra_channel_handles: Option<Vec<String>>,

    pub required_in_title: Option<Vec<String>>,
    pub banned_in_title: Option<Vec<String>>,
    pub ignore_title_emojis: bool,
    pub ignore_title_punctuation: bool,
    pub ignore_title_case: bool,

    pub required_in_description: Option<Vec<String>>,
    pub banned_in_description: Option<Vec<String>>,
    pub required_tags: Option<Vec<String>>,
    pub banned_tags: Option<Vec<String>>,

    /// `[min, max]` in minutes, inclusive.
    pub allowed_durations: Option<Vec<u32>>,
    pub ignore_livestreams: bool,
    pub ignore_premieres: bool,
    pub keep_shorts: bool,
    /// Off when absent, so videos already in the target playlist are skipped
    /// unless this is set.
    pub keep_duplicates: bool,
    pub allow_paid_promotions: bool,
    pub only_made_for_kids: bool,

    pub preferred_languages: Option<Vec<String>>,
    pub lowest_definition: Option<Definition>,
    pub preferred_dimensions: Option<Vec<Dimension>>,
    pub preferred_projections: Option<Vec<Projection>>,
    pub lowest_resolution: Option<Resolution>,
    pub lowest_framerate: Option<u32>,

    pub require_captions: bool,
    pub caption_options: Option<CaptionOptions>,

    pub views_threshold: u64,
    pub likes_threshold: u64,
    pub comments_threshold: u64,
    pub likes_to_views_ratio: f64,
    pub comments_to_views_ratio: f64,

    pub verbosity: Vec<Verbosity>,
    pub fancy_mode: bool,
    pub override_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload_playlist_id: String::new(),
            run_frequency: RunFrequency::Daily,
            required_in_channel_name: None,
            banned_in_channel_name: None,
            include_extra_channels: false,
            extra_channel_handles: None,
            required_in_title: None,
            banned_in_title: None,
            ignore_title_emojis: false,
            ignore_title_punctuation: false,
            ignore_title_case: false,
            required_in_description: None,
            banned_in_description: None,
            required_tags: None,
            banned_tags: None,
            allowed_durations: None,
            ignore_livestreams: false,
            ignore_premieres: false,
            keep_shorts: true,
            keep_duplicates: false,
            allow_paid_promotions: true,
            only_made_for_kids: false,
            preferred_languages: None,
            lowest_definition: None,
            preferred_dimensions: None,
            preferred_projections: None,
            lowest_resolution: None,
            lowest_framerate: None,
            require_captions: false,
            caption_options: None,
            views_threshold: 0,
            likes_threshold: 0,
            comments_threshold: 0,
            likes_to_views_ratio: 0.0,
            comments_to_views_ratio: 0.0,
            verbosity: vec![Verbosity::All],
            fancy_mode: true,
            override_json: false,
        }
    }
}

impl Settings {
    /// Checks every rule the type system does not encode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_playlist_id.trim().is_empty() {
            return Err(ConfigError::Missing("upload_playlist_id"));
        }

        if let Some(durations) = &self.allowed_durations {
            match durations.as_slice() {
                [min, max] if min <= max => {}
                [min, max] => {
                    return Err(invalid(
                        "allowed_durations",
                        format!("minimum {min} is greater than maximum {max}"),
                    ))
                }
                other => {
                    return Err(invalid(
                        "allowed_durations",
                        format!("expected [min, max], got {} values", other.len()),
                    ))
                }
            }
        }

        if let Some(languages) = &self.preferred_languages {
            if let Some(bad) = languages
                .iter()
                .find(|l| !LANGUAGE_CODES.contains(&l.as_str()))
            {
                return Err(invalid(
                    "preferred_languages",
                    format!("`{bad}` is not an ISO 639-1 code"),
                ));
            }
        }

        if self.lowest_framerate == Some(0) {
            return Err(invalid("lowest_framerate", "must be a positive number"));
        }

        if self.require_captions {
            match &self.caption_options {
                Some(options) => options.validate()?,
                None => {
                    return Err(invalid(
                        "caption_options",
                        "required when `require_captions` is true",
                    ))
                }
            }
        }

        if self.include_extra_channels && self.extra_channel_handles.is_none() {
            return Err(invalid(
                "extra_channel_handles",
                "required when `include_extra_channels` is true",
            ));
        }

        for (key, ratio) in [
            ("likes_to_views_ratio", self.likes_to_views_ratio),
            ("comments_to_views_ratio", self.comments_to_views_ratio),
        ] {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(invalid(key, format!("must be a non-negative number, got {ratio}")));
            }
        }

        if self.verbosity.is_empty() {
            return Err(invalid("verbosity", "at least one category is required"));
        }

        Ok(())
    }

    /// Allowed duration range in seconds.
    pub fn duration_bounds(&self) -> Option<(f64, f64)> {
        match self.allowed_durations.as_deref() {
            Some([min, max]) => Some((f64::from(*min) * 60.0, f64::from(*max) * 60.0)),
            _ => None,
        }
    }

    pub fn extra_handles(&self) -> &[String] {
        if !self.include_extra_channels {
            return &[];
        }
        self.extra_channel_handles.as_deref().unwrap_or(&[])
    }

    /// Whether any stage needs the per-video stream probe.
    pub fn needs_stream_probe(&self) -> bool {
        self.lowest_resolution.is_some() || self.lowest_framerate.is_some()
    }

    pub fn trace_loaded(&self) {
        info!(
            playlist = %self.upload_playlist_id,
            frequency = %self.run_frequency,
            extra_channels = self.extra_handles().len(),
            "Settings loaded"
        );
        debug!(settings = ?self, "Full settings");
    }
}
