/// `load_config` module: reads the settings file and layers command-line overrides on top.
///
/// # Responsibilities
/// - Parse the settings file into [`Settings`]: JSON by default, YAML for `.yaml`/`.yml`.
/// - Merge [`Overrides`] from the command line, but only when the file sets `override_json`.
/// - Validate the merged result before anything touches the network.
///
/// # Errors
/// Every failure is reported as [`SyncError::Config`] wrapped in `anyhow`, so the binary
/// can map it to the configuration exit code.
use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::{error, info};

use tubesift_core::config::{
    CaptionOptions, Definition, Dimension, Projection, Resolution, RunFrequency, Settings, Verbosity,
};
use tubesift_core::error::SyncError;

fn config_error(message: String) -> anyhow::Error {
    anyhow::Error::new(SyncError::Config(message))
}

fn parse_caption_options(raw: &str) -> Result<CaptionOptions, String> {
    serde_json::from_str(raw).map_err(|e| format!("caption options must be a JSON object: {e}"))
}

fn parse_definition(raw: &str) -> Result<Definition, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("`{raw}` is not HD or SD"))
}

fn parse_dimension(raw: &str) -> Result<Dimension, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("`{raw}` is not 2D or 3D"))
}

fn parse_projection(raw: &str) -> Result<Projection, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("`{raw}` is not rectangular or 360"))
}

fn parse_verbosity(raw: &str) -> Result<Verbosity, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("`{raw}` is not one of all, videos, credentials, func, none"))
}

/// Command-line replacements for individual settings. Boolean flags take an
/// explicit value (`--keep-shorts false`).
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    #[clap(long)]
    pub upload_playlist_id: Option<String>,
    #[clap(long)]
    pub run_frequency: Option<RunFrequency>,

    #[clap(long, num_args = 1..)]
    pub required_in_channel_name: Option<Vec<String>>,
    #[clap(long, num_args = 1..)]
    pub banned_in_channel_name: Option<Vec<String>>,
    #[clap(long)]
    pub include_extra_channels: Option<bool>,
    #[clap(long, num_args = 1..)]
    pub extra_channel_handles: Option<Vec<String>>,

    #[clap(long, num_args = 1..)]
    pub required_in_title: Option<Vec<String>>,
    #[clap(long, num_args = 1..)]
    pub banned_in_title: Option<Vec<String>>,
    #[clap(long)]
    pub ignore_title_emojis: Option<bool>,
    #[clap(long)]
    pub ignore_title_punctuation: Option<bool>,
    #[clap(long)]
    pub ignore_title_case: Option<bool>,

    #[clap(long, num_args = 1..)]
    pub required_in_description: Option<Vec<String>>,
    #[clap(long, num_args = 1..)]
    pub banned_in_description: Option<Vec<String>>,
    #[clap(long, num_args = 1..)]
    pub required_tags: Option<Vec<String>>,
    #[clap(long, num_args = 1..)]
    pub banned_tags: Option<Vec<String>>,

    /// Minimum and maximum duration in minutes
    #[clap(long, num_args = 2)]
    pub allowed_durations: Option<Vec<u32>>,
    #[clap(long)]
    pub ignore_livestreams: Option<bool>,
    #[clap(long)]
    pub ignore_premieres: Option<bool>,
    #[clap(long)]
    pub keep_shorts: Option<bool>,
    #[clap(long)]
    pub keep_duplicates: Option<bool>,
    #[clap(long)]
    pub allow_paid_promotions: Option<bool>,
    #[clap(long)]
    pub only_made_for_kids: Option<bool>,

    #[clap(long, num_args = 1..)]
    pub preferred_languages: Option<Vec<String>>,
    #[clap(long, value_parser = parse_definition)]
    pub lowest_definition: Option<Definition>,
    #[clap(long, num_args = 1.., value_parser = parse_dimension)]
    pub preferred_dimensions: Option<Vec<Dimension>>,
    #[clap(long, num_args = 1.., value_parser = parse_projection)]
    pub preferred_projections: Option<Vec<Projection>>,
    #[clap(long)]
    pub lowest_resolution: Option<Resolution>,
    #[clap(long)]
    pub lowest_framerate: Option<u32>,

    #[clap(long)]
    pub require_captions: Option<bool>,
    /// JSON object, e.g. '{"trackKind": ["standard"], ...}'
    #[clap(long, value_parser = parse_caption_options)]
    pub caption_options: Option<CaptionOptions>,

    #[clap(long)]
    pub views_threshold: Option<u64>,
    #[clap(long)]
    pub likes_threshold: Option<u64>,
    #[clap(long)]
    pub comments_threshold: Option<u64>,
    #[clap(long)]
    pub likes_to_views_ratio: Option<f64>,
    #[clap(long)]
    pub comments_to_views_ratio: Option<f64>,

    #[clap(long, num_args = 1.., value_parser = parse_verbosity)]
    pub verbosity: Option<Vec<Verbosity>>,
    #[clap(long)]
    pub fancy_mode: Option<bool>,
}

macro_rules! replace {
    ($settings:ident, $overrides:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$overrides.$field {
                $settings.$field = value.clone();
            }
        )+
    };
}

macro_rules! replace_optional {
    ($settings:ident, $overrides:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$overrides.$field {
                $settings.$field = Some(value.clone());
            }
        )+
    };
}

impl Overrides {
    pub fn apply(&self, settings: &mut Settings) {
        replace!(
            settings,
            self,
            upload_playlist_id,
            run_frequency,
            include_extra_channels,
            ignore_title_emojis,
            ignore_title_punctuation,
            ignore_title_case,
            ignore_livestreams,
            ignore_premieres,
            keep_shorts,
            keep_duplicates,
            allow_paid_promotions,
            only_made_for_kids,
            require_captions,
            views_threshold,
            likes_threshold,
            comments_threshold,
            likes_to_views_ratio,
            comments_to_views_ratio,
            verbosity,
            fancy_mode,
        );
        replace_optional!(
            settings,
            self,
            required_in_channel_name,
            banned_in_channel_name,
            extra_channel_handles,
            required_in_title,
            banned_in_title,
            required_in_description,
            banned_in_description,
            required_tags,
            banned_tags,
            allowed_durations,
            preferred_languages,
            lowest_definition,
            preferred_dimensions,
            preferred_projections,
            lowest_resolution,
            lowest_framerate,
            caption_options,
        );
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Reads and parses the settings file without validating it.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(config_error(format!(
                "failed to read config file {}: {e}",
                path_ref.display()
            )));
        }
    };

    let parsed = if is_yaml(path_ref) {
        serde_yaml::from_str::<Settings>(&content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str::<Settings>(&content).map_err(|e| e.to_string())
    };

    match parsed {
        Ok(settings) => {
            info!(config_path = ?path_ref, "Parsed config successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = %e, config_path = ?path_ref, "Failed to parse config");
            Err(config_error(format!(
                "failed to parse config file {}: {e}",
                path_ref.display()
            )))
        }
    }
}

/// Loads, merges overrides when allowed, and validates.
pub fn load_settings<P: AsRef<Path>>(path: P, overrides: &Overrides) -> Result<Settings> {
    let mut settings = load_config(path)?;

    if settings.override_json {
        overrides.apply(&mut settings);
        info!("Command-line overrides applied");
    }

    if let Err(e) = settings.validate() {
        error!(error = %e, "Settings failed validation");
        return Err(anyhow::Error::new(SyncError::from(e)));
    }
    settings.trace_loaded();
    Ok(settings)
}
