///
/// This module implements the CLI interface for tubesift: command parsing, the async
/// `run` entrypoint, and the mapping of failures to exit codes.
///
/// All pipeline logic (collection, enrichment, filters, publishing) lives in the
/// [`tubesift-core`] crate. This module wires the concrete YouTube client, OAuth token
/// cache and stream probe into it.
///
/// ## Subcommands
/// - `sync`: run the pipeline once against the authenticated account.
/// - `check`: load and validate a settings file without contacting the API.
///
/// [`tubesift-core`]: ../../tubesift-core/
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use tubesift_core::contract::ensure_valid_credential;
use tubesift_core::error::SyncError;
use tubesift_core::retry::RetryPolicy;
use tubesift_core::synchronise::synchronise;

use crate::auth::TokenCache;
use crate::load_config::{load_settings, Overrides};
use crate::logging;
use crate::probe::WatchPageProbe;
use crate::youtube::YouTubeClient;

/// Exit code for failures that carry no [`SyncError`].
pub const GENERIC_FAILURE: i32 = 1;

/// CLI for tubesift: filter recent uploads from your subscriptions into a playlist.
#[derive(Parser)]
#[clap(
    name = "tubesift",
    version,
    about = "Collect recent uploads from your subscriptions, filter them and add the keepers to a playlist"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once using the given settings file
    Sync {
        /// Path to the settings file (JSON, or YAML by extension)
        #[clap(long, default_value = "user_params.json")]
        config: PathBuf,
        /// OAuth client secrets downloaded from the cloud console
        #[clap(long, default_value = "client_secrets.json")]
        client_secrets: PathBuf,
        /// Where the access and refresh tokens are cached
        #[clap(long, default_value = "token.json")]
        token_cache: PathBuf,
        #[clap(flatten)]
        overrides: Overrides,
    },
    /// Validate a settings file and exit
    Check {
        #[clap(long, default_value = "user_params.json")]
        config: PathBuf,
        #[clap(flatten)]
        overrides: Overrides,
    },
}

/// Exit code for an error returned by [`run`].
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<SyncError>()
        .map_or(GENERIC_FAILURE, SyncError::exit_code)
}

/// Async CLI entrypoint for `main` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Check { config, overrides } => {
            let settings = load_settings(&config, &overrides)?;
            println!(
                "Settings in {} are valid (target playlist {}).",
                config.display(),
                settings.upload_playlist_id
            );
            Ok(())
        }
        Commands::Sync {
            config,
            client_secrets,
            token_cache,
            overrides,
        } => {
            let settings = load_settings(&config, &overrides)?;
            logging::init(&settings.verbosity, settings.fancy_mode);
            tracing::info!(command = "sync", "Starting synchronisation process");

            let auth = TokenCache::new(client_secrets, token_cache);
            let credential = ensure_valid_credential(&auth, Utc::now()).await?;
            let api = YouTubeClient::new(auth, credential);
            let probe = WatchPageProbe::new();

            match synchronise(&settings, &api, &probe, RetryPolicy::default(), Utc::now()).await {
                Ok(report) => {
                    tracing::info!(command = "sync", ?report, "Synchronisation complete");
                    println!("{report:#?}");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(anyhow::Error::new(e)).context("synchronisation failed")
                }
            }
        }
    }
}
