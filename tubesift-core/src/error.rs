//! Run-level failures and how they surface to the user.

use thiserror::Error;

use crate::config::ConfigError;
use crate::contract::ApiError;
use crate::retry::Operation;

pub const QUOTA_USAGE_URL: &str = "https://console.cloud.google.com/iam-admin/quotas";
pub const API_DASHBOARD_URL: &str = "https://console.cloud.google.com/apis/dashboard";

/// Every condition that stops a run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not obtain valid credentials: {0}")]
    Credentials(String),

    #[error("the API quota has been reached during {operation}: {source}")]
    QuotaExceeded {
        operation: Operation,
        #[source]
        source: ApiError,
    },

    #[error("invalid playlist ID: playlist {playlist_id} does not exist")]
    PlaylistNotFound { playlist_id: String },

    #[error("invalid playlist ID: playlist {playlist_id} belongs to channel {owner}, not to you ({user})")]
    PlaylistNotOwned {
        playlist_id: String,
        owner: String,
        user: String,
    },

    #[error("{operation} could not be executed after {attempts} tries, last error: {last}")]
    RetriesExhausted {
        operation: Operation,
        attempts: usize,
        last: ApiError,
    },
}

impl SyncError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) => 2,
            SyncError::Credentials(_) => 3,
            SyncError::QuotaExceeded { .. } => 4,
            SyncError::PlaylistNotFound { .. } | SyncError::PlaylistNotOwned { .. } => 5,
            SyncError::RetriesExhausted { .. } => 6,
        }
    }

    /// What the user can do about it.
    pub fn remedy(&self) -> Option<String> {
        match self {
            SyncError::Config(_) => {
                Some("Check the settings file against the template and retry.".to_string())
            }
            SyncError::Credentials(_) => Some(
                "Delete the cached token file and run again to go through the consent flow."
                    .to_string(),
            ),
            SyncError::QuotaExceeded { .. } => Some(format!(
                "Please try again once the quota has been reset. Check your usage at:\nUsed quota: {QUOTA_USAGE_URL}\nCalls made: {API_DASHBOARD_URL}"
            )),
            SyncError::PlaylistNotFound { .. } | SyncError::PlaylistNotOwned { .. } => Some(
                "Set `upload_playlist_id` to a playlist owned by the authenticated channel."
                    .to_string(),
            ),
            SyncError::RetriesExhausted { .. } => Some(
                "Please check your internet connection and the API status, then retry later."
                    .to_string(),
            ),
        }
    }
}

impl From<ConfigError> for SyncError {
    fn from(e: ConfigError) -> Self {
        SyncError::Config(e.to_string())
    }
}
