use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::time::Instant;
use tubesift::youtube::YouTubeClient;
use tubesift_core::contract::{AuthError, Credential, MockAuthProvider};
use tubesift_core::error::SyncError;
use tubesift_core::retry::{ResilientApi, RetryPolicy};

fn expired_credential() -> Credential {
    Credential {
        access_token: "stale".into(),
        refresh_token: Some("refresh".into()),
        expires_at: Some(Utc::now() - Duration::minutes(1)),
    }
}

/// A refresh that fails mid-run is a credential failure, reported at once.
#[tokio::test(start_paused = true)]
async fn failed_refresh_stops_the_run_with_credentials_exit_code() {
    let mut auth = MockAuthProvider::new();
    auth.expect_refresh()
        .times(1)
        .returning(|_credential: &Credential| Err(AuthError("invalid_grant".into())));

    // Unroutable base URL: the request must never be sent.
    let client = YouTubeClient::with_base_url(auth, expired_credential(), "http://127.0.0.1:9");
    let remote = ResilientApi::new(&client, RetryPolicy::default());

    let started = Instant::now();
    let err = remote.my_channel_id().await.unwrap_err();

    assert!(matches!(err, SyncError::Credentials(_)), "got {err:?}");
    assert!(err.to_string().contains("invalid_grant"));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(started.elapsed(), StdDuration::ZERO);
}

/// A refreshed token is used for every later call without refreshing again.
#[tokio::test]
async fn refresh_happens_once_per_expiry() {
    let mut auth = MockAuthProvider::new();
    auth.expect_refresh().times(1).returning(|old: &Credential| {
        Ok(Credential {
            access_token: "fresh".into(),
            refresh_token: old.refresh_token.clone(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    });

    let client = YouTubeClient::with_base_url(auth, expired_credential(), "http://127.0.0.1:9");
    let policy = RetryPolicy::new(vec![StdDuration::ZERO]);
    let remote = ResilientApi::new(&client, policy);

    // Nothing listens on the discard port, so both calls fail in transport.
    for _ in 0..2 {
        let err = remote.my_channel_id().await.unwrap_err();
        assert!(matches!(err, SyncError::RetriesExhausted { .. }), "got {err:?}");
    }
}
