use chrono::Utc;
use tubesift_core::candidate::VideoCandidate;
use tubesift_core::contract::{MockContentApi, PlaylistInfo};
use tubesift_core::error::SyncError;
use tubesift_core::publish::publish;
use tubesift_core::retry::{ResilientApi, RetryPolicy};

fn playlist(item_count: u64) -> PlaylistInfo {
    PlaylistInfo {
        id: "PLtarget".into(),
        title: "Watch later-ish".into(),
        owner_channel_id: "UCme".into(),
        item_count,
    }
}

fn survivors(n: usize) -> Vec<VideoCandidate> {
    (0..n)
        .map(|i| {
            let mut c = VideoCandidate::new(format!("v{i:02}"), "Channel", "UU1", Utc::now());
            c.original_title = format!("Video {i}");
            c
        })
        .collect()
}

#[tokio::test]
async fn overflowing_playlist_adds_nothing() {
    let mut api = MockContentApi::new();
    api.expect_playlist_info()
        .times(1)
        .returning(|_id: &str| Ok(Some(playlist(4990))));
    api.expect_insert_playlist_item().never();

    let candidates = survivors(15);
    let refs: Vec<&VideoCandidate> = candidates.iter().collect();
    let remote = ResilientApi::new(&api, RetryPolicy::default());

    let report = publish(&remote, "PLtarget", &refs).await.unwrap();

    assert!(report.added.is_empty());
    assert_eq!(report.withheld.len(), 15);
    assert_eq!(report.shortfall, 15);
    assert_eq!(report.playlist_title, "Watch later-ish");
    assert_eq!(report.withheld[0].title, "Video 0");
}

#[tokio::test]
async fn filling_the_playlist_exactly_is_allowed() {
    let mut api = MockContentApi::new();
    api.expect_playlist_info()
        .returning(|_id: &str| Ok(Some(playlist(4985))));
    api.expect_insert_playlist_item()
        .times(15)
        .returning(|_playlist: &str, _video: &str| Ok(()));

    let candidates = survivors(15);
    let refs: Vec<&VideoCandidate> = candidates.iter().collect();
    let remote = ResilientApi::new(&api, RetryPolicy::default());

    let report = publish(&remote, "PLtarget", &refs).await.unwrap();

    assert_eq!(report.added.len(), 15);
    assert_eq!(report.shortfall, 0);
    let order: Vec<&str> = report.added.iter().map(|v| v.video_id.as_str()).collect();
    assert_eq!(order.first(), Some(&"v00"));
    assert_eq!(order.last(), Some(&"v14"));
}

#[tokio::test]
async fn no_survivors_is_not_an_error() {
    let mut api = MockContentApi::new();
    api.expect_playlist_info()
        .returning(|_id: &str| Ok(Some(playlist(12))));
    api.expect_insert_playlist_item().never();

    let remote = ResilientApi::new(&api, RetryPolicy::default());
    let report = publish(&remote, "PLtarget", &[]).await.unwrap();

    assert!(report.added.is_empty());
    assert_eq!(report.size_before, 12);
}

#[tokio::test]
async fn inserts_target_the_configured_playlist() {
    let mut api = MockContentApi::new();
    api.expect_playlist_info()
        .returning(|_id: &str| Ok(Some(playlist(0))));
    api.expect_insert_playlist_item()
        .withf(|target: &str, video: &str| target == "PLtarget" && video == "v00")
        .times(1)
        .returning(|_, _| Ok(()));

    let candidates = survivors(1);
    let refs: Vec<&VideoCandidate> = candidates.iter().collect();
    let remote = ResilientApi::new(&api, RetryPolicy::default());

    publish(&remote, "PLtarget", &refs).await.unwrap();
}

#[tokio::test]
async fn vanished_playlist_is_reported() {
    let mut api = MockContentApi::new();
    api.expect_playlist_info().returning(|_id: &str| Ok(None));

    let remote = ResilientApi::new(&api, RetryPolicy::default());
    let err = publish(&remote, "PLgone", &[]).await.unwrap_err();

    assert!(matches!(err, SyncError::PlaylistNotFound { ref playlist_id } if playlist_id == "PLgone"));
    assert_eq!(err.exit_code(), 5);
}
