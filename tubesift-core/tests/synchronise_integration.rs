use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tubesift_core::contract::{
    ApiError, CaptionTrack, ChannelRef, MockContentApi, MockStreamProbe, Page, PlaylistEntry,
    PlaylistInfo, StreamInfo, VideoDetails,
};
use tubesift_core::config::{
    CaptionOptions, Definition, Projection, Resolution, RunFrequency, Settings,
};
use tubesift_core::error::SyncError;
use tubesift_core::retry::RetryPolicy;
use tubesift_core::synchronise::synchronise;

fn settings() -> Settings {
    Settings {
        upload_playlist_id: "PLtarget".into(),
        run_frequency: RunFrequency::Daily,
        ..Settings::default()
    }
}

fn owned_playlist(item_count: u64) -> Option<PlaylistInfo> {
    Some(PlaylistInfo {
        id: "PLtarget".into(),
        title: "Sifted".into(),
        owner_channel_id: "UCme".into(),
        item_count,
    })
}

fn details(id: &str, title: &str, duration: &str, views: u64) -> VideoDetails {
    VideoDetails {
        id: id.into(),
        title: title.into(),
        duration: Some(duration.into()),
        definition: "hd".into(),
        dimension: "2d".into(),
        projection: "rectangular".into(),
        live_broadcast_content: "none".into(),
        view_count: Some(views),
        ..VideoDetails::default()
    }
}

/// Two subscribed channels over two pages, one of them without uploads.
fn subscribed_world(now: DateTime<Utc>) -> MockContentApi {
    subscribed_world_with(now, |_| {})
}

/// Like `subscribed_world`, with a hook to alter the fetched video details.
fn subscribed_world_with(
    now: DateTime<Utc>,
    adjust: impl Fn(&mut VideoDetails) + Send + 'static,
) -> MockContentApi {
    let mut api = MockContentApi::new();
    api.expect_my_channel_id()
        .returning(|| Ok("UCme".to_string()));
    api.expect_playlist_info()
        .returning(|_id: &str| Ok(owned_playlist(10)));
    api.expect_subscriptions_page()
        .times(2)
        .returning(|token: Option<String>| match token.as_deref() {
            None => Ok(Page {
                items: vec![ChannelRef::new("Alpha", "UCa")],
                next_page_token: Some("page2".into()),
            }),
            Some(_) => Ok(Page::last(vec![ChannelRef::new("Beta", "UCb")])),
        });
    api.expect_upload_playlists()
        .times(1)
        .returning(|ids: &[String]| {
            Ok(ids
                .iter()
                .map(|id| (id.clone(), id.replacen("UC", "UU", 1)))
                .collect())
        });
    api.expect_recent_uploads()
        .times(2)
        .returning(move |playlist_id: &str, max: u32| {
            assert_eq!(max, 5);
            match playlist_id {
                "UUa" => Ok(vec![
                    PlaylistEntry {
                        video_id: "fresh".into(),
                        published_at: now - Duration::hours(2),
                    },
                    PlaylistEntry {
                        video_id: "short".into(),
                        published_at: now - Duration::hours(5),
                    },
                    PlaylistEntry {
                        video_id: "stale".into(),
                        published_at: now - Duration::days(3),
                    },
                ]),
                _ => Err(ApiError::new(404, "playlistNotFound", "no uploads")),
            }
        });
    api.expect_video_details()
        .times(1)
        .returning(move |ids: &[String]| {
            assert_eq!(ids, ["fresh".to_string(), "short".to_string()]);
            // Deliberately out of request order.
            let mut found = vec![
                details("short", "Quick tip", "PT40S", 5_000),
                details("fresh", "Deep dive", "PT12M", 1_200),
            ];
            found.iter_mut().for_each(&adjust);
            Ok(found)
        });
    api
}

#[tokio::test]
async fn test_synchronise_publishes_survivors() {
    let now = Utc::now();
    let mut api = subscribed_world(now);
    api.expect_playlist_items_page()
        .times(1)
        .returning(|_playlist: &str, _token: Option<String>| {
            Ok(Page::last(vec!["older".to_string()]))
        });
    api.expect_insert_playlist_item()
        .withf(|target: &str, video: &str| target == "PLtarget" && video == "fresh")
        .times(1)
        .returning(|_, _| Ok(()));

    let mut probe = MockStreamProbe::new();
    probe.expect_probe().never();

    let mut s = settings();
    s.keep_shorts = false;

    let report = synchronise(&s, &api, &probe, RetryPolicy::default(), now)
        .await
        .expect("Synchronise should succeed");

    assert_eq!(report.channels, 2);
    assert_eq!(report.collected, 3);
    assert_eq!(report.in_window, 2);
    assert_eq!(report.survivors, 1);
    assert_eq!(report.rejections.get("recency"), Some(&1));
    assert_eq!(report.rejections.get("shorts"), Some(&1));
    assert_eq!(report.publish.added.len(), 1);
    assert_eq!(report.publish.added[0].title, "Deep dive");
    assert_eq!(report.publish.added[0].channel_name, "Alpha");
}

#[tokio::test]
async fn test_synchronise_probes_streams_when_resolution_is_required() {
    let now = Utc::now();
    let mut api = subscribed_world(now);
    api.expect_insert_playlist_item()
        .times(1)
        .withf(|_target: &str, video: &str| video == "short")
        .returning(|_, _| Ok(()));

    let mut probe = MockStreamProbe::new();
    probe
        .expect_probe()
        .times(2)
        .returning(|id: &str| {
            let top = if id == "short" { 1080 } else { 480 };
            Ok(StreamInfo {
                resolutions: [360, top].into_iter().collect(),
                framerates: [30].into_iter().collect(),
            })
        });

    let mut s = settings();
    s.keep_duplicates = true;
    s.lowest_resolution = "720p".parse::<Resolution>().ok();

    let report = synchronise(&s, &api, &probe, RetryPolicy::default(), now)
        .await
        .unwrap();

    assert_eq!(report.survivors, 1);
    assert_eq!(report.rejections.get("resolution"), Some(&1));
}

#[tokio::test]
async fn test_synchronise_rejects_foreign_playlist() {
    let mut api = MockContentApi::new();
    api.expect_my_channel_id()
        .returning(|| Ok("UCme".to_string()));
    api.expect_playlist_info().returning(|_id: &str| {
        Ok(Some(PlaylistInfo {
            id: "PLtarget".into(),
            title: "Someone else's".into(),
            owner_channel_id: "UCother".into(),
            item_count: 3,
        }))
    });
    api.expect_subscriptions_page().never();
    let probe = MockStreamProbe::new();

    let err = synchronise(&settings(), &api, &probe, RetryPolicy::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PlaylistNotOwned { .. }));
    assert_eq!(err.exit_code(), 5);
}

#[tokio::test]
async fn test_synchronise_validates_before_any_remote_call() {
    // Any call on an unconfigured mock panics.
    let api = MockContentApi::new();
    let probe = MockStreamProbe::new();

    let err = synchronise(&Settings::default(), &api, &probe, RetryPolicy::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Config(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_synchronise_stops_on_quota() {
    let mut api = MockContentApi::new();
    api.expect_my_channel_id()
        .returning(|| Ok("UCme".to_string()));
    api.expect_playlist_info()
        .returning(|_id: &str| Ok(owned_playlist(0)));
    api.expect_subscriptions_page()
        .times(1)
        .returning(|_token: Option<String>| {
            Err(ApiError::new(403, "quotaExceeded", "quota"))
        });
    let probe = MockStreamProbe::new();

    let started = tokio::time::Instant::now();
    let err = synchronise(&settings(), &api, &probe, RetryPolicy::default(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::QuotaExceeded { .. }));
    assert_eq!(started.elapsed(), StdDuration::ZERO);
}

#[tokio::test]
async fn test_synchronise_resolves_extra_handles() {
    let now = Utc::now();
    let mut api = MockContentApi::new();
    api.expect_my_channel_id()
        .returning(|| Ok("UCme".to_string()));
    api.expect_playlist_info()
        .returning(|_id: &str| Ok(owned_playlist(0)));
    api.expect_subscriptions_page()
        .returning(|_token: Option<String>| Ok(Page::last(Vec::new())));
    api.expect_channel_by_handle()
        .times(2)
        .returning(|handle: &str| {
            Ok((handle == "@known").then(|| ChannelRef::new("Known", "UCknown")))
        });
    api.expect_upload_playlists()
        .returning(|ids: &[String]| {
            assert_eq!(ids, ["UCknown".to_string()]);
            Ok(vec![("UCknown".to_string(), "UUknown".to_string())])
        });
    api.expect_recent_uploads()
        .returning(|_playlist: &str, _max: u32| Ok(Vec::new()));
    api.expect_video_details().never();
    api.expect_insert_playlist_item().never();
    let probe = MockStreamProbe::new();

    let mut s = settings();
    s.include_extra_channels = true;
    s.extra_channel_handles = Some(vec!["@known".into(), "@missing".into()]);

    let report = synchronise(&s, &api, &probe, RetryPolicy::default(), now)
        .await
        .unwrap();

    assert_eq!(report.channels, 1);
    assert_eq!(report.collected, 0);
    assert!(report.publish.added.is_empty());
}

fn english_captions() -> CaptionOptions {
    CaptionOptions {
        track_kind: vec!["standard".into()],
        languages: vec!["en".into()],
        audio_track_type: vec!["primary".into()],
        status: vec!["serving".into()],
        is_cc: false,
        is_large: false,
        is_easy_reader: false,
        is_auto_synced: false,
    }
}

fn caption_track(id: &str, is_auto_synced: bool) -> CaptionTrack {
    CaptionTrack {
        id: id.into(),
        track_kind: "standard".into(),
        language: "en".into(),
        audio_track_type: "primary".into(),
        status: "serving".into(),
        is_cc: false,
        is_large: false,
        is_easy_reader: false,
        is_auto_synced,
    }
}

#[tokio::test]
async fn test_synchronise_requires_a_fully_matching_caption_track() {
    let now = Utc::now();
    let mut api = subscribed_world(now);
    api.expect_captions()
        .times(2)
        .returning(|video_id: &str| match video_id {
            "fresh" => Ok(vec![caption_track("fresh-en", false)]),
            // Seven of eight conditions hold.
            "short" => Ok(vec![caption_track("short-en", true)]),
            other => panic!("captions requested for {other}"),
        });
    api.expect_insert_playlist_item()
        .withf(|_target: &str, video: &str| video == "fresh")
        .times(1)
        .returning(|_, _| Ok(()));
    let probe = MockStreamProbe::new();

    let mut s = settings();
    s.keep_duplicates = true;
    s.require_captions = true;
    s.caption_options = Some(english_captions());

    let report = synchronise(&s, &api, &probe, RetryPolicy::default(), now)
        .await
        .unwrap();

    assert_eq!(report.survivors, 1);
    assert_eq!(report.rejections.get("captions"), Some(&1));
    assert_eq!(report.publish.added[0].title, "Deep dive");
}

#[tokio::test]
async fn test_synchronise_rejects_spherical_projection() {
    let now = Utc::now();
    let mut api = subscribed_world_with(now, |video| {
        if video.id == "short" {
            video.projection = "360".into();
        }
    });
    api.expect_captions().never();
    api.expect_insert_playlist_item()
        .withf(|_target: &str, video: &str| video == "fresh")
        .times(1)
        .returning(|_, _| Ok(()));
    let probe = MockStreamProbe::new();

    let mut s = settings();
    s.keep_duplicates = true;
    s.preferred_projections = Some(vec![Projection::Rectangular]);

    let report = synchronise(&s, &api, &probe, RetryPolicy::default(), now)
        .await
        .unwrap();

    assert_eq!(report.survivors, 1);
    assert_eq!(report.rejections.get("projection"), Some(&1));
}

#[tokio::test]
async fn test_synchronise_rejects_other_languages_and_sd() {
    let now = Utc::now();
    let mut api = subscribed_world_with(now, |video| match video.id.as_str() {
        "fresh" => video.default_audio_language = Some("de".into()),
        _ => video.definition = "sd".into(),
    });
    api.expect_insert_playlist_item().never();
    let probe = MockStreamProbe::new();

    let mut s = settings();
    s.keep_duplicates = true;
    s.preferred_languages = Some(vec!["en".into()]);
    s.lowest_definition = Some(Definition::Hd);

    let report = synchronise(&s, &api, &probe, RetryPolicy::default(), now)
        .await
        .unwrap();

    assert_eq!(report.survivors, 0);
    assert_eq!(report.rejections.get("language"), Some(&1));
    assert_eq!(report.rejections.get("definition"), Some(&1));
    assert!(report.publish.added.is_empty());
}
