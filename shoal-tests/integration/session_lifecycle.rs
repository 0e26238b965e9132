//! Session sharing, per-reader cancellation, explicit teardown and reaping.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use futures::StreamExt;
use shoal_core::SessionState;
use shoal_core::config::GatewayConfig;
use shoal_sim::JoinBehavior;

use crate::common::{
    body_bytes, body_json, gateway, gateway_with, get, patterned, request, send, stream_uri,
    test_gateway_config, video,
};

#[tokio::test]
async fn test_concurrent_requests_share_one_join() {
    let content = video("popular", 200_000);
    let content_id = content.content_id();
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let requests = (0..6).map(|i| {
        let app = gw.app.clone();
        let uri = stream_uri(&locator);
        let range = format!("bytes={}-{}", i * 1000, i * 1000 + 999);
        async move {
            let response = get(&app, &uri, Some(&range)).await;
            (response.status(), body_bytes(response).await)
        }
    });
    let responses = futures::future::join_all(requests).await;

    let data = patterned(200_000);
    for (i, (status, body)) in responses.into_iter().enumerate() {
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(body.to_vec(), data[i * 1000..i * 1000 + 1000].to_vec());
    }
    assert_eq!(gw.swarm.join_count_for(&content_id), 1);
    assert_eq!(gw.state.registry.len(), 1);
}

#[tokio::test]
async fn test_aborting_one_reader_leaves_others_running() {
    let content = video("shared", 2_000_000);
    let content_id = content.content_id();
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let first = get(&gw.app, &stream_uri(&locator), None).await;
    let second = get(&gw.app, &stream_uri(&locator), Some("bytes=1000000-")).await;
    let session = gw.state.registry.get_existing(&content_id).unwrap();
    let torrent = gw.swarm.live_torrents().pop().unwrap();
    assert_eq!(session.active_readers(), 2);
    assert_eq!(torrent.interest_count(), 2);

    let mut aborted = first.into_body().into_data_stream();
    let chunk = aborted.next().await.unwrap().unwrap();
    assert!(!chunk.is_empty());
    drop(aborted);

    assert_eq!(session.active_readers(), 1);
    assert_eq!(torrent.interest_count(), 1);
    assert_eq!(session.state(), SessionState::Ready);

    let body = body_bytes(second).await;
    assert_eq!(body.to_vec(), patterned(2_000_000)[1_000_000..].to_vec());
    assert_eq!(session.active_readers(), 0);
    assert_eq!(torrent.interest_count(), 0);
    assert!(!torrent.is_shut_down());
}

#[tokio::test]
async fn test_delete_destroys_session() {
    let content = video("deleted", 10_000);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=0-9")).await;
    assert_eq!(body_bytes(response).await.len(), 10);
    let torrent = gw.swarm.live_torrents().pop().unwrap();

    let response = send(&gw.app, request(Method::DELETE, &stream_uri(&locator), None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(gw.state.registry.is_empty());
    assert!(torrent.is_shut_down());

    let response = send(&gw.app, request(Method::DELETE, &stream_uri(&locator), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // the next play request rejoins
    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=0-9")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(gw.swarm.join_count(), 2);
}

#[tokio::test]
async fn test_destroy_cancels_attached_readers() {
    let content = video("cut", 4_000_000);
    let content_id = content.content_id();
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), None).await;
    gw.swarm.live_torrents().pop().unwrap().pause();
    let mut body = response.into_body().into_data_stream();

    assert!(gw.state.registry.destroy(&content_id).await);

    let mut failed = false;
    while let Some(chunk) = body.next().await {
        if chunk.is_err() {
            failed = true;
            break;
        }
    }
    assert!(failed);
}

#[tokio::test]
async fn test_sessions_and_health_listing() {
    let content = video("listed", 4096);
    let locator = content.magnet_uri();
    let hash = content.content_id().to_string();
    let gw = gateway(vec![content]);

    let health = body_json(get(&gw.app, "/health", None).await).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 0);

    body_bytes(get(&gw.app, &stream_uri(&locator), None).await).await;

    let listing = body_json(get(&gw.app, "/sessions", None).await).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["sessions"][0]["contentId"], hash);
    assert_eq!(listing["sessions"][0]["state"], "ready");
    assert_eq!(listing["sessions"][0]["fileCount"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_join_timeout_is_reported() {
    let content = video("slow", 1024);
    let locator = content.magnet_uri();
    let gw = gateway_with(
        vec![content],
        GatewayConfig {
            join_timeout: Duration::from_secs(2),
            ..test_gateway_config()
        },
    );
    gw.swarm.set_join_behavior(JoinBehavior::Hang);

    let response = get(&gw.app, &stream_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Timed out after 2s waiting for swarm metadata"
    );
    assert!(gw.state.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_completed_idle_session_is_reaped() {
    let content = video("reaped", 50_000);
    let content_id = content.content_id();
    let locator = content.magnet_uri();
    let grace = Duration::from_secs(60);
    let gw = gateway_with(
        vec![content],
        GatewayConfig {
            idle_grace_period: grace,
            ..test_gateway_config()
        },
    );

    let response = get(&gw.app, &stream_uri(&locator), None).await;
    body_bytes(response).await;
    let session = gw.state.registry.get_existing(&content_id).unwrap();

    tokio::time::sleep(grace / 2).await;
    // a new read restarts the countdown
    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=0-99")).await;
    body_bytes(response).await;

    tokio::time::sleep(grace / 2 + Duration::from_secs(5)).await;
    assert_eq!(session.state(), SessionState::Ready);

    tokio::time::sleep(grace).await;
    assert_eq!(session.state(), SessionState::Destroyed);
    assert!(gw.state.registry.get_existing(&content_id).is_none());
    assert_eq!(gw.swarm.join_count(), 1);
}
