//! `GET /stream?stats=true` never creates sessions.

use axum::http::StatusCode;

use crate::common::{body_bytes, body_json, gateway, get, stats_uri, stream_uri, video};

#[tokio::test]
async fn test_stats_for_absent_session_is_404() {
    let content = video("cold", 4096);
    let content_id = content.content_id();
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stats_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["error"].is_string());

    assert!(gw.state.registry.get_existing(&content_id).is_none());
    assert_eq!(gw.swarm.join_count(), 0);
}

#[tokio::test]
async fn test_stats_for_live_session() {
    let content = video("warm", 4096);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    body_bytes(get(&gw.app, &stream_uri(&locator), None).await).await;

    let response = get(&gw.app, &stats_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["peerCount"], 3);
    assert!(stats["downloadRateBytesPerSec"].is_u64());
    assert!(stats["uploadRateBytesPerSec"].is_u64());
    assert!(stats["progressFraction"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_stats_keyed_by_content_id_not_locator_text() {
    let content = video("keyed", 4096);
    let hash = content.content_id().to_string();
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    body_bytes(get(&gw.app, &stream_uri(&locator), None).await).await;

    let with_trackers = format!("magnet:?tr=udp%3A%2F%2Ftracker.example%3A1337&xt=urn:btih:{hash}");
    let response = get(&gw.app, &stats_uri(&with_trackers), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(gw.swarm.join_count(), 1);
}

#[tokio::test]
async fn test_stats_with_invalid_locator() {
    let gw = gateway(vec![]);
    let response = get(&gw.app, &stats_uri("magnet:?xt=urn:btih:abc"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
