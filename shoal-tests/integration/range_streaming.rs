//! Range semantics of `GET|HEAD /stream`.

use axum::http::{Method, StatusCode, header};
use shoal_sim::{JoinBehavior, SimulatedContent};

use crate::common::{body_bytes, body_json, gateway, get, patterned, request, send, stream_uri, video};

#[tokio::test]
async fn test_full_file_without_range() {
    let content = video("full", 100_000);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100000");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());

    assert_eq!(body_bytes(response).await.to_vec(), patterned(100_000));
}

#[tokio::test]
async fn test_open_ended_range_of_million_byte_file() {
    let content = video("million", 1_000_000);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=500000-")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 500000-999999/1000000"
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "500000");

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 500_000);
    assert_eq!(body.to_vec(), patterned(1_000_000)[500_000..].to_vec());
}

#[tokio::test]
async fn test_closed_range_and_clamped_end() {
    let content = video("closed", 1_000_000);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=0-99")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/1000000");
    assert_eq!(body_bytes(response).await.len(), 100);

    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=999990-2000000")).await;
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 999990-999999/1000000"
    );
    assert_eq!(body_bytes(response).await.len(), 10);
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let content = video("short", 1000);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=1000-")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");

    let response = get(&gw.app, &stream_uri(&locator), Some("bytes=500-100")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert!(body_json(response).await["error"].is_string());

    // the session survives a rejected range
    assert_eq!(gw.state.registry.len(), 1);
}

#[tokio::test]
async fn test_head_matches_get_headers() {
    let content = video("head", 5000);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = send(
        &gw.app,
        request(Method::HEAD, &stream_uri(&locator), Some("bytes=1000-1999")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 1000-1999/5000");
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_magnet_alias_and_bare_hash() {
    let content = video("alias", 2048);
    let magnet = content.magnet_uri();
    let hash = content.content_id().to_string();
    let gw = gateway(vec![content]);

    let uri = format!("/stream?magnet={}", urlencoding::encode(&magnet));
    let response = get(&gw.app, &uri, Some("bytes=0-15")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

    let response = get(&gw.app, &stream_uri(&hash.to_uppercase()), Some("bytes=0-15")).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(gw.swarm.join_count(), 1);
}

#[tokio::test]
async fn test_invalid_locators_are_rejected_before_joining() {
    let gw = gateway(vec![]);

    let response = get(&gw.app, "/stream", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for locator in [
        "magnet:?dn=no-hash",
        "magnet:?xt=urn:btih:1234",
        "magnet:?xt=urn:btih:zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz",
        "https://example.com/file.torrent",
    ] {
        let response = get(&gw.app, &stream_uri(locator), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{locator}");
        assert!(body_json(response).await["error"].is_string());
    }

    assert_eq!(gw.swarm.join_count(), 0);
    assert!(gw.state.registry.is_empty());
}

#[tokio::test]
async fn test_no_playable_file() {
    let content = SimulatedContent::builder("album")
        .file("track01.flac", vec![0u8; 512])
        .file("cover.jpg", vec![1u8; 256])
        .build();
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        "No video file found in torrent"
    );
    assert!(gw.state.registry.is_empty());
}

#[tokio::test]
async fn test_first_playable_file_is_served() {
    let content = SimulatedContent::builder("bundle")
        .file("readme.txt", b"hello".to_vec())
        .patterned_file("Show.S01E01.mkv", 3000)
        .patterned_file("Show.S01E02.mkv", 4000)
        .build();
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    let response = get(&gw.app, &stream_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/x-matroska");
    assert_eq!(body_bytes(response).await.to_vec(), patterned(3000));
}

#[tokio::test]
async fn test_join_failure_then_retry() {
    let content = video("flaky", 4096);
    let locator = content.magnet_uri();
    let gw = gateway(vec![content]);

    gw.swarm
        .set_join_behavior(JoinBehavior::Fail("tracker unreachable".to_string()));
    let response = get(&gw.app, &stream_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Could not join swarm: tracker unreachable"
    );
    assert!(gw.state.registry.is_empty());

    gw.swarm.set_join_behavior(JoinBehavior::Deliver);
    let response = get(&gw.app, &stream_uri(&locator), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(gw.swarm.join_count(), 2);
}

#[tokio::test]
async fn test_unknown_content_is_a_join_failure() {
    let gw = gateway(vec![]);
    let response = get(
        &gw.app,
        &stream_uri("0123456789abcdef0123456789abcdef01234567"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(gw.state.registry.is_empty());
}
