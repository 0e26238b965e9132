//! Shared fixtures for gateway integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{Method, Request, Response, header};
use shoal_core::config::{GatewayConfig, ShoalConfig, SimulationConfig};
use shoal_sim::{SimulatedContent, SimulatedSwarm};
use shoal_web::{AppState, router};
use tower::ServiceExt;

pub struct Gateway {
    pub app: Router,
    pub state: AppState,
    pub swarm: Arc<SimulatedSwarm>,
}

pub fn test_gateway_config() -> GatewayConfig {
    GatewayConfig {
        join_timeout: Duration::from_secs(5),
        idle_grace_period: Duration::from_secs(300),
        chunk_size: 64 * 1024,
    }
}

pub fn gateway(contents: Vec<SimulatedContent>) -> Gateway {
    gateway_with(contents, test_gateway_config())
}

pub fn gateway_with(contents: Vec<SimulatedContent>, gateway: GatewayConfig) -> Gateway {
    let config = ShoalConfig {
        gateway,
        simulation: SimulationConfig::deterministic_testing(),
        ..ShoalConfig::default()
    };
    let swarm = Arc::new(SimulatedSwarm::new(config.simulation.clone()));
    for content in contents {
        swarm.add_content(content);
    }

    let state = AppState::new(config, swarm.clone());
    Gateway {
        app: router(state.clone()),
        state,
        swarm,
    }
}

/// Single-file content whose bytes encode their offset.
pub fn video(name: &str, length: usize) -> SimulatedContent {
    SimulatedContent::builder(name)
        .patterned_file(format!("{name}.mp4"), length)
        .build()
}

pub fn patterned(length: usize) -> Vec<u8> {
    (0..length).map(|i| (i % 251) as u8).collect()
}

pub fn stream_uri(locator: &str) -> String {
    format!("/stream?locator={}", urlencoding::encode(locator))
}

pub fn stats_uri(locator: &str) -> String {
    format!("{}&stats=true", stream_uri(locator))
}

pub fn request(method: Method, uri: &str, range: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, range: Option<&str>) -> Response<Body> {
    send(app, request(Method::GET, uri, range)).await
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
