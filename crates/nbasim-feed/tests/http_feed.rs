//! Integration tests for the HTTP feed client.
//!
//! A throwaway Axum server on a loopback port stands in for the public
//! play-by-play CDN.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use nbasim_feed::{FeedClient, FeedError};
use tokio::net::TcpListener;

async fn playbyplay(Path(file): Path<String>) -> impl IntoResponse {
    match file.as_str() {
        "playbyplay_good.json" => (
            StatusCode::OK,
            serde_json::json!({
                "meta": {"version": 1, "code": 200, "request": "x", "time": "t"},
                "game": {
                    "gameId": "good",
                    "actions": [
                        {"actionNumber": 2, "clock": "PT11M58.00S", "period": 1, "actionType": "jumpball", "teamTricode": "BOS"},
                        {"actionNumber": 1, "clock": "PT12M00.00S", "period": 1, "actionType": "period"}
                    ]
                }
            })
            .to_string(),
        ),
        "playbyplay_garbage.json" => (StatusCode::OK, String::from("<html>not json</html>")),
        _ => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn spawn_stub() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/feed/{file}", get(playbyplay));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> FeedClient {
    FeedClient::new(
        format!("http://{addr}/feed/playbyplay_{{game_id}}.json"),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn fetch_records_keeps_feed_order() {
    let addr = spawn_stub().await;
    let client = client_for(addr);

    let records = client.fetch_records("good").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action_number, 2);
    assert_eq!(records[0].fields["teamTricode"], "BOS");
    assert_eq!(records[1].action_type, "period");
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let addr = spawn_stub().await;
    let client = client_for(addr);

    let err = client.fetch_records("missing").await.unwrap_err();
    assert!(matches!(err, FeedError::Status { status: 404, .. }));
}

#[tokio::test]
async fn undecodable_body_is_reported() {
    let addr = spawn_stub().await;
    let client = client_for(addr);

    let err = client.fetch_records("garbage").await.unwrap_err();
    assert!(matches!(err, FeedError::Decode(_)));
}

#[tokio::test]
async fn unreachable_host_is_a_request_error() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr);
    let err = client.fetch_records("good").await.unwrap_err();
    assert!(matches!(err, FeedError::Request { .. }));
}
