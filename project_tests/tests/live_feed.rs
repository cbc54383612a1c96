use std::time::Duration;

use futures_util::SinkExt;
use project_tests::{next_json, TestServer};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn viewer_receives_each_stored_reading() {
    let server = TestServer::start().await.unwrap();
    let mut feed = server.connect_feed().await.unwrap();

    server
        .http
        .post(server.url("/api/sensor-data"))
        .json(&json!({"distance": 55.2, "tds": 210.7}))
        .send()
        .await
        .unwrap();

    let pushed = next_json(&mut feed, WAIT).await.unwrap();
    assert_eq!(pushed["distance"], 55.2);
    assert_eq!(pushed["tds"], 210.7);

    // Whatever was pushed is already in the history.
    let history = server.coordinator.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(serde_json::to_value(&history[0]).unwrap(), pushed);
}

#[tokio::test]
async fn rejected_reading_is_not_pushed() {
    let server = TestServer::start().await.unwrap();
    let mut feed = server.connect_feed().await.unwrap();

    server
        .http
        .post(server.url("/api/sensor-data"))
        .json(&json!({"distance": 10}))
        .send()
        .await
        .unwrap();
    server
        .http
        .post(server.url("/api/sensor-data"))
        .json(&json!({"distance": 11, "tds": 12}))
        .send()
        .await
        .unwrap();

    let pushed = next_json(&mut feed, WAIT).await.unwrap();
    assert_eq!(pushed["distance"], 11.0);
}

#[tokio::test]
async fn clear_is_announced_after_earlier_readings() {
    let server = TestServer::start().await.unwrap();
    let mut feed = server.connect_feed().await.unwrap();

    server
        .http
        .post(server.url("/api/sensor-data"))
        .json(&json!({"distance": 1, "tds": 2}))
        .send()
        .await
        .unwrap();
    server.http.post(server.url("/api/clear-data")).send().await.unwrap();

    let first = next_json(&mut feed, WAIT).await.unwrap();
    assert_eq!(first["distance"], 1.0);

    let second = next_json(&mut feed, WAIT).await.unwrap();
    assert_eq!(
        second,
        json!({"type": "dataCleared", "message": "Historical data has been cleared."})
    );
}

#[tokio::test]
async fn every_viewer_gets_the_same_sequence() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.connect_feed().await.unwrap();
    let mut b = server.connect_feed().await.unwrap();

    for distance in [1, 2, 3] {
        server
            .http
            .post(server.url("/api/sensor-data"))
            .json(&json!({"distance": distance, "tds": 100}))
            .send()
            .await
            .unwrap();
    }

    for feed in [&mut a, &mut b] {
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(next_json(feed, WAIT).await.unwrap()["distance"].as_f64().unwrap());
        }
        assert_eq!(seen, vec![1.0, 2.0, 3.0]);
    }
}

#[tokio::test]
async fn closed_viewer_is_removed_without_affecting_others() {
    let server = TestServer::start().await.unwrap();
    let mut stays = server.connect_feed().await.unwrap();
    let mut leaves = server.connect_feed().await.unwrap();

    leaves.send(Message::Close(None)).await.unwrap();
    drop(leaves);
    server.wait_for_subscribers(1).await.unwrap();

    let response = server
        .http
        .post(server.url("/api/sensor-data"))
        .json(&json!({"distance": 4, "tds": 5}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let pushed = next_json(&mut stays, WAIT).await.unwrap();
    assert_eq!(pushed["distance"], 4.0);
}
