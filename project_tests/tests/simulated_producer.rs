use std::time::Duration;

use lib_sensor::ingestors::DummyGenerator;
use lib_sensor::retrieve::ApiClient;
use project_tests::{next_json, TestServer};
use serde_json::Value;

#[tokio::test]
async fn generated_readings_flow_through_the_ingestion_api() {
    let server = TestServer::start().await.unwrap();
    let mut feed = server.connect_feed().await.unwrap();

    let client = ApiClient::new(&server.url("/api/sensor-data"), 1, Duration::from_secs(5)).unwrap();
    let mut generator = DummyGenerator::seeded(11);

    let mut sent = Vec::new();
    for _ in 0..5 {
        let reading = generator.next_reading();
        let response = client.post_json::<Value, _>("", &reading).await.unwrap();
        assert!(response.success, "status {}", response.status);
        assert_eq!(response.data.unwrap()["message"], "Sensor data stored");
        sent.push(reading);
    }

    for reading in &sent {
        let pushed = next_json(&mut feed, Duration::from_secs(5)).await.unwrap();
        assert_eq!(pushed["distance"].as_f64().unwrap(), reading.distance);
        assert_eq!(pushed["tds"].as_f64().unwrap(), reading.tds);
    }

    let history = server.coordinator.history().await;
    assert_eq!(history, sent);
}

#[tokio::test]
async fn refused_reading_reports_status_and_body() {
    let server = TestServer::start().await.unwrap();
    let client = ApiClient::new(&server.url("/api/sensor-data"), 0, Duration::from_secs(5)).unwrap();

    let response = client
        .post_json::<Value, _>("", &serde_json::json!({"distance": 3}))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.status, 400);
    assert!(response.error_body.unwrap().contains("missingField"));
}
