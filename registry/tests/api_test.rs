//! Runs against a live registry (`WOL_SERVER`, default `http://localhost:3000`)
//! backed by PostgreSQL. Start both before running with `--ignored`.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Device {
    id: String,
    name: String,
    mac_address: String,
    ip_address: Option<String>,
    description: Option<String>,
}

fn server() -> String {
    std::env::var("WOL_SERVER").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, std::process::id())
}

#[tokio::test]
#[ignore]
async fn test_device_lifecycle() {
    let client = Client::new();
    let base = server();
    let name = unique_name("tv1");

    let response = client
        .post(format!("{}/api/devices", base))
        .json(&json!({
            "name": name,
            "macAddress": "AA:BB:CC:DD:EE:FF",
            "ipAddress": "192.168.1.20",
            "description": "living room"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Device = response.json().await.unwrap();
    assert_eq!(created.name, name);
    assert!(!created.id.is_empty());

    let response = client
        .post(format!("{}/api/devices", base))
        .json(&json!({ "name": name, "macAddress": "AA:BB:CC:DD:EE:FF" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .put(format!("{}/api/devices/{}", base, created.id))
        .json(&json!({ "macAddress": "11:22:33:44:55:66" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Device = response.json().await.unwrap();
    assert_eq!(updated.mac_address, "11:22:33:44:55:66");
    assert_eq!(updated.ip_address, None);
    assert_eq!(updated.description, None);

    let response = client
        .delete(format!("{}/api/devices/{}", base, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let removed: Device = response.json().await.unwrap();
    assert_eq!(removed.id, created.id);

    let response = client
        .get(format!("{}/api/devices/{}", base, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Device not found");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_adds_with_same_name() {
    let client = Client::new();
    let base = server();
    let name = unique_name("race");
    let payload = json!({ "name": name, "macAddress": "01:02:03:04:05:06" });

    let attempts = (0..8).map(|_| {
        let client = client.clone();
        let url = format!("{}/api/devices", base);
        let payload = payload.clone();
        tokio::spawn(async move { client.post(url).json(&payload).send().await.unwrap().status() })
    });

    let mut created = 0;
    let mut conflicts = 0;
    for handle in attempts.collect::<Vec<_>>() {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);

    // Clean up through the name-addressed route
    let response = client
        .delete(format!("{}/device/{}", base, name))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn test_wake_unknown_device_logs_nothing() {
    let client = Client::new();
    let base = server();
    let missing = "00000000-0000-4000-8000-000000000000";

    let response = client
        .post(format!("{}/api/devices/{}/wake", base, missing))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let activities: Vec<Value> = client
        .get(format!("{}/api/activities?device={}", base, missing))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(activities.is_empty());
}
