#![cfg(test)]

use serde_json::json;
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::update::client::{UpdateClient, UpdateError, WebApiClient};
use crate::update::model::{ModSearchEntry, UpdateCheckRequest};

fn request() -> UpdateCheckRequest {
    UpdateCheckRequest {
        api_version: "4.0.0".to_string(),
        platform: "linux".to_string(),
        mods: vec![ModSearchEntry {
            id: "Farm.Tools".to_string(),
            installed_version: "1.0.0".to_string(),
            update_keys: vec!["Nexus:1".to_string()],
            is_broken: false,
        }],
    }
}

#[tokio::test]
async fn test_posts_batch_and_parses_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mods"))
        .and(header_exists("user-agent"))
        .and(body_partial_json(json!({
            "apiVersion": "4.0.0",
            "mods": [{ "id": "Farm.Tools", "installedVersion": "1.0.0", "updateKeys": ["Nexus:1"], "isBroken": false }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Farm.Tools": { "suggestedVersion": "1.2.0", "url": "https://mods.example/1" },
            "Other": { "errors": ["no update keys"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebApiClient::new(format!("{}/", server.uri())).unwrap();
    assert_eq!(client.base_url(), server.uri());
    let response = client.check(&request()).await.unwrap();

    let tools = &response["Farm.Tools"];
    assert_eq!(tools.suggested_version.as_deref(), Some("1.2.0"));
    assert_eq!(tools.url.as_deref(), Some("https://mods.example/1"));
    assert!(tools.errors.is_empty());
    assert_eq!(response["Other"].errors, vec!["no update keys"]);
}

#[tokio::test]
async fn test_server_error_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mods"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = WebApiClient::new(server.uri()).unwrap();
    match client.check(&request()).await {
        Err(UpdateError::Status { status, url }) => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/mods"));
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mods"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = WebApiClient::new(server.uri()).unwrap();
    assert!(matches!(client.check(&request()).await, Err(UpdateError::Http(_))));
}
