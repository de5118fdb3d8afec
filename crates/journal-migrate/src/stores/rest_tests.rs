//! Tests for the REST target adapter.

use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> RestTargetStore {
    RestTargetStore::new(RestTargetConfig {
        base_url: format!("{}/api", server.uri()),
        api_token: Some("secret".to_string()),
        timeout_secs: 5,
    })
    .unwrap()
}

#[test]
fn test_rest_config_defaults() {
    let config: RestTargetConfig =
        serde_json::from_str(r#"{"base_url":"http://localhost:3000"}"#).unwrap();
    assert!(config.api_token.is_none());
    assert_eq!(config.timeout_secs, 30);
}

#[test]
fn test_unwrap_envelope() {
    assert_eq!(unwrap_envelope(json!({"data": [1, 2]})), json!([1, 2]));
    assert_eq!(
        unwrap_envelope(json!({"data": 1, "meta": 2})),
        json!({"data": 1, "meta": 2})
    );
    assert_eq!(unwrap_envelope(json!([3])), json!([3]));
}

#[tokio::test]
async fn test_list_with_owner_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/daily_plans"))
        .and(query_param("user_id", "u1"))
        .and(query_param("limit", "10"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 7, "date": "2024-03-01", "source_ref": "p1"}]
        })))
        .mount(&server)
        .await;

    let records = store(&server)
        .list(EntityType::DailyPlan, &ListQuery::for_owner(Some("u1")).limit(10))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "7");
    assert_eq!(records[0].source_ref.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_get_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/trades/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let record = store(&server).get(EntityType::Trade, "99").await.unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn test_create_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/journal_entries"))
        .and(body_json(json!({"title": "Day 1", "source_ref": "j1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "abc-123"})))
        .mount(&server)
        .await;

    let data = json!({"title": "Day 1", "source_ref": "j1"})
        .as_object()
        .cloned()
        .unwrap();
    let id = store(&server)
        .create(EntityType::JournalEntry, data)
        .await
        .unwrap();

    assert_eq!(id, "abc-123");
}

#[tokio::test]
async fn test_create_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/trades"))
        .respond_with(ResponseTemplate::new(422).set_body_string("entry_price must be a number"))
        .mount(&server)
        .await;

    let err = store(&server)
        .create(EntityType::Trade, Document::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TargetStore(_)));
    assert!(err.to_string().contains("entry_price"));
}

#[tokio::test]
async fn test_delete_and_update() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/trades/5"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/trades/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server);
    store
        .update(EntityType::Trade, "5", Document::new())
        .await
        .unwrap();
    store.delete(EntityType::Trade, "5").await.unwrap();
}

#[tokio::test]
async fn test_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/trades"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&server)
        .await;

    let err = store(&server)
        .list(EntityType::Trade, &ListQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
}
