//! Target store adapter for the REST API.
//!
//! Resources are the entity's target resource names:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list | `GET {base_url}/{resource}?user_id=..&limit=..` |
//! | get | `GET {base_url}/{resource}/{id}` (404 means absent) |
//! | create | `POST {base_url}/{resource}` returning `{"id": ...}` |
//! | update | `PUT {base_url}/{resource}/{id}` |
//! | delete | `DELETE {base_url}/{resource}/{id}` |
//!
//! Responses may be bare or wrapped in a `{"data": ...}` envelope.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::common::{
    create_http_client, extract_id, handle_http_error, validate_url, StoreSide, DEFAULT_TIMEOUT,
};
use super::TargetStore;
use crate::entity::{EntityType, TARGET_OWNER_FIELD};
use crate::error::{Error, Result};
use crate::record::{Document, ListQuery, TargetRecord};

/// Configuration for the REST target store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestTargetConfig {
    /// API base URL (e.g. https://api.example.com/v1).
    pub base_url: String,
    /// Optional bearer token.
    #[serde(default)]
    pub api_token: Option<String>,
    /// HTTP timeout in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Target store backed by the REST API.
pub struct RestTargetStore {
    config: RestTargetConfig,
    client: Client,
}

impl RestTargetStore {
    /// Creates the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is invalid.
    pub fn new(config: RestTargetConfig) -> Result<Self> {
        validate_url(&config.base_url)?;
        let client = create_http_client(Duration::from_secs(config.timeout_secs));
        Ok(Self { config, client })
    }

    fn collection_url(&self, entity: EntityType) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            entity.target_resource()
        )
    }

    fn record_url(&self, entity: EntityType, id: &str) -> String {
        format!("{}/{}", self.collection_url(entity), id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::TargetStore(format!("REST request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_http_error(status.as_u16(), &body, "REST", StoreSide::Target));
        }

        Ok(response)
    }

    async fn json_body(response: Response) -> Result<Value> {
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::TargetStore(format!("Failed to parse REST response: {}", e)))?;
        Ok(unwrap_envelope(body))
    }

    fn to_record(entity: EntityType, row: Value) -> Result<TargetRecord> {
        let Value::Object(data) = row else {
            return Err(Error::TargetStore(format!("{} row is not an object", entity)));
        };
        let id = data
            .get("id")
            .and_then(extract_id)
            .ok_or_else(|| Error::TargetStore(format!("{} row has no id", entity)))?;
        Ok(TargetRecord::from_row(entity, id, data))
    }
}

/// Strips a `{"data": ...}` envelope if present.
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl TargetStore for RestTargetStore {
    fn store_type(&self) -> &'static str {
        "rest"
    }

    async fn list(&self, entity: EntityType, query: &ListQuery) -> Result<Vec<TargetRecord>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(owner) = &query.owner_id {
            params.push((TARGET_OWNER_FIELD, owner.clone()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let request = self.client.get(self.collection_url(entity)).query(&params);
        let body = Self::json_body(self.send(request).await?).await?;

        let Value::Array(rows) = body else {
            return Err(Error::TargetStore(format!(
                "{} listing is not an array",
                entity
            )));
        };
        rows.into_iter()
            .map(|row| Self::to_record(entity, row))
            .collect()
    }

    async fn get(&self, entity: EntityType, id: &str) -> Result<Option<TargetRecord>> {
        let request = self.authorize(self.client.get(self.record_url(entity, id)));
        let response = request
            .send()
            .await
            .map_err(|e| Error::TargetStore(format!("REST request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_http_error(status.as_u16(), &body, "REST", StoreSide::Target));
        }

        let body = Self::json_body(response).await?;
        Self::to_record(entity, body).map(Some)
    }

    async fn create(&self, entity: EntityType, data: Document) -> Result<String> {
        let request = self.client.post(self.collection_url(entity)).json(&data);
        let body = Self::json_body(self.send(request).await?).await?;

        body.get("id")
            .and_then(extract_id)
            .ok_or_else(|| Error::TargetStore(format!("{} create returned no id", entity)))
    }

    async fn update(&self, entity: EntityType, id: &str, data: Document) -> Result<()> {
        let request = self.client.put(self.record_url(entity, id)).json(&data);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, entity: EntityType, id: &str) -> Result<()> {
        let request = self.client.delete(self.record_url(entity, id));
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
