//! Document store adapter over a Data API (REST) endpoint.
//!
//! Speaks the MongoDB Data API dialect: every call is a
//! `POST {data_api_url}/action/{find|findOne|insertOne|updateOne}` with the
//! data source, database and collection in the body. Collections are the
//! entity's source collection names.
//!
//! Record ids are plain strings. Ids read from an `{"$oid": ...}` `_id`, and
//! any 24-digit hex id, are sent back as `{"$oid": ...}` in filters and
//! inserts so they keep matching ObjectId keys.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use super::common::{
    create_http_client, extract_id, handle_http_error, validate_url, StoreSide, DEFAULT_TIMEOUT,
};
use super::SourceStore;
use crate::entity::{EntityType, SOURCE_OWNER_FIELD};
use crate::error::{Error, Result};
use crate::record::{Document, ListQuery, SourceRecord};

/// Configuration for the document Data API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentApiConfig {
    /// Data API endpoint URL.
    /// Format: https://data.mongodb-api.com/app/<app-id>/endpoint/data/v1
    pub data_api_url: String,
    /// Data API key.
    pub api_key: String,
    /// Database name.
    pub database: String,
    /// Data source (cluster) name.
    #[serde(default = "default_data_source")]
    pub data_source: String,
    /// HTTP timeout in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_data_source() -> String {
    "mongodb-atlas".to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Request body for `find`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindRequest<'a> {
    data_source: &'a str,
    database: &'a str,
    collection: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

/// Request body for `findOne`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindOneRequest<'a> {
    data_source: &'a str,
    database: &'a str,
    collection: &'a str,
    filter: Value,
}

/// Request body for `insertOne`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertOneRequest<'a> {
    data_source: &'a str,
    database: &'a str,
    collection: &'a str,
    document: Value,
}

/// Request body for `updateOne`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOneRequest<'a> {
    data_source: &'a str,
    database: &'a str,
    collection: &'a str,
    filter: Value,
    update: Value,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct FindOneResponse {
    document: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertOneResponse {
    inserted_id: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOneResponse {
    matched_count: u64,
}

/// Source store backed by a document Data API.
pub struct DocumentApiStore {
    config: DocumentApiConfig,
    client: Client,
    object_ids: Mutex<HashSet<String>>,
}

impl DocumentApiStore {
    /// Creates the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint URL is invalid.
    pub fn new(config: DocumentApiConfig) -> Result<Self> {
        validate_url(&config.data_api_url)?;
        let client = create_http_client(Duration::from_secs(config.timeout_secs));
        Ok(Self {
            config,
            client,
            object_ids: Mutex::new(HashSet::new()),
        })
    }

    /// The `_id` value to send for a record id.
    fn id_value(&self, id: &str) -> Value {
        if is_object_id_hex(id) || self.object_ids.lock().contains(id) {
            json!({ "$oid": id })
        } else {
            Value::String(id.to_string())
        }
    }

    /// Builds the API URL for a specific action.
    fn build_url(&self, action: &str) -> String {
        format!(
            "{}/action/{}",
            self.config.data_api_url.trim_end_matches('/'),
            action
        )
    }

    /// Makes a POST request to the Data API.
    async fn api_request<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        body: &T,
    ) -> Result<R> {
        let url = self.build_url(action);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::SourceStore(format!("Document API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(handle_http_error(
                status.as_u16(),
                &body,
                "Document API",
                StoreSide::Source,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::SourceStore(format!("Failed to parse Document API response: {}", e)))
    }

    /// Splits a document into its id and remaining fields.
    fn to_record(&self, entity: EntityType, doc: Value) -> Result<SourceRecord> {
        let Value::Object(mut data) = doc else {
            return Err(Error::SourceStore(format!(
                "{} document is not an object",
                entity
            )));
        };
        let raw_id = data.remove("_id");
        let id = raw_id
            .as_ref()
            .and_then(extract_id)
            .ok_or_else(|| Error::SourceStore(format!("{} document has no _id", entity)))?;
        if raw_id.as_ref().is_some_and(|v| v.get("$oid").is_some()) {
            self.object_ids.lock().insert(id.clone());
        }
        Ok(SourceRecord::new(entity, id, data))
    }
}

#[async_trait]
impl SourceStore for DocumentApiStore {
    fn store_type(&self) -> &'static str {
        "document_api"
    }

    async fn list(&self, entity: EntityType, query: &ListQuery) -> Result<Vec<SourceRecord>> {
        let request = FindRequest {
            data_source: &self.config.data_source,
            database: &self.config.database,
            collection: entity.source_collection(),
            filter: query
                .owner_id
                .as_ref()
                .map(|owner| json!({ SOURCE_OWNER_FIELD: owner })),
            sort: query.order_by.map(|field| json!({ field: -1 })),
            limit: query.limit,
        };

        let response: FindResponse = self.api_request("find", &request).await?;

        response
            .documents
            .into_iter()
            .map(|doc| self.to_record(entity, doc))
            .collect()
    }

    async fn get(&self, entity: EntityType, id: &str) -> Result<Option<SourceRecord>> {
        let request = FindOneRequest {
            data_source: &self.config.data_source,
            database: &self.config.database,
            collection: entity.source_collection(),
            filter: json!({ "_id": self.id_value(id) }),
        };

        let response: FindOneResponse = self.api_request("findOne", &request).await?;

        response
            .document
            .filter(|doc| !doc.is_null())
            .map(|doc| self.to_record(entity, doc))
            .transpose()
    }

    async fn create(&self, entity: EntityType, id: Option<&str>, data: Document) -> Result<String> {
        let mut document = data;
        if let Some(id) = id {
            document.insert("_id".to_string(), self.id_value(id));
        }

        let request = InsertOneRequest {
            data_source: &self.config.data_source,
            database: &self.config.database,
            collection: entity.source_collection(),
            document: Value::Object(document),
        };

        let response: InsertOneResponse = self.api_request("insertOne", &request).await?;

        extract_id(&response.inserted_id)
            .ok_or_else(|| Error::SourceStore("insertOne returned no id".to_string()))
    }

    async fn update(&self, entity: EntityType, id: &str, data: Document) -> Result<()> {
        let request = UpdateOneRequest {
            data_source: &self.config.data_source,
            database: &self.config.database,
            collection: entity.source_collection(),
            filter: json!({ "_id": self.id_value(id) }),
            update: json!({ "$set": data }),
        };

        let response: UpdateOneResponse = self.api_request("updateOne", &request).await?;

        if response.matched_count == 0 {
            return Err(Error::NotFound(format!("{} {}", entity, id)));
        }
        Ok(())
    }
}

fn is_object_id_hex(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
#[path = "document_api_tests.rs"]
mod tests;
