// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Milvus RESTful v2 client
//!
//! Search uses the L2 metric, so hit distances are lower-is-closer as returned.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

use super::index::VectorIndex;
use super::types::{IndexHit, RetrievalError, SearchRequest};

const SEARCH_PATH: &str = "/v2/vectordb/entities/search";
const QUERY_PATH: &str = "/v2/vectordb/entities/query";

/// Page size when enumerating sources
const QUERY_BATCH_SIZE: usize = 1000;

/// Milvus caps `offset + limit` of a query at this value
const MAX_QUERY_WINDOW: usize = 16_384;

/// Connection settings for [`MilvusRestIndex`]
#[derive(Debug, Clone)]
pub struct MilvusConfig {
    /// Base URL, e.g. `http://localhost:19530`
    pub url: String,
    pub collection: String,
    /// Bearer token (`user:password` or API key)
    pub token: Option<String>,
    /// Vector field searched against
    pub anns_field: String,
    /// Field holding the source name
    pub source_field: String,
    /// HNSW `ef` search parameter
    pub ef: u32,
    pub timeout: Duration,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:19530".to_string(),
            collection: "documents".to_string(),
            token: None,
            anns_field: "vector".to_string(),
            source_field: "source".to_string(),
            ef: 30,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`VectorIndex`] backed by a Milvus server
pub struct MilvusRestIndex {
    client: Client,
    config: MilvusConfig,
}

impl MilvusRestIndex {
    pub fn new(config: MilvusConfig) -> Result<Self, RetrievalError> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| RetrievalError::IndexUnavailable(format!("Invalid index URL: {}", e)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrievalError::IndexUnavailable(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Request body for a search call
    pub fn search_body(&self, request: &SearchRequest) -> Value {
        let mut body = json!({
            "collectionName": self.config.collection,
            "data": [request.vector],
            "annsField": self.config.anns_field,
            "limit": request.limit,
            "outputFields": request.output_fields,
            "searchParams": {
                "metricType": "L2",
                "params": { "ef": self.config.ef }
            },
            "consistencyLevel": request.consistency.as_str(),
        });
        if let Some(expression) = request.filter.to_expression(&self.config.source_field) {
            body["filter"] = Value::String(expression);
        }
        body
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, RetrievalError> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
        let mut builder = self.client.post(&url).json(body);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| self.map_transport(e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RetrievalError::IndexUnavailable(format!(
                "HTTP {}: {}",
                status, text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| self.map_transport(e))?;

        // Milvus reports failures as HTTP 200 with a non-zero code
        let code = payload.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(RetrievalError::IndexResponse(format!(
                "code {}: {}",
                code, message
            )));
        }

        Ok(payload)
    }

    fn map_transport(&self, e: reqwest::Error) -> RetrievalError {
        if e.is_timeout() {
            RetrievalError::Timeout(self.config.timeout.as_millis() as u64)
        } else if e.is_decode() {
            RetrievalError::IndexResponse(e.to_string())
        } else {
            RetrievalError::IndexUnavailable(e.to_string())
        }
    }
}

#[async_trait]
impl VectorIndex for MilvusRestIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Vec<IndexHit>>, RetrievalError> {
        let body = self.search_body(request);
        debug!(
            "Milvus search on {} (limit {}, filter {:?})",
            self.config.collection,
            request.limit,
            body.get("filter")
        );
        let payload = self.post(SEARCH_PATH, &body).await?;
        parse_search_groups(&payload)
    }

    async fn list_sources(&self) -> Result<Vec<String>, RetrievalError> {
        let mut sources = BTreeSet::new();
        let mut offset = 0usize;

        loop {
            let limit = QUERY_BATCH_SIZE.min(MAX_QUERY_WINDOW.saturating_sub(offset));
            if limit == 0 {
                warn!(
                    "Source listing for {} stopped at the {} row query window",
                    self.config.collection, MAX_QUERY_WINDOW
                );
                break;
            }

            let body = json!({
                "collectionName": self.config.collection,
                "filter": "",
                "outputFields": [self.config.source_field],
                "limit": limit,
                "offset": offset,
            });
            let payload = self.post(QUERY_PATH, &body).await?;
            let rows = payload
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| RetrievalError::IndexResponse("query response has no data".into()))?;

            for row in rows {
                if let Some(source) = row.get(&self.config.source_field).and_then(Value::as_str) {
                    sources.insert(source.to_string());
                }
            }

            if rows.len() < limit {
                break;
            }
            offset += rows.len();
        }

        Ok(sources.into_iter().collect())
    }

    fn collection(&self) -> &str {
        &self.config.collection
    }

    fn name(&self) -> &'static str {
        "milvus"
    }
}

/// Parse the `data` array of a search response.
///
/// A flat array of hit objects is one group; an array of arrays is one group
/// per query vector.
pub fn parse_search_groups(payload: &Value) -> Result<Vec<Vec<IndexHit>>, RetrievalError> {
    let data = match payload.get("data") {
        Some(Value::Array(data)) => data,
        Some(Value::Null) | None => return Ok(vec![]),
        Some(other) => {
            return Err(RetrievalError::IndexResponse(format!(
                "search data is not an array: {}",
                other
            )))
        }
    };

    if data.iter().all(Value::is_array) && !data.is_empty() {
        data.iter()
            .map(|group| {
                group
                    .as_array()
                    .map(|hits| hits.iter().map(parse_hit).collect::<Result<Vec<_>, _>>())
                    .unwrap_or_else(|| Ok(vec![]))
            })
            .collect()
    } else {
        Ok(vec![data.iter().map(parse_hit).collect::<Result<Vec<_>, _>>()?])
    }
}

fn parse_hit(value: &Value) -> Result<IndexHit, RetrievalError> {
    // Output fields are top-level in v2 responses, nested under "entity" in some proxies
    let fields = value.get("entity").unwrap_or(value);

    let distance = value
        .get("distance")
        .and_then(Value::as_f64)
        .ok_or_else(|| RetrievalError::IndexResponse(format!("hit without distance: {}", value)))?;

    let source = fields
        .get("source")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let text = fields
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(IndexHit {
        distance: distance as f32,
        source,
        page: parse_page(fields.get("page")),
        text,
    })
}

/// Pages are stored as integers or numeric strings depending on the loader
fn parse_page(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
