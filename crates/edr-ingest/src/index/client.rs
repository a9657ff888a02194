//! HTTP client for Elasticsearch / Amazon OpenSearch Service
//!
//! Requests are signed with SigV4 when a [`RequestSigner`] is supplied;
//! without one they go out unauthenticated (local clusters, tests).

use super::sigv4::RequestSigner;
use super::{encode_ndjson, BulkOutcome, IndexAction, IndexingService, ItemIndexError};
use crate::config::IndexConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Identity reported by the cluster root endpoint
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClusterInfo {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub version: ClusterVersion,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ClusterVersion {
    #[serde(default)]
    pub number: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: u16,
    error: Option<serde_json::Value>,
}

impl BulkItem {
    fn into_error(self, position: usize) -> Option<ItemIndexError> {
        if (200..300).contains(&self.status) {
            return None;
        }

        let (error_type, reason) = match self.error {
            Some(serde_json::Value::Object(ref error)) => (
                error
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                error
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            ),
            Some(serde_json::Value::String(ref reason)) => ("unknown".to_string(), reason.clone()),
            _ => ("unknown".to_string(), String::new()),
        };

        Some(ItemIndexError {
            position,
            doc_id: self.id,
            status: self.status,
            error_type,
            reason,
        })
    }
}

/// Indexing service client over HTTP
#[derive(Debug, Clone)]
pub struct EsClient {
    http: Client,
    base_url: Url,
    signer: Option<RequestSigner>,
}

impl EsClient {
    /// Create a client without contacting the cluster.
    pub fn new(config: &IndexConfig, signer: Option<RequestSigner>) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url()?,
            signer,
        })
    }

    /// Create a client and verify that the cluster answers.
    pub async fn connect(config: &IndexConfig, signer: Option<RequestSigner>) -> Result<Self> {
        let client = Self::new(config, signer)?;

        let info = client
            .info()
            .await
            .map_err(|e| IngestError::Connection(format!("{}: {}", client.base_url, e)))?;

        info!(
            endpoint = %client.base_url,
            cluster = %info.cluster_name,
            version = %info.version.number,
            "Connected to indexing service"
        );

        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the cluster root document
    pub async fn info(&self) -> Result<ClusterInfo> {
        let response = self.send(Method::GET, "", None).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| IngestError::config(format!("invalid request URL '{}': {}", raw, e)))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<(Vec<u8>, &'static str)>,
    ) -> Result<reqwest::Response> {
        let url = self.url_for(path)?;
        let payload: &[u8] = body.as_ref().map(|(bytes, _)| bytes.as_slice()).unwrap_or_default();
        debug!(method = %method, url = %url, bytes = payload.len(), "Sending request");

        let mut request = self.http.request(method.clone(), url.clone());

        if let Some(ref signer) = self.signer {
            for (name, value) in signer.sign(method.as_str(), &url, payload, Utc::now()) {
                request = request.header(name, value);
            }
        }

        if let Some((bytes, content_type)) = body {
            request = request.header(CONTENT_TYPE, content_type).body(bytes);
        }

        Ok(request.send().await?)
    }

    async fn bulk_chunk(&self, chunk: &[IndexAction], offset: usize) -> Result<BulkOutcome> {
        let body = encode_ndjson(chunk)?;

        let response = self
            .send(Method::POST, "_bulk", Some((body, NDJSON_CONTENT_TYPE)))
            .await
            .map_err(|e| IngestError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IngestError::transport(format!("{}: {}", status, text)));
        }

        let parsed: BulkResponse = response
            .json()
            .await
            .map_err(|e| IngestError::transport(format!("unreadable bulk response: {}", e)))?;

        if parsed.items.len() != chunk.len() {
            return Err(IngestError::transport(format!(
                "bulk response reported {} items for {} actions",
                parsed.items.len(),
                chunk.len()
            )));
        }

        let mut outcome = BulkOutcome::default();
        for (i, item) in parsed.items.into_iter().enumerate() {
            let Some(item) = item.into_values().next() else {
                return Err(IngestError::transport(format!("empty bulk response item at {}", offset + i)));
            };
            match item.into_error(offset + i) {
                Some(error) => outcome.errors.push(error),
                None => outcome.success_count += 1,
            }
        }

        debug!(
            actions = chunk.len(),
            errors_flag = parsed.errors,
            rejected = outcome.errors.len(),
            "Bulk chunk acknowledged"
        );

        Ok(outcome)
    }
}

#[async_trait]
impl IndexingService for EsClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .send(Method::HEAD, index, None)
            .await
            .map_err(|e| IngestError::index_setup(format!("existence check for '{}': {}", index, e)))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(IngestError::index_setup(format!(
                "existence check for '{}' returned {}",
                index, status
            ))),
        }
    }

    async fn create_index(&self, index: &str, body: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_vec(body)?;

        let response = self
            .send(Method::PUT, index, Some((payload, JSON_CONTENT_TYPE)))
            .await
            .map_err(|e| IngestError::index_setup(format!("creating '{}': {}", index, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IngestError::index_setup(format!(
                "creating '{}' returned {}: {}",
                index, status, text
            )));
        }

        Ok(())
    }

    async fn bulk(&self, actions: &[IndexAction], chunk_size: usize) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome::default();

        for (n, chunk) in actions.chunks(chunk_size.max(1)).enumerate() {
            let offset = n * chunk_size.max(1);
            outcome.merge(self.bulk_chunk(chunk, offset).await?);
        }

        Ok(outcome)
    }
}
