//! Managed knowledge-base retrieval
//!
//! Sends a hybrid-search retrieve request for the project's knowledge base and
//! links every result back to a stored File and Chunk so evaluation results
//! keep their provenance.

use super::{ExtractMetadata, RetrievalProvider, RetrievedExtract, ScopeFilter};
use crate::error::{Result, ScoutError};
use crate::store::Store;
use crate::types::{Chunk, File};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct KnowledgeBaseConfig {
    /// Base URL of the retrieval service
    pub endpoint: String,
    /// Bearer token, if the service requires one
    pub token: Option<String>,
    pub timeout: Duration,
}

pub struct KnowledgeBaseProvider {
    client: reqwest::Client,
    config: KnowledgeBaseConfig,
    store: Arc<dyn Store>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Debug, Deserialize)]
struct RetrievalResult {
    content: ResultContent,
    #[serde(default)]
    location: Option<ResultLocation>,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResultContent {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultLocation {
    #[serde(default)]
    s3_location: Option<S3Location>,
}

#[derive(Debug, Deserialize)]
struct S3Location {
    uri: String,
}

impl RetrievalResult {
    fn source_uri(&self) -> Option<&str> {
        self.location
            .as_ref()
            .and_then(|l| l.s3_location.as_ref())
            .map(|s| s.uri.as_str())
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m["x-amz-bedrock-kb-source-uri"].as_str())
            })
    }
}

/// Split `s3://bucket/key` into bucket and key; both must be non-empty
pub fn parse_s3_uri(uri: &str) -> Option<(String, String)> {
    let rest = uri.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket.to_string(), key.to_string()))
}

impl KnowledgeBaseProvider {
    pub fn new(config: KnowledgeBaseConfig, store: Arc<dyn Store>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config, store })
    }

    /// Find or create the File and Chunk standing in for an object
    fn link_provenance(&self, scope: &ScopeFilter, bucket: &str, key: &str) -> Result<(File, Chunk)> {
        let file = match self.store.file_by_location(scope.project_id, bucket, key)? {
            Some(file) => file,
            None => {
                let name = key.rsplit('/').next().unwrap_or(key);
                let mut file = File::new(scope.project_id, name);
                file.s3_bucket = Some(bucket.to_string());
                file.s3_key = Some(key.to_string());
                file.storage_kind = "bedrock_kb".to_string();
                self.store.write_file(&file)?;
                file
            }
        };

        let chunk = match self.store.chunks_for_file(file.id)?.into_iter().next() {
            Some(chunk) => chunk,
            None => {
                let chunk = Chunk::new(file.id, 0, key, 0);
                self.store.write_chunk(&chunk)?;
                chunk
            }
        };

        Ok((file, chunk))
    }
}

#[async_trait]
impl RetrievalProvider for KnowledgeBaseProvider {
    async fn search(&self, query: &str, k: usize, scope: &ScopeFilter) -> Result<Vec<RetrievedExtract>> {
        let kb_id = scope.knowledgebase_id.as_deref().ok_or_else(|| {
            ScoutError::Retrieval(format!("project {} has no knowledge base", scope.project_id))
        })?;

        let url = format!(
            "{}/knowledgebases/{}/retrieve",
            self.config.endpoint.trim_end_matches('/'),
            kb_id
        );
        let body = serde_json::json!({
            "retrievalQuery": { "text": query },
            "retrievalConfiguration": {
                "vectorSearchConfiguration": {
                    "numberOfResults": k,
                    "overrideSearchType": "HYBRID"
                }
            }
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ScoutError::Retrieval(format!(
                "knowledge base {} returned {}: {}",
                kb_id, status, text
            )));
        }

        let parsed: RetrieveResponse = response.json().await?;
        debug!(kb_id, results = parsed.retrieval_results.len(), "Knowledge base search");

        let mut extracts = Vec::with_capacity(parsed.retrieval_results.len());
        for result in parsed.retrieval_results {
            let Some(uri) = result.source_uri().map(str::to_string) else {
                warn!("Dropping knowledge base result without a source URI");
                continue;
            };
            let Some((bucket, key)) = parse_s3_uri(&uri) else {
                warn!(uri = %uri, "Dropping knowledge base result with unparseable source URI");
                continue;
            };

            let (file, chunk) = self.link_provenance(scope, &bucket, &key)?;
            extracts.push(RetrievedExtract {
                content: result.content.text,
                metadata: ExtractMetadata {
                    source_id: uri,
                    score: result.score.unwrap_or(0.0),
                    chunk_id: Some(chunk.id),
                    file_id: Some(file.id),
                    page_num: Some(chunk.page_num),
                },
            });
        }

        Ok(extracts)
    }
}
