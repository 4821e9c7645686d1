//! Retrieval providers
//!
//! A [`RetrievalProvider`] returns the top-k text extracts for a query, scoped
//! to one project. Two backends exist: the local vector index
//! ([`local::LocalIndex`]) and a managed knowledge base
//! ([`knowledge_base::KnowledgeBaseProvider`]). The evaluator holds one of them
//! as a trait object and never branches on which.

pub mod knowledge_base;
pub mod local;

use crate::error::Result;
use crate::store::Store;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub use knowledge_base::{KnowledgeBaseConfig, KnowledgeBaseProvider};
pub use local::LocalIndex;

/// Restricts a search to one project's documents
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    pub project_id: Uuid,
    /// Knowledge base backing the project, if any
    pub knowledgebase_id: Option<String>,
}

impl ScopeFilter {
    pub fn for_project(project: &crate::types::Project) -> Self {
        Self {
            project_id: project.id,
            knowledgebase_id: project.knowledgebase_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractMetadata {
    /// Backend-specific source identifier (chunk id or object URI)
    pub source_id: String,
    pub score: f32,
    pub chunk_id: Option<Uuid>,
    pub file_id: Option<Uuid>,
    pub page_num: Option<i64>,
}

/// A text extract returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedExtract {
    pub content: String,
    pub metadata: ExtractMetadata,
}

#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    /// Top `k` extracts for `query`, best first; no hits is an empty vector
    async fn search(&self, query: &str, k: usize, scope: &ScopeFilter) -> Result<Vec<RetrievedExtract>>;
}

#[async_trait]
impl<R: RetrievalProvider + ?Sized> RetrievalProvider for std::sync::Arc<R> {
    async fn search(&self, query: &str, k: usize, scope: &ScopeFilter) -> Result<Vec<RetrievedExtract>> {
        (**self).search(query, k, scope).await
    }
}

pub const EXTRACTS_HEADER: &str = "Document extracts relevant to the query:\n\n";

/// Render extracts into the context block used in prompts
///
/// Each extract is annotated with its file's metadata. Extracts pointing at a
/// file the store no longer has are dropped.
pub fn format_extracts(store: &dyn Store, extracts: &[RetrievedExtract]) -> Result<String> {
    let mut prompt = String::from(EXTRACTS_HEADER);

    for extract in extracts {
        let (file_name, source, summary, date) = match extract.metadata.file_id {
            Some(file_id) => match store.file_by_id(file_id)? {
                Some(file) => (
                    file.display_name().to_string(),
                    file.source.unwrap_or_else(|| "None".to_string()),
                    file.summary.unwrap_or_else(|| "None".to_string()),
                    file.published_date.unwrap_or_else(|| "None".to_string()),
                ),
                None => {
                    warn!(file_id = %file_id, "Dropping extract for unknown file");
                    continue;
                }
            },
            None => (
                extract.metadata.source_id.clone(),
                "None".to_string(),
                "None".to_string(),
                "None".to_string(),
            ),
        };

        prompt.push_str(&format!(
            "File name: {}\nSource: {}\nSummary: {}\nPublished: {}\nExtract: {}\n\n",
            file_name, source, summary, date, extract.content
        ));
    }

    Ok(prompt)
}

/// Chunk ids of the extracts, in retrieval order, without duplicates
pub fn chunk_ids(extracts: &[RetrievedExtract]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for id in extracts.iter().filter_map(|e| e.metadata.chunk_id) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
