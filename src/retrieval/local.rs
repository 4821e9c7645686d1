//! Local vector index
//!
//! Chunk embeddings live in the `chunks.embedding` column. A search embeds the
//! query and scans every embedded chunk of the scoped project with cosine
//! similarity.

use super::{ExtractMetadata, RetrievalProvider, RetrievedExtract, ScopeFilter};
use crate::db;
use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{Result, ScoutError};
use crate::store::SqliteStore;
use crate::types::{Chunk, File};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct LocalIndex {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
}

impl LocalIndex {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Store a file with its chunks and their vectors
    ///
    /// Every chunk is embedded before anything is written, and the rows go in
    /// one transaction, so a failure leaves no trace of the file.
    pub fn add_document(&self, file: &File, chunks: &[Chunk]) -> Result<()> {
        let embeddings = chunks
            .iter()
            .map(|chunk| self.embedder.embed(&chunk.text))
            .collect::<Result<Vec<_>>>()?;

        let conn = self.store.conn()?;
        let tx = conn.unchecked_transaction()?;
        db::insert_file(&tx, file)?;
        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            db::insert_chunk(&tx, chunk)?;
            db::set_chunk_embedding(&tx, chunk.id, embedding)?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Embed the query and rank the project's chunks by cosine similarity
fn rank(
    store: &SqliteStore,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    project_id: Uuid,
) -> Result<Vec<RetrievedExtract>> {
    let query_embedding = embedder.embed(query)?;
    let candidates = db::chunk_embeddings_for_project(&*store.conn()?, project_id)?;
    debug!(candidates = candidates.len(), k, "Scanning local index");

    let mut scored: Vec<(f32, Chunk)> = candidates
        .into_iter()
        .map(|(chunk, embedding)| (cosine_similarity(&query_embedding, &embedding), chunk))
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(score, chunk)| RetrievedExtract {
            metadata: ExtractMetadata {
                source_id: chunk.id.to_string(),
                score,
                chunk_id: Some(chunk.id),
                file_id: chunk.file_id,
                page_num: Some(chunk.page_num),
            },
            content: chunk.text,
        })
        .collect())
}

#[async_trait]
impl RetrievalProvider for LocalIndex {
    async fn search(&self, query: &str, k: usize, scope: &ScopeFilter) -> Result<Vec<RetrievedExtract>> {
        let store = Arc::clone(&self.store);
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        let project_id = scope.project_id;

        // Inference and the table scan are blocking work
        tokio::task::spawn_blocking(move || rank(&store, embedder.as_ref(), &query, k, project_id))
            .await
            .map_err(|e| ScoutError::Retrieval(format!("local search task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::KeywordEmbedder;
    use crate::store::Store;
    use crate::types::Project;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    fn seed(index: &LocalIndex, project: &Project, texts: &[&str]) -> Vec<Chunk> {
        let file = File::new(project.id, "plan.txt");
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(file.id, i as i64, text, 1))
            .collect();
        index.add_document(&file, &chunks).unwrap();
        chunks
    }

    /// Waits for a signal from the test before embedding
    struct GatedEmbedder {
        gate: Mutex<mpsc::Receiver<()>>,
        inner: KeywordEmbedder,
    }

    impl Embedder for GatedEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.gate
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5))
                .map_err(|_| ScoutError::Embedding("gate never opened".to_string()))?;
            self.inner.embed(text)
        }
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let index = LocalIndex::new(Arc::clone(&store), Arc::new(KeywordEmbedder::default()));
        let project = Project::new("Alpha");
        store.write_project(&project).unwrap();
        let chunks = seed(&index, &project, &[
            "The schedule slipped by two months",
            "Budget contingency is five percent of the budget",
            "Staff turnover is a key risk",
        ]);

        let hits = index
            .search("budget", 2, &ScopeFilter::for_project(&project))
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.chunk_id, Some(chunks[1].id));
        assert!(hits[0].metadata.score >= hits[1].metadata.score);
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_project() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let index = LocalIndex::new(Arc::clone(&store), Arc::new(KeywordEmbedder::default()));
        let alpha = Project::new("Alpha");
        let beta = Project::new("Beta");
        store.write_project(&alpha).unwrap();
        store.write_project(&beta).unwrap();
        seed(&index, &beta, &["Budget overrun in beta"]);

        let hits = index.search("budget", 3, &ScopeFilter::for_project(&alpha)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_leaves_runtime_free() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let project = Project::new("Alpha");
        store.write_project(&project).unwrap();
        seed(
            &LocalIndex::new(Arc::clone(&store), Arc::new(KeywordEmbedder::default())),
            &project,
            &["Budget approved"],
        );

        let (open_gate, gate) = mpsc::channel();
        let embedder = GatedEmbedder { gate: Mutex::new(gate), inner: KeywordEmbedder::default() };
        let index = Arc::new(LocalIndex::new(Arc::clone(&store), Arc::new(embedder)));

        let scope = ScopeFilter::for_project(&project);
        let search = tokio::spawn({
            let index = Arc::clone(&index);
            async move { index.search("budget", 1, &scope).await }
        });

        // On a single-threaded runtime this only runs if the search yielded
        tokio::task::yield_now().await;
        open_gate.send(()).unwrap();

        let hits = search.await.unwrap().unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_failed_embedding_writes_nothing() {
        struct Broken;
        impl Embedder for Broken {
            fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(ScoutError::Embedding("model missing".to_string()))
            }
        }

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let project = Project::new("Alpha");
        store.write_project(&project).unwrap();
        let index = LocalIndex::new(Arc::clone(&store), Arc::new(Broken));

        let file = File::new(project.id, "plan.txt");
        let chunk = Chunk::new(file.id, 0, "Budget approved", 1);
        assert!(index.add_document(&file, &[chunk]).is_err());
        assert!(store.file_by_id(file.id).unwrap().is_none());
    }
}
