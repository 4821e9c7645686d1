//! Test doubles for the model, retrieval and embedding seams
//!
//! Deterministic stand-ins used by the unit tests.

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel};
use crate::retrieval::{RetrievalProvider, RetrievedExtract, ScopeFilter};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

type Responder = dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync;

/// Chat model answering through a closure and recording every call
pub struct MockModel {
    responder: Box<Responder>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl ChatModel for MockModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        lock(&self.calls).push(messages.to_vec());
        (self.responder)(messages)
    }
}

/// Retrieval returning a fixed list of extracts and recording queries
pub struct StaticRetrieval {
    extracts: Vec<RetrievedExtract>,
    queries: Mutex<Vec<String>>,
}

impl StaticRetrieval {
    pub fn new(extracts: Vec<RetrievedExtract>) -> Self {
        Self {
            extracts,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl RetrievalProvider for StaticRetrieval {
    async fn search(&self, query: &str, k: usize, _scope: &ScopeFilter) -> Result<Vec<RetrievedExtract>> {
        lock(&self.queries).push(query.to_string());
        Ok(self.extracts.iter().take(k).cloned().collect())
    }
}

/// Bag-of-keywords embedder: one dimension per vocabulary term
///
/// A word counts towards a term when it starts with it, so "budgets" hits
/// "budget".
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new(&[
            "budget", "cost", "contingency", "schedule", "risk", "staff",
            "benefit", "procurement", "stakeholder", "governance",
        ])
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.vocabulary.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            for (i, term) in self.vocabulary.iter().enumerate() {
                if word.starts_with(term.as_str()) {
                    vector[i] += 1.0;
                }
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_embedder_counts_terms() {
        let embedder = KeywordEmbedder::new(&["budget", "risk"]);
        assert_eq!(embedder.embed("Budgets and budget RISKS").unwrap(), vec![2.0, 1.0]);
        assert_eq!(embedder.embed("nothing here").unwrap(), vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_mock_model_records_calls() {
        let model = MockModel::fixed("ok");
        model.invoke(&[ChatMessage::user("one")]).await.unwrap();
        model.invoke(&[ChatMessage::user("two")]).await.unwrap();
        assert_eq!(model.call_count(), 2);
        assert_eq!(model.calls()[1][0].content, "two");
    }
}
