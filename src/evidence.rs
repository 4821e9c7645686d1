//! Evidence answering engine
//!
//! Answers one criterion for one project:
//! 1. each evidence point is answered from its own retrieval,
//! 2. the main question is answered with the running hypothesis and those answers,
//! 3. the hypothesis is rewritten in light of the new answer.
//!
//! The engine holds no state between criteria; the caller passes the current
//! hypothesis in and receives the refreshed one back.

use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel};
use crate::prompts;
use crate::retrieval::{self, RetrievalProvider, ScopeFilter};
use crate::store::Store;
use crate::types::{Criterion, Project};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Marker used in prompts when a criterion has no evidence points
pub const NO_EVIDENCE: &str = "None";

/// Minimum length of an evidence fragment worth asking about
const MIN_EVIDENCE_LEN: usize = 5;

#[derive(Debug, Clone)]
pub struct EvidenceOptions {
    /// Extracts retrieved per query
    pub k: usize,
    /// Separator between evidence points in a criterion's evidence field
    pub delimiter: String,
}

impl Default for EvidenceOptions {
    fn default() -> Self {
        Self {
            k: 3,
            delimiter: "_".to_string(),
        }
    }
}

/// Output of answering one criterion
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Narrative including the label token
    pub raw_text: String,
    /// Chunks retrieved for the main question, in retrieval order
    pub chunk_ids: Vec<Uuid>,
    /// Refreshed hypothesis to carry into the next criterion
    pub hypothesis: String,
}

/// Split an evidence field into the points worth asking about
pub fn evidence_points(evidence: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        let point = evidence.trim();
        return if point.chars().count() >= MIN_EVIDENCE_LEN {
            vec![point.to_string()]
        } else {
            Vec::new()
        };
    }

    evidence
        .split(delimiter)
        .map(str::trim)
        .filter(|p| p.chars().count() >= MIN_EVIDENCE_LEN)
        .map(str::to_string)
        .collect()
}

pub struct EvidenceEngine {
    store: Arc<dyn Store>,
    model: Arc<dyn ChatModel>,
    retrieval: Arc<dyn RetrievalProvider>,
    options: EvidenceOptions,
}

impl EvidenceEngine {
    pub fn new(
        store: Arc<dyn Store>,
        model: Arc<dyn ChatModel>,
        retrieval: Arc<dyn RetrievalProvider>,
        options: EvidenceOptions,
    ) -> Self {
        Self { store, model, retrieval, options }
    }

    pub fn options(&self) -> &EvidenceOptions {
        &self.options
    }

    /// Answer a criterion for a project given the current hypothesis
    pub async fn answer(&self, criterion: &Criterion, project: &Project, hypothesis: &str) -> Result<Answer> {
        match self.answer_inner(criterion, project, hypothesis).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                error!(criterion = %criterion.id, project = %project.id, "An error occurred: {}", e);
                Err(e)
            }
        }
    }

    async fn answer_inner(&self, criterion: &Criterion, project: &Project, hypothesis: &str) -> Result<Answer> {
        let scope = ScopeFilter::for_project(project);
        let evidence_answers = self.answer_evidence_points(criterion, &scope).await?;

        let extracts = self.retrieval.search(&criterion.question, self.options.k, &scope).await?;
        let context = retrieval::format_extracts(self.store.as_ref(), &extracts)?;
        let chunk_ids = retrieval::chunk_ids(&extracts);

        let raw_text = self
            .model
            .invoke(&[ChatMessage::user(prompts::main_question(
                hypothesis,
                &criterion.question,
                &context,
                &evidence_answers,
            ))])
            .await?;

        let refreshed = self
            .model
            .invoke(&[ChatMessage::user(prompts::regenerate_hypothesis(
                hypothesis,
                &criterion.question,
                &raw_text,
                &context,
                &evidence_answers,
            ))])
            .await?;

        Ok(Answer {
            raw_text,
            chunk_ids,
            hypothesis: refreshed,
        })
    }

    /// Answer each evidence point; `"None"` when there are none
    async fn answer_evidence_points(&self, criterion: &Criterion, scope: &ScopeFilter) -> Result<String> {
        if criterion.evidence.trim().is_empty() {
            return Ok(NO_EVIDENCE.to_string());
        }

        let points = evidence_points(&criterion.evidence, &self.options.delimiter);
        debug!(criterion = %criterion.id, points = points.len(), "Answering evidence points");

        let mut pairs = Vec::with_capacity(points.len());
        for point in &points {
            let extracts = self.retrieval.search(point, self.options.k, scope).await?;
            let context = retrieval::format_extracts(self.store.as_ref(), &extracts)?;

            let answer = self
                .model
                .invoke(&[
                    ChatMessage::system(prompts::SYSTEM_EVIDENCE_POINTS),
                    ChatMessage::user(prompts::evidence_point_question(&criterion.question, point, &context)),
                ])
                .await?;

            pairs.push(format!("question: {} answer: {}", point, answer));
        }

        if pairs.is_empty() {
            return Ok(NO_EVIDENCE.to_string());
        }
        Ok(pairs.join("\n"))
    }
}
