//! Batch evaluator
//!
//! Runs the evidence engine over an ordered list of criteria for one project.
//! Criteria are evaluated strictly in order because each answer refreshes the
//! hypothesis used by the next one. After a batch, a short summary of all
//! answers is written to the project.

use crate::config::AppContext;
use crate::error::{Result, ScoutError};
use crate::evidence::{EvidenceEngine, EvidenceOptions};
use crate::labels;
use crate::llm::{ChatMessage, ChatModel};
use crate::prompts;
use crate::retrieval::RetrievalProvider;
use crate::store::Store;
use crate::types::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Hypothesis value before the first criterion of a run
pub const INITIAL_HYPOTHESIS: &str = "None";

pub struct BatchEvaluator {
    project: Project,
    store: Arc<dyn Store>,
    model: Arc<dyn ChatModel>,
    engine: EvidenceEngine,
    hypothesis: String,
    run_id: Uuid,
}

impl BatchEvaluator {
    pub fn new(
        project: Project,
        store: Arc<dyn Store>,
        model: Arc<dyn ChatModel>,
        retrieval: Arc<dyn RetrievalProvider>,
        options: EvidenceOptions,
    ) -> Self {
        let engine = EvidenceEngine::new(Arc::clone(&store), Arc::clone(&model), retrieval, options);
        Self {
            project,
            store,
            model,
            engine,
            hypothesis: INITIAL_HYPOTHESIS.to_string(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn hypothesis(&self) -> &str {
        &self.hypothesis
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Evaluate one criterion, carrying the hypothesis forward
    pub async fn evaluate_single(&mut self, criterion: &Criterion, save: bool) -> Result<EvaluationResult> {
        let answer = self.engine.answer(criterion, &self.project, &self.hypothesis).await?;

        let (label, full_text) = labels::extract_label(&answer.raw_text);
        let chunks = self.resolve_chunks(&answer.chunk_ids)?;

        let result = EvaluationResult {
            id: None,
            run_id: self.run_id,
            criterion_id: criterion.id,
            project_id: self.project.id,
            answer: label,
            full_text,
            chunks,
            created_at: None,
        };

        let result = if save { self.store.write_result(result)? } else { result };

        // Only a completed criterion moves the hypothesis on
        self.hypothesis = answer.hypothesis;
        Ok(result)
    }

    /// Evaluate criteria in order, then summarise the answers onto the project
    ///
    /// A failure stops the batch; results already saved stay saved.
    pub async fn evaluate(&mut self, criteria: &[Criterion], save: bool) -> Result<Vec<EvaluationResult>> {
        if criteria.is_empty() {
            info!(project = %self.project.name, "No criteria to evaluate");
            return Ok(Vec::new());
        }

        info!("Evaluating questions...");
        let mut results = Vec::with_capacity(criteria.len());
        let mut pairs = Vec::with_capacity(criteria.len());

        for (idx, criterion) in criteria.iter().enumerate() {
            let result = self.evaluate_single(criterion, save).await?;
            pairs.push((criterion.question.clone(), result.full_text.clone()));
            results.push(result);
            if idx % 5 == 0 {
                info!("{} criteria complete", idx);
            }
        }

        info!("Generating summary of answers...");
        let summary = self.generate_summary(&pairs).await?;
        self.project.results_summary = Some(summary);
        self.project = self.store.update_project(&self.project)?;

        Ok(results)
    }

    /// Ask the model for a short summary of question/answer pairs
    pub async fn generate_summary(&self, pairs: &[(String, String)]) -> Result<String> {
        self.model
            .invoke(&[ChatMessage::user(prompts::summarize_responses(pairs))])
            .await
    }

    fn resolve_chunks(&self, ids: &[Uuid]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.chunk_by_id(*id)? {
                Some(chunk) => chunks.push(chunk),
                None => warn!(chunk_id = %id, "Dropping unresolvable chunk reference"),
            }
        }
        Ok(chunks)
    }
}

/// Criteria visible to a project: shared criteria plus its own custom ones
pub fn criteria_for_project(store: &dyn Store, project: &Project, gate: Option<Gate>) -> Result<Vec<Criterion>> {
    let criteria = store.criteria_by_filter(&CriterionFilter { gate, project_id: None })?;
    Ok(criteria
        .into_iter()
        .filter(|c| c.project_ids.is_empty() || c.project_ids.contains(&project.id))
        .collect())
}

/// Criteria visible to the project that have no stored result yet
pub fn criteria_without_results(store: &dyn Store, project: &Project, gate: Option<Gate>) -> Result<Vec<Criterion>> {
    let answered: HashSet<Uuid> = store
        .results_for_project(project.id)?
        .into_iter()
        .map(|r| r.criterion_id)
        .collect();

    Ok(criteria_for_project(store, project, gate)?
        .into_iter()
        .filter(|c| !answered.contains(&c.id))
        .collect())
}

/// Evaluate a gate's criteria for the named project and save the results
pub async fn evaluate_gate(
    ctx: &AppContext,
    project_name: &str,
    gate: Gate,
    only_missing: bool,
) -> Result<Vec<EvaluationResult>> {
    let store = ctx.store();
    let project = store
        .project_by_name(project_name)?
        .ok_or_else(|| ScoutError::NotFound(format!("project '{}'", project_name)))?;

    let criteria = if only_missing {
        criteria_without_results(store.as_ref(), &project, Some(gate))?
    } else {
        criteria_for_project(store.as_ref(), &project, Some(gate))?
    };
    info!("{} criteria loaded", criteria.len());

    let mut evaluator = ctx.evaluator(project)?;
    evaluator.evaluate(&criteria, true).await
}
