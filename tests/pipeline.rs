//! End-to-end evaluation runs against an in-memory store and scripted model

mod common;

use common::{KeywordEmbedder, MockModel, StaticRetrieval};
use scout::llm::Role;
use scout::prompts::{CORE_PERSONA, SYSTEM_QUESTION};
use scout::retrieval::{ExtractMetadata, LocalIndex};
use scout::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ============================================================================
// Fixtures
// ============================================================================

/// Store that records write_result / update_project calls in order
struct RecordingStore {
    inner: SqliteStore,
    events: Mutex<Vec<String>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Store for RecordingStore {
    fn write_result(&self, result: EvaluationResult) -> scout::Result<EvaluationResult> {
        self.events.lock().unwrap().push(format!("write_result:{}", result.criterion_id));
        self.inner.write_result(result)
    }
    fn write_project(&self, project: &Project) -> scout::Result<Project> {
        self.inner.write_project(project)
    }
    fn update_project(&self, project: &Project) -> scout::Result<Project> {
        self.events.lock().unwrap().push("update_project".to_string());
        self.inner.update_project(project)
    }
    fn project_by_id(&self, id: Uuid) -> scout::Result<Option<Project>> {
        self.inner.project_by_id(id)
    }
    fn project_by_name(&self, name: &str) -> scout::Result<Option<Project>> {
        self.inner.project_by_name(name)
    }
    fn write_criterion(&self, criterion: &Criterion) -> scout::Result<()> {
        self.inner.write_criterion(criterion)
    }
    fn criteria_by_filter(&self, filter: &CriterionFilter) -> scout::Result<Vec<Criterion>> {
        self.inner.criteria_by_filter(filter)
    }
    fn write_file(&self, file: &File) -> scout::Result<()> {
        self.inner.write_file(file)
    }
    fn update_file(&self, file: &File) -> scout::Result<()> {
        self.inner.update_file(file)
    }
    fn file_by_id(&self, id: Uuid) -> scout::Result<Option<File>> {
        self.inner.file_by_id(id)
    }
    fn file_by_hash(&self, project_id: Uuid, hash: &str) -> scout::Result<Option<File>> {
        self.inner.file_by_hash(project_id, hash)
    }
    fn file_by_location(&self, project_id: Uuid, bucket: &str, key: &str) -> scout::Result<Option<File>> {
        self.inner.file_by_location(project_id, bucket, key)
    }
    fn write_chunk(&self, chunk: &Chunk) -> scout::Result<()> {
        self.inner.write_chunk(chunk)
    }
    fn chunk_by_id(&self, id: Uuid) -> scout::Result<Option<Chunk>> {
        self.inner.chunk_by_id(id)
    }
    fn chunks_for_file(&self, file_id: Uuid) -> scout::Result<Vec<Chunk>> {
        self.inner.chunks_for_file(file_id)
    }
    fn result_by_id(&self, id: Uuid) -> scout::Result<Option<EvaluationResult>> {
        self.inner.result_by_id(id)
    }
    fn results_for_project(&self, project_id: Uuid) -> scout::Result<Vec<EvaluationResult>> {
        self.inner.results_for_project(project_id)
    }
    fn label_counts(&self, project_id: Uuid) -> scout::Result<BTreeMap<String, i64>> {
        self.inner.label_counts(project_id)
    }
    fn top_referenced_files(&self, project_id: Uuid, limit: usize) -> scout::Result<Vec<ReferencedFile>> {
        self.inner.top_referenced_files(project_id, limit)
    }
    fn write_chat_session(&self, session: &ChatSession) -> scout::Result<()> {
        self.inner.write_chat_session(session)
    }
    fn chat_session_by_id(&self, id: Uuid) -> scout::Result<Option<ChatSession>> {
        self.inner.chat_session_by_id(id)
    }
    fn chat_sessions_for_project(&self, project_id: Uuid) -> scout::Result<Vec<ChatSession>> {
        self.inner.chat_sessions_for_project(project_id)
    }
    fn write_chat_turn(&self, turn: &ChatTurn) -> scout::Result<()> {
        self.inner.write_chat_turn(turn)
    }
    fn chat_turns(&self, session_id: Uuid) -> scout::Result<Vec<ChatTurn>> {
        self.inner.chat_turns(session_id)
    }
}

/// Model scripted by prompt shape: evidence, main question, hypothesis, summary
fn scripted_model(main_answer: &'static str) -> Arc<MockModel> {
    Arc::new(MockModel::new(move |messages| {
        let first = &messages[0];
        if first.role == Role::System {
            Ok("The board approved the budget.".to_string())
        } else if first.content.starts_with(SYSTEM_QUESTION) {
            Ok(main_answer.to_string())
        } else if first.content.starts_with(CORE_PERSONA) {
            Ok("The project appears well funded.".to_string())
        } else {
            Ok("Funding is secure and governance is in place.".to_string())
        }
    }))
}

fn seed_document(store: &dyn Store, project: &Project) -> Chunk {
    let file = File::new(project.id, "business_case.txt");
    store.write_file(&file).unwrap();
    let chunk = Chunk::new(file.id, 0, "The approved budget is 10m with 15% contingency.", 1);
    store.write_chunk(&chunk).unwrap();
    chunk
}

fn extract_for(chunk: &Chunk) -> RetrievedExtract {
    RetrievedExtract {
        content: chunk.text.clone(),
        metadata: ExtractMetadata {
            source_id: chunk.id.to_string(),
            score: 0.92,
            chunk_id: Some(chunk.id),
            file_id: chunk.file_id,
            page_num: Some(chunk.page_num),
        },
    }
}

fn is_evidence_call(messages: &[ChatMessage]) -> bool {
    messages[0].role == Role::System
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_single_criterion_labelled_and_saved() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let project = Project::new("Alpha");
    store.write_project(&project).unwrap();
    let chunk = seed_document(store.as_ref(), &project);

    let criterion = Criterion::new(
        Gate::Gate2,
        "Finance",
        "Is the budget adequate?",
        "Budget approved by board_Contingency allowance set",
    );
    store.write_criterion(&criterion).unwrap();

    let model = scripted_model("Budget looks adequate. [Positive]");
    let retrieval = Arc::new(StaticRetrieval::new(vec![extract_for(&chunk)]));
    let mut evaluator = BatchEvaluator::new(
        project.clone(),
        store.clone(),
        model.clone(),
        retrieval.clone(),
        EvidenceOptions::default(),
    );

    let result = evaluator.evaluate_single(&criterion, true).await.unwrap();

    assert_eq!(result.answer, Label::Positive);
    assert_eq!(result.full_text, "Budget looks adequate.");
    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].id, chunk.id);
    assert!(result.id.is_some());
    assert_eq!(evaluator.hypothesis(), "The project appears well funded.");

    // Two evidence points, then the main question, then the hypothesis refresh
    let calls = model.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls.iter().filter(|c| is_evidence_call(c)).count(), 2);
    assert_eq!(
        retrieval.queries(),
        vec![
            "Budget approved by board".to_string(),
            "Contingency allowance set".to_string(),
            "Is the budget adequate?".to_string(),
        ]
    );
    assert!(calls[2][0].content.contains("business_case.txt"));
    assert!(calls[2][0].content.contains("question: Budget approved by board answer: The board approved the budget."));
}

#[tokio::test]
async fn test_batch_writes_results_in_order_then_summary() {
    let store = Arc::new(RecordingStore::new());
    let project = Project::new("Alpha");
    store.write_project(&project).unwrap();
    let chunk = seed_document(store.as_ref(), &project);

    let criteria: Vec<Criterion> = [
        ("Finance", "Is the budget adequate?"),
        ("Delivery", "Is the schedule realistic?"),
        ("Governance", "Is there a named SRO?"),
    ]
    .iter()
    .map(|(category, question)| Criterion::new(Gate::Gate2, category, question, ""))
    .collect();
    for criterion in &criteria {
        store.write_criterion(criterion).unwrap();
    }

    let model = scripted_model("Mostly there. [Neutral]");
    let retrieval = Arc::new(StaticRetrieval::new(vec![extract_for(&chunk)]));
    let mut evaluator = BatchEvaluator::new(
        project.clone(),
        store.clone(),
        model.clone(),
        retrieval,
        EvidenceOptions::default(),
    );

    let results = evaluator.evaluate(&criteria, true).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.answer == Label::Neutral));
    assert!(results.iter().all(|r| r.run_id == evaluator.run_id()));

    let mut expected: Vec<String> = criteria.iter().map(|c| format!("write_result:{}", c.id)).collect();
    expected.push("update_project".to_string());
    assert_eq!(store.events(), expected);

    let saved = store.project_by_id(project.id).unwrap().unwrap();
    assert_eq!(
        saved.results_summary.as_deref(),
        Some("Funding is secure and governance is in place.")
    );

    // Empty evidence fields mean no evidence calls at all
    assert_eq!(model.calls().iter().filter(|c| is_evidence_call(c)).count(), 0);
    // Two calls per criterion plus one summary
    assert_eq!(model.call_count(), 7);
}

#[tokio::test]
async fn test_failure_mid_batch_keeps_saved_results_and_skips_summary() {
    let store = Arc::new(RecordingStore::new());
    let project = Project::new("Alpha");
    store.write_project(&project).unwrap();

    let criteria: Vec<Criterion> = ["Is there a clear need?", "Are options appraised?", "Is funding agreed?"]
        .iter()
        .map(|question| Criterion::new(Gate::Gate1, "Strategy", question, ""))
        .collect();
    for criterion in &criteria {
        store.write_criterion(criterion).unwrap();
    }

    // The second criterion's main question is rejected by the model
    let main_calls = Arc::new(AtomicUsize::new(0));
    let model = Arc::new(MockModel::new({
        let main_calls = Arc::clone(&main_calls);
        move |messages| {
            if messages[0].content.starts_with(SYSTEM_QUESTION) && main_calls.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(ScoutError::Llm("400 invalid_request_error".to_string()));
            }
            Ok("Clear need. [Positive]".to_string())
        }
    }));
    let mut evaluator = BatchEvaluator::new(
        project.clone(),
        store.clone(),
        model,
        Arc::new(StaticRetrieval::new(vec![])),
        EvidenceOptions::default(),
    );

    let err = evaluator.evaluate(&criteria, true).await.unwrap_err();
    assert!(matches!(err, ScoutError::Llm(_)));

    assert_eq!(store.events(), vec![format!("write_result:{}", criteria[0].id)]);
    assert_eq!(store.results_for_project(project.id).unwrap().len(), 1);
    assert!(store.project_by_id(project.id).unwrap().unwrap().results_summary.is_none());
    assert_eq!(main_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_batch_writes_nothing() {
    let store = Arc::new(RecordingStore::new());
    let project = Project::new("Alpha");
    store.write_project(&project).unwrap();

    let model = scripted_model("unused");
    let mut evaluator = BatchEvaluator::new(
        project,
        store.clone(),
        model.clone(),
        Arc::new(StaticRetrieval::new(vec![])),
        EvidenceOptions::default(),
    );

    assert!(evaluator.evaluate(&[], true).await.unwrap().is_empty());
    assert!(store.events().is_empty());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_unsaved_result_not_persisted() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let project = Project::new("Alpha");
    store.write_project(&project).unwrap();
    let criterion = Criterion::new(Gate::Gate1, "Strategy", "Is there a clear need?", "");
    store.write_criterion(&criterion).unwrap();

    let mut evaluator = BatchEvaluator::new(
        project.clone(),
        store.clone(),
        scripted_model("No business case found. [Negative]"),
        Arc::new(StaticRetrieval::new(vec![])),
        EvidenceOptions::default(),
    );

    let result = evaluator.evaluate_single(&criterion, false).await.unwrap();
    assert_eq!(result.answer, Label::Negative);
    assert!(result.id.is_none());
    assert!(store.results_for_project(project.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_saved_result_round_trips_with_chunks() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let project = Project::new("Alpha");
    store.write_project(&project).unwrap();
    let chunk = seed_document(store.as_ref(), &project);
    let criterion = Criterion::new(Gate::Gate3, "Finance", "Is the budget adequate?", "");
    store.write_criterion(&criterion).unwrap();

    let mut evaluator = BatchEvaluator::new(
        project.clone(),
        store.clone(),
        scripted_model("Budget looks adequate. [Positive]"),
        Arc::new(StaticRetrieval::new(vec![extract_for(&chunk)])),
        EvidenceOptions::default(),
    );
    let saved = evaluator.evaluate_single(&criterion, true).await.unwrap();

    let loaded = store.result_by_id(saved.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.answer, Label::Positive);
    assert_eq!(loaded.full_text, "Budget looks adequate.");
    assert_eq!(loaded.criterion_id, criterion.id);
    assert_eq!(loaded.chunks.len(), 1);
    assert_eq!(loaded.chunks[0].text, chunk.text);

    let counts = store.label_counts(project.id).unwrap();
    assert_eq!(counts.get("Positive"), Some(&1));

    // Already answered, so nothing is missing for this gate
    assert!(criteria_without_results(store.as_ref(), &project, Some(Gate::Gate3))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_local_index_feeds_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.txt");
    std::fs::write(
        &path,
        "The project budget is fully costed.\x0cStaff turnover is the main schedule risk.",
    )
    .unwrap();

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let project = Project::new("Alpha");
    store.write_project(&project).unwrap();
    let index = Arc::new(LocalIndex::new(store.clone(), Arc::new(KeywordEmbedder::default())));

    let file = documents::ingest_document(store.as_ref(), &index, &project, &path).unwrap();
    assert_eq!(store.chunks_for_file(file.id).unwrap().len(), 2);

    let criterion = Criterion::new(Gate::Gate2, "Finance", "Is the budget costed?", "");
    store.write_criterion(&criterion).unwrap();
    let mut evaluator = BatchEvaluator::new(
        project,
        store.clone(),
        scripted_model("Costed. [Positive]"),
        index,
        EvidenceOptions { k: 1, ..EvidenceOptions::default() },
    );

    let result = evaluator.evaluate_single(&criterion, true).await.unwrap();
    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].text, "The project budget is fully costed.");
    assert_eq!(result.chunks[0].page_num, 1);
}
