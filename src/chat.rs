//! Retrieval-augmented chat over a project's documents
//!
//! Sessions belong to one project. Each question retrieves fresh extracts and
//! is sent together with the session's earlier turns.

use crate::error::{Result, ScoutError};
use crate::llm::{ChatMessage, ChatModel, Role};
use crate::prompts;
use crate::retrieval::{self, RetrievalProvider, ScopeFilter};
use crate::store::Store;
use crate::types::{ChatSession, ChatTurn, Criterion, Project};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Extracts retrieved per chat question
pub const CHAT_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub answer: String,
    pub documents_used: usize,
}

pub struct ChatEngine {
    store: Arc<dyn Store>,
    model: Arc<dyn ChatModel>,
    retrieval: Arc<dyn RetrievalProvider>,
}

impl ChatEngine {
    pub fn new(store: Arc<dyn Store>, model: Arc<dyn ChatModel>, retrieval: Arc<dyn RetrievalProvider>) -> Self {
        Self { store, model, retrieval }
    }

    pub fn start_session(&self, project: &Project, title: &str) -> Result<ChatSession> {
        let session = ChatSession {
            id: Uuid::new_v4(),
            project_id: project.id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.store.write_chat_session(&session)?;
        info!(session = %session.id, project = %project.name, "Chat session started");
        Ok(session)
    }

    pub fn sessions(&self, project: &Project) -> Result<Vec<ChatSession>> {
        self.store.chat_sessions_for_project(project.id)
    }

    pub fn history(&self, session_id: Uuid) -> Result<Vec<ChatTurn>> {
        if self.store.chat_session_by_id(session_id)?.is_none() {
            return Err(ScoutError::NotFound(format!("chat session {}", session_id)));
        }
        self.store.chat_turns(session_id)
    }

    /// Answer a question in a session, optionally anchored on a criterion
    pub async fn ask(&self, session: &ChatSession, question: &str, criterion: Option<&Criterion>) -> Result<ChatReply> {
        let project = self
            .store
            .project_by_id(session.project_id)?
            .ok_or_else(|| ScoutError::NotFound(format!("project {}", session.project_id)))?;

        let query = prompts::enhanced_query(criterion.map(|c| c.question.as_str()), question);
        let extracts = self
            .retrieval
            .search(&query, CHAT_RESULTS, &ScopeFilter::for_project(&project))
            .await?;
        let context = retrieval::format_extracts(self.store.as_ref(), &extracts)?;
        debug!(session = %session.id, documents = extracts.len(), "Chat context retrieved");

        let mut messages = Vec::new();
        for turn in self.store.chat_turns(session.id)? {
            let role: Role = turn.role.parse()?;
            messages.push(ChatMessage { role, content: turn.content });
        }
        let question_text = match criterion {
            Some(c) => format!("{}\n\n{}", c.question, question),
            None => question.to_string(),
        };
        messages.push(ChatMessage::user(prompts::chat_question(&context, &question_text)));

        let answer = self.model.invoke(&messages).await?;

        for (role, content) in [(Role::User, question), (Role::Assistant, answer.as_str())] {
            self.store.write_chat_turn(&ChatTurn {
                session_id: session.id,
                role: role.as_str().to_string(),
                content: content.to_string(),
                created_at: Utc::now(),
            })?;
        }

        Ok(ChatReply {
            answer,
            documents_used: extracts.len(),
        })
    }
}
