//! Persistence adapter
//!
//! The evaluator only talks to storage through [`Store`]. [`SqliteStore`]
//! implements it over the query functions in [`crate::db`].

use crate::db;
use crate::error::{Result, ScoutError};
use crate::types::*;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Storage contract used by the evaluation pipeline and its supplements
pub trait Store: Send + Sync {
    /// Persist a result and its chunk links, returning it with identity assigned
    fn write_result(&self, result: EvaluationResult) -> Result<EvaluationResult>;
    /// Insert a project and return it as stored
    fn write_project(&self, project: &Project) -> Result<Project>;
    /// Update a project's mutable fields and return it as stored
    fn update_project(&self, project: &Project) -> Result<Project>;
    fn project_by_id(&self, id: Uuid) -> Result<Option<Project>>;
    fn project_by_name(&self, name: &str) -> Result<Option<Project>>;

    fn write_criterion(&self, criterion: &Criterion) -> Result<()>;
    fn criteria_by_filter(&self, filter: &CriterionFilter) -> Result<Vec<Criterion>>;

    fn write_file(&self, file: &File) -> Result<()>;
    fn update_file(&self, file: &File) -> Result<()>;
    fn file_by_id(&self, id: Uuid) -> Result<Option<File>>;
    fn file_by_hash(&self, project_id: Uuid, hash: &str) -> Result<Option<File>>;
    fn file_by_location(&self, project_id: Uuid, bucket: &str, key: &str) -> Result<Option<File>>;

    fn write_chunk(&self, chunk: &Chunk) -> Result<()>;
    fn chunk_by_id(&self, id: Uuid) -> Result<Option<Chunk>>;
    fn chunks_for_file(&self, file_id: Uuid) -> Result<Vec<Chunk>>;

    fn result_by_id(&self, id: Uuid) -> Result<Option<EvaluationResult>>;
    fn results_for_project(&self, project_id: Uuid) -> Result<Vec<EvaluationResult>>;
    fn label_counts(&self, project_id: Uuid) -> Result<BTreeMap<String, i64>>;
    fn top_referenced_files(&self, project_id: Uuid, limit: usize) -> Result<Vec<ReferencedFile>>;

    fn write_chat_session(&self, session: &ChatSession) -> Result<()>;
    fn chat_session_by_id(&self, id: Uuid) -> Result<Option<ChatSession>>;
    fn chat_sessions_for_project(&self, project_id: Uuid) -> Result<Vec<ChatSession>>;
    fn write_chat_turn(&self, turn: &ChatTurn) -> Result<()>;
    fn chat_turns(&self, session_id: Uuid) -> Result<Vec<ChatTurn>>;
}

/// SQLite-backed store
///
/// Access is serialized through a mutex; callers never hold it across an await
/// because every method is synchronous.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(db::init_db(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::init_memory_db()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    /// Borrow the underlying connection (used by the local vector index)
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ScoutError::Config("database mutex poisoned".to_string()))
    }
}

fn stored_project(conn: &Connection, id: Uuid) -> Result<Project> {
    db::get_project(conn, id)?.ok_or_else(|| ScoutError::NotFound(format!("project {}", id)))
}

impl Store for SqliteStore {
    fn write_result(&self, mut result: EvaluationResult) -> Result<EvaluationResult> {
        let id = result.id.unwrap_or_else(Uuid::new_v4);
        if result.created_at.is_none() {
            result.created_at = Some(chrono::Utc::now());
        }
        db::insert_result(&*self.conn()?, id, &result)?;
        result.id = Some(id);
        Ok(result)
    }

    fn write_project(&self, project: &Project) -> Result<Project> {
        let conn = self.conn()?;
        db::insert_project(&conn, project)?;
        stored_project(&conn, project.id)
    }

    fn update_project(&self, project: &Project) -> Result<Project> {
        let conn = self.conn()?;
        match db::update_project(&conn, project)? {
            0 => Err(ScoutError::NotFound(format!("project {}", project.id))),
            _ => stored_project(&conn, project.id),
        }
    }

    fn project_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        db::get_project(&*self.conn()?, id)
    }

    fn project_by_name(&self, name: &str) -> Result<Option<Project>> {
        db::get_project_by_name(&*self.conn()?, name)
    }

    fn write_criterion(&self, criterion: &Criterion) -> Result<()> {
        db::insert_criterion(&*self.conn()?, criterion)
    }

    fn criteria_by_filter(&self, filter: &CriterionFilter) -> Result<Vec<Criterion>> {
        db::criteria_by_filter(&*self.conn()?, filter)
    }

    fn write_file(&self, file: &File) -> Result<()> {
        db::insert_file(&*self.conn()?, file)
    }

    fn update_file(&self, file: &File) -> Result<()> {
        match db::update_file(&*self.conn()?, file)? {
            0 => Err(ScoutError::NotFound(format!("file {}", file.id))),
            _ => Ok(()),
        }
    }

    fn file_by_id(&self, id: Uuid) -> Result<Option<File>> {
        db::get_file(&*self.conn()?, id)
    }

    fn file_by_hash(&self, project_id: Uuid, hash: &str) -> Result<Option<File>> {
        db::find_file_by_hash(&*self.conn()?, project_id, hash)
    }

    fn file_by_location(&self, project_id: Uuid, bucket: &str, key: &str) -> Result<Option<File>> {
        db::find_file_by_location(&*self.conn()?, project_id, bucket, key)
    }

    fn write_chunk(&self, chunk: &Chunk) -> Result<()> {
        db::insert_chunk(&*self.conn()?, chunk)
    }

    fn chunk_by_id(&self, id: Uuid) -> Result<Option<Chunk>> {
        db::get_chunk(&*self.conn()?, id)
    }

    fn chunks_for_file(&self, file_id: Uuid) -> Result<Vec<Chunk>> {
        db::chunks_for_file(&*self.conn()?, file_id)
    }

    fn result_by_id(&self, id: Uuid) -> Result<Option<EvaluationResult>> {
        db::get_result(&*self.conn()?, id)
    }

    fn results_for_project(&self, project_id: Uuid) -> Result<Vec<EvaluationResult>> {
        db::results_for_project(&*self.conn()?, project_id)
    }

    fn label_counts(&self, project_id: Uuid) -> Result<BTreeMap<String, i64>> {
        db::label_counts(&*self.conn()?, project_id)
    }

    fn top_referenced_files(&self, project_id: Uuid, limit: usize) -> Result<Vec<ReferencedFile>> {
        db::top_referenced_files(&*self.conn()?, project_id, limit)
    }

    fn write_chat_session(&self, session: &ChatSession) -> Result<()> {
        db::insert_chat_session(&*self.conn()?, session)
    }

    fn chat_session_by_id(&self, id: Uuid) -> Result<Option<ChatSession>> {
        db::get_chat_session(&*self.conn()?, id)
    }

    fn chat_sessions_for_project(&self, project_id: Uuid) -> Result<Vec<ChatSession>> {
        db::chat_sessions_for_project(&*self.conn()?, project_id)
    }

    fn write_chat_turn(&self, turn: &ChatTurn) -> Result<()> {
        db::insert_chat_turn(&*self.conn()?, turn)
    }

    fn chat_turns(&self, session_id: Uuid) -> Result<Vec<ChatTurn>> {
        db::chat_turns(&*self.conn()?, session_id)
    }
}
