//! Database layer for Scout
//!
//! SQLite schema and plain query functions over a [`Connection`]. The
//! [`crate::store::SqliteStore`] adapter wraps these behind the `Store` trait;
//! binaries and tests may also call them directly.
//!
//! Identifiers are stored as hyphenated UUID text, timestamps as RFC 3339.

use crate::embeddings::{bytes_to_embedding, embedding_to_bytes};
use crate::error::Result;
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Initialize the database with schema
pub fn init_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// In-memory database with schema, for tests and dry runs
pub fn init_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    results_summary TEXT,
    knowledgebase_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_projects_name ON projects(name);

CREATE TABLE IF NOT EXISTS criteria (
    id TEXT PRIMARY KEY,
    gate TEXT NOT NULL,
    category TEXT NOT NULL,
    question TEXT NOT NULL,
    evidence TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_criteria_gate ON criteria(gate);

CREATE TABLE IF NOT EXISTS project_criteria (
    project_id TEXT NOT NULL REFERENCES projects(id),
    criterion_id TEXT NOT NULL REFERENCES criteria(id),
    PRIMARY KEY (project_id, criterion_id)
);

CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    project_id TEXT REFERENCES projects(id),
    name TEXT NOT NULL,
    file_type TEXT NOT NULL,
    clean_name TEXT,
    summary TEXT,
    source TEXT,
    published_date TEXT,
    s3_bucket TEXT,
    s3_key TEXT,
    storage_kind TEXT NOT NULL DEFAULT 'local',
    content_hash TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_files_project ON files(project_id);
CREATE INDEX IF NOT EXISTS idx_files_hash ON files(content_hash);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    file_id TEXT REFERENCES files(id),
    idx INTEGER NOT NULL,
    text TEXT NOT NULL,
    page_num INTEGER NOT NULL,
    embedding BLOB,             -- little-endian f32, see embeddings.rs
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);

-- Results are append-only; one row per (criterion, project, run)
CREATE TABLE IF NOT EXISTS results (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL,
    criterion_id TEXT NOT NULL REFERENCES criteria(id),
    project_id TEXT NOT NULL REFERENCES projects(id),
    answer TEXT NOT NULL,
    full_text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(criterion_id, project_id, run_id)
);

CREATE INDEX IF NOT EXISTS idx_results_project ON results(project_id);

CREATE TABLE IF NOT EXISTS result_chunks (
    result_id TEXT NOT NULL REFERENCES results(id),
    chunk_id TEXT NOT NULL REFERENCES chunks(id),
    position INTEGER NOT NULL,
    PRIMARY KEY (result_id, chunk_id)
);

CREATE TABLE IF NOT EXISTS chat_sessions (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id),
    title TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES chat_sessions(id),
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_turns_session ON chat_turns(session_id);
"#;

// ============================================================================
// Column helpers
// ============================================================================

fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_opt_uuid(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        Uuid::parse_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn get_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_parsed<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

// ============================================================================
// Projects
// ============================================================================

const PROJECT_COLUMNS: &str = "id, name, results_summary, knowledgebase_id";

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        results_summary: row.get(2)?,
        knowledgebase_id: row.get(3)?,
    })
}

pub fn insert_project(conn: &Connection, project: &Project) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (id, name, results_summary, knowledgebase_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            project.id.to_string(),
            project.name,
            project.results_summary,
            project.knowledgebase_id,
            now(),
        ],
    )?;
    Ok(())
}

/// Update mutable project fields; returns the number of rows touched
pub fn update_project(conn: &Connection, project: &Project) -> Result<usize> {
    let rows = conn.execute(
        "UPDATE projects
         SET name = ?2, results_summary = ?3, knowledgebase_id = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            project.id.to_string(),
            project.name,
            project.results_summary,
            project.knowledgebase_id,
            now(),
        ],
    )?;
    Ok(rows)
}

pub fn get_project(conn: &Connection, id: Uuid) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
            [id.to_string()],
            row_to_project,
        )
        .optional()?;
    Ok(project)
}

/// Most recently created project with this name
pub fn get_project_by_name(conn: &Connection, name: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            &format!(
                "SELECT {} FROM projects WHERE name = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                PROJECT_COLUMNS
            ),
            [name],
            row_to_project,
        )
        .optional()?;
    Ok(project)
}

// ============================================================================
// Criteria
// ============================================================================

fn row_to_criterion(row: &Row) -> rusqlite::Result<Criterion> {
    Ok(Criterion {
        id: get_uuid(row, 0)?,
        gate: get_parsed(row, 1)?,
        category: row.get(2)?,
        question: row.get(3)?,
        evidence: row.get(4)?,
        project_ids: Vec::new(),
    })
}

pub fn insert_criterion(conn: &Connection, criterion: &Criterion) -> Result<()> {
    conn.execute(
        "INSERT INTO criteria (id, gate, category, question, evidence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            criterion.id.to_string(),
            criterion.gate.as_str(),
            criterion.category,
            criterion.question,
            criterion.evidence,
            now(),
        ],
    )?;

    for project_id in &criterion.project_ids {
        conn.execute(
            "INSERT OR IGNORE INTO project_criteria (project_id, criterion_id) VALUES (?1, ?2)",
            params![project_id.to_string(), criterion.id.to_string()],
        )?;
    }
    Ok(())
}

fn criterion_project_ids(conn: &Connection, criterion_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT project_id FROM project_criteria WHERE criterion_id = ?1 ORDER BY project_id",
    )?;
    let ids = stmt
        .query_map([criterion_id.to_string()], |row| get_uuid(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Criteria matching the filter, in insertion order
///
/// A project filter matches criteria linked to that project.
pub fn criteria_by_filter(conn: &Connection, filter: &CriterionFilter) -> Result<Vec<Criterion>> {
    let mut sql = String::from(
        "SELECT c.id, c.gate, c.category, c.question, c.evidence FROM criteria c WHERE 1 = 1",
    );
    let mut args: Vec<String> = Vec::new();

    if let Some(gate) = filter.gate {
        args.push(gate.as_str().to_string());
        sql.push_str(&format!(" AND c.gate = ?{}", args.len()));
    }
    if let Some(project_id) = filter.project_id {
        args.push(project_id.to_string());
        sql.push_str(&format!(
            " AND c.id IN (SELECT criterion_id FROM project_criteria WHERE project_id = ?{})",
            args.len()
        ));
    }
    sql.push_str(" ORDER BY c.rowid");

    let mut stmt = conn.prepare(&sql)?;
    let mut criteria = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), row_to_criterion)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for criterion in criteria.iter_mut() {
        criterion.project_ids = criterion_project_ids(conn, criterion.id)?;
    }
    Ok(criteria)
}

// ============================================================================
// Files and chunks
// ============================================================================

const FILE_COLUMNS: &str = "id, project_id, name, file_type, clean_name, summary, source, \
     published_date, s3_bucket, s3_key, storage_kind, content_hash";

fn row_to_file(row: &Row) -> rusqlite::Result<File> {
    Ok(File {
        id: get_uuid(row, 0)?,
        project_id: get_opt_uuid(row, 1)?,
        name: row.get(2)?,
        file_type: row.get(3)?,
        clean_name: row.get(4)?,
        summary: row.get(5)?,
        source: row.get(6)?,
        published_date: row.get(7)?,
        s3_bucket: row.get(8)?,
        s3_key: row.get(9)?,
        storage_kind: row.get(10)?,
        content_hash: row.get(11)?,
    })
}

pub fn insert_file(conn: &Connection, file: &File) -> Result<()> {
    conn.execute(
        "INSERT INTO files (id, project_id, name, file_type, clean_name, summary, source,
                            published_date, s3_bucket, s3_key, storage_kind, content_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            file.id.to_string(),
            file.project_id.map(|id| id.to_string()),
            file.name,
            file.file_type,
            file.clean_name,
            file.summary,
            file.source,
            file.published_date,
            file.s3_bucket,
            file.s3_key,
            file.storage_kind,
            file.content_hash,
            now(),
        ],
    )?;
    Ok(())
}

pub fn update_file(conn: &Connection, file: &File) -> Result<usize> {
    let rows = conn.execute(
        "UPDATE files
         SET name = ?2, file_type = ?3, clean_name = ?4, summary = ?5, source = ?6,
             published_date = ?7, s3_bucket = ?8, s3_key = ?9, storage_kind = ?10,
             content_hash = ?11, updated_at = ?12
         WHERE id = ?1",
        params![
            file.id.to_string(),
            file.name,
            file.file_type,
            file.clean_name,
            file.summary,
            file.source,
            file.published_date,
            file.s3_bucket,
            file.s3_key,
            file.storage_kind,
            file.content_hash,
            now(),
        ],
    )?;
    Ok(rows)
}

pub fn get_file(conn: &Connection, id: Uuid) -> Result<Option<File>> {
    let file = conn
        .query_row(
            &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
            [id.to_string()],
            row_to_file,
        )
        .optional()?;
    Ok(file)
}

/// File in a project with identical content, if one was already ingested
pub fn find_file_by_hash(conn: &Connection, project_id: Uuid, hash: &str) -> Result<Option<File>> {
    let file = conn
        .query_row(
            &format!(
                "SELECT {} FROM files WHERE project_id = ?1 AND content_hash = ?2 LIMIT 1",
                FILE_COLUMNS
            ),
            params![project_id.to_string(), hash],
            row_to_file,
        )
        .optional()?;
    Ok(file)
}

/// File in a project backed by the given object-storage location
pub fn find_file_by_location(
    conn: &Connection,
    project_id: Uuid,
    bucket: &str,
    key: &str,
) -> Result<Option<File>> {
    let file = conn
        .query_row(
            &format!(
                "SELECT {} FROM files WHERE project_id = ?1 AND s3_bucket = ?2 AND s3_key = ?3 LIMIT 1",
                FILE_COLUMNS
            ),
            params![project_id.to_string(), bucket, key],
            row_to_file,
        )
        .optional()?;
    Ok(file)
}

fn row_to_chunk(row: &Row) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: get_uuid(row, 0)?,
        file_id: get_opt_uuid(row, 1)?,
        idx: row.get(2)?,
        text: row.get(3)?,
        page_num: row.get(4)?,
    })
}

pub fn insert_chunk(conn: &Connection, chunk: &Chunk) -> Result<()> {
    conn.execute(
        "INSERT INTO chunks (id, file_id, idx, text, page_num, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.id.to_string(),
            chunk.file_id.map(|id| id.to_string()),
            chunk.idx,
            chunk.text,
            chunk.page_num,
            now(),
        ],
    )?;
    Ok(())
}

pub fn get_chunk(conn: &Connection, id: Uuid) -> Result<Option<Chunk>> {
    let chunk = conn
        .query_row(
            "SELECT id, file_id, idx, text, page_num FROM chunks WHERE id = ?1",
            [id.to_string()],
            row_to_chunk,
        )
        .optional()?;
    Ok(chunk)
}

pub fn chunks_for_file(conn: &Connection, file_id: Uuid) -> Result<Vec<Chunk>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_id, idx, text, page_num FROM chunks WHERE file_id = ?1 ORDER BY idx",
    )?;
    let chunks = stmt
        .query_map([file_id.to_string()], row_to_chunk)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chunks)
}

pub fn set_chunk_embedding(conn: &Connection, chunk_id: Uuid, embedding: &[f32]) -> Result<()> {
    conn.execute(
        "UPDATE chunks SET embedding = ?2 WHERE id = ?1",
        params![chunk_id.to_string(), embedding_to_bytes(embedding)],
    )?;
    Ok(())
}

/// Embedded chunks whose file belongs to the project, with their file ids
pub fn chunk_embeddings_for_project(
    conn: &Connection,
    project_id: Uuid,
) -> Result<Vec<(Chunk, Vec<f32>)>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.id, c.file_id, c.idx, c.text, c.page_num, c.embedding
        FROM chunks c
        JOIN files f ON c.file_id = f.id
        WHERE f.project_id = ?1 AND c.embedding IS NOT NULL
        "#,
    )?;
    let rows = stmt
        .query_map([project_id.to_string()], |row| {
            let chunk = row_to_chunk(row)?;
            let blob: Vec<u8> = row.get(5)?;
            Ok((chunk, bytes_to_embedding(&blob)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ============================================================================
// Results
// ============================================================================

/// Insert a result and its chunk links; the result must carry an id
pub fn insert_result(conn: &Connection, id: Uuid, result: &EvaluationResult) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO results (id, run_id, criterion_id, project_id, answer, full_text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            result.run_id.to_string(),
            result.criterion_id.to_string(),
            result.project_id.to_string(),
            result.answer.as_str(),
            result.full_text,
            result.created_at.unwrap_or_else(Utc::now).to_rfc3339(),
        ],
    )?;
    for (position, chunk) in result.chunks.iter().enumerate() {
        tx.execute(
            "INSERT OR IGNORE INTO result_chunks (result_id, chunk_id, position) VALUES (?1, ?2, ?3)",
            params![id.to_string(), chunk.id.to_string(), position as i64],
        )?;
    }
    tx.commit()?;
    Ok(())
}

fn result_chunks(conn: &Connection, result_id: Uuid) -> Result<Vec<Chunk>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.id, c.file_id, c.idx, c.text, c.page_num
        FROM result_chunks rc
        JOIN chunks c ON rc.chunk_id = c.id
        WHERE rc.result_id = ?1
        ORDER BY rc.position
        "#,
    )?;
    let chunks = stmt
        .query_map([result_id.to_string()], row_to_chunk)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chunks)
}

fn row_to_result(row: &Row) -> rusqlite::Result<EvaluationResult> {
    Ok(EvaluationResult {
        id: Some(get_uuid(row, 0)?),
        run_id: get_uuid(row, 1)?,
        criterion_id: get_uuid(row, 2)?,
        project_id: get_uuid(row, 3)?,
        answer: get_parsed(row, 4)?,
        full_text: row.get(5)?,
        chunks: Vec::new(),
        created_at: Some(get_timestamp(row, 6)?),
    })
}

const RESULT_COLUMNS: &str = "id, run_id, criterion_id, project_id, answer, full_text, created_at";

pub fn get_result(conn: &Connection, id: Uuid) -> Result<Option<EvaluationResult>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM results WHERE id = ?1", RESULT_COLUMNS),
            [id.to_string()],
            row_to_result,
        )
        .optional()?;

    match result {
        Some(mut result) => {
            result.chunks = result_chunks(conn, id)?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

/// All results for a project, oldest first
pub fn results_for_project(conn: &Connection, project_id: Uuid) -> Result<Vec<EvaluationResult>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM results WHERE project_id = ?1 ORDER BY created_at, rowid",
        RESULT_COLUMNS
    ))?;
    let mut results = stmt
        .query_map([project_id.to_string()], row_to_result)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for result in results.iter_mut() {
        if let Some(id) = result.id {
            result.chunks = result_chunks(conn, id)?;
        }
    }
    Ok(results)
}

/// Count of results per answer label for a project
pub fn label_counts(conn: &Connection, project_id: Uuid) -> Result<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT answer, COUNT(*) FROM results WHERE project_id = ?1 GROUP BY answer",
    )?;
    let counts = stmt
        .query_map([project_id.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<String, i64>>>()?;
    Ok(counts)
}

/// Files ranked by the number of result links pointing at their chunks
pub fn top_referenced_files(
    conn: &Connection,
    project_id: Uuid,
    limit: usize,
) -> Result<Vec<ReferencedFile>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {}, COUNT(rc.result_id) AS refs
        FROM files f
        JOIN chunks c ON c.file_id = f.id
        JOIN result_chunks rc ON rc.chunk_id = c.id
        JOIN results r ON r.id = rc.result_id
        WHERE r.project_id = ?1
        GROUP BY f.id
        ORDER BY refs DESC, f.name
        LIMIT ?2
        "#,
        FILE_COLUMNS
            .split(", ")
            .map(|c| format!("f.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ")
    ))?;
    let files = stmt
        .query_map(params![project_id.to_string(), limit as i64], |row| {
            Ok(ReferencedFile {
                file: row_to_file(row)?,
                reference_count: row.get(12)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(files)
}

// ============================================================================
// Chat sessions
// ============================================================================

pub fn insert_chat_session(conn: &Connection, session: &ChatSession) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_sessions (id, project_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            session.id.to_string(),
            session.project_id.to_string(),
            session.title,
            session.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn row_to_chat_session(row: &Row) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: get_uuid(row, 0)?,
        project_id: get_uuid(row, 1)?,
        title: row.get(2)?,
        created_at: get_timestamp(row, 3)?,
    })
}

pub fn get_chat_session(conn: &Connection, id: Uuid) -> Result<Option<ChatSession>> {
    let session = conn
        .query_row(
            "SELECT id, project_id, title, created_at FROM chat_sessions WHERE id = ?1",
            [id.to_string()],
            row_to_chat_session,
        )
        .optional()?;
    Ok(session)
}

pub fn chat_sessions_for_project(conn: &Connection, project_id: Uuid) -> Result<Vec<ChatSession>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, title, created_at FROM chat_sessions
         WHERE project_id = ?1 ORDER BY created_at DESC",
    )?;
    let sessions = stmt
        .query_map([project_id.to_string()], row_to_chat_session)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sessions)
}

pub fn insert_chat_turn(conn: &Connection, turn: &ChatTurn) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_turns (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            turn.session_id.to_string(),
            turn.role,
            turn.content,
            turn.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn chat_turns(conn: &Connection, session_id: Uuid) -> Result<Vec<ChatTurn>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, role, content, created_at FROM chat_turns
         WHERE session_id = ?1 ORDER BY id",
    )?;
    let turns = stmt
        .query_map([session_id.to_string()], |row| {
            Ok(ChatTurn {
                session_id: get_uuid(row, 0)?,
                role: row.get(1)?,
                content: row.get(2)?,
                created_at: get_timestamp(row, 3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(turns)
}
