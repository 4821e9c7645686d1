//! Core types for Scout
//!
//! Criteria are checklist items grouped by review gate; results tie one
//! criterion to one project together with the document chunks that backed
//! the answer.

use crate::error::ScoutError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A named checklist stage grouping related criteria
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gate {
    #[serde(rename = "GATE_0")]
    Gate0,
    #[serde(rename = "GATE_1")]
    Gate1,
    #[serde(rename = "GATE_2")]
    Gate2,
    #[serde(rename = "GATE_3")]
    Gate3,
    #[serde(rename = "GATE_4")]
    Gate4,
    #[serde(rename = "GATE_5")]
    Gate5,
    IpaGuidance,
    Custom,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Gate0 => "GATE_0",
            Gate::Gate1 => "GATE_1",
            Gate::Gate2 => "GATE_2",
            Gate::Gate3 => "GATE_3",
            Gate::Gate4 => "GATE_4",
            Gate::Gate5 => "GATE_5",
            Gate::IpaGuidance => "IPA_GUIDANCE",
            Gate::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gate {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GATE_0" => Ok(Gate::Gate0),
            "GATE_1" => Ok(Gate::Gate1),
            "GATE_2" => Ok(Gate::Gate2),
            "GATE_3" => Ok(Gate::Gate3),
            "GATE_4" => Ok(Gate::Gate4),
            "GATE_5" => Ok(Gate::Gate5),
            "IPA_GUIDANCE" => Ok(Gate::IpaGuidance),
            "CUSTOM" => Ok(Gate::Custom),
            other => Err(ScoutError::Validation(format!("unknown gate '{}'", other))),
        }
    }
}

/// Categorical outcome extracted from a narrative answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Label {
    Positive,
    Neutral,
    Negative,
    /// No label token was found in the answer
    #[serde(rename = "None")]
    Unlabeled,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Positive => "Positive",
            Label::Neutral => "Neutral",
            Label::Negative => "Negative",
            Label::Unlabeled => "None",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Label::Positive),
            "neutral" => Ok(Label::Neutral),
            "negative" => Ok(Label::Negative),
            "none" => Ok(Label::Unlabeled),
            other => Err(ScoutError::Validation(format!("unknown label '{}'", other))),
        }
    }
}

/// One checklist question plus its expected-evidence checklist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Criterion {
    pub id: Uuid,
    pub gate: Gate,
    pub category: String,
    pub question: String,
    /// Delimiter-separated evidence sub-points
    pub evidence: String,
    #[serde(default)]
    pub project_ids: Vec<Uuid>,
}

impl Criterion {
    pub fn new(gate: Gate, category: &str, question: &str, evidence: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            gate,
            category: category.to_string(),
            question: question.to_string(),
            evidence: evidence.to_string(),
            project_ids: Vec::new(),
        }
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_ids.push(project_id);
        self
    }
}

/// Filter used to read criteria back from storage
#[derive(Debug, Clone, Default)]
pub struct CriterionFilter {
    pub gate: Option<Gate>,
    pub project_id: Option<Uuid>,
}

/// Tenant-scoped container for files and results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub results_summary: Option<String>,
    /// Managed knowledge base backing this project, if any
    pub knowledgebase_id: Option<String>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            results_summary: None,
            knowledgebase_id: None,
        }
    }
}

/// An uploaded or discovered source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct File {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub file_type: String,
    pub clean_name: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub published_date: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_key: Option<String>,
    pub storage_kind: String,
    /// SHA-256 of the file content, hex encoded
    pub content_hash: Option<String>,
}

impl File {
    pub fn new(project_id: Uuid, name: &str) -> Self {
        let file_type = std::path::Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            project_id: Some(project_id),
            name: name.to_string(),
            file_type,
            clean_name: None,
            summary: None,
            source: None,
            published_date: None,
            s3_bucket: None,
            s3_key: None,
            storage_kind: "local".to_string(),
            content_hash: None,
        }
    }

    /// Name to show in prompts and reports
    pub fn display_name(&self) -> &str {
        self.clean_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

/// A fragment of a file with position metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub file_id: Option<Uuid>,
    pub idx: i64,
    pub text: String,
    pub page_num: i64,
}

impl Chunk {
    pub fn new(file_id: Uuid, idx: i64, text: &str, page_num: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id: Some(file_id),
            idx,
            text: text.to_string(),
            page_num,
        }
    }
}

/// Outcome of evaluating one criterion against one project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    /// Assigned by the store on write; `None` for unsaved results
    pub id: Option<Uuid>,
    /// Evaluation run (one batch evaluator instance) that produced this result
    pub run_id: Uuid,
    pub criterion_id: Uuid,
    pub project_id: Uuid,
    pub answer: Label,
    /// Justification with the label tokens stripped out
    pub full_text: String,
    pub chunks: Vec<Chunk>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Origin of a document as judged by the file-info extractor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileSource {
    Government,
    Supplier,
    Other,
}

impl FileSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSource::Government => "Government",
            FileSource::Supplier => "Supplier",
            FileSource::Other => "Other",
        }
    }
}

/// LLM-generated metadata about a file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub clean_name: Option<String>,
    pub summary: Option<String>,
    pub source: Option<FileSource>,
    pub published_date: Option<String>,
}

/// A persisted chat conversation scoped to one project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One message in a chat session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub session_id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A file ranked by how many results cite its chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencedFile {
    pub file: File,
    pub reference_count: i64,
}
