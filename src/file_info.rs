//! LLM-generated file metadata
//!
//! Asks the model for a clean title, origin, short summary and publication
//! date. A failed or unparseable answer yields blank metadata; ingestion
//! carries on without it.

use crate::error::{Result, ScoutError};
use crate::llm::{ChatMessage, ChatModel};
use crate::prompts;
use crate::store::Store;
use crate::types::{File, FileInfo, FileSource, Project};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{error, info};

/// Chunks of a file used as the model's view of it
pub const FILE_INFO_CHUNKS: usize = 20;

pub const MAX_SUMMARY_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct RawFileInfo {
    clean_name: Option<String>,
    source: Option<String>,
    summary: Option<String>,
    published_date: Option<String>,
}

fn json_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```json\s*\n(.*?)\n\s*```").expect("Invalid fence pattern"))
}

fn parse_source(source: &str) -> Option<FileSource> {
    match source.trim().to_ascii_lowercase().as_str() {
        "government" => Some(FileSource::Government),
        "supplier" => Some(FileSource::Supplier),
        "other" => Some(FileSource::Other),
        _ => None,
    }
}

/// Parse the model's answer, accepting a bare object or a ```json fence
pub fn parse_file_info(output: &str) -> Result<FileInfo> {
    let json_str = match json_fence().captures(output).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => output.trim().trim_start_matches("```").trim_end_matches("```").trim(),
    };

    let raw: RawFileInfo = serde_json::from_str(json_str)?;
    let non_empty = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    Ok(FileInfo {
        clean_name: non_empty(raw.clean_name),
        source: raw.source.as_deref().and_then(parse_source),
        summary: non_empty(raw.summary).map(|s| s.chars().take(MAX_SUMMARY_CHARS).collect()),
        published_date: non_empty(raw.published_date),
    })
}

/// Generate metadata for a file from its opening text
pub async fn generate_file_info(model: &dyn ChatModel, project_name: &str, file_name: &str, text: &str) -> FileInfo {
    let prompt = prompts::file_info(project_name, file_name, text);
    let parsed = match model.invoke(&[ChatMessage::user(prompt)]).await {
        Ok(output) => parse_file_info(&output),
        Err(e) => Err(e),
    };

    match parsed {
        Ok(info) => {
            info!(file = file_name, "File info generated");
            info
        }
        Err(e) => {
            error!("{} unable to get LLM generated file info for {}, proceeding without...", e, file_name);
            FileInfo::default()
        }
    }
}

/// Generate metadata from the file's first chunks and store it on the file
pub async fn add_file_info(store: &dyn Store, model: &dyn ChatModel, project: &Project, file: &File) -> Result<File> {
    let chunks = store.chunks_for_file(file.id)?;
    let text = chunks
        .iter()
        .take(FILE_INFO_CHUNKS)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if text.trim().is_empty() {
        return Err(ScoutError::Validation(format!("file {} has no text", file.name)));
    }

    let info = generate_file_info(model, &project.name, &file.name, &text).await;

    let mut updated = file.clone();
    if info.clean_name.is_some() {
        updated.clean_name = info.clean_name;
    }
    if let Some(source) = info.source {
        updated.source = Some(source.as_str().to_string());
    }
    if info.summary.is_some() {
        updated.summary = info.summary;
    }
    if info.published_date.is_some() {
        updated.published_date = info.published_date;
    }
    store.update_file(&updated)?;
    Ok(updated)
}
