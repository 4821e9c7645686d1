//! Document ingestion into the local index
//!
//! Text and markdown files are hashed, split into pages on form feeds,
//! chunked with overlap and embedded. Re-ingesting identical content for the
//! same project returns the existing file.

use crate::error::{Result, ScoutError};
use crate::retrieval::LocalIndex;
use crate::store::Store;
use crate::types::{Chunk, File, Project};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 100;

/// Hex SHA-256 of the content
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Split text into windows of at most `size` chars overlapping by `overlap`
///
/// Window ends are pulled back to a paragraph break, or failing that a
/// whitespace, when one exists in the second half of the window.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let overlap = overlap.min(size / 2);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size / 2;
            let window = &chars[floor..end];
            let paragraph = window
                .windows(2)
                .rposition(|w| w[0] == '\n' && w[1] == '\n')
                .map(|i| floor + i + 2);
            let space = window.iter().rposition(|c| c.is_whitespace()).map(|i| floor + i + 1);
            if let Some(cut) = paragraph.or(space) {
                end = cut;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Ingest a UTF-8 text file for a project and index its chunks
pub fn ingest_document(store: &dyn Store, index: &LocalIndex, project: &Project, path: &Path) -> Result<File> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| ScoutError::Validation(format!("{} is not UTF-8 text", path.display())))?;
    let hash = content_hash(text.as_bytes());

    if let Some(existing) = store.file_by_hash(project.id, &hash)? {
        info!(file = %existing.name, "Identical document already ingested");
        return Ok(existing);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ScoutError::Validation(format!("{} has no file name", path.display())))?;
    let mut file = File::new(project.id, &name);
    file.content_hash = Some(hash);

    let mut chunks = Vec::new();
    for (page, page_text) in text.split('\x0c').enumerate() {
        for piece in chunk_text(page_text, CHUNK_SIZE, CHUNK_OVERLAP) {
            chunks.push(Chunk::new(file.id, chunks.len() as i64, &piece, page as i64 + 1));
        }
    }
    index.add_document(&file, &chunks)?;

    info!(file = %file.name, chunks = chunks.len(), "Document ingested");
    Ok(file)
}
