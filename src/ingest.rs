//! Criteria ingestion from CSV
//!
//! Expected headers: `Category`, `Question`, `Evidence`, `Gate`. A file with
//! no header row or a missing column is rejected as a whole; bad rows are
//! logged and skipped.

use crate::error::{Result, ScoutError};
use crate::store::Store;
use crate::types::{Criterion, Gate, Project};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const REQUIRED_COLUMNS: [&str; 4] = ["Category", "Question", "Evidence", "Gate"];

/// Where a criteria CSV lives
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaSource {
    Local(PathBuf),
    ObjectStore { bucket: String, key: String },
}

impl CriteriaSource {
    /// `s3://bucket/key` is an object-store location; anything else a path
    pub fn parse(s: &str) -> Self {
        match crate::retrieval::knowledge_base::parse_s3_uri(s) {
            Some((bucket, key)) => CriteriaSource::ObjectStore { bucket, key },
            None => CriteriaSource::Local(PathBuf::from(s)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CriteriaSource::Local(path) => path.display().to_string(),
            CriteriaSource::ObjectStore { bucket, key } => format!("s3://{}/{}", bucket, key),
        }
    }
}

/// Minimal object-store reader: `GET {endpoint}/{bucket}/{key}`
pub struct ObjectStoreClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ObjectStoreClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}/{}", self.endpoint, bucket, key);
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ScoutError::NotFound(format!("object s3://{}/{}", bucket, key)));
        }
        let response = response.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

pub struct CriteriaIngestor {
    store: Arc<dyn Store>,
    object_store: Option<ObjectStoreClient>,
}

impl CriteriaIngestor {
    pub fn new(store: Arc<dyn Store>, object_store: Option<ObjectStoreClient>) -> Self {
        Self { store, object_store }
    }

    /// Ingest one CSV, optionally linking every criterion to a project
    ///
    /// Returns the number of criteria written.
    pub async fn ingest(&self, source: &CriteriaSource, project: Option<&Project>) -> Result<usize> {
        let label = source.describe();
        let count = match source {
            CriteriaSource::Local(path) => {
                let file = std::fs::File::open(path)?;
                load_criteria_csv(self.store.as_ref(), file, &label, project)?
            }
            CriteriaSource::ObjectStore { bucket, key } => {
                let client = self.object_store.as_ref().ok_or_else(|| {
                    ScoutError::Config("SCOUT_OBJECT_STORE_URL is not set".to_string())
                })?;
                let bytes = client.get_object(bucket, key).await?;
                load_criteria_csv(self.store.as_ref(), bytes.as_slice(), &label, project)?
            }
        };
        info!("Successfully uploaded {} criteria to db from {}", count, label);
        Ok(count)
    }
}

/// Parse criteria rows from a CSV reader and write the valid ones
pub fn load_criteria_csv<R: Read>(
    store: &dyn Store,
    reader: R,
    label: &str,
    project: Option<&Project>,
) -> Result<usize> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(ScoutError::Validation(format!(
            "The CSV file '{}' is empty or has no headers.",
            label
        )));
    }

    let mut columns = [0usize; 4];
    for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                ScoutError::Validation(format!("The CSV file '{}' has no '{}' column.", label, name))
            })?;
    }
    let [category_col, question_col, evidence_col, gate_col] = columns;

    let mut records_uploaded = 0;
    for (row, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                error!("Error processing row {} in '{}': {}", row + 1, label, e);
                continue;
            }
        };
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        match build_criterion(field(category_col), field(question_col), field(evidence_col), field(gate_col), project) {
            Ok(criterion) => {
                store.write_criterion(&criterion)?;
                records_uploaded += 1;
            }
            Err(e) => {
                error!("Error processing row {} in '{}': {}", row + 1, label, e);
            }
        }
    }

    Ok(records_uploaded)
}

fn build_criterion(
    category: &str,
    question: &str,
    evidence: &str,
    gate: &str,
    project: Option<&Project>,
) -> Result<Criterion> {
    if question.is_empty() {
        return Err(ScoutError::Validation("question is empty".to_string()));
    }
    if category.is_empty() {
        return Err(ScoutError::Validation("category is empty".to_string()));
    }
    let gate: Gate = gate.parse()?;

    let mut criterion = Criterion::new(gate, category, question, evidence);
    match project {
        Some(project) => criterion = criterion.with_project(project.id),
        None if gate == Gate::Custom => {
            return Err(ScoutError::Validation(
                "project is required when gate is CUSTOM".to_string(),
            ));
        }
        None => {}
    }
    Ok(criterion)
}
