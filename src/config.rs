//! Configuration and application context
//!
//! [`ScoutConfig`] is read once from the environment at process start.
//! [`AppContext`] owns the long-lived collaborators built from it and hands
//! them to evaluators, chat and ingestion; nothing is global.

use crate::chat::ChatEngine;
use crate::embeddings::{default_model_dir, Embedder, OnnxEmbedder};
use crate::error::{Result, ScoutError};
use crate::evaluator::BatchEvaluator;
use crate::evidence::EvidenceOptions;
use crate::ingest::{CriteriaIngestor, ObjectStoreClient};
use crate::llm::{AnthropicClient, ChatModel, LlmConfig};
use crate::retrieval::{KnowledgeBaseConfig, KnowledgeBaseProvider, LocalIndex, RetrievalProvider};
use crate::retry::{RetryPolicy, RetryingModel};
use crate::store::{SqliteStore, Store};
use crate::types::Project;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Directory for `scout.log`; `None` logs to stdout only
    pub log_dir: Option<PathBuf>,
    pub llm: LlmConfig,
    pub retry: RetryPolicy,
    pub evidence: EvidenceOptions,
    pub knowledge_base: Option<KnowledgeBaseConfig>,
    pub object_store_url: Option<String>,
    pub model_dir: PathBuf,
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| ScoutError::Config(format!("{} has invalid value '{}'", name, v))),
        _ => Ok(default),
    }
}

impl ScoutConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = non_empty("SCOUT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("scout"));
        let db_path = non_empty("SCOUT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("scout.db"));
        let log_dir = match non_empty("SCOUT_LOG_DIR") {
            Some(dir) if dir == "-" => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => Some(data_dir.join("logs")),
        };

        let defaults = LlmConfig::default();
        let llm = LlmConfig {
            api_url: non_empty("SCOUT_LLM_API_URL").unwrap_or(defaults.api_url),
            api_key: non_empty("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: non_empty("SCOUT_LLM_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_var("SCOUT_LLM_MAX_TOKENS", lookup("SCOUT_LLM_MAX_TOKENS"), defaults.max_tokens)?,
            connect_timeout: Duration::from_secs(parse_var(
                "SCOUT_CONNECT_TIMEOUT_SECS",
                lookup("SCOUT_CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout.as_secs(),
            )?),
            read_timeout: Duration::from_secs(parse_var(
                "SCOUT_READ_TIMEOUT_SECS",
                lookup("SCOUT_READ_TIMEOUT_SECS"),
                defaults.read_timeout.as_secs(),
            )?),
        };

        let evidence_defaults = EvidenceOptions::default();
        let evidence = EvidenceOptions {
            k: parse_var("SCOUT_RETRIEVAL_K", lookup("SCOUT_RETRIEVAL_K"), evidence_defaults.k)?,
            // Delimiter may legitimately be whitespace, so no trimming here
            delimiter: lookup("SCOUT_EVIDENCE_DELIMITER")
                .filter(|d| !d.is_empty())
                .unwrap_or(evidence_defaults.delimiter),
        };
        if evidence.k == 0 {
            return Err(ScoutError::Config("SCOUT_RETRIEVAL_K must be at least 1".to_string()));
        }

        let knowledge_base = non_empty("SCOUT_KB_ENDPOINT").map(|endpoint| KnowledgeBaseConfig {
            endpoint,
            token: non_empty("SCOUT_KB_TOKEN"),
            timeout: llm.read_timeout,
        });

        Ok(Self {
            data_dir,
            db_path,
            log_dir,
            llm,
            retry: RetryPolicy::default(),
            evidence,
            knowledge_base,
            object_store_url: non_empty("SCOUT_OBJECT_STORE_URL"),
            model_dir: non_empty("SCOUT_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_model_dir),
        })
    }
}

/// Which retrieval backend a project uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalKind {
    Local,
    KnowledgeBase,
}

pub struct AppContext {
    config: ScoutConfig,
    store: Arc<SqliteStore>,
    model: Mutex<Option<Arc<dyn ChatModel>>>,
    embedder: Mutex<Option<Arc<dyn Embedder>>>,
}

impl AppContext {
    /// Assemble a context from already-built parts
    pub fn new(
        config: ScoutConfig,
        store: Arc<SqliteStore>,
        model: Arc<dyn ChatModel>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            config,
            store,
            model: Mutex::new(Some(model)),
            embedder: Mutex::new(embedder),
        }
    }

    /// Open the database; the model client and embedder are built on first use
    pub fn from_config(config: ScoutConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(SqliteStore::open(&config.db_path)?);
        info!(db = %config.db_path.display(), "Context ready");
        Ok(Self {
            config,
            store,
            model: Mutex::new(None),
            embedder: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Retry-wrapped model client, built on first use
    ///
    /// Fails with [`ScoutError::Config`] when no API key is configured.
    pub fn model(&self) -> Result<Arc<dyn ChatModel>> {
        let mut slot = self
            .model
            .lock()
            .map_err(|_| ScoutError::Config("model mutex poisoned".to_string()))?;
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let client = AnthropicClient::new(self.config.llm.clone())?;
        let model: Arc<dyn ChatModel> = Arc::new(RetryingModel::new(client, self.config.retry.clone()));
        info!(model = %self.config.llm.model, "Model client ready");
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Embedder, loading the ONNX model on first use
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let mut slot = self
            .embedder
            .lock()
            .map_err(|_| ScoutError::Config("embedder mutex poisoned".to_string()))?;
        if let Some(embedder) = slot.as_ref() {
            return Ok(Arc::clone(embedder));
        }
        let embedder: Arc<dyn Embedder> = Arc::new(OnnxEmbedder::new(&self.config.model_dir)?);
        *slot = Some(Arc::clone(&embedder));
        Ok(embedder)
    }

    pub fn local_index(&self) -> Result<LocalIndex> {
        Ok(LocalIndex::new(self.store.clone(), self.embedder()?))
    }

    pub fn retrieval_kind(&self, project: &Project) -> RetrievalKind {
        match (&project.knowledgebase_id, &self.config.knowledge_base) {
            (Some(_), Some(_)) => RetrievalKind::KnowledgeBase,
            _ => RetrievalKind::Local,
        }
    }

    /// Retrieval backend for a project
    pub fn retrieval_for(&self, project: &Project) -> Result<Arc<dyn RetrievalProvider>> {
        match (self.retrieval_kind(project), &self.config.knowledge_base) {
            (RetrievalKind::KnowledgeBase, Some(kb)) => {
                Ok(Arc::new(KnowledgeBaseProvider::new(kb.clone(), self.store())?))
            }
            _ => Ok(Arc::new(self.local_index()?)),
        }
    }

    pub fn evaluator(&self, project: Project) -> Result<BatchEvaluator> {
        let retrieval = self.retrieval_for(&project)?;
        Ok(BatchEvaluator::new(
            project,
            self.store(),
            self.model()?,
            retrieval,
            self.config.evidence.clone(),
        ))
    }

    pub fn chat_engine(&self, project: &Project) -> Result<ChatEngine> {
        Ok(ChatEngine::new(self.store(), self.model()?, self.retrieval_for(project)?))
    }

    pub fn criteria_ingestor(&self) -> Result<CriteriaIngestor> {
        let object_store = match &self.config.object_store_url {
            Some(url) => Some(ObjectStoreClient::new(url, self.config.llm.read_timeout)?),
            None => None,
        };
        Ok(CriteriaIngestor::new(self.store(), object_store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{KeywordEmbedder, MockModel};
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ScoutConfig> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ScoutConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("SCOUT_DATA_DIR", "/tmp/scout-test")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/scout-test/scout.db"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/scout-test/logs")));
        assert_eq!(config.llm.connect_timeout, Duration::from_secs(120));
        assert_eq!(config.llm.read_timeout, Duration::from_secs(120));
        assert_eq!(config.evidence.k, 3);
        assert_eq!(config.evidence.delimiter, "_");
        assert_eq!(config.retry.max_attempts, 10);
        assert!(config.knowledge_base.is_none());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = config_from(&[
            ("SCOUT_RETRIEVAL_K", "5"),
            ("SCOUT_EVIDENCE_DELIMITER", ";"),
            ("SCOUT_KB_ENDPOINT", "http://kb.local"),
            ("SCOUT_LOG_DIR", "-"),
        ])
        .unwrap();
        assert_eq!(config.evidence.k, 5);
        assert_eq!(config.evidence.delimiter, ";");
        assert_eq!(config.knowledge_base.unwrap().endpoint, "http://kb.local");
        assert!(config.log_dir.is_none());

        assert!(matches!(config_from(&[("SCOUT_RETRIEVAL_K", "many")]), Err(ScoutError::Config(_))));
        assert!(matches!(config_from(&[("SCOUT_RETRIEVAL_K", "0")]), Err(ScoutError::Config(_))));
    }

    #[test]
    fn test_retrieval_selected_per_project() {
        let config = config_from(&[("SCOUT_KB_ENDPOINT", "http://kb.local")]).unwrap();
        let ctx = AppContext::new(
            config,
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(MockModel::fixed("ok")),
            Some(Arc::new(KeywordEmbedder::default())),
        );

        let local = Project::new("Local");
        let mut managed = Project::new("Managed");
        managed.knowledgebase_id = Some("KB1".to_string());

        assert_eq!(ctx.retrieval_kind(&local), RetrievalKind::Local);
        assert_eq!(ctx.retrieval_kind(&managed), RetrievalKind::KnowledgeBase);
        assert!(ctx.retrieval_for(&local).is_ok());
        assert!(ctx.retrieval_for(&managed).is_ok());
    }

    #[test]
    fn test_knowledge_base_ignored_without_endpoint() {
        let config = config_from(&[]).unwrap();
        let ctx = AppContext::new(
            config,
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(MockModel::fixed("ok")),
            Some(Arc::new(KeywordEmbedder::default())),
        );
        let mut managed = Project::new("Managed");
        managed.knowledgebase_id = Some("KB1".to_string());
        assert_eq!(ctx.retrieval_kind(&managed), RetrievalKind::Local);
    }

    #[test]
    fn test_context_opens_without_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().to_string();
        let config = config_from(&[("SCOUT_DATA_DIR", data_dir.as_str()), ("SCOUT_LOG_DIR", "-")]).unwrap();
        assert!(config.llm.api_key.is_empty());

        let ctx = AppContext::from_config(config).unwrap();
        let project = Project::new("Alpha");
        ctx.store().write_project(&project).unwrap();
        assert!(ctx.store().project_by_name("Alpha").unwrap().is_some());

        assert!(matches!(ctx.model(), Err(ScoutError::Config(_))));
    }
}
