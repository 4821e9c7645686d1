//! Scout - governance criteria evaluation
//!
//! Evaluates a project's documents against a checklist of assurance criteria
//! with a hosted LLM, stores a labelled answer per criterion together with the
//! document chunks behind it, and writes a short summary onto the project.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scout::{AppContext, ScoutConfig, Gate};
//!
//! let config = ScoutConfig::from_env()?;
//! scout::logging::init(&config)?;
//! let ctx = AppContext::from_config(config)?;
//!
//! // Evaluate every GATE_2 criterion for the project named "Alpha"
//! let results = scout::evaluator::evaluate_gate(&ctx, "Alpha", Gate::Gate2, false).await?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! BatchEvaluator ──(per criterion)──► EvidenceEngine
//!       │                              │          │
//!       │                     RetrievalProvider  ChatModel (RetryingModel)
//!       │                     (local | KB)
//!       ▼
//!     Store ◄── results, then project summary
//! ```

pub mod chat;
pub mod config;
pub mod db;
pub mod documents;
pub mod embeddings;
pub mod error;
pub mod evaluator;
pub mod evidence;
pub mod file_info;
pub mod ingest;
pub mod labels;
pub mod llm;
pub mod logging;
#[cfg(test)]
mod mock;
pub mod prompts;
pub mod retrieval;
pub mod retry;
pub mod store;
pub mod types;

// Core types
pub use error::{Result, ScoutError};
pub use types::*;

// Pipeline
pub use config::{AppContext, ScoutConfig};
pub use evaluator::{criteria_without_results, evaluate_gate, BatchEvaluator};
pub use evidence::{Answer, EvidenceEngine, EvidenceOptions};
pub use labels::extract_label;

// Seams
pub use llm::{AnthropicClient, ChatMessage, ChatModel, Role};
pub use retrieval::{RetrievalProvider, RetrievedExtract, ScopeFilter};
pub use retry::{RetryPolicy, RetryingModel};
pub use store::{SqliteStore, Store};
