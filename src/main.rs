//! Scout CLI
//!
//! Evaluate a project's documents against governance criteria.
//!
//! Run with: cargo run -- --evaluate <project> GATE_2
//! Criteria are loaded separately with the `ingest` binary.

use anyhow::{bail, Context, Result};
use scout::{
    chat::ChatEngine, documents, evaluator, file_info, AppContext, EvaluationResult, Gate, Project, ScoutConfig, Store,
};
use std::path::Path;
use uuid::Uuid;

const USAGE: &str = "Usage:
  scout --create-project <name> [--kb <knowledgebase-id>]
  scout --add-document <project> <path>
  scout --file-info <project> <file-id>
  scout --evaluate <project> <gate> [--only-missing]
  scout --evaluate-one <project> <criterion-id>
  scout --ask <project> <question...>
  scout --report <project>";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let config = ScoutConfig::from_env()?;
    scout::logging::init(&config)?;

    match args[1].as_str() {
        "--create-project" => {
            let kb = args
                .iter()
                .position(|a| a == "--kb")
                .and_then(|i| args.get(i + 1))
                .cloned();
            run_create_project(config, &args[2], kb)
        }
        "--add-document" => {
            let path = args.get(3).context("Usage: --add-document <project> <path>")?;
            run_add_document(config, &args[2], Path::new(path))
        }
        "--file-info" => {
            let file_id = args.get(3).context("Usage: --file-info <project> <file-id>")?;
            run_file_info(config, &args[2], file_id).await
        }
        "--evaluate" => {
            let gate: Gate = args.get(3).context("Usage: --evaluate <project> <gate>")?.parse()?;
            let only_missing = args.iter().any(|a| a == "--only-missing");
            run_evaluate(config, &args[2], gate, only_missing).await
        }
        "--evaluate-one" => {
            let criterion_id = args.get(3).context("Usage: --evaluate-one <project> <criterion-id>")?;
            run_evaluate_one(config, &args[2], criterion_id).await
        }
        "--ask" => {
            let question = args[3..].join(" ");
            if question.trim().is_empty() {
                bail!("Usage: --ask <project> <question...>");
            }
            run_ask(config, &args[2], &question).await
        }
        "--report" => run_report(config, &args[2]),
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
}

fn load_project(ctx: &AppContext, name: &str) -> Result<Project> {
    ctx.store()
        .project_by_name(name)?
        .with_context(|| format!("project '{}' not found", name))
}

fn run_create_project(config: ScoutConfig, name: &str, knowledgebase_id: Option<String>) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let mut project = Project::new(name);
    project.knowledgebase_id = knowledgebase_id;
    ctx.store().write_project(&project)?;

    println!("✓ Created project {} ({})", project.name, project.id);
    if let Some(kb) = &project.knowledgebase_id {
        println!("  Knowledge base: {}", kb);
    }
    Ok(())
}

fn run_add_document(config: ScoutConfig, project_name: &str, path: &Path) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let project = load_project(&ctx, project_name)?;
    let index = ctx.local_index()?;

    let file = documents::ingest_document(ctx.store().as_ref(), &index, &project, path)
        .with_context(|| format!("failed to ingest {}", path.display()))?;
    let chunks = ctx.store().chunks_for_file(file.id)?;

    println!("✓ {} ({} chunks)", file.name, chunks.len());
    println!("  File id: {}", file.id);
    Ok(())
}

async fn run_file_info(config: ScoutConfig, project_name: &str, file_id: &str) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let project = load_project(&ctx, project_name)?;
    let file_id = Uuid::parse_str(file_id).context("file id is not a UUID")?;
    let file = ctx
        .store()
        .file_by_id(file_id)?
        .with_context(|| format!("file {} not found", file_id))?;

    let model = ctx.model()?;
    let updated = file_info::add_file_info(ctx.store().as_ref(), model.as_ref(), &project, &file).await?;

    println!("\n📄 {}", updated.display_name());
    println!("   Source:    {}", updated.source.as_deref().unwrap_or("-"));
    println!("   Published: {}", updated.published_date.as_deref().unwrap_or("-"));
    if let Some(summary) = &updated.summary {
        println!("   Summary:   {}", summary);
    }
    Ok(())
}

async fn run_evaluate(config: ScoutConfig, project_name: &str, gate: Gate, only_missing: bool) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let results = evaluator::evaluate_gate(&ctx, project_name, gate, only_missing).await?;

    println!("\n========================================");
    println!("Evaluated {} criteria for {} ({})", results.len(), project_name, gate);
    println!("========================================");
    for result in &results {
        print_result(result);
    }

    if let Some(summary) = load_project(&ctx, project_name)?.results_summary {
        println!("\nSUMMARY:\n{}", summary);
    }
    Ok(())
}

async fn run_evaluate_one(config: ScoutConfig, project_name: &str, criterion_id: &str) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let project = load_project(&ctx, project_name)?;
    let criterion_id = Uuid::parse_str(criterion_id).context("criterion id is not a UUID")?;

    let criterion = evaluator::criteria_for_project(ctx.store().as_ref(), &project, None)?
        .into_iter()
        .find(|c| c.id == criterion_id)
        .with_context(|| format!("criterion {} not found for project", criterion_id))?;

    let mut batch = ctx.evaluator(project)?;
    let result = batch.evaluate_single(&criterion, true).await?;

    println!("\n{}", criterion.question);
    print_result(&result);
    println!("\n{}", result.full_text);
    Ok(())
}

async fn run_ask(config: ScoutConfig, project_name: &str, question: &str) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let project = load_project(&ctx, project_name)?;
    let engine: ChatEngine = ctx.chat_engine(&project)?;

    let title: String = question.chars().take(60).collect();
    let session = engine.start_session(&project, &title)?;
    let reply = engine.ask(&session, question, None).await?;

    println!("\n{}", reply.answer);
    println!("\n({} documents used, session {})", reply.documents_used, session.id);
    Ok(())
}

fn run_report(config: ScoutConfig, project_name: &str) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let project = load_project(&ctx, project_name)?;
    let store = ctx.store();

    println!("\n📊 {} REPORT", project.name.to_uppercase());

    println!("\nLabels:");
    let counts = store.label_counts(project.id)?;
    if counts.is_empty() {
        println!("   (no results yet)");
    }
    for (label, count) in &counts {
        println!("   {:<10} {}", label, count);
    }

    println!("\nMost referenced documents:");
    for referenced in store.top_referenced_files(project.id, 5)? {
        println!("   {:>3}  {}", referenced.reference_count, referenced.file.display_name());
    }

    if let Some(summary) = &project.results_summary {
        println!("\nSummary:\n{}", summary);
    }
    Ok(())
}

fn print_result(result: &EvaluationResult) {
    println!(
        "  {} {:<8} {} ({} chunks)",
        if result.id.is_some() { "✓" } else { "·" },
        result.answer.as_str(),
        result.criterion_id,
        result.chunks.len()
    );
}
