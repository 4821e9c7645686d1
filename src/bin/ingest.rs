//! Import governance criteria from CSV files
//!
//! Usage: cargo run --bin ingest -- [--project <name>] <file|dir|glob|s3://bucket/key>...
//!
//! Directories are walked for `*.csv` files. Each CSV needs the headers
//! Category, Question, Evidence and Gate.

use anyhow::{Context, Result};
use scout::ingest::CriteriaSource;
use scout::{AppContext, ScoutConfig};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} [--project <name>] <csv-files|dirs|globs|s3-uris...>", args[0]);
        eprintln!("Example: {} --project Alpha criteria/gate_*.csv", args[0]);
        std::process::exit(1);
    }

    let config = ScoutConfig::from_env()?;
    scout::logging::init(&config)?;
    println!("Opening database at {:?}", config.db_path);
    let ctx = AppContext::from_config(config)?;
    let store = ctx.store();

    let mut project_name: Option<String> = None;
    let mut inputs: Vec<String> = Vec::new();
    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        if arg == "--project" {
            project_name = Some(rest.next().context("--project needs a name")?.clone());
        } else {
            inputs.push(arg.clone());
        }
    }

    let project = match &project_name {
        Some(name) => Some(
            store
                .project_by_name(name)?
                .with_context(|| format!("project '{}' not found", name))?,
        ),
        None => None,
    };

    let ingestor = ctx.criteria_ingestor()?;
    let mut total = 0;
    let mut failed = 0;

    for source in expand_inputs(&inputs) {
        match ingestor.ingest(&source, project.as_ref()).await {
            Ok(count) => {
                println!("  ✓ {} ({} criteria)", source.describe(), count);
                total += count;
            }
            Err(e) => {
                eprintln!("  ✗ {}: {}", source.describe(), e);
                failed += 1;
            }
        }
    }

    println!("\n========================================");
    println!("Import complete!");
    println!("  Criteria: {}", total);
    if failed > 0 {
        println!("  Failed files: {}", failed);
    }
    println!("========================================");

    Ok(())
}

/// Resolve CLI inputs into sources: s3 URIs, directories, globs, or files
fn expand_inputs(inputs: &[String]) -> Vec<CriteriaSource> {
    let mut sources = Vec::new();

    for input in inputs {
        if input.starts_with("s3://") {
            sources.push(CriteriaSource::parse(input));
            continue;
        }

        let path = PathBuf::from(input);
        if path.is_dir() {
            sources.extend(csv_files_in(&path).into_iter().map(CriteriaSource::Local));
        } else if input.contains(['*', '?', '[']) {
            match glob::glob(input) {
                Ok(paths) => {
                    let mut matched: Vec<PathBuf> = paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect();
                    matched.sort();
                    if matched.is_empty() {
                        eprintln!("Warning: {} matched no files", input);
                    }
                    sources.extend(matched.into_iter().map(CriteriaSource::Local));
                }
                Err(e) => eprintln!("Warning: bad pattern {}: {}", input, e),
            }
        } else if path.exists() {
            sources.push(CriteriaSource::Local(path));
        } else {
            eprintln!("Warning: {} does not exist, skipping", input);
        }
    }

    sources
}

fn csv_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| x.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
