use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predicate_set::{Document, OptimizedPredicateSet, Predicate};

#[derive(Parser)]
#[command(name = "predctl")]
#[command(version = "0.1.0")]
#[command(about = "Compile and evaluate predicate sets against a document")]
#[command(long_about = None)]
struct Cli {
    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate predicates from a file (one predicate per line)
    Check {
        /// Path to a file with one predicate per line
        file: PathBuf,
    },
    /// Compile a predicate set and evaluate it against a JSON document
    Eval {
        /// Path to a file with one predicate per line
        predicates_file: PathBuf,
        /// Path to a JSON document
        document_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("predicate_set={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("predctl v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Eval { predicates_file, document_file } => eval(&predicates_file, &document_file),
    }
}

fn read_predicates(path: &PathBuf) -> Result<Vec<Predicate>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Predicate::new)
        .collect())
}

fn check(file: &PathBuf) -> Result<()> {
    let predicates = read_predicates(file)?;
    let mut bad = 0;
    for p in &predicates {
        if p.is_valid() {
            println!("ok      {}", p.source());
        } else {
            bad += 1;
            println!("invalid {}", p.source());
            for err in p.parse_errors() {
                println!("        {err}");
            }
        }
    }
    println!("{} predicate(s), {} invalid", predicates.len(), bad);
    if bad > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn eval(predicates_file: &PathBuf, document_file: &PathBuf) -> Result<()> {
    let predicates = read_predicates(predicates_file)?;
    let doc_text =
        fs::read_to_string(document_file).with_context(|| format!("reading {}", document_file.display()))?;
    let document = Document::from_str(&doc_text).context("parsing document as JSON")?;

    let mut set = OptimizedPredicateSet::default();
    for p in predicates {
        if !p.is_valid() {
            for err in p.parse_errors() {
                eprintln!("skipping invalid predicate {:?}: {err}", p.source());
            }
            continue;
        }
        set.add(p)?;
    }

    for matched in set.evaluate(&document) {
        println!("{matched}");
    }
    Ok(())
}
