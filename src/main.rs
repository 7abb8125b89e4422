use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod artifacts;
mod cli;
mod config;
mod factory;
mod pipeline;
mod record;
mod semantic;
mod shell;
mod storage;
mod store;
#[cfg(test)]
mod tests;

use cli::Command;
use config::Config;
use factory::AppFactory;
use semantic::{diagnostics, CleanOptions, Embedder};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = cli::Args::parse();
    let config = AppFactory::create_config()?;

    match args.command {
        Command::Prepare {} => {
            let (summary, records) = pipeline::prepare(
                &config.raw_csv_path(),
                &config.cleaned_csv_path(),
                CleanOptions {
                    redact_numbers: config.data.redact_numbers,
                },
            )?;

            println!(
                "{} records written ({} rows read, {} malformed, {} duplicates removed)",
                summary.records_written,
                summary.rows_read,
                summary.rows_skipped,
                summary.duplicates_removed
            );
            if let Some(first) = records.first() {
                println!("{}", serde_json::to_string_pretty(first)?);
            }
            Ok(())
        }

        Command::Embed { compare } => {
            let embedder = AppFactory::create_embedder(&config);
            let summary = pipeline::embed(
                embedder.as_ref(),
                &config.cleaned_csv_path(),
                &config.embeddings_path(),
                config.embedding.batch_size,
                config.embedding.show_progress,
            )?;

            println!(
                "{} records embedded ({} skipped), {} dimensions",
                summary.records.len(),
                summary.skipped,
                embedder.dimensions()
            );
            if let Some([a, b]) = compare.as_deref() {
                print_comparison(&summary.records, a, b);
            }
            Ok(())
        }

        Command::Schema {} => {
            let store = AppFactory::create_store(&config)?;
            let indexer = AppFactory::create_indexer(&config, store);
            indexer.ensure_schema()?;
            println!(
                "{}",
                serde_json::to_string_pretty(indexer.schema())?
            );
            Ok(())
        }

        Command::Import {} => {
            let store = AppFactory::create_store(&config)?;
            let indexer = AppFactory::create_indexer(&config, store);
            let summary = pipeline::import(
                &indexer,
                &config.embeddings_path(),
                &config.embeddings_with_ids_path(),
            )?;

            for failure in summary.report.failures() {
                println!(
                    "failed: {} ({})",
                    failure.id,
                    failure.error.as_deref().unwrap_or_default()
                );
            }
            println!(
                "{} imported, {} failed",
                summary.report.succeeded(),
                summary.report.failed()
            );
            println!(
                "Number of documents in '{}' collection: {}",
                config.typesense.collection, summary.document_count
            );
            Ok(())
        }

        Command::Search { query, args } => {
            let service = AppFactory::create_search_service(&config, args.offline)?;
            let hits = service.search_ranked(&query, args.k);
            println!("{}", shell::render_hits(&hits));
            Ok(())
        }

        Command::Shell { args } => {
            let service = AppFactory::create_search_service(&config, args.offline)?;
            shell::run(&service, args.k)
        }

        Command::Similar {
            index,
            top,
            compare,
            matrix,
        } => run_similar(&config, index, top, compare, matrix),
    }
}

fn run_similar(
    config: &Config,
    index: Option<usize>,
    top: usize,
    compare: Option<Vec<String>>,
    matrix: Option<usize>,
) -> anyhow::Result<()> {
    let path = config.embeddings_path();
    let records = artifacts::read_embeddings(&path)
        .with_context(|| format!("failed to read embeddings {}", path.display()))?;

    if let Some([a, b]) = compare.as_deref() {
        print_comparison(&records, a, b);
        return Ok(());
    }

    if let Some(limit) = matrix {
        print!("{}", diagnostics::format_matrix(&records, limit));
        return Ok(());
    }

    let Some(index) = index else {
        bail!("one of --index, --compare or --matrix is required");
    };

    let neighbors = diagnostics::similar_records(&records, index, top)?;
    println!("Top {} products similar to '{}':", top, records[index].title);
    for neighbor in neighbors {
        println!(
            "{:.4}  {}",
            neighbor.similarity, records[neighbor.index].title
        );
    }
    Ok(())
}

fn print_comparison(records: &[record::EmbeddedRecord], a: &str, b: &str) {
    match diagnostics::compare_titles(records, a, b) {
        Some(pair) => {
            println!("First product: {}", pair.first_title);
            println!("Second product: {}", pair.second_title);
            println!("Cosine similarity: {:.4}", pair.similarity);
        }
        None => println!("One or both products not found in the dataset."),
    }
}
