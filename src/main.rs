use clap::Parser;
use miette::{IntoDiagnostic, Result};
use paytrack::application::engine::WorkflowEngine;
use paytrack::infrastructure::access::{InMemoryDocumentIndex, StaticAuthorizer};
use paytrack::infrastructure::in_memory::InMemoryStore;
use paytrack::interfaces::csv::command_reader::CommandReader;
use paytrack::interfaces::csv::report_writer::ReportWriter;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input workflow commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn build_engine(db_path: Option<PathBuf>) -> Result<WorkflowEngine> {
    let authorizer = Box::new(StaticAuthorizer::permissive());
    let documents = Box::new(InMemoryDocumentIndex::new());

    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        let store = paytrack::infrastructure::rocksdb::RocksDbStore::open(db_path)
            .into_diagnostic()?;
        return Ok(WorkflowEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store),
            authorizer,
            documents,
        ));
    }
    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        miette::bail!("--db-path requires the storage-rocksdb feature");
    }

    let store = InMemoryStore::new();
    Ok(WorkflowEngine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store),
        authorizer,
        documents,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = build_engine(cli.db_path)?;

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command_result in reader.commands() {
        match command_result {
            Ok(command) => {
                if let Err(e) = command.apply(&engine).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let contracts = engine.contracts().await.into_diagnostic()?;
    let tickets = engine.tickets().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer
        .write_report(&contracts, &tickets)
        .into_diagnostic()?;

    Ok(())
}
