use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use biointeract::app::{ReconcileJob, ReconcileReport, ReconcileUseCase};
use biointeract::config::{SourceCatalog, SourceFormat};
use biointeract::infra::NdjsonOutputAdapter;
use biointeract::logging;
use biointeract::metrics::init_metrics;

#[derive(Parser)]
#[command(name = "biointeract")]
#[command(about = "Reconcile pairwise biological-interaction sources into canonical records")]
#[command(version)]
struct Cli {
    /// Extra source catalog (TOML); entries override built-ins with the same id
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sources the catalog knows about
    Sources,
    /// Reconcile one source file
    Reconcile {
        /// Catalog source id, e.g. biogrid
        #[arg(long)]
        source: String,
        /// Path to the raw source file
        #[arg(long)]
        input: PathBuf,
        /// Directory for <source_id>.ndjson output
        #[arg(long, default_value = "output")]
        output: PathBuf,
    },
    /// Reconcile several sources concurrently
    Batch {
        /// <source_id>=<path>, repeatable
        #[arg(long = "job", required = true)]
        jobs: Vec<String>,
        /// Directory for <source_id>.ndjson output
        #[arg(long, default_value = "output")]
        output: PathBuf,
    },
}

fn print_report(report: &ReconcileReport) {
    let stats = &report.stats;
    println!("\n📊 Reconciliation results for {}:", report.source_id);
    println!("   Input: {}", report.input.display());
    println!("   Rows read: {}", stats.rows_read);
    println!("   Rows skipped: {}", stats.rows_skipped);
    if stats.edges_filtered > 0 {
        println!("   Edges filtered: {}", stats.edges_filtered);
    }
    println!("   Canonical records: {}", stats.records_emitted);
    println!("   Evidence entries: {}", stats.evidence_entries);
    println!("   Duplicate evidence: {}", stats.duplicate_evidence);
    println!("   Numeric fallbacks: {}", stats.coercion_fallbacks);
}

fn build_use_case(catalog: SourceCatalog, output: PathBuf) -> ReconcileUseCase {
    ReconcileUseCase::new(
        Arc::new(catalog),
        Arc::new(NdjsonOutputAdapter::new(output)),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    init_metrics();

    let cli = Cli::parse();
    let catalog = SourceCatalog::load_with_overrides(cli.catalog.as_ref())?;

    match cli.command {
        Commands::Sources => {
            for source in &catalog.sources {
                let format = match source.format {
                    SourceFormat::Tabular => "tabular",
                    SourceFormat::GraphExchange => "graph_exchange",
                };
                println!(
                    "{:<16} {:<15} {}",
                    source.source_id,
                    format,
                    source.description.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Reconcile {
            source,
            input,
            output,
        } => {
            let use_case = build_use_case(catalog, output);
            let report = use_case
                .reconcile_file(&ReconcileJob::new(source, input))
                .await?;
            print_report(&report);
        }
        Commands::Batch { jobs, output } => {
            let jobs = jobs
                .iter()
                .map(|spec| ReconcileJob::parse(spec))
                .collect::<Result<Vec<_>>>()?;
            let use_case = build_use_case(catalog, output);

            let mut failures = 0;
            for (job, result) in use_case.reconcile_all(jobs).await {
                match result {
                    Ok(report) => print_report(&report),
                    Err(e) => {
                        failures += 1;
                        error!("Source {} failed: {:#}", job.source_id, e);
                        println!("\n❌ {} ({}) failed: {:#}", job.source_id, job.input.display(), e);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} source(s) failed", failures);
            }
            info!("All sources reconciled");
        }
    }

    Ok(())
}
