//! `sources` subcommands: read-only views of a tenant's sources.

use clap::Subcommand;
use pulse_analysis::AnalysisService;

#[derive(Debug, Subcommand)]
pub enum SourcesCommands {
    /// List sources the tenant may analyse
    List {
        #[arg(long)]
        tenant: i64,
    },
    /// Document totals and date bounds for one source
    Stats {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        source: i64,
    },
}

pub(crate) async fn run(service: &AnalysisService, command: SourcesCommands) -> anyhow::Result<()> {
    match command {
        SourcesCommands::List { tenant } => {
            let sources = service.list_sources(tenant).await?;
            if sources.is_empty() {
                println!("no sources for tenant {tenant}");
            }
            for source in &sources {
                println!(
                    "{:>6}  {:<24}  {:<8}  {}",
                    source.id, source.name, source.source_type, source.ingestion_mode
                );
            }
        }
        SourcesCommands::Stats { tenant, source } => {
            let stats = service.source_stats(tenant, source).await?;
            let fmt = |ts: Option<chrono::DateTime<chrono::Utc>>| {
                ts.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
            };
            println!(
                "source {}: {} documents, {} .. {}",
                stats.source_id,
                stats.total_documents,
                fmt(stats.date_min),
                fmt(stats.date_max)
            );
        }
    }
    Ok(())
}
