//! `jobs` subcommands: submit, inspect, run and reap analysis jobs.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Subcommand;
use pulse_analysis::{AnalysisService, ExecuteOutcome, SubmitRequest};
use pulse_core::{AnalysisJob, AnalysisScope, AppConfig, ModelRef};
use serde_json::{Map, Value};

#[derive(Debug, Subcommand)]
pub enum JobsCommands {
    /// Create an analysis job and enqueue it
    Submit {
        #[arg(long)]
        tenant: i64,
        /// Source ids to include (repeat or comma-separate)
        #[arg(long = "source", value_delimiter = ',', required = true)]
        sources: Vec<i64>,
        /// Inclusive lower bound (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_timestamp)]
        from: DateTime<Utc>,
        /// Inclusive upper bound (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_timestamp)]
        to: DateTime<Utc>,
        /// Case-insensitive text filter over title and body
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        model_name: Option<String>,
        #[arg(long)]
        model_version: Option<String>,
        /// Opaque JSON object stored with the job
        #[arg(long)]
        params: Option<String>,
    },
    /// Show a tenant's most recent jobs
    List {
        #[arg(long)]
        tenant: i64,
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show one job record
    Show {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        job: i64,
    },
    /// Show the report and trend events of a finished job
    Overview {
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        job: i64,
    },
    /// Execute a job in this process, as if it had been delivered
    Run {
        #[arg(long)]
        job: i64,
    },
    /// Move jobs stuck in RUNNING to ERROR
    Reap {
        /// Only jobs started more than this many minutes ago
        #[arg(long)]
        older_than_mins: u32,
    },
}

/// Accept a full RFC 3339 timestamp or a bare date (UTC midnight).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| format!("expected RFC 3339 timestamp or YYYY-MM-DD, got {raw:?}"))
}

fn parse_params(raw: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("--params must be a JSON object, got {other}"),
    }
}

fn print_job_line(job: &AnalysisJob) {
    println!(
        "{:>6}  {:<8}  {}  sources={:?}  {}",
        job.id,
        job.status,
        job.created_at.format("%Y-%m-%d %H:%M:%S"),
        job.scope.source_ids(),
        job.error.as_deref().unwrap_or(""),
    );
}

pub(crate) async fn run(
    service: &AnalysisService,
    config: &AppConfig,
    command: JobsCommands,
) -> anyhow::Result<()> {
    match command {
        JobsCommands::Submit {
            tenant,
            sources,
            from,
            to,
            query,
            model_name,
            model_version,
            params,
        } => {
            let scope = AnalysisScope::new(sources, from, to, query.as_deref())?;
            let request = SubmitRequest {
                tenant_id: tenant,
                model: ModelRef {
                    name: model_name.unwrap_or_else(|| config.default_model_name.clone()),
                    version: model_version.unwrap_or_else(|| config.default_model_version.clone()),
                },
                scope,
                params: parse_params(params.as_deref())?,
            };
            let job = service.submit(request).await?;
            println!("submitted job {} ({})", job.id, job.status);
        }
        JobsCommands::List { tenant, limit } => {
            let jobs = service.list_recent(tenant, limit).await?;
            if jobs.is_empty() {
                println!("no jobs for tenant {tenant}");
            }
            for job in &jobs {
                print_job_line(job);
            }
        }
        JobsCommands::Show { tenant, job } => {
            let job = service.get_job(tenant, job).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        JobsCommands::Overview { tenant, job } => {
            let report = service.get_overview(tenant, job).await?;
            let events = service.list_trend_events(tenant, job).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            for ev in &events {
                println!(
                    "{}  {:<5}  value={} baseline={:.2} z={:.2}",
                    ev.ts.format("%Y-%m-%d"),
                    ev.kind,
                    ev.value,
                    ev.baseline,
                    ev.z
                );
            }
        }
        JobsCommands::Run { job } => match service.execute(job).await? {
            ExecuteOutcome::Completed {
                total_documents,
                trends_found,
                sentiment_mode,
            } => println!(
                "job {job} done: {total_documents} documents, {trends_found} trends, sentiment {sentiment_mode}"
            ),
            ExecuteOutcome::SkippedTerminal(status) => {
                println!("job {job} already {status}; nothing to do");
            }
            ExecuteOutcome::SkippedRunning => println!("job {job} is already running"),
            ExecuteOutcome::Missing => anyhow::bail!("job {job} does not exist"),
        },
        JobsCommands::Reap { older_than_mins } => {
            let cutoff = Utc::now() - Duration::minutes(i64::from(older_than_mins));
            let reaped = service.reap_stale(cutoff).await?;
            println!("reaped {} stale job(s): {reaped:?}", reaped.len());
        }
    }
    Ok(())
}
