use chrono::{TimeZone, Utc};

use super::*;
use crate::jobs::parse_timestamp;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["pulse-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["pulse-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["pulse-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_submit_with_repeated_and_comma_separated_sources() {
    let cli = Cli::try_parse_from([
        "pulse-cli",
        "jobs",
        "submit",
        "--tenant",
        "7",
        "--source",
        "1,2",
        "--source",
        "3",
        "--from",
        "2024-01-01",
        "--to",
        "2024-01-31T23:59:59Z",
        "--query",
        "rates",
    ])
    .unwrap();

    let Some(Commands::Jobs {
        command:
            JobsCommands::Submit {
                tenant,
                sources,
                from,
                to,
                query,
                model_name,
                params,
                ..
            },
    }) = cli.command
    else {
        panic!("expected jobs submit");
    };
    assert_eq!(tenant, 7);
    assert_eq!(sources, vec![1, 2, 3]);
    assert_eq!(from, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(to, Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
    assert_eq!(query.as_deref(), Some("rates"));
    assert!(model_name.is_none());
    assert!(params.is_none());
}

#[test]
fn submit_requires_a_source() {
    let result = Cli::try_parse_from([
        "pulse-cli",
        "jobs",
        "submit",
        "--tenant",
        "7",
        "--from",
        "2024-01-01",
        "--to",
        "2024-02-01",
    ]);
    assert!(result.is_err());
}

#[test]
fn submit_rejects_unparseable_dates() {
    let result = Cli::try_parse_from([
        "pulse-cli",
        "jobs",
        "submit",
        "--tenant",
        "7",
        "--source",
        "1",
        "--from",
        "last tuesday",
        "--to",
        "2024-02-01",
    ]);
    assert!(result.is_err());
}

#[test]
fn list_limit_defaults_to_twenty() {
    let cli = Cli::try_parse_from(["pulse-cli", "jobs", "list", "--tenant", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Jobs {
            command: JobsCommands::List {
                tenant: 3,
                limit: 20
            }
        })
    ));
}

#[test]
fn parses_run_and_reap() {
    let run = Cli::try_parse_from(["pulse-cli", "jobs", "run", "--job", "42"]).unwrap();
    assert!(matches!(
        run.command,
        Some(Commands::Jobs {
            command: JobsCommands::Run { job: 42 }
        })
    ));

    let reap =
        Cli::try_parse_from(["pulse-cli", "jobs", "reap", "--older-than-mins", "90"]).unwrap();
    assert!(matches!(
        reap.command,
        Some(Commands::Jobs {
            command: JobsCommands::Reap {
                older_than_mins: 90
            }
        })
    ));
}

#[test]
fn parses_source_stats() {
    let cli = Cli::try_parse_from([
        "pulse-cli",
        "sources",
        "stats",
        "--tenant",
        "1",
        "--source",
        "9",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sources {
            command: SourcesCommands::Stats {
                tenant: 1,
                source: 9
            }
        })
    ));
}

#[test]
fn worker_concurrency_override_is_optional() {
    let cli = Cli::try_parse_from(["pulse-cli", "worker"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Worker { concurrency: None })
    ));

    let cli = Cli::try_parse_from(["pulse-cli", "worker", "--concurrency", "8"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Worker {
            concurrency: Some(8)
        })
    ));
}

#[test]
fn timestamp_parser_accepts_offsets() {
    let ts = parse_timestamp("2024-03-01T02:00:00+02:00").unwrap();
    assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    assert!(parse_timestamp("2024-13-01").is_err());
}
