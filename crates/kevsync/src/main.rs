//! KEV Sync - CISA Known Exploited Vulnerabilities synchronizer
//!
//! Fetches the KEV feed, optionally validates it against its JSON Schema,
//! and reconciles the local SQLite collection with it.

mod progress;

use anyhow::Result;
use clap::Parser;
use kevsync_common::{init_logging, init_logging_to, redact_credentials, Config, LogSettings};
use kevsync_core::{EntryPolicy, Error, SyncReport};
use kevsync_db::SqliteKevStore;
use kevsync_sync::{KevSync, SyncOptions};
use progress::ProgressObserver;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// KEV Sync
#[derive(Parser, Debug)]
#[command(name = "kevsync")]
#[command(version)]
#[command(about = "Synchronize the CISA KEV catalog into a local store", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/kevsync/kevsync.toml")]
    config_file: String,

    /// Log level (overrides config)
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// Log format (overrides config)
    #[arg(long, value_parser = ["pretty", "json", "compact"])]
    log_format: Option<String>,

    /// KEV JSON feed URL (overrides config)
    #[arg(long)]
    json_url: Option<String>,

    /// KEV JSON Schema URL (overrides config)
    #[arg(long, conflicts_with = "no_schema")]
    schema_url: Option<String>,

    /// Skip schema validation even if a schema URL is configured
    #[arg(long)]
    no_schema: bool,

    /// SQLite database path (overrides config)
    #[arg(long)]
    database: Option<String>,

    /// Handling of feed entries without a cveID (skip, abort)
    #[arg(long)]
    on_missing_identifier: Option<EntryPolicy>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(Error::PartialSync(report)) = e.downcast_ref::<Error>() {
                print_summary(report);
            }
            eprintln!("kevsync: {}", redact_credentials(&format!("{:#}", e)));
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(args: Args) -> Result<SyncReport> {
    let (config, from_file) = load_config(&args)?;
    let settings = LogSettings::from_config(&config.logging)?;

    let progress = (!args.no_progress).then(|| Arc::new(ProgressObserver::new()));
    match progress {
        Some(ref observer) => init_logging_to(&settings, observer.writer()),
        None => init_logging(&settings),
    }

    info!("KEV Sync starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if !from_file {
        info!("Config file {} not found, using defaults", args.config_file);
    }
    info!("Database: {}", config.database.path);

    let store = SqliteKevStore::open(&config.database.path)?;
    let mut sync = KevSync::new(store, SyncOptions::from(&config.kevsync))?;
    if let Some(ref observer) = progress {
        sync = sync.with_observer(observer.clone());
    }

    let token = sync.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current record");
            token.cancel();
        }
    });

    let result = sync.run().await;
    if let Some(observer) = progress {
        observer.finish();
    }

    Ok(result?)
}

/// Load the config file (or defaults), then apply env and CLI overrides
fn load_config(args: &Args) -> Result<(Config, bool)> {
    let path = Path::new(&args.config_file);
    let from_file = path.exists();
    let config = if from_file {
        Config::from_file(path)?
    } else {
        Config::default()
    };

    let mut config = config.merge_env()?;

    if let Some(ref url) = args.json_url {
        config.kevsync.json_url = url.clone();
    }
    if args.no_schema {
        config.kevsync.schema_url = None;
    } else if let Some(ref url) = args.schema_url {
        config.kevsync.schema_url = Some(url.clone());
    }
    if let Some(ref path) = args.database {
        config.database.path = path.clone();
    }
    if let Some(policy) = args.on_missing_identifier {
        config.kevsync.on_missing_identifier = policy;
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref format) = args.log_format {
        config.logging.format = format.clone();
    }

    config.validate()?;
    Ok((config, from_file))
}

/// Map a failure to the process exit status
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::Configuration(_)) | Some(Error::InvalidConfig { .. }) => 2,
        Some(Error::PartialSync(_)) => 4,
        Some(e) if e.is_fatal() => 3,
        _ => 1,
    }
}

fn print_summary(report: &SyncReport) {
    println!("KEV sync summary");
    println!("  created:   {}", report.created);
    println!("  updated:   {}", report.updated);
    println!("  unchanged: {}", report.unchanged);
    println!("  deleted:   {}", report.deleted);
    println!("  skipped:   {}", report.skipped);
    if report.duplicates > 0 {
        println!("  duplicate: {}", report.duplicates);
    }
    println!("  stored:    {}", report.stored_total);
    if report.count_mismatch {
        println!("  warning: feed count did not match its entry list");
    }
    for failure in &report.failures {
        println!(
            "  failed {} of {}: {}",
            failure.operation, failure.id, failure.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["kevsync", "--config-file", "/nonexistent/kevsync.toml"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = args(&[
            "--json-url",
            "https://mirror.example.com/kev.json",
            "--schema-url",
            "https://mirror.example.com/kev.schema.json",
            "--database",
            "/tmp/kev.db",
            "--on-missing-identifier",
            "abort",
        ]);

        let (config, from_file) = load_config(&args).unwrap();
        assert!(!from_file);
        assert_eq!(config.kevsync.json_url, "https://mirror.example.com/kev.json");
        assert_eq!(
            config.kevsync.schema_url.as_deref(),
            Some("https://mirror.example.com/kev.schema.json")
        );
        assert_eq!(config.database.path, "/tmp/kev.db");
        assert_eq!(config.kevsync.on_missing_identifier, EntryPolicy::Abort);
    }

    #[test]
    fn test_no_schema_conflicts_with_schema_url() {
        let result = Args::try_parse_from([
            "kevsync",
            "--no-schema",
            "--schema-url",
            "https://example.com/schema.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        assert!(Args::try_parse_from(["kevsync", "--log-level", "verbose"]).is_err());
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let args = args(&["--json-url", "ftp://example.com/kev.json"]);
        let err = load_config(&args).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_bad_log_format_is_config_error() {
        let mut config = Config::default();
        config.logging.format = String::from("xml");
        let err = anyhow::Error::from(LogSettings::from_config(&config.logging).unwrap_err());
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_help_names_no_author() {
        use clap::CommandFactory;
        assert!(Args::command().get_author().is_none());
    }

    #[test]
    fn test_exit_codes() {
        let partial = anyhow::Error::from(Error::PartialSync(Box::default()));
        assert_eq!(exit_code(&partial), 4);

        let schema = anyhow::Error::from(Error::SchemaViolation {
            violations: vec![String::from("/count: not an integer")],
        });
        assert_eq!(exit_code(&schema), 3);

        let transport = anyhow::Error::from(Error::Transport {
            url: String::from("https://example.com"),
            message: String::from("connection refused"),
            timed_out: false,
        });
        assert_eq!(exit_code(&transport), 3);

        let db = anyhow::Error::from(Error::Database(String::from("disk full")));
        assert_eq!(exit_code(&db), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }
}
