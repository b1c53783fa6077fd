//! Command-line front end for the roster workflow.
//!
//! # Responsibility
//! - Load configuration once and inject it into the store and notifier.
//! - Run one submission (or list stored identities) and print the status message.
//!
//! # Exit codes
//! - `0` for every workflow terminal state.
//! - `2` when input fails validation.
//! - `1` for configuration, storage, or logging failures, including a
//!   `ROSTER_DEDUP_KEY` that differs from the one the database was created with.

use clap::{Parser, Subcommand};
use log::error;
use roster_core::config::ENV_DEDUP_KEY;
use roster_core::db::open_db;
use roster_core::{
    default_log_level, init_logging, AppConfig, ConfigError, MailgunNotifier, RepoError,
    SqliteIdentityRepository, SubmissionError, SubmissionRequest, SubmissionService,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "roster", version, about = "Collect names and notify operators")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "ROSTER_DB_PATH", default_value = "roster.sqlite3")]
    db: PathBuf,

    /// Directory for rolling log files. Defaults to `./logs`.
    #[arg(long, env = "ROSTER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "ROSTER_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit one identity.
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Print every stored identity in insertion order.
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(message) = start_logging(&cli) {
        eprintln!("error: {message}");
        return ExitCode::from(1);
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("event=config_load module=cli status=error error={err}");
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };

    let conn = match open_db(&cli.db) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("error: failed to open `{}`: {err}", cli.db.display());
            return ExitCode::from(1);
        }
    };

    let repo = match SqliteIdentityRepository::try_new(&conn, config.dedup_key) {
        Ok(repo) => repo,
        Err(err @ RepoError::DedupKeyMismatch { .. }) => {
            let err = ConfigError::Invalid {
                key: ENV_DEDUP_KEY,
                message: err.to_string(),
            };
            error!("event=config_load module=cli status=error error={err}");
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };
    let notifier = match MailgunNotifier::new(config.mailgun) {
        Ok(notifier) => notifier,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };
    let service = SubmissionService::new(repo, notifier, config.workflow);

    match cli.command {
        Command::Submit { name, email } => {
            match service.submit(&SubmissionRequest::new(name, email)) {
                Ok(outcome) => {
                    println!("{}", outcome.status_message());
                    ExitCode::SUCCESS
                }
                Err(err @ SubmissionError::Validation(_)) => {
                    eprintln!("{}", err.status_message());
                    ExitCode::from(2)
                }
                Err(err) => {
                    eprintln!("{}", err.status_message());
                    ExitCode::from(1)
                }
            }
        }
        Command::List => match service.list_identities() {
            Ok(identities) => {
                for identity in identities {
                    println!(
                        "{}\t{}\t{}",
                        identity.created_at_ms,
                        identity.name,
                        identity.email.as_deref().unwrap_or("-")
                    );
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::from(1)
            }
        },
    }
}

fn start_logging(cli: &Cli) -> Result<(), String> {
    let log_dir = match &cli.log_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => current_dir()?.join(dir),
        None => current_dir()?.join("logs"),
    };
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let log_dir = log_dir
        .to_str()
        .ok_or_else(|| format!("log directory `{}` is not valid UTF-8", log_dir.display()))?;
    init_logging(level, log_dir)
}

fn current_dir() -> Result<PathBuf, String> {
    std::env::current_dir().map_err(|err| format!("cannot resolve working directory: {err}"))
}
