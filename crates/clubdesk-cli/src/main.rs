//! clubdesk - a command-line student dashboard.
//!
//! Browse and apply to clubs, follow applications, check attendance and
//! keep track of external courses, all against the university club API.

mod browse;
mod commands;
mod format;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clubdesk_core::auth::CredentialStore;
use clubdesk_core::{ApiClient, ApiError, Config, QueryCache, SessionStore, StudentApi};

// ============================================================================
// Constants
// ============================================================================

/// Log file name prefix; the appender adds the date
const LOG_FILE_PREFIX: &str = "clubdesk.log";

// ============================================================================
// Command line
// ============================================================================

#[derive(Parser)]
#[command(name = "clubdesk")]
#[command(about = "Student dashboard for university clubs, attendance and external courses", long_about = None)]
struct Cli {
    /// API root, overriding config and CLUBDESK_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Log in with HEMIS credentials
    Login {
        /// Student ID; defaults to the last one used
        student_id: Option<String>,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// End the session
    Logout {
        /// Also delete the remembered password
        #[arg(long)]
        forget: bool,
    },
    /// Show or update the profile
    Profile {
        /// Set a new email address
        #[arg(long)]
        email: Option<String>,
    },
    /// Change the account password
    ChangePassword,
    /// Overview: statistics, active clubs, courses and notifications
    Dashboard,
    /// List clubs open for enrollment
    Clubs {
        #[arg(long)]
        faculty: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one club
    Club { id: String },
    /// Apply to a club
    Apply { id: String },
    /// List your applications
    Applications,
    /// List the clubs you are enrolled in
    MyClubs,
    /// Attendance history and summary
    Attendance {
        /// Only this club
        #[arg(long)]
        club: Option<String>,
        /// From date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// To date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Manage external courses
    Courses {
        #[command(subcommand)]
        command: CourseCommand,
    },
    /// Interactive club browser with live search
    Browse,
}

#[derive(Subcommand)]
pub(crate) enum CourseCommand {
    /// List external courses
    List,
    /// Add an external course
    Add(CourseArgs),
    /// Update an external course; unset fields keep their value
    Update {
        id: String,
        #[command(flatten)]
        args: CourseArgs,
    },
    /// Delete an external course
    Delete { id: String },
}

#[derive(Args, Default)]
pub(crate) struct CourseArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub institution: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    /// Weekdays, 1 = Monday .. 7 = Sunday, comma separated
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<u8>,
    /// Start time (HH:MM)
    #[arg(long)]
    pub start_time: Option<String>,
    /// End time (HH:MM)
    #[arg(long)]
    pub end_time: Option<String>,
    #[arg(long)]
    pub instructor: Option<String>,
    #[arg(long)]
    pub instructor_phone: Option<String>,
    /// Your phone number for the course
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

// ============================================================================
// Setup
// ============================================================================

/// Initialize the tracing subscriber.
///
/// Logs go to a daily file so they never interleave with table output.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring config: {:#}", e);
        Config::default()
    });

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = match config.log_dir().and_then(|dir| init_tracing(&dir)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        }
    };

    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| config.resolve_api_url());
    info!(api_url = %api_url, "clubdesk starting");

    let session = Arc::new(SessionStore::new(config.session_dir()?));
    session.load().context("Failed to load session")?;

    let credentials = CredentialStore::for_api(&api_url);
    let client = ApiClient::http(&api_url, session)?;
    let api = StudentApi::new(QueryCache::new(client));

    // A rejected login must not end an existing session
    let is_login = matches!(cli.command, Commands::Login { .. });
    let result = commands::run(&api, &mut config, &credentials, cli.command).await;

    if let (Err(e), false) = (&result, is_login) {
        if let Some(api_err) = e.downcast_ref::<ApiError>() {
            if api.end_session_on_auth_failure(api_err) {
                eprintln!("Your session has ended. Run `clubdesk login` to sign in again.");
            }
        }
    }

    result
}
