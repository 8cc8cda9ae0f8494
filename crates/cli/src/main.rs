//! Salon CLI - command-line host for the salon booking API client

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use salon_client::{ClientError, SessionEvent};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{Level, error, info};

/// Exit status when the session has to be re-established by logging in
const EXIT_SESSION_EXPIRED: i32 = 2;

#[derive(Parser)]
#[command(name = "salon")]
#[command(about = "Command-line client for the salon booking API")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Act as the admin dashboard (expired sessions point at the admin login)
    #[arg(long, global = true)]
    admin: bool,

    /// Timeout for the whole command in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "120")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.into(), cli.log_json)?;

    let settings = config::Overrides {
        path: cli.config.clone(),
        base_url: cli.base_url.clone(),
        admin: cli.admin,
    };

    let command = match cli.command {
        Commands::Config { command } => return command.execute(&settings),
        Commands::Api(command) => command,
    };

    let client = config::build_client(&settings)?;
    let mut events = client.subscribe();

    let outcome = if cli.timeout == 0 {
        command.execute(&client).await
    } else {
        let limit = Duration::from_secs(cli.timeout);
        match tokio::time::timeout(limit, command.execute(&client)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    };

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) if session_expired(&e) => {
            let route = expired_login_route(&mut events)
                .unwrap_or_else(|| client.config().surface.login_route());
            error!("Session expired: {e:#}");
            eprintln!("Session expired, log in again ({route})");
            std::process::exit(EXIT_SESSION_EXPIRED);
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn session_expired(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ClientError>(),
            Some(ClientError::SessionExpired(_))
        )
    })
}

fn expired_login_route(events: &mut broadcast::Receiver<SessionEvent>) -> Option<&'static str> {
    let mut route = None;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Expired { login_route, .. } = event {
            route = Some(login_route);
        }
    }
    route
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
