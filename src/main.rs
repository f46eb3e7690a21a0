//! db-guard - read-only SQL guard for agent tool calls.

use std::process::ExitCode;
use std::sync::Arc;

use db_guard::cli::{Cli, Command};
use db_guard::config::Config;
use db_guard::db::{self, DatabaseClient};
use db_guard::error::{GuardError, Result};
use db_guard::guard::SqlGuard;
use db_guard::logging;
use db_guard::safety::{build_checker, ValidationOutcome};
use db_guard::tool::{tool_definition, ToolResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

/// Exit status for `check` when the statement is rejected.
const EXIT_REJECTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => {
            if let Err(e) = logging::init_file_logging(path) {
                eprintln!("Warning: {e}");
                logging::init_stderr_logging();
            }
        }
        None => logging::init_stderr_logging(),
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command {
        Command::ToolSchema => {
            let definition = tool_definition(&config.tool);
            let json = serde_json::to_string_pretty(&definition)
                .map_err(|e| GuardError::internal(e.to_string()))?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { sql } => {
            let backend = config
                .database
                .connection_config()
                .map(|c| c.backend)
                .unwrap_or_default();
            let checker = build_checker(config.guard.checker, config.guard.policy(), backend)?;
            match checker.check(&sql) {
                ValidationOutcome::Accepted(normalized) => {
                    println!("{normalized}");
                    Ok(ExitCode::SUCCESS)
                }
                ValidationOutcome::Rejected(violation) => {
                    println!("{}", ToolResult::from(violation).as_text().unwrap_or_default());
                    Ok(ExitCode::from(EXIT_REJECTED))
                }
            }
        }
        Command::Exec { sql } => {
            let guard = open_guard(&config).await?;
            let result = guard.execute_sql(&sql).await;
            println!("{}", result.to_json());
            guard.close().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve => {
            let guard = open_guard(&config).await?;
            let served = serve(&guard).await;
            guard.close().await?;
            served.map(|()| ExitCode::SUCCESS)
        }
    }
}

async fn open_guard(config: &Config) -> Result<SqlGuard> {
    let connection = config.database.connection_config()?;
    info!("Connecting to {}", connection.display_string());
    let client: Arc<dyn DatabaseClient> = db::connect(&connection).await?;
    let guard = SqlGuard::from_config(config, client)?;
    info!(checker = guard.checker_name(), "Guard ready");
    Ok(guard)
}

/// Answers one JSON tool call per stdin line until EOF.
async fn serve(guard: &SqlGuard) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| GuardError::internal(format!("Failed to read stdin: {e}")))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(arguments) => guard.call(&arguments).await,
            Err(e) => ToolResult::error(format!("invalid tool input: {e}")),
        };

        let mut output = result.to_json();
        output.push('\n');
        stdout
            .write_all(output.as_bytes())
            .await
            .map_err(|e| GuardError::internal(format!("Failed to write stdout: {e}")))?;
        stdout
            .flush()
            .await
            .map_err(|e| GuardError::internal(format!("Failed to write stdout: {e}")))?;
    }

    info!("Input closed, shutting down");
    Ok(())
}
