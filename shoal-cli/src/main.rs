//! Shoal CLI - Command-line interface
//!
//! Runs the streaming gateway and offers small locator utilities.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use shoal_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "shoal")]
#[command(about = "Swarm-backed HTTP range streaming gateway")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level (RUST_LOG overrides)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for the full debug log of this run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Commands;

    #[test]
    fn test_server_arguments() {
        let cli = Cli::try_parse_from([
            "shoal",
            "server",
            "--port",
            "8080",
            "--idle-grace",
            "30",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level, CliLogLevel::Debug);
        match cli.command {
            Commands::Server {
                port, idle_grace, host, ..
            } => {
                assert_eq!(port, Some(8080));
                assert_eq!(idle_grace, Some(30));
                assert_eq!(host, None);
            }
            Commands::Resolve { .. } => panic!("expected server command"),
        }
    }

    #[test]
    fn test_resolve_requires_locator() {
        assert!(Cli::try_parse_from(["shoal", "resolve"]).is_err());
        assert!(Cli::try_parse_from(["shoal", "resolve", "abc"]).is_ok());
    }
}
