//! Handshake sync agent.
//!
//! Verifies that a service and the services it depends on agree on their
//! published contracts, and records the verdict in the service's own
//! repository.

#![forbid(unsafe_code)]

mod checker;
mod git_cli;
mod git_exec;
mod http_api;
mod loader;
mod orchestrator;
mod repo_cache;
mod repo_locks;
mod state_writer;
#[cfg(test)]
mod test_support;
mod walker;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use handshake_common::{ErrorCode, HandshakeConfig, LogConfig, init_logging};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use git_cli::GitCliTransport;
use orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "handshaked")]
#[command(author, version, about = "Handshake sync agent - contract handshakes between services")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Root directory for working copies (overrides HANDSHAKE_WORK_DIR)
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger
    Serve {
        /// Port to listen on (overrides HANDSHAKE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one handshake and print the resulting actualState as JSON
    Check {
        /// Repository URL, e.g. https://github.com/acme/checkout.git
        url: String,
    },
    /// Clone or update one working copy and print its local path
    Sync {
        /// Repository URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = HandshakeConfig::from_env().map_err(|errors| {
        anyhow::anyhow!("{}\n{errors}", ErrorCode::ConfigEnvError.entry().format_brief())
    })?;
    if let Some(work_dir) = cli.work_dir {
        config = config.with_work_dir(work_dir);
    }
    if let Commands::Serve { port: Some(port) } = cli.command {
        config = config.with_port(port);
    }

    let mut log_config = LogConfig::from_config(&config);
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if !matches!(cli.command, Commands::Serve { .. }) {
        log_config = log_config.with_stderr();
    }
    let _log_guards = init_logging(&log_config)?;

    let transport = Arc::new(GitCliTransport::new(
        config.git_binary.value.clone(),
        config.git_timeout(),
    ));
    let orchestrator = Arc::new(Orchestrator::from_config(&config, transport));

    match cli.command {
        Commands::Serve { .. } => {
            info!(
                work_dir = %config.work_dir.value.display(),
                work_dir_source = %config.work_dir.describe_source(),
                failure_mode = %config.failure_mode.value,
                max_concurrent_git = config.max_concurrent_git.value,
                "Starting handshake daemon"
            );
            let addr = SocketAddr::new(config.bind_addr.value, config.port.value);
            let state = http_api::HttpState {
                orchestrator,
                version: env!("CARGO_PKG_VERSION"),
                started_at: Instant::now(),
            };
            http_api::serve(addr, state)
                .await
                .with_context(|| format!("HTTP server on {addr} failed"))?;
        }
        Commands::Check { url } => {
            let state = orchestrator
                .handshake(&url)
                .await
                .map_err(|e| anyhow::anyhow!("{}\n{e}", e.error_code().entry().format_full()))?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            if !state.handshake_status {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Sync { url } => {
            let resolved = orchestrator
                .sync(&url)
                .await
                .map_err(|e| anyhow::anyhow!("{}\n{e}", e.error_code().entry().format_brief()))?;
            println!("{}", resolved.local_path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
