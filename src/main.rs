//! scribelock entry point
//!
//! Parses args, loads configuration, wires the core, then serves one JSON
//! command per stdin line with one envelope per stdout line. The real
//! transport (HTTP + streaming) lives outside this crate; this loop is the
//! debug surface.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use scribelock::config::ServiceConfig;
use scribelock::observability::Logger;
use scribelock::router::CommandRouter;

/// scribelock - single-writer chat service core
#[derive(Parser, Debug)]
#[command(name = "scribelock")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Write a default configuration file
    InitConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./scribelock.json")]
        config: PathBuf,
    },

    /// Run the service on stdin/stdout
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "./scribelock.json")]
        config: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<ServiceConfig, String> {
    if !path.exists() {
        return Ok(ServiceConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::InitConfig { config } => {
            let default = ServiceConfig::default();
            let body = serde_json::to_string_pretty(&default)
                .expect("default config serialization cannot fail");
            if let Err(e) = std::fs::write(&config, body) {
                Logger::fatal("CONFIG_WRITE_FAILED", &[("error", &e.to_string())]);
                process::exit(1);
            }
            Logger::info(
                "CONFIG_WRITTEN",
                &[("path", &config.display().to_string())],
            );
        }

        CliCommand::Run { config } => {
            let config = match load_config(&config) {
                Ok(config) => config,
                Err(e) => {
                    Logger::fatal("CONFIG_LOAD_FAILED", &[("error", &e)]);
                    process::exit(1);
                }
            };

            let router = match CommandRouter::build(&config) {
                Ok(router) => router,
                Err(e) => {
                    Logger::fatal("STARTUP_FAILED", &[("error", &e.to_string())]);
                    process::exit(1);
                }
            };

            let _maintenance = router.spawn_maintenance(
                Duration::from_millis(config.reconcile_interval_ms),
                Duration::from_secs(1),
            );
            Logger::info("SERVICE_STARTED", &[]);

            serve_stdio(router).await;
        }
    }
}

/// One JSON command per line in, one envelope per line out.
async fn serve_stdio(router: Arc<CommandRouter>) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let envelope = router.handle(line);
                println!("{}", envelope.to_json());
            }
            Ok(None) => break,
            Err(e) => {
                Logger::error("STDIN_READ_FAILED", &[("error", &e.to_string())]);
                break;
            }
        }
    }

    Logger::info("SERVICE_STOPPED", &[]);
}
