//! `guardian-cli` – LiDAR Collision Guardian command line
//!
//! Entry point for running the collision guardian outside a vehicle stack:
//!
//! 1. Loads `~/.guardian/config.toml` (or `--config <path>`), applies
//!    `GUARDIAN_*` overrides and refuses to start on an invalid config.
//! 2. `replay` boots the bus, transform tree, guardian node and collision
//!    monitor, then streams a recorded frame log through them while printing
//!    every safety-status transition.
//! 3. Intercepts **Ctrl-C** to stop the pipeline cleanly.

mod config;
mod run;

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use config::Config;

/// Replay pace in frames per second, matching a 10 Hz spinning LiDAR.
const DEFAULT_REPLAY_RATE: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "guardian", version, about = "LiDAR collision guardian")]
struct Cli {
    /// Config file (default `~/.guardian/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file.
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Load and validate the config, then print it.
    Check,
    /// Print the JSON Schema of the config file.
    Schema,
    /// Stream a JSON-lines frame log through the guardian.
    Replay {
        log: PathBuf,
        /// Frames per second, close to the sensor's own rate; 0 replays
        /// as fast as the log can be read.
        #[arg(long, default_value_t = DEFAULT_REPLAY_RATE)]
        rate: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => match config::schema_json() {
            Ok(schema) => {
                println!("{schema}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::config_path);
            if path.exists() && !force {
                return fail(&format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ));
            }
            match config::save_to(&Config::default(), &path) {
                Ok(()) => {
                    println!(
                        "  {} Config saved to {}",
                        "✓".green().bold(),
                        path.display().to_string().bold()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => fail(&e),
            }
        }
        Commands::Check => match load_config(cli.config) {
            Ok(cfg) => {
                println!("{} {:#?}", "Config OK:".green().bold(), cfg);
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        Commands::Replay { log, rate } => {
            let cfg = match load_config(cli.config) {
                Ok(cfg) => cfg,
                Err(e) => return fail(&e),
            };

            // Hold the guard for the whole run so pending spans are flushed.
            let telemetry = guardian_runtime::init_tracing("collision-guardian");
            if telemetry.is_exporting() {
                info!("exporting spans over OTLP");
            }
            print_banner();

            let shutdown = Arc::new(AtomicBool::new(false));
            let shutdown_clone = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                println!();
                println!("{}", "⚠  Ctrl-C received – stopping guardian …".yellow().bold());
                shutdown_clone.store(true, Ordering::SeqCst);
            }) {
                warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
            }

            // The runtime is created after `init_tracing` on purpose.
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => return fail(&format!("Failed to start async runtime: {e}")),
            };
            let rate = NonZeroU32::new(rate);
            match runtime.block_on(run::replay(cfg, log, rate, shutdown)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => fail(&e),
            }
        }
    }
}

/// Load, override and validate the config.  A missing file means defaults.
fn load_config(path: Option<PathBuf>) -> Result<Config, String> {
    let path = path.unwrap_or_else(config::config_path);
    let cfg = match config::load_from(&path)? {
        Some(cfg) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        None => {
            println!(
                "  {} {} not found, using defaults.",
                "Note:".yellow(),
                path.display()
            );
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    cfg.validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;
    Ok(cfg)
}

fn fail(msg: &str) -> ExitCode {
    eprintln!("{}: {}", "Error".red().bold(), msg);
    ExitCode::FAILURE
}

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      LiDAR Collision Guardian        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!(
        "  {} {}",
        "guardian".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}
