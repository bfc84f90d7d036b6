//! tulp CLI Binary
//!
//! Parses the command line, initializes logging and runs one invocation, racing it
//! against Ctrl-C. This is the only place the process exits.

use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::{debug, error};
use tulp::cli::{map_error, Cli, RunContext};
use tulp::config::ConfigLoader;
use tulp::error::TulpError;
use tulp::exit_codes;
use tulp::logging::{init_logging, LoggingConfig};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(exit_codes::SETUP_ERROR);
    }

    debug!(version = env!("CARGO_PKG_VERSION"), "tulp starting");

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("tulp: {:#}", e);
            exit_codes::BACKEND_ERROR
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let code = runtime.block_on(async move {
        let context = match RunContext::new(&cli) {
            Ok(context) => context,
            Err(e) => return report(&e),
        };

        tokio::select! {
            biased;
            result = context.execute(&cli) => match result {
                Ok(code) => code,
                Err(e) => report(&e),
            },
            _ = tokio::signal::ctrl_c() => report(&TulpError::Interrupted),
        }
    });
    // A stdin read still blocked on the terminal must not hold up exit
    runtime.shutdown_background();
    Ok(code)
}

fn report(e: &TulpError) -> i32 {
    error!(error = %e, "Run failed");
    eprintln!("{}", map_error(e));
    e.exit_code()
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults; `TULP_LOG` beats all
/// of them inside `init_logging`.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = ConfigLoader::load(cli.config.as_deref())
        .ok()
        .map(|c| c.logging)
        .unwrap_or_default();

    if cli.quiet {
        config.level = "error".to_string();
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }

    config
}
