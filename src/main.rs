//! aish - interactive shell with AI-assisted commands and background jobs.
//!
//! Thin binary entry point: parse arguments, load configuration, then either
//! dispatch a single line or run the REPL.

use std::process::ExitCode;
use std::sync::Arc;

use aish_config::ShellConfig;
use aish_core::{CommandDispatcher, ShellContext};
use anyhow::{Context, Result};
use clap::Parser;
use colorchoice::ColorChoice;

mod cli;
mod repl;

use cli::Cli;

/// Targets enabled at debug level by `AISH_DEBUG`.
const DEBUG_TARGETS: &str = "aish=debug,aish_core=debug,aish_bash_runner=debug,aish_config=debug";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    if args.no_color {
        ColorChoice::Never.write_global();
    }

    let config = ShellConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    initialize_tracing(config.debug);
    tracing::debug!(?config, "configuration loaded");

    let ctx = ShellContext::from_config(config).context("failed to start shell session")?;
    let dispatcher = CommandDispatcher::new(Arc::new(ctx));

    if let Some(line) = args.one_shot_line() {
        let outcome = dispatcher.execute(&line).await;
        return Ok(if outcome.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    repl::run(&dispatcher).await?;
    Ok(ExitCode::SUCCESS)
}

/// `RUST_LOG` wins; otherwise `AISH_DEBUG` turns on debug output for the
/// shell's own crates and everything else stays at `warn`.
fn initialize_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, prelude::*};

    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new(DEBUG_TARGETS)
    } else {
        EnvFilter::new("warn")
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();

    if let Err(err) = init_result {
        eprintln!("warning: tracing already initialized: {err}");
    }
}
