//! Stackscope: a live terminal dashboard for the containers of one compose stack.
//!
//! The library discovers the stack's containers through the engine API, keeps
//! one streaming stats subscription per container, derives CPU, memory,
//! network and block I/O metrics from the raw counters and renders them as
//! braille plots.
use std::sync::Arc;

use config::{Cli, Config, LogConfig};
use engine::DockerEngine;
use error::{Error, ResultOkLogExt};
use stack::StackDescriptor;
use telemetry::Reconciler;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod container;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod plot;
pub mod stack;
pub mod telemetry;

/// Installs the logger. The terminal belongs to the dashboard, so records go
/// to the configured log file.
///
/// `RUST_LOG` overrides the configured level.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened, the configured level is
/// invalid or a logger is already installed.
pub fn init_logging(log: &LogConfig) -> error::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log.file)
        .map_err(|source| Error::LogFile {
            path: log.file.clone(),
            source,
        })?;

    env_logger::Builder::new()
        .filter_level(log.level_filter()?)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()?;
    Ok(())
}

/// Runs the dashboard for the stack declared by `cli.compose_file`.
///
/// Loads the compose file, connects to the engine, starts the reconciler
/// and drives the dashboard until the user quits. All telemetry tasks are
/// stopped before returning.
///
/// # Errors
///
/// Possible errors include:
/// - The compose file cannot be read or parsed.
/// - The engine socket cannot be reached.
/// - The terminal cannot be set up or written to.
pub async fn run(cli: Cli, config: Config) -> error::Result<()> {
    let stack = Arc::new(StackDescriptor::load(&cli.compose_file)?);
    let engine = Arc::new(DockerEngine::connect(cli.socket()).await?);
    log::info!("watching stack `{}`", stack.name());

    let shutdown = CancellationToken::new();
    let (events_tx, events_rx) = telemetry::event_channel(config.event_buffer);
    let reconciler = tokio::spawn(
        Reconciler::new(
            Arc::clone(&engine),
            Arc::clone(&stack),
            events_tx,
            config.reconcile_interval(),
            shutdown.clone(),
        )
        .run(),
    );

    let result = dashboard::run(engine, stack, config, events_rx, shutdown.clone()).await;

    shutdown.cancel();
    reconciler.await.ok_log();
    log::info!("stopped");
    result
}
