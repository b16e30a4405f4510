use clap::Parser;
use stackscope::config::{Cli, Config};

/// Entry point for the Stackscope compose stack dashboard.
///
/// Parses the command line, loads the optional configuration file, installs
/// the file logger and hands over to [`stackscope::run`].
///
/// # Errors
///
/// Returns an error if startup fails (e.g., an unreadable compose or config
/// file, an unreachable engine socket, or a terminal that cannot enter raw mode).
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug cargo run -- ./shop/compose.yaml
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    stackscope::init_logging(&config.log)?;
    stackscope::run(cli, config).await?;
    Ok(())
}
