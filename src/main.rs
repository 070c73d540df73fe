mod cli;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Structured logging only off the TUI; the TUI owns the terminal and
    // surfaces everything through its notification line.
    if args.is_headless() {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let is_headless = args.is_headless();
    match cli::run(args).await {
        Ok(()) => {
            if is_headless {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
