//! A3S Image CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_image_cli::commands::{dispatch, Cli};
use a3s_image_core::ToolConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ToolConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli, &config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
