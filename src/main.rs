use clap::Parser;
use std::process;
use stigcheck::cli::Cli;
use stigcheck::config::types::StigConfig;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> stigcheck::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    // Load configuration
    let config = StigConfig::load(cli.config.as_deref())?;

    // Execute command
    stigcheck::run_command(cli.command, config).await
}
