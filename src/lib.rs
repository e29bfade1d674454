//! # stigcheck
//!
//! Evaluates a live Kubernetes cluster against DISA Kubernetes STIG rules.
//!
//! ## Features
//!
//! - **Read-only**: Rules list and get cluster objects and run read-only commands in existing pods
//! - **Reference groups**: Replicas of one controller are checked once, on as few nodes as possible
//! - **Structured results**: Every verdict carries an ordered target path and a status
//! - **Exceptions**: Failing checks can be accepted with a justification through configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use stigcheck::config::types::StigConfig;
//! use stigcheck::handlers::{RunOptions, handle_run};
//!
//! # async fn example() -> stigcheck::Result<()> {
//! let config = StigConfig::load(None)?;
//! handle_run(config, RunOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;

// Re-export commonly used types and functions
pub use analyzer::stig::{CheckResult, Report, Rule, RuleResult, Status, Target};
pub use error::{Result, StigError};
use cli::Commands;
use config::types::StigConfig;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run_command(command: Commands, config: StigConfig) -> Result<()> {
    match command {
        Commands::Run {
            context,
            namespace,
            rules,
            ignore,
            format,
            output,
            timeout,
            only_findings,
            fail_on_findings,
        } => {
            let options = handlers::RunOptions {
                context,
                namespace,
                rules: rules.unwrap_or_default(),
                ignore: ignore.unwrap_or_default(),
                format,
                output,
                timeout,
                only_findings,
                fail_on_findings,
            };
            handlers::handle_run(config, options).await
        }
        Commands::Rules => handlers::handle_rules(),
    }
}
