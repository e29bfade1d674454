use crate::config::types::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stig-ctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate a Kubernetes cluster against DISA STIG rules")]
#[command(long_about = "Reads cluster objects and runtime state of existing pods and reports, per rule, which checks passed, failed or could not be evaluated. The cluster is never modified.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run compliance rules against a cluster
    Run {
        /// Kubeconfig context to use (defaults to the current context)
        #[arg(long, value_name = "CONTEXT")]
        context: Option<String>,

        /// Namespace of the control plane workloads
        #[arg(short, long, value_name = "NAMESPACE")]
        namespace: Option<String>,

        /// Only run these rule IDs
        #[arg(short, long, value_delimiter = ',', value_name = "IDS")]
        rules: Option<Vec<String>>,

        /// Skip these rule IDs
        #[arg(long, value_delimiter = ',', value_name = "IDS")]
        ignore: Option<Vec<String>>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Overall deadline for cluster calls (e.g. 5m, 90s)
        #[arg(long, value_name = "DURATION")]
        timeout: Option<String>,

        /// Only show failed, warning and errored checks
        #[arg(long)]
        only_findings: bool,

        /// Exit with a non-zero code when checks fail or error
        #[arg(long)]
        fail_on_findings: bool,
    },

    /// List available rules
    Rules,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "stig-ctl",
            "-vv",
            "run",
            "--context",
            "kind-kind",
            "--rules",
            "242415,242438",
            "--format",
            "json",
            "--timeout",
            "2m",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                context,
                rules,
                format,
                timeout,
                only_findings,
                ..
            } => {
                assert_eq!(context.as_deref(), Some("kind-kind"));
                assert_eq!(rules, Some(vec!["242415".to_string(), "242438".to_string()]));
                assert_eq!(format, Some(OutputFormat::Json));
                assert_eq!(timeout.as_deref(), Some("2m"));
                assert!(!only_findings);
            }
            Commands::Rules => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["stig-ctl", "rules", "--quiet", "--config", "stig.yaml"]);
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("stig.yaml")));
        assert!(matches!(cli.command, Commands::Rules));
    }
}
