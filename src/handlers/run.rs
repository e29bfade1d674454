//! Handler for the `run` command.
//!
//! Connects to the cluster, evaluates the selected rules and writes the
//! report.

use crate::analyzer::stig::cluster::{ClusterClient, KubeCluster, NodeConfigFetcher, PodExecutor, RunContext};
use crate::analyzer::stig::duration::ApiDuration;
use crate::analyzer::stig::formatter::{FormatOptions, format_report_to_string};
use crate::analyzer::stig::rules::{RuleEnv, all_rules, codes};
use crate::analyzer::stig::runner::{Report, Runner};
use crate::analyzer::stig::types::Target;
use crate::config::types::{OutputFormat, StigConfig};
use crate::error::{Result, StigError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the run command
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Kubeconfig context, overrides the config file
    pub context: Option<String>,
    /// Control plane namespace, overrides the config file
    pub namespace: Option<String>,
    /// Only run these rules
    pub rules: Vec<String>,
    /// Skip these rules in addition to the configured ones
    pub ignore: Vec<String>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    pub timeout: Option<String>,
    pub only_findings: bool,
    pub fail_on_findings: bool,
}

impl RunOptions {
    /// Fold command line overrides into the loaded configuration.
    pub fn apply(&self, mut config: StigConfig) -> StigConfig {
        if let Some(context) = &self.context {
            config = config.with_context(context.clone());
        }
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace.clone());
        }
        if let Some(timeout) = &self.timeout {
            config = config.with_timeout(timeout.clone());
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.only_findings {
            config.output.only_findings = true;
        }
        config.with_ignored_rules(self.ignore.iter().cloned())
    }
}

/// Reject rule IDs that are not in the catalog.
fn validate_rule_ids(ids: &[String]) -> Result<()> {
    match ids.iter().find(|id| !codes::ALL.contains(&id.as_str())) {
        Some(id) => Err(StigError::UnknownRule(id.clone())),
        None => Ok(()),
    }
}

/// Build the run context from the configured timeout.
pub fn run_context(config: &StigConfig) -> Result<RunContext> {
    let ctx = RunContext::new();
    match &config.provider.timeout {
        None => Ok(ctx),
        Some(raw) => {
            let timeout = ApiDuration::parse(raw)?;
            let nanos = u64::try_from(timeout.as_nanos()).unwrap_or(0);
            Ok(ctx.with_timeout(Duration::from_nanos(nanos)))
        }
    }
}

/// Build the rule environment for a cluster.
pub fn rule_env(
    config: &StigConfig,
    client: Arc<dyn ClusterClient>,
    executor: Arc<dyn PodExecutor>,
    node_config: Arc<dyn NodeConfigFetcher>,
) -> RuleEnv {
    let base_target = match &config.provider.cluster_name {
        Some(name) => Target::new([("cluster", name.as_str())]),
        None => Target::default(),
    };
    RuleEnv::new(client, executor, node_config)
        .with_options(config.rules.clone())
        .with_namespace(config.provider.control_plane_namespace.clone())
        .with_page_size(config.provider.page_size)
        .with_base_target(base_target)
}

/// Evaluate the configured rules and build a report.
pub async fn evaluate(config: &StigConfig, env: &RuleEnv, only: &[String], ctx: &RunContext) -> Report {
    let runner = Runner::filtered(all_rules(env), only, &config.ignore_rules);
    log::info!("running rules: {}", runner.rule_ids().join(", "));
    Report::new(runner.run(ctx).await).with_cluster(config.provider.cluster_name.clone())
}

/// Handle the `run` command.
pub async fn handle_run(config: StigConfig, options: RunOptions) -> Result<()> {
    validate_rule_ids(&options.rules)?;
    validate_rule_ids(&options.ignore)?;
    let config = options.apply(config);
    let ctx = run_context(&config)?;

    // Install rustls crypto provider (required for TLS connections to K8s API)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cluster = match &config.provider.context {
        Some(context) => KubeCluster::with_context(context).await?,
        None => KubeCluster::new().await?,
    };
    let cluster = Arc::new(cluster);
    let env = rule_env(&config, cluster.clone(), cluster.clone(), cluster);

    let report = evaluate(&config, &env, &options.rules, &ctx).await;

    let rendered = format_report_to_string(
        &report,
        FormatOptions {
            format: config.output.format,
            only_findings: config.output.only_findings,
        },
    )?;
    match &options.output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            println!("Report written to: {}", path.display());
        }
        None => println!("{}", rendered),
    }

    if options.fail_on_findings && report.has_findings() {
        let summary = report.summary();
        eprintln!(
            "{} failed and {} errored checks",
            summary.failed, summary.errored
        );
        std::process::exit(1);
    }

    Ok(())
}
