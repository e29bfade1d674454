use crate::analyzer::stig::acceptance::AcceptanceList;
use crate::analyzer::stig::cluster::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StigConfig {
    pub provider: ProviderConfig,
    /// Rule IDs that are never run.
    pub ignore_rules: Vec<String>,
    pub rules: RuleOptions,
    pub output: OutputConfig,
}

/// Cluster connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Kubeconfig context; the current context when unset.
    pub context: Option<String>,
    /// Label added as `cluster=<name>` to every result target.
    pub cluster_name: Option<String>,
    /// Namespace of the control plane workloads.
    pub control_plane_namespace: String,
    pub page_size: u32,
    /// Overall deadline for a run, e.g. `5m`.
    pub timeout: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            context: None,
            cluster_name: None,
            control_plane_namespace: "kube-system".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: None,
        }
    }
}

/// A container of a workload controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRef {
    pub deployment: String,
    pub container: String,
}

impl WorkloadRef {
    pub fn new(deployment: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
            container: container.into(),
        }
    }
}

/// A set of existing pods to run commands in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSelectorOptions {
    pub namespace: String,
    pub label_selector: String,
    pub container: String,
}

impl PodSelectorOptions {
    pub fn kube_proxy() -> Self {
        Self {
            namespace: "kube-system".to_string(),
            label_selector: "k8s-app=kube-proxy".to_string(),
            container: "kube-proxy".to_string(),
        }
    }
}

/// Options of the secrets-in-environment rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretsInEnvOptions {
    pub accepted_pods: AcceptanceList,
}

/// Per-rule options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleOptions {
    /// The API server workload inspected by the control plane rules.
    pub api_server: WorkloadRef,
    /// kube-proxy pods, inspected for their config file permissions.
    pub kube_proxy: PodSelectorOptions,
    /// Pods sharing the host network of every worker node.
    pub node_pods: PodSelectorOptions,
    #[serde(rename = "242415")]
    pub secrets_in_env: SecretsInEnvOptions,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            api_server: WorkloadRef::new("kube-apiserver", "kube-apiserver"),
            kube_proxy: PodSelectorOptions::kube_proxy(),
            node_pods: PodSelectorOptions::kube_proxy(),
            secrets_in_env: SecretsInEnvOptions::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Leave passed, skipped and accepted results out of plain reports.
    pub only_findings: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}
