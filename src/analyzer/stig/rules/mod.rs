//! Compliance rules.
//!
//! Each rule is implemented as a separate module named after its STIG ID.
//! Rules read the cluster through the collaborators in [`RuleEnv`] and report
//! every verdict as a [`CheckResult`](crate::analyzer::stig::types::CheckResult).

mod rule_242385;
mod rule_242388;
mod rule_242389;
mod rule_242393;
mod rule_242396;
mod rule_242415;
mod rule_242438;
mod rule_242447;
mod rule_242451;
mod rule_245541;

pub use rule_242385::ControllerManagerBindAddressRule;
pub use rule_242388::InsecureBindAddressRule;
pub use rule_242389::SecurePortRule;
pub use rule_242393::SshdRule;
pub use rule_242396::KubectlVersionRule;
pub use rule_242415::SecretsInEnvRule;
pub use rule_242438::RequestTimeoutRule;
pub use rule_242447::KubeProxyFilePermissionsRule;
pub use rule_242451::PkiOwnershipRule;
pub use rule_245541::StreamingConnectionIdleTimeoutRule;

use crate::analyzer::stig::cluster::{
    ClusterClient, DEFAULT_PAGE_SIZE, NodeConfigFetcher, PodExecutor, RunContext,
};
use crate::analyzer::stig::types::{RuleResult, Target};
use crate::config::types::RuleOptions;
use async_trait::async_trait;
use std::sync::Arc;

// ============================================================================
// Rule Trait
// ============================================================================

/// A single compliance check.
#[async_trait]
pub trait Rule: Send + Sync {
    /// Stable rule ID (e.g., "242415").
    fn id(&self) -> &str;

    /// Human readable rule name.
    fn name(&self) -> &str;

    /// Evaluate the rule against the cluster.
    ///
    /// Problems with individual objects are reported as `Errored` check
    /// results. An `Err` means nothing could be evaluated at all.
    async fn run(&self, ctx: &RunContext) -> Result<RuleResult, RuleError>;
}

/// Failure that prevented a rule from evaluating anything.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule {rule}: {message}")]
    Orchestration { rule: String, message: String },
}

impl RuleError {
    pub fn orchestration(rule: &str, message: impl Into<String>) -> Self {
        Self::Orchestration {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

/// Collaborators and settings shared by all rules.
#[derive(Clone)]
pub struct RuleEnv {
    pub client: Arc<dyn ClusterClient>,
    pub executor: Arc<dyn PodExecutor>,
    pub node_config: Arc<dyn NodeConfigFetcher>,
    pub options: RuleOptions,
    /// Namespace of the control plane workloads.
    pub namespace: String,
    pub page_size: u32,
    /// Prefix of every check result target.
    pub base_target: Target,
}

impl RuleEnv {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        executor: Arc<dyn PodExecutor>,
        node_config: Arc<dyn NodeConfigFetcher>,
    ) -> Self {
        Self {
            client,
            executor,
            node_config,
            options: RuleOptions::default(),
            namespace: "kube-system".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            base_target: Target::default(),
        }
    }

    pub fn with_options(mut self, options: RuleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_base_target(mut self, base_target: Target) -> Self {
        self.base_target = base_target;
        self
    }
}

// ============================================================================
// Rule Codes
// ============================================================================

/// Rule ID constants.
pub mod codes {
    pub const CONTROLLER_MANAGER_BIND_ADDRESS: &str = "242385";
    pub const INSECURE_BIND_ADDRESS: &str = "242388";
    pub const SECURE_PORT: &str = "242389";
    pub const SSHD: &str = "242393";
    pub const KUBECTL_VERSION: &str = "242396";
    pub const SECRETS_IN_ENV: &str = "242415";
    pub const REQUEST_TIMEOUT: &str = "242438";
    pub const KUBE_PROXY_FILE_PERMISSIONS: &str = "242447";
    pub const PKI_OWNERSHIP: &str = "242451";
    pub const STREAMING_CONNECTION_IDLE_TIMEOUT: &str = "245541";

    /// All rule IDs in registration order.
    pub const ALL: [&str; 10] = [
        CONTROLLER_MANAGER_BIND_ADDRESS,
        INSECURE_BIND_ADDRESS,
        SECURE_PORT,
        SSHD,
        KUBECTL_VERSION,
        SECRETS_IN_ENV,
        REQUEST_TIMEOUT,
        KUBE_PROXY_FILE_PERMISSIONS,
        PKI_OWNERSHIP,
        STREAMING_CONNECTION_IDLE_TIMEOUT,
    ];
}

// ============================================================================
// Rule Registry
// ============================================================================

/// Get all available rules, in registration order.
pub fn all_rules(env: &RuleEnv) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ControllerManagerBindAddressRule::new(env.clone())),
        Box::new(InsecureBindAddressRule::new(env.clone())),
        Box::new(SecurePortRule::new(env.clone())),
        Box::new(SshdRule::new(env.clone())),
        Box::new(KubectlVersionRule::new(env.clone())),
        Box::new(SecretsInEnvRule::new(env.clone())),
        Box::new(RequestTimeoutRule::new(env.clone())),
        Box::new(KubeProxyFilePermissionsRule::new(env.clone())),
        Box::new(PkiOwnershipRule::new(env.clone())),
        Box::new(StreamingConnectionIdleTimeoutRule::new(env.clone())),
    ]
}

/// Get rule name by ID.
pub fn rule_name(id: &str) -> &'static str {
    match id {
        codes::CONTROLLER_MANAGER_BIND_ADDRESS => {
            "The Kubernetes Controller Manager must have secure binding (MEDIUM 242385)"
        }
        codes::INSECURE_BIND_ADDRESS => {
            "The Kubernetes API server must have the insecure bind address not set (HIGH 242388)"
        }
        codes::SECURE_PORT => "The Kubernetes API server must have the secure port set (MEDIUM 242389)",
        codes::SSHD => "Kubernetes Worker Nodes must not have sshd service running (MEDIUM 242393)",
        codes::KUBECTL_VERSION => {
            "Kubernetes Kubectl cp command must give expected access and results (MEDIUM 242396)"
        }
        codes::SECRETS_IN_ENV => {
            "Secrets in Kubernetes must not be stored as environment variables (HIGH 242415)"
        }
        codes::REQUEST_TIMEOUT => {
            "Kubernetes API Server must configure timeouts to limit attack surface (MEDIUM 242438)"
        }
        codes::KUBE_PROXY_FILE_PERMISSIONS => {
            "The Kubernetes Kube Proxy kubeconfig must have file permissions set to 644 or more restrictive (MEDIUM 242447)"
        }
        codes::PKI_OWNERSHIP => "The Kubernetes component PKI must be owned by root (MEDIUM 242451)",
        codes::STREAMING_CONNECTION_IDLE_TIMEOUT => {
            "Kubernetes Kubelet must not disable timeouts (MEDIUM 245541)"
        }
        _ => "Unknown rule",
    }
}

/// Target of the API server Deployment.
pub(crate) fn api_server_target(env: &RuleEnv) -> Target {
    env.base_target.with([
        ("name", env.options.api_server.deployment.as_str()),
        ("namespace", env.namespace.as_str()),
        ("kind", "deployment"),
    ])
}
