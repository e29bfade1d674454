//! Cluster collaborators.
//!
//! Rules never talk to the Kubernetes API directly. They read objects through
//! [`ClusterClient`], run commands in existing pods through [`PodExecutor`] and
//! fetch live kubelet configuration through [`NodeConfigFetcher`]. The kube-rs
//! backed implementation lives in [`client`]; in-memory fakes for tests live in
//! [`fake`].

pub mod fake;
pub mod client;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub use self::fake::{FakeCluster, FakeNodeConfigFetcher, FakePodExecutor};
pub use self::client::KubeCluster;

/// Default page size for list calls.
pub const DEFAULT_PAGE_SIZE: u32 = 300;

/// Error type for cluster collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// The object does not exist. Carries the API server's own message,
    /// e.g. `deployments.apps "foo" not found`.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Api(String),

    /// Command execution inside a pod failed.
    #[error("{0}")]
    Exec(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to create Kubernetes client: {0}")]
    ClientCreation(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ClusterError {
    /// The not-found message the API server produces for a missing object.
    pub fn not_found(resource: &str, name: &str) -> Self {
        Self::NotFound(format!("{} \"{}\" not found", resource, name))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Scope of a list call. Listings are always drained across pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Namespace to list in, `None` for all namespaces.
    pub namespace: Option<String>,
    /// Label selector in API syntax (`app=foo,tier!=db`).
    pub label_selector: Option<String>,
    pub page_size: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            label_selector: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self::default().with_namespace(namespace)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Read access to cluster objects.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_pods(&self, options: &ListOptions) -> Result<Vec<Pod>, ClusterError>;

    async fn list_nodes(&self, options: &ListOptions) -> Result<Vec<Node>, ClusterError>;

    async fn list_replica_sets(&self, options: &ListOptions) -> Result<Vec<ReplicaSet>, ClusterError>;

    async fn list_namespaces(&self, options: &ListOptions) -> Result<Vec<Namespace>, ClusterError>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError>;

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError>;
}

/// Runs shell commands inside existing pods.
#[async_trait]
pub trait PodExecutor: Send + Sync {
    /// Run `command` with `/bin/sh -c` in the given container and return its
    /// standard output.
    async fn execute(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
    ) -> Result<String, ClusterError>;
}

/// Fetches the live kubelet configuration of a node.
#[async_trait]
pub trait NodeConfigFetcher: Send + Sync {
    /// Raw body of `GET /api/v1/nodes/<node>/proxy/configz`.
    async fn fetch_configz(&self, node: &str) -> Result<Vec<u8>, ClusterError>;
}

/// Per-invocation context handed to every rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunContext {
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every collaborator call to finish within `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Await a collaborator call, failing with
    /// [`ClusterError::DeadlineExceeded`] once the deadline has passed.
    pub async fn call<T, F>(&self, call: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, ClusterError>>,
    {
        match self.deadline {
            None => call.await,
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .map_err(|_| ClusterError::DeadlineExceeded)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ClusterError::not_found("deployments.apps", "foo");
        assert_eq!(err.to_string(), "deployments.apps \"foo\" not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_options_builder() {
        let options = ListOptions::namespaced("kube-system")
            .with_label_selector("app=kube-proxy")
            .with_page_size(50);
        assert_eq!(options.namespace.as_deref(), Some("kube-system"));
        assert_eq!(options.label_selector.as_deref(), Some("app=kube-proxy"));
        assert_eq!(options.page_size, 50);
        assert_eq!(ListOptions::all().page_size, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_call_without_deadline() {
        let ctx = RunContext::new();
        let value = ctx.call(async { Ok::<_, ClusterError>(7) }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_past_deadline() {
        let ctx = RunContext::new().with_timeout(Duration::from_millis(10));
        let result = ctx
            .call(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ClusterError>(())
            })
            .await;
        assert_eq!(result, Err(ClusterError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_call_passes_errors_through() {
        let ctx = RunContext::new().with_timeout(Duration::from_secs(60));
        let result: Result<(), _> = ctx.call(async { Err(ClusterError::Exec("foo".to_string())) }).await;
        assert_eq!(result.unwrap_err().to_string(), "foo");
    }
}
