//! In-memory collaborators for tests.
//!
//! `FakeCluster` serves objects from vectors, honoring namespace and equality
//! label selectors. `FakePodExecutor` replays scripted command outputs per pod
//! and records every call. `FakeNodeConfigFetcher` serves canned `/configz`
//! bodies per node.

use super::{ClusterClient, ClusterError, ListOptions, NodeConfigFetcher, PodExecutor};
use crate::analyzer::stig::extract::{match_labels, object_name, object_namespace};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// Cluster read access backed by in-memory objects.
#[derive(Debug, Default)]
pub struct FakeCluster {
    pods: Vec<Pod>,
    nodes: Vec<Node>,
    replica_sets: Vec<ReplicaSet>,
    namespaces: Vec<Namespace>,
    deployments: Vec<Deployment>,
    config_maps: Vec<ConfigMap>,
    secrets: Vec<Secret>,
    failures: HashMap<&'static str, ClusterError>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pods(mut self, pods: impl IntoIterator<Item = Pod>) -> Self {
        self.pods.extend(pods);
        self
    }

    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn with_replica_sets(mut self, replica_sets: impl IntoIterator<Item = ReplicaSet>) -> Self {
        self.replica_sets.extend(replica_sets);
        self
    }

    pub fn with_namespaces(mut self, namespaces: impl IntoIterator<Item = Namespace>) -> Self {
        self.namespaces.extend(namespaces);
        self
    }

    pub fn with_deployment(mut self, deployment: Deployment) -> Self {
        self.deployments.push(deployment);
        self
    }

    pub fn with_config_map(mut self, config_map: ConfigMap) -> Self {
        self.config_maps.push(config_map);
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secrets.push(secret);
        self
    }

    /// Make the named operation (`"list_pods"`, `"get_deployment"`, ...) fail.
    pub fn with_failure(mut self, operation: &'static str, error: ClusterError) -> Self {
        self.failures.insert(operation, error);
        self
    }

    fn check(&self, operation: &str) -> Result<(), ClusterError> {
        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn select<T: Clone>(items: &[T], options: &ListOptions, meta: impl Fn(&T) -> &ObjectMeta) -> Vec<T> {
    let selector = options
        .label_selector
        .as_deref()
        .map(parse_equality_selector)
        .unwrap_or_default();

    items
        .iter()
        .filter(|item| {
            let meta = meta(item);
            options
                .namespace
                .as_deref()
                .is_none_or(|ns| object_namespace(meta) == ns)
                && match_labels(meta.labels.as_ref(), &selector)
        })
        .cloned()
        .collect()
}

/// Parse `a=b,c==d` into a label map. Set based requirements are not supported.
fn parse_equality_selector(selector: &str) -> BTreeMap<String, String> {
    selector
        .split(',')
        .filter_map(|term| {
            let (key, value) = term.split_once("==").or_else(|| term.split_once('='))?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn get<T: Clone>(
    items: &[T],
    namespace: &str,
    name: &str,
    resource: &str,
    meta: impl Fn(&T) -> &ObjectMeta,
) -> Result<T, ClusterError> {
    items
        .iter()
        .find(|item| object_namespace(meta(item)) == namespace && object_name(meta(item)) == name)
        .cloned()
        .ok_or_else(|| ClusterError::not_found(resource, name))
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_pods(&self, options: &ListOptions) -> Result<Vec<Pod>, ClusterError> {
        self.check("list_pods")?;
        Ok(select(&self.pods, options, |p| &p.metadata))
    }

    async fn list_nodes(&self, options: &ListOptions) -> Result<Vec<Node>, ClusterError> {
        self.check("list_nodes")?;
        let options = ListOptions {
            namespace: None,
            ..options.clone()
        };
        Ok(select(&self.nodes, &options, |n| &n.metadata))
    }

    async fn list_replica_sets(&self, options: &ListOptions) -> Result<Vec<ReplicaSet>, ClusterError> {
        self.check("list_replica_sets")?;
        Ok(select(&self.replica_sets, options, |r| &r.metadata))
    }

    async fn list_namespaces(&self, options: &ListOptions) -> Result<Vec<Namespace>, ClusterError> {
        self.check("list_namespaces")?;
        let options = ListOptions {
            namespace: None,
            ..options.clone()
        };
        Ok(select(&self.namespaces, &options, |n| &n.metadata))
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        self.check("get_deployment")?;
        get(&self.deployments, namespace, name, "deployments.apps", |d| &d.metadata)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError> {
        self.check("get_config_map")?;
        get(&self.config_maps, namespace, name, "configmaps", |c| &c.metadata)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError> {
        self.check("get_secret")?;
        get(&self.secrets, namespace, name, "secrets", |s| &s.metadata)
    }
}

/// One recorded `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub command: String,
}

/// Replays scripted command outputs.
///
/// Responses are consumed in order, first from the queue of the target pod,
/// then from the shared default queue. An exhausted script is an error.
#[derive(Debug, Default)]
pub struct FakePodExecutor {
    per_pod: Mutex<HashMap<String, VecDeque<Result<String, ClusterError>>>>,
    default: Mutex<VecDeque<Result<String, ClusterError>>>,
    calls: Mutex<Vec<ExecCall>>,
}

impl FakePodExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the responses for commands run in `pod`.
    pub fn with_responses(
        self,
        pod: impl Into<String>,
        responses: impl IntoIterator<Item = Result<String, ClusterError>>,
    ) -> Self {
        self.per_pod
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(pod.into())
            .or_default()
            .extend(responses);
        self
    }

    /// Script responses for any pod without its own queue.
    pub fn with_default_responses(self, responses: impl IntoIterator<Item = Result<String, ClusterError>>) -> Self {
        self.default
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(responses);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PodExecutor for FakePodExecutor {
    async fn execute(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
    ) -> Result<String, ClusterError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ExecCall {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
                container: container.to_string(),
                command: command.to_string(),
            });

        let scripted = self
            .per_pod
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(pod)
            .and_then(VecDeque::pop_front);
        let response = match scripted {
            Some(response) => Some(response),
            None => self.default.lock().unwrap_or_else(|e| e.into_inner()).pop_front(),
        };

        response.unwrap_or_else(|| Err(ClusterError::Exec(format!("no scripted response for pod {}", pod))))
    }
}

/// Serves canned `/configz` bodies.
#[derive(Debug, Default)]
pub struct FakeNodeConfigFetcher {
    responses: HashMap<String, Result<Vec<u8>, ClusterError>>,
}

impl FakeNodeConfigFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, node: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(node.into(), Ok(body.into()));
        self
    }

    pub fn with_error(mut self, node: impl Into<String>, error: ClusterError) -> Self {
        self.responses.insert(node.into(), Err(error));
        self
    }
}

#[async_trait]
impl NodeConfigFetcher for FakeNodeConfigFetcher {
    async fn fetch_configz(&self, node: &str) -> Result<Vec<u8>, ClusterError> {
        self.responses
            .get(node)
            .cloned()
            .unwrap_or_else(|| Err(ClusterError::NotFound("the server could not find the requested resource".to_string())))
    }
}
