//! kube-rs backed cluster collaborators.

use super::{ClusterClient, ClusterError, ListOptions, NodeConfigFetcher, PodExecutor};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret};
use kube::{
    Client, Config,
    api::{Api, AttachParams, ListParams},
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Live cluster access through a kube-rs client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using the inferred configuration (in-cluster or kubeconfig).
    pub async fn new() -> Result<Self, ClusterError> {
        let config = Config::infer()
            .await
            .map_err(|e| ClusterError::ClientCreation(e.to_string()))?;
        Self::from_config(config)
    }

    /// Connect using a specific kubeconfig context.
    pub async fn with_context(context: &str) -> Result<Self, ClusterError> {
        let kubeconfig =
            kube::config::Kubeconfig::read().map_err(|e| ClusterError::ClientCreation(e.to_string()))?;
        let config = Config::from_custom_kubeconfig(
            kubeconfig,
            &kube::config::KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| ClusterError::ClientCreation(e.to_string()))?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, ClusterError> {
        let client = Client::try_from(config).map_err(|e| ClusterError::ClientCreation(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn namespaced_or_all<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Drain every page of a listing.
async fn list_all<K>(api: &Api<K>, options: &ListOptions) -> Result<Vec<K>, ClusterError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut params = ListParams::default().limit(options.page_size);
    if let Some(selector) = &options.label_selector {
        params = params.labels(selector);
    }

    let mut items = Vec::new();
    loop {
        let page = api.list(&params).await.map_err(map_kube_error)?;
        items.extend(page.items);

        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => {
                params = params.continue_token(&token);
            }
            _ => break,
        }
    }

    log::debug!("listed {} objects", items.len());
    Ok(items)
}

/// Read an attached output stream to the end.
async fn read_stream<R>(reader: Option<R>) -> Result<String, ClusterError>
where
    R: AsyncRead + Unpin,
{
    let mut output = String::new();
    if let Some(mut reader) = reader {
        reader
            .read_to_string(&mut output)
            .await
            .map_err(|e| ClusterError::Exec(e.to_string()))?;
    }
    Ok(output)
}

/// Read stdout and stderr to the end. Both pipes are fed by one task, so they
/// are drained together.
async fn drain_output<O, E>(stdout: Option<O>, stderr: Option<E>) -> Result<(String, String), ClusterError>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    tokio::try_join!(read_stream(stdout), read_stream(stderr))
}

fn map_kube_error(err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound(resp.message),
        kube::Error::Api(resp) => ClusterError::Api(resp.message),
        other => ClusterError::Api(other.to_string()),
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn list_pods(&self, options: &ListOptions) -> Result<Vec<Pod>, ClusterError> {
        let api: Api<Pod> = self.namespaced_or_all(options.namespace.as_deref());
        list_all(&api, options).await
    }

    async fn list_nodes(&self, options: &ListOptions) -> Result<Vec<Node>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        list_all(&api, options).await
    }

    async fn list_replica_sets(&self, options: &ListOptions) -> Result<Vec<ReplicaSet>, ClusterError> {
        let api: Api<ReplicaSet> = self.namespaced_or_all(options.namespace.as_deref());
        list_all(&api, options).await
    }

    async fn list_namespaces(&self, options: &ListOptions) -> Result<Vec<Namespace>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        list_all(&api, options).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(map_kube_error)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(map_kube_error)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(map_kube_error)
    }
}

#[async_trait]
impl PodExecutor for KubeCluster {
    async fn execute(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
    ) -> Result<String, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default()
            .container(container)
            .stdout(true)
            .stderr(true);

        log::debug!("exec in {}/{} ({}): {}", namespace, pod, container, command);
        let mut attached = api
            .exec(pod, ["/bin/sh", "-c", command], &params)
            .await
            .map_err(|e| ClusterError::Exec(e.to_string()))?;

        let (stdout, stderr) = drain_output(attached.stdout(), attached.stderr()).await?;

        let status = match attached.take_status() {
            Some(status) => status.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| ClusterError::Exec(e.to_string()))?;

        if let Some(status) = status
            && status.status.as_deref() == Some("Failure")
        {
            let mut message = status.message.unwrap_or_default();
            if !stderr.is_empty() {
                message = format!("command stderr output: {}", stderr.trim_end());
            }
            return Err(ClusterError::Exec(message));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl NodeConfigFetcher for KubeCluster {
    async fn fetch_configz(&self, node: &str) -> Result<Vec<u8>, ClusterError> {
        let path = format!("/api/v1/nodes/{}/proxy/configz", node);
        let request = http::Request::builder()
            .method("GET")
            .uri(&path)
            .body(Vec::new())
            .map_err(|e| ClusterError::Api(format!("Failed to build request: {}", e)))?;

        let body = self
            .client
            .request_text(request)
            .await
            .map_err(map_kube_error)?;
        Ok(body.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    #[tokio::test]
    async fn test_drain_output_reads_stderr_while_stdout_is_open() {
        let (mut stdout_tx, stdout_rx) = duplex(64);
        let (mut stderr_tx, stderr_rx) = duplex(64);
        let writer = tokio::spawn(async move {
            // Far more than the pipe holds before stdout is closed.
            stderr_tx.write_all(&[b'e'; 4096]).await.unwrap();
            drop(stderr_tx);
            stdout_tx.write_all(b"644 0 0 /a\n").await.unwrap();
        });

        let (stdout, stderr) = drain_output(Some(stdout_rx), Some(stderr_rx)).await.unwrap();
        writer.await.unwrap();

        assert_eq!(stdout, "644 0 0 /a\n");
        assert_eq!(stderr.len(), 4096);
    }

    #[tokio::test]
    async fn test_drain_output_without_streams() {
        let (stdout, stderr) = drain_output(None::<DuplexStream>, None::<DuplexStream>).await.unwrap();
        assert!(stdout.is_empty());
        assert!(stderr.is_empty());
    }
}
