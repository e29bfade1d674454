//! Volume content resolution.
//!
//! Reads the content of a file that a pod sees through a ConfigMap or Secret
//! volume, without exec'ing into the pod.

use crate::analyzer::stig::cluster::{ClusterClient, RunContext};
use crate::analyzer::stig::error::EvalError;
use crate::analyzer::stig::extract::{container_from_deployment, deployment_pod_spec, find_volume, object_namespace};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Volume;

/// Get the bytes of `file_name` from a ConfigMap or Secret volume.
pub async fn file_data_from_volume(
    ctx: &RunContext,
    client: &dyn ClusterClient,
    namespace: &str,
    volume: &Volume,
    file_name: &str,
) -> Result<Vec<u8>, EvalError> {
    if let Some(source) = &volume.config_map {
        let config_map = ctx.call(client.get_config_map(namespace, &source.name)).await?;
        if let Some(data) = config_map.data.as_ref().and_then(|d| d.get(file_name)) {
            return Ok(data.clone().into_bytes());
        }
        if let Some(data) = config_map.binary_data.as_ref().and_then(|d| d.get(file_name)) {
            return Ok(data.0.clone());
        }
        return Err(EvalError::MissingField {
            kind: "configMap",
            name: source.name.clone(),
            field: file_name.to_string(),
        });
    }

    if let Some(source) = &volume.secret {
        let secret_name = source.secret_name.as_deref().unwrap_or_default();
        let secret = ctx.call(client.get_secret(namespace, secret_name)).await?;
        return match secret.data.as_ref().and_then(|d| d.get(file_name)) {
            Some(data) => Ok(data.0.clone()),
            None => Err(EvalError::MissingField {
                kind: "secret",
                name: secret_name.to_string(),
                field: file_name.to_string(),
            }),
        };
    }

    Err(EvalError::UnsupportedSource(volume.name.clone()))
}

/// Get the bytes of the file at `file_path` as seen by a Deployment container.
///
/// The file's directory must be the mount path of one of the container's
/// volume mounts; the file name is looked up in that volume.
pub async fn config_bytes_by_mount_path(
    ctx: &RunContext,
    client: &dyn ClusterClient,
    deployment: &Deployment,
    container_name: &str,
    file_path: &str,
) -> Result<Vec<u8>, EvalError> {
    let container = container_from_deployment(deployment, container_name)
        .ok_or_else(|| EvalError::ContainerNotFound(container_name.to_string()))?;

    let (dir, file_name) = file_path.rsplit_once('/').unwrap_or(("", file_path));
    let mount = container
        .volume_mounts
        .iter()
        .flatten()
        .find(|mount| mount.mount_path.trim_end_matches('/') == dir)
        .ok_or_else(|| EvalError::VolumePathNotFound(file_path.to_string()))?;

    let volume = deployment_pod_spec(deployment)
        .and_then(|spec| find_volume(spec, &mount.name))
        .ok_or_else(|| EvalError::VolumeNotFound(mount.name.clone()))?;

    file_data_from_volume(
        ctx,
        client,
        object_namespace(&deployment.metadata),
        volume,
        file_name,
    )
    .await
}
