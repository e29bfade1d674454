//! Ownership resolution for workload controllers.
//!
//! Recovers the live pods of a Deployment by following the
//! Deployment -> ReplicaSet -> Pod owner reference chain.

use crate::analyzer::stig::cluster::{ClusterClient, ClusterError, ListOptions, RunContext};
use crate::analyzer::stig::error::EvalError;
use crate::analyzer::stig::extract::{
    command_tokens, container_from_deployment, is_owned_by, object_uid, owner_references,
};
use crate::analyzer::stig::flags::find_flag_value_raw;
use k8s_openapi::api::core::v1::Pod;
use std::collections::HashMap;

pub use crate::analyzer::stig::extract::{
    container_from_pod_spec, container_from_stateful_set, volume_from_stateful_set,
};

/// Get the live pods of a Deployment.
///
/// ReplicaSets owned by the Deployment are visited in listing order; one with
/// an explicit replica count of 0 contributes nothing. Pods of each eligible
/// ReplicaSet follow in listing order. A missing Deployment fails with the
/// API server's not-found message.
///
/// Pods are joined to their ReplicaSet through a table keyed by owner UID,
/// built once from the pod listing.
pub async fn get_deployment_pods(
    ctx: &RunContext,
    client: &dyn ClusterClient,
    name: &str,
    namespace: &str,
    page_size: u32,
) -> Result<Vec<Pod>, ClusterError> {
    ctx.call(client.get_deployment(namespace, name)).await?;

    let options = ListOptions::namespaced(namespace).with_page_size(page_size);
    let replica_sets = ctx.call(client.list_replica_sets(&options)).await?;
    let pods = ctx.call(client.list_pods(&options)).await?;

    let mut by_owner: HashMap<&str, Vec<&Pod>> = HashMap::new();
    for pod in &pods {
        for owner in owner_references(&pod.metadata) {
            if owner.kind == "ReplicaSet" {
                by_owner.entry(owner.uid.as_str()).or_default().push(pod);
            }
        }
    }

    let mut result = Vec::new();
    for replica_set in &replica_sets {
        if !is_owned_by(&replica_set.metadata, "Deployment", name) {
            continue;
        }
        let replicas = replica_set.spec.as_ref().and_then(|s| s.replicas);
        if replicas == Some(0) {
            continue;
        }
        if let Some(owned) = by_owner.get(object_uid(&replica_set.metadata)) {
            result.extend(owned.iter().map(|pod| (*pod).clone()));
        }
    }

    log::debug!(
        "deployment {}/{} resolved to {} pods",
        namespace,
        name,
        result.len()
    );
    Ok(result)
}

/// Find every value of `option` in the command and args of a Deployment's
/// container.
pub async fn get_command_option_from_deployment(
    ctx: &RunContext,
    client: &dyn ClusterClient,
    deployment_name: &str,
    container_name: &str,
    namespace: &str,
    option: &str,
) -> Result<Vec<String>, EvalError> {
    let deployment = ctx.call(client.get_deployment(namespace, deployment_name)).await?;

    let container = container_from_deployment(&deployment, container_name).ok_or_else(|| {
        EvalError::MissingContainer {
            deployment: deployment_name.to_string(),
            container: container_name.to_string(),
        }
    })?;

    Ok(find_flag_value_raw(&command_tokens(container), option))
}
