//! Container and pod spec extraction utilities.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, Volume};

/// Pod spec of a Deployment's pod template.
pub fn deployment_pod_spec(deployment: &Deployment) -> Option<&PodSpec> {
    deployment.spec.as_ref()?.template.spec.as_ref()
}

/// Pod spec of a StatefulSet's pod template.
pub fn stateful_set_pod_spec(stateful_set: &StatefulSet) -> Option<&PodSpec> {
    stateful_set.spec.as_ref()?.template.spec.as_ref()
}

/// Find a container by name.
pub fn container_from_pod_spec<'a>(pod_spec: &'a PodSpec, name: &str) -> Option<&'a Container> {
    pod_spec.containers.iter().find(|c| c.name == name)
}

/// Find a volume by name.
pub fn find_volume<'a>(pod_spec: &'a PodSpec, name: &str) -> Option<&'a Volume> {
    pod_spec.volumes.as_deref()?.iter().find(|v| v.name == name)
}

/// Find a container of a Deployment's pod template.
pub fn container_from_deployment<'a>(deployment: &'a Deployment, name: &str) -> Option<&'a Container> {
    deployment_pod_spec(deployment).and_then(|spec| container_from_pod_spec(spec, name))
}

/// Find a container of a StatefulSet's pod template.
pub fn container_from_stateful_set<'a>(stateful_set: &'a StatefulSet, name: &str) -> Option<&'a Container> {
    stateful_set_pod_spec(stateful_set).and_then(|spec| container_from_pod_spec(spec, name))
}

/// Find a volume of a StatefulSet's pod template.
pub fn volume_from_stateful_set<'a>(stateful_set: &'a StatefulSet, name: &str) -> Option<&'a Volume> {
    stateful_set_pod_spec(stateful_set).and_then(|spec| find_volume(spec, name))
}

/// Command followed by args, as the container runtime sees them.
pub fn command_tokens(container: &Container) -> Vec<&str> {
    container
        .command
        .iter()
        .flatten()
        .chain(container.args.iter().flatten())
        .map(String::as_str)
        .collect()
}

/// Name of the node a pod is scheduled on, or the empty string.
pub fn pod_node_name(pod: &Pod) -> &str {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .unwrap_or_default()
}

/// Regular containers of a pod.
pub fn pod_containers(pod: &Pod) -> &[Container] {
    pod.spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or_default()
}
