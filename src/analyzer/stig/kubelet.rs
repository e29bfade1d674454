//! Kubelet configuration helpers.
//!
//! The kubelet is configured through command line flags and a config file
//! (`--config`). The effective configuration of a running kubelet is also
//! served by the API server's node proxy at `/configz`.

use crate::analyzer::stig::cluster::{NodeConfigFetcher, PodExecutor, RunContext};
use crate::analyzer::stig::error::EvalError;
use crate::analyzer::stig::files::shell_quote;
use crate::analyzer::stig::flags::find_flag_values_in_command;
use k8s_openapi::api::core::v1::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The subset of the kubelet configuration the rules inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_port: Option<i32>,
    /// Kept raw: rules report malformed values instead of failing to decode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_connection_idle_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protect_kernel_defaults: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_record_qps: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
}

#[derive(Debug, Deserialize)]
struct Configz {
    kubeletconfig: KubeletConfig,
}

/// Path given to `--config` in a raw kubelet command line.
pub fn kubelet_config_path(raw_kubelet_command: &str) -> Result<String, EvalError> {
    let mut paths = find_flag_values_in_command(raw_kubelet_command, "config");
    match paths.len() {
        0 => Err(EvalError::OptionNotSet(
            "kubelet config file has not been set".to_string(),
        )),
        1 => Ok(paths.remove(0)),
        _ => Err(EvalError::AmbiguousOption(
            "kubelet config file has been set more than once".to_string(),
        )),
    }
}

/// Read and decode the kubelet config file referenced by a kubelet command
/// line, from inside a pod that can see the node's file system.
pub async fn get_kubelet_config(
    ctx: &RunContext,
    executor: &dyn PodExecutor,
    namespace: &str,
    pod: &str,
    container: &str,
    raw_kubelet_command: &str,
) -> Result<KubeletConfig, EvalError> {
    let path = kubelet_config_path(raw_kubelet_command)?;
    let content = ctx
        .call(executor.execute(namespace, pod, container, &format!("cat -- {}", shell_quote(&path))))
        .await?;
    serde_yaml::from_str(&content).map_err(EvalError::parse)
}

/// Decode a `/configz` response body.
pub fn decode_configz(body: &[u8]) -> Result<KubeletConfig, EvalError> {
    let configz: Configz = serde_json::from_slice(body).map_err(EvalError::parse)?;
    Ok(configz.kubeletconfig)
}

/// Fetch the live kubelet configuration of a node.
pub async fn node_kubelet_config(
    ctx: &RunContext,
    fetcher: &dyn NodeConfigFetcher,
    node: &str,
) -> Result<KubeletConfig, EvalError> {
    let body = ctx.call(fetcher.fetch_configz(node)).await?;
    decode_configz(&body)
}

/// Whether the node reports the `Ready` condition as `True`.
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}
