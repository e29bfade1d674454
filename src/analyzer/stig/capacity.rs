//! Remaining schedulable pod budget per node.

use crate::analyzer::stig::extract::{object_name, pod_node_name};
use k8s_openapi::api::core::v1::{Node, Pod};
use std::collections::HashMap;

/// Compute the remaining pod capacity of every node.
///
/// Each node starts from its `status.allocatable["pods"]` and loses one slot
/// for every pod scheduled on it. Unscheduled pods and pods bound to nodes that
/// are not in `nodes` are ignored. The result is not clamped: consumers treat
/// any value `<= 0` as exhausted.
pub fn nodes_allocatable_pods(pods: &[Pod], nodes: &[Node]) -> HashMap<String, i64> {
    let mut allocatable: HashMap<String, i64> = nodes
        .iter()
        .map(|node| (object_name(&node.metadata).to_string(), node_pod_capacity(node)))
        .collect();

    for pod in pods {
        let node_name = pod_node_name(pod);
        if node_name.is_empty() {
            continue;
        }
        if let Some(remaining) = allocatable.get_mut(node_name) {
            *remaining -= 1;
        }
    }

    allocatable
}

/// Declared allocatable pod count of a node. Absent or unparsable is 0.
pub fn node_pod_capacity(node: &Node) -> i64 {
    node.status
        .as_ref()
        .and_then(|s| s.allocatable.as_ref())
        .and_then(|a| a.get("pods"))
        .and_then(|q| parse_pod_quantity(&q.0))
        .unwrap_or(0)
}

/// Parse a decimal resource quantity ("110", "1k", "0.5Ki") into a whole
/// number of pods, rounding fractional results up.
pub fn parse_pod_quantity(quantity: &str) -> Option<i64> {
    const SUFFIXES: [(&str, f64); 13] = [
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("n", 1e-9),
        ("u", 1e-6),
        ("m", 1e-3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
    ];

    let quantity = quantity.trim();
    if quantity.is_empty() {
        return None;
    }

    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| quantity.strip_suffix(suffix).map(|n| (n, *mult)))
        .unwrap_or((quantity, 1.0));

    let value = number.parse::<f64>().ok()? * multiplier;
    if !value.is_finite() {
        return None;
    }
    Some(value.ceil() as i64)
}
