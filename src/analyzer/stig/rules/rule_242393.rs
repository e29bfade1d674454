//! 242393: Worker nodes must not run sshd.
//!
//! The check runs in a host network pod on every node (kube-proxy by default)
//! and looks for a TCP socket listening on port 22 in `/proc/net/tcp{,6}`.

use super::{Rule, RuleEnv, RuleError, codes, rule_name};
use crate::analyzer::stig::cluster::{ListOptions, RunContext};
use crate::analyzer::stig::extract::{object_name, object_namespace, pod_node_name};
use crate::analyzer::stig::kubelet::is_node_ready;
use crate::analyzer::stig::types::{CheckResult, RuleResult};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

const LIST_SOCKETS: &str = "cat /proc/net/tcp /proc/net/tcp6 2>/dev/null || true";
const SSH_PORT: u16 = 22;
/// `TCP_LISTEN` in the kernel's socket state table.
const STATE_LISTEN: &str = "0A";

/// Rule: no SSH daemon may listen on worker nodes.
pub struct SshdRule {
    env: RuleEnv,
}

impl SshdRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

/// Whether a `/proc/net/tcp` style listing has a listening socket on `port`.
pub fn is_listening_on(proc_net_tcp: &str, port: u16) -> bool {
    proc_net_tcp.lines().any(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (Some(local_address), Some(state)) = (fields.get(1), fields.get(3)) else {
            return false;
        };
        let Some((_, hex_port)) = local_address.rsplit_once(':') else {
            return false;
        };
        *state == STATE_LISTEN && u16::from_str_radix(hex_port, 16).ok() == Some(port)
    })
}

#[async_trait]
impl Rule for SshdRule {
    fn id(&self) -> &str {
        codes::SSHD
    }

    fn name(&self) -> &str {
        rule_name(self.id())
    }

    async fn run(&self, ctx: &RunContext) -> Result<RuleResult, RuleError> {
        let selector = &self.env.options.node_pods;
        if selector.label_selector.trim().is_empty() {
            return Err(RuleError::orchestration(self.id(), "node pod label selector is not configured"));
        }
        let base = &self.env.base_target;

        let nodes = match ctx
            .call(self.env.client.list_nodes(&ListOptions::all().with_page_size(self.env.page_size)))
            .await
        {
            Ok(nodes) => nodes,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err.to_string(), base.with([("kind", "nodeList")])),
                ));
            }
        };

        let options = ListOptions::namespaced(&selector.namespace)
            .with_label_selector(&selector.label_selector)
            .with_page_size(self.env.page_size);
        let pods = match ctx.call(self.env.client.list_pods(&options)).await {
            Ok(pods) => pods,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err.to_string(), base.with([("kind", "podList")])),
                ));
            }
        };

        let mut check_results = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let node_name = object_name(&node.metadata);
            let target = base.with([("kind", "node"), ("name", node_name)]);

            if !is_node_ready(node) {
                check_results.push(CheckResult::warning("Node is not in Ready state.", target));
                continue;
            }

            let Some(pod) = pods.iter().find(|p: &&Pod| pod_node_name(p) == node_name) else {
                check_results.push(CheckResult::warning(
                    "No pod found on node to execute the check in.",
                    target,
                ));
                continue;
            };

            let output = ctx
                .call(self.env.executor.execute(
                    object_namespace(&pod.metadata),
                    object_name(&pod.metadata),
                    &selector.container,
                    LIST_SOCKETS,
                ))
                .await;

            check_results.push(match output {
                Err(err) => CheckResult::errored(err.to_string(), target),
                Ok(sockets) if is_listening_on(&sockets, SSH_PORT) => {
                    CheckResult::failed("SSH daemon started on port 22", target)
                }
                Ok(_) => CheckResult::passed("SSH daemon not listening on port 22", target),
            });
        }

        Ok(RuleResult::new(self, check_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::stig::cluster::{
        ClusterError, FakeCluster, FakeNodeConfigFetcher, FakePodExecutor, PodExecutor,
    };
    use crate::analyzer::stig::rules::test_support::{env_with, node, pod, with_labels};
    use crate::analyzer::stig::types::{Status, Target};
    use std::sync::Arc;

    const LISTENING_22: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 19113 1 0000000000000000 100 0 0 10 0
   1: 0100007F:2710 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 19114 1 0000000000000000 100 0 0 10 0
";
    const CONNECTED_22: &str = "  sl  local_address rem_address   st
   0: 0A000002:C350 0A000001:0016 01 00000000:00000000
   1: 0A000002:0016 0A000001:C351 06 00000000:00000000
";

    fn proxy(name: &str, node: &str) -> Pod {
        with_labels(pod(name, "kube-system", node), &[("k8s-app", "kube-proxy")])
    }

    #[test]
    fn test_is_listening_on() {
        assert!(is_listening_on(LISTENING_22, 22));
        assert!(is_listening_on(LISTENING_22, 10000));
        assert!(!is_listening_on(LISTENING_22, 80));
        assert!(!is_listening_on(CONNECTED_22, 22));
        assert!(!is_listening_on("", 22));
        assert!(is_listening_on(
            "0: 00000000000000000000000000000000:0016 00000000000000000000000000000000:0000 0A",
            22
        ));
    }

    #[tokio::test]
    async fn test_per_node_results() {
        let cluster = FakeCluster::new()
            .with_nodes([
                node("node1", "10", true),
                node("node2", "10", true),
                node("node3", "10", false),
                node("node4", "10", true),
                node("node5", "10", true),
            ])
            .with_pods([
                proxy("proxy-1", "node1"),
                proxy("proxy-2", "node2"),
                proxy("proxy-3", "node3"),
                proxy("proxy-5", "node5"),
            ]);
        let executor = FakePodExecutor::new()
            .with_responses("proxy-1", [Ok(LISTENING_22.to_string())])
            .with_responses("proxy-2", [Ok(CONNECTED_22.to_string())])
            .with_responses("proxy-5", [Err(ClusterError::Exec("command stderr output: denied".to_string()))]);
        let rule = SshdRule::new(env_with(cluster, executor, FakeNodeConfigFetcher::new()));

        let result = rule.run(&RunContext::new()).await.unwrap();

        let node_target = |name: &str| Target::new([("kind", "node"), ("name", name)]);
        assert_eq!(
            result.check_results,
            vec![
                CheckResult::failed("SSH daemon started on port 22", node_target("node1")),
                CheckResult::passed("SSH daemon not listening on port 22", node_target("node2")),
                CheckResult::warning("Node is not in Ready state.", node_target("node3")),
                CheckResult::warning("No pod found on node to execute the check in.", node_target("node4")),
                CheckResult::errored("command stderr output: denied", node_target("node5")),
            ]
        );
    }

    #[tokio::test]
    async fn test_exec_uses_configured_container() {
        let cluster = FakeCluster::new()
            .with_nodes([node("node1", "10", true)])
            .with_pods([proxy("proxy-1", "node1")]);
        let executor = Arc::new(FakePodExecutor::new().with_default_responses([Ok(String::new())]));
        let shared: Arc<dyn PodExecutor> = executor.clone();
        let mut rule_env = env_with(cluster, FakePodExecutor::new(), FakeNodeConfigFetcher::new());
        rule_env.executor = shared;

        let result = SshdRule::new(rule_env).run(&RunContext::new()).await.unwrap();
        assert_eq!(result.check_results[0].status, Status::Passed);

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].namespace, "kube-system");
        assert_eq!(calls[0].container, "kube-proxy");
        assert_eq!(calls[0].command, LIST_SOCKETS);
    }

    #[tokio::test]
    async fn test_missing_selector_is_an_orchestration_error() {
        let mut rule_env = env_with(FakeCluster::new(), FakePodExecutor::new(), FakeNodeConfigFetcher::new());
        rule_env.options.node_pods.label_selector = String::new();

        let err = SshdRule::new(rule_env).run(&RunContext::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "rule 242393: node pod label selector is not configured");
    }

    #[tokio::test]
    async fn test_node_list_error() {
        let cluster = FakeCluster::new().with_failure("list_nodes", ClusterError::Api("forbidden".to_string()));
        let rule = SshdRule::new(env_with(cluster, FakePodExecutor::new(), FakeNodeConfigFetcher::new()));

        let result = rule.run(&RunContext::new()).await.unwrap();
        assert_eq!(
            result.check_results,
            vec![CheckResult::errored("forbidden", Target::new([("kind", "nodeList")]))]
        );
    }
}
