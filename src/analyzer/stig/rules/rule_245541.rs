//! 245541: Kubelet streamingConnectionIdleTimeout.

use super::{Rule, RuleEnv, RuleError, codes, rule_name};
use crate::analyzer::stig::cluster::{ListOptions, RunContext};
use crate::analyzer::stig::duration::ApiDuration;
use crate::analyzer::stig::extract::object_name;
use crate::analyzer::stig::kubelet::{is_node_ready, node_kubelet_config};
use crate::analyzer::stig::types::{CheckResult, RuleResult, Target};
use async_trait::async_trait;

const OPTION: &str = "streamingConnectionIdleTimeout";
const RECOMMENDED: ApiDuration = ApiDuration::from_mins(5);
const MAX_ALLOWED: ApiDuration = ApiDuration::from_hours(4);

/// Rule: the kubelet must close idle streaming connections.
pub struct StreamingConnectionIdleTimeoutRule {
    env: RuleEnv,
}

impl StreamingConnectionIdleTimeoutRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

/// Verdict for a configured timeout value.
fn check_timeout(raw: Option<&str>, target: Target) -> CheckResult {
    let Some(raw) = raw else {
        return CheckResult::failed(format!("Option {} not set.", OPTION), target);
    };
    let timeout = match ApiDuration::parse(raw) {
        Ok(timeout) => timeout,
        Err(err) => return CheckResult::errored(err.to_string(), target),
    };
    let details = target.with([("details", format!("{} set to {}.", OPTION, timeout))]);

    if timeout < RECOMMENDED || timeout > MAX_ALLOWED {
        CheckResult::failed(format!("Option {} set to not allowed value.", OPTION), details)
    } else if timeout == RECOMMENDED {
        CheckResult::passed(format!("Option {} set to allowed value.", OPTION), target)
    } else {
        CheckResult::passed(
            format!("Option {} set to allowed, but not recommended value (should be 5m).", OPTION),
            details,
        )
    }
}

#[async_trait]
impl Rule for StreamingConnectionIdleTimeoutRule {
    fn id(&self) -> &str {
        codes::STREAMING_CONNECTION_IDLE_TIMEOUT
    }

    fn name(&self) -> &str {
        rule_name(self.id())
    }

    async fn run(&self, ctx: &RunContext) -> Result<RuleResult, RuleError> {
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

        let mut check_results = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let node_name = object_name(&node.metadata);
            let target = base.with([("kind", "node"), ("name", node_name)]);

            if !is_node_ready(node) {
                check_results.push(CheckResult::warning("Node is not in Ready state.", target));
                continue;
            }

            match node_kubelet_config(ctx, self.env.node_config.as_ref(), node_name).await {
                Ok(config) => check_results.push(check_timeout(
                    config.streaming_connection_idle_timeout.as_deref(),
                    target,
                )),
                Err(err) => {
                    log::warn!("failed to read kubelet config of node {}: {}", node_name, err);
                    check_results.push(CheckResult::errored(err.to_string(), target));
                }
            }
        }

        Ok(RuleResult::new(self, check_results))
    }
}
